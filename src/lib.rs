//! slateboard - the document mutation core of a whiteboard editor.
//!
//! Everything that changes the document goes through a reversible
//! [`Command`] executed by the [`History`] manager against the
//! [`DocumentStore`]. A [`RelationshipGraph`] records parent/child edges
//! between shapes; the [`RuleEngine`] auto-forms edges from geometric
//! overlap, and the propagator in [`propagate`] cascades a parent's
//! mutation down to its descendants.
//!
//! Rendering, input handling, camera math, and persistence live outside
//! this crate. They observe the store through [`Whiteboard::subscribe`]
//! and supply geometry through the [`GeometryProvider`] capability.

pub mod command;
pub mod engine;
pub mod geometry;
pub mod history;
pub mod propagate;
pub mod relationships;
pub mod rules;
pub mod shapes;
pub mod store;

pub use command::{Command, MergeWindows};
pub use engine::Whiteboard;
pub use geometry::{BasicGeometry, Bounds, GeometryProvider, OverlapCondition};
pub use history::History;
pub use propagate::{apply_effects_to_children, plan_child_updates, EffectScope, ShapeDelta};
pub use relationships::{
    RelationshipEffect, RelationshipGraph, RelationshipId, RelationshipKind, ShapeRelationship,
};
pub use rules::{RelationshipRule, RuleEngine};
pub use shapes::{
    GroupId, LayerInfo, Shape, ShapeGroup, ShapeId, ShapeKind, ShapePatch, ShapeStyle,
};
pub use store::{DocumentState, DocumentStore, Outcome, RemovedShape};
