//! The whiteboard engine facade.
//!
//! Owns the store, history, rule engine, and geometry capability, and is
//! the only mutation surface tool/input code is meant to call. Compound
//! gestures (moving a parent with its descendants) are wrapped in batch
//! transactions so they land on the undo stack as one unit.

use anyhow::Result;

use crate::command::Command;
use crate::geometry::{BasicGeometry, GeometryProvider};
use crate::history::History;
use crate::propagate::{plan_child_updates, EffectScope, ShapeDelta};
use crate::relationships::RelationshipId;
use crate::rules::{RelationshipRule, RuleEngine};
use crate::shapes::{Shape, ShapeId, ShapePatch};
use crate::store::{DocumentState, DocumentStore, Outcome};

/// A whiteboard document with its mutation engine
pub struct Whiteboard {
    store: DocumentStore,
    history: History,
    rules: RuleEngine,
    geometry: Box<dyn GeometryProvider>,
}

impl Default for Whiteboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Whiteboard {
    pub fn new() -> Self {
        Self::with_geometry(BasicGeometry)
    }

    /// Build an engine around a custom geometry capability (rotated
    /// bounds, path shapes)
    pub fn with_geometry(geometry: impl GeometryProvider + 'static) -> Self {
        Self {
            store: DocumentStore::new(),
            history: History::new(),
            rules: RuleEngine::new(),
            geometry: Box::new(geometry),
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Read-only view of the document
    pub fn state(&self) -> &DocumentState {
        self.store.state()
    }

    /// Register a presentation-layer observer of committed mutations
    pub fn subscribe(&mut self, f: impl Fn(&DocumentState) + 'static) {
        self.store.subscribe(f);
    }

    pub fn register_rule(&mut self, rule: RelationshipRule) {
        self.rules.register(rule);
    }

    // --- Command entry points ---

    /// Execute a command through the history manager
    pub fn execute(&mut self, cmd: Command) -> Result<Outcome> {
        self.history.execute(cmd, &mut self.store)
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.history.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.history.redo(&mut self.store)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn begin_batch(&mut self, description: impl Into<String>) -> Result<()> {
        self.history.begin_batch(description)
    }

    pub fn end_batch(&mut self) -> Result<()> {
        self.history.end_batch()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // --- Compound operations ---

    /// Add a shape and evaluate relationship rules for it. Returns the
    /// shape id.
    pub fn add_shape(&mut self, shape: Shape) -> Result<ShapeId> {
        let id = shape.id;
        self.execute(Command::add_shape(shape))?;
        self.check_relationships(id);
        Ok(id)
    }

    pub fn delete_shape(&mut self, id: ShapeId) -> Result<Outcome> {
        self.execute(Command::delete_shape(id))
    }

    pub fn update_shape(&mut self, id: ShapeId, patch: ShapePatch) -> Result<Outcome> {
        self.execute(Command::update_shape(id, patch))
    }

    /// Move a shape and cascade position effects to its descendants, all
    /// recorded as one undo unit. A move that would not touch any child
    /// (no relationship children, or only effects outside the position
    /// scope) takes the plain command path so rapid drag updates keep
    /// coalescing.
    pub fn move_shape(&mut self, id: ShapeId, dx: f64, dy: f64) -> Result<Outcome> {
        let Some(shape) = self.store.state().shape(id) else {
            return Ok(Outcome::Rejected);
        };
        let target = ShapePatch::move_to(shape.x + dx, shape.y + dy);
        let delta = ShapeDelta::translate(dx, dy);

        // Preview against the pre-move state: the parent's position only
        // shifts the planned patch values, never whether a child is
        // touched at all.
        let cascades = !plan_child_updates(self.store.state(), id, &delta, EffectScope::Position)
            .is_empty();
        if !cascades {
            return self.execute(Command::update_shape(id, target));
        }

        self.history.begin_batch("Move shape")?;
        let outcome = self
            .history
            .execute(Command::update_shape(id, target), &mut self.store)?;
        if outcome.is_applied() {
            // Re-plan against the committed state so pinned offsets see
            // the parent's new position, then replay as commands so the
            // whole cascade shares the batch's undo unit
            let plan = plan_child_updates(self.store.state(), id, &delta, EffectScope::Position);
            for (child_id, patch) in plan {
                self.history
                    .execute(Command::update_shape(child_id, patch), &mut self.store)?;
            }
        }
        self.history.end_batch()?;
        Ok(outcome)
    }

    /// Re-evaluate relationship rules for a moved or created shape.
    /// Auto-formed relationships mutate the store directly; they are
    /// derived state, not user edits, and stay off the undo stack.
    pub fn check_relationships(&mut self, id: ShapeId) -> Vec<RelationshipId> {
        self.rules
            .check_and_form(id, &mut self.store, self.geometry.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::OverlapCondition;
    use crate::relationships::{RelationshipEffect, RelationshipKind, ShapeRelationship};
    use crate::shapes::ShapeKind;

    fn rect(x: f64, y: f64) -> Shape {
        Shape::new(ShapeKind::Rect, x, y, 10.0, 10.0)
    }

    fn link_move(board: &mut Whiteboard, parent: ShapeId, child: ShapeId) {
        board.execute(Command::add_relationship(ShapeRelationship::new(
            RelationshipKind::Attachment,
            parent,
            child,
            vec![RelationshipEffect::MoveWithParent { offset: None }],
        )))
        .unwrap();
    }

    #[test]
    fn move_with_children_is_one_undo_unit() {
        let mut board = Whiteboard::new();
        let p = board.add_shape(rect(0.0, 0.0)).unwrap();
        let c = board.add_shape(rect(30.0, 0.0)).unwrap();
        link_move(&mut board, p, c);
        let undo_before = board.history().undo_count();

        board.move_shape(p, 10.0, 20.0).unwrap();
        assert_eq!(board.state().shape(c).unwrap().x, 40.0);
        assert_eq!(board.history().undo_count(), undo_before + 1);

        board.undo().unwrap();
        assert_eq!(board.state().shape(p).unwrap().x, 0.0);
        assert_eq!(board.state().shape(c).unwrap().x, 30.0);

        board.redo().unwrap();
        assert_eq!(board.state().shape(c).unwrap().y, 20.0);
    }

    #[test]
    fn childless_moves_keep_coalescing() {
        let mut board = Whiteboard::new();
        let id = board.add_shape(rect(0.0, 0.0)).unwrap();
        let undo_before = board.history().undo_count();

        board.move_shape(id, 5.0, 0.0).unwrap();
        board.move_shape(id, 5.0, 0.0).unwrap();
        assert_eq!(board.history().undo_count(), undo_before + 1);

        board.undo().unwrap();
        assert_eq!(board.state().shape(id).unwrap().x, 0.0);
    }

    #[test]
    fn style_only_children_do_not_break_move_coalescing() {
        let mut board = Whiteboard::new();
        let p = board.add_shape(rect(0.0, 0.0)).unwrap();
        let c = board.add_shape(rect(30.0, 0.0)).unwrap();
        board
            .execute(Command::add_relationship(ShapeRelationship::new(
                RelationshipKind::Connection,
                p,
                c,
                vec![RelationshipEffect::InheritStyle],
            )))
            .unwrap();
        let undo_before = board.history().undo_count();

        board.move_shape(p, 5.0, 0.0).unwrap();
        board.move_shape(p, 5.0, 0.0).unwrap();
        assert_eq!(board.history().undo_count(), undo_before + 1);
        assert_eq!(board.state().shape(c).unwrap().x, 30.0);

        board.undo().unwrap();
        assert_eq!(board.state().shape(p).unwrap().x, 0.0);
    }

    #[test]
    fn dropping_a_shape_into_a_frame_forms_containment() {
        let mut board = Whiteboard::new();
        board.register_rule(
            RelationshipRule::new(
                "frame-containment",
                RelationshipKind::Containment,
                OverlapCondition::Contains,
            )
            .with_parent_kind(ShapeKind::Frame)
            .with_effects(vec![RelationshipEffect::MoveWithParent { offset: None }]),
        );

        let frame = board
            .add_shape(Shape::new(ShapeKind::Frame, 0.0, 0.0, 200.0, 200.0))
            .unwrap();
        let inner = board.add_shape(rect(50.0, 50.0)).unwrap();

        let rels = board.state().relationships();
        assert_eq!(rels.len(), 1);
        let rel = rels.parent_relationships(inner)[0];
        assert_eq!(rel.parent_id, frame);

        // Containment now carries motion
        board.move_shape(frame, 10.0, 0.0).unwrap();
        assert_eq!(board.state().shape(inner).unwrap().x, 60.0);
    }

    #[test]
    fn moving_a_missing_shape_is_rejected() {
        let mut board = Whiteboard::new();
        assert_eq!(
            board.move_shape(ShapeId::new(), 1.0, 1.0).unwrap(),
            Outcome::Rejected
        );
        assert!(!board.can_undo());
    }
}
