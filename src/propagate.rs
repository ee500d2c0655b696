//! Cascading application of relationship effects.
//!
//! When a parent shape mutates, its declared effects propagate to child
//! shapes, and from them onward to grandchildren. Propagation runs after
//! the triggering mutation has committed, so every step observes a fully
//! applied state. Recursion depth is bounded by graph depth (the graph is
//! acyclic); a visited set guards against invariant violations.

use std::collections::HashSet;

use crate::relationships::RelationshipEffect;
use crate::shapes::{ShapeId, ShapePatch};
use crate::store::{DocumentState, DocumentStore};

/// Which class of parent mutation is being propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectScope {
    /// Geometric transforms: move/resize/rotate-with-parent,
    /// maintain-distance, clip-by-parent
    Position,
    /// Style inheritance
    Style,
    /// Auto-layout re-flow (computed by the external layout capability;
    /// carried on the relationship, no geometric delta here)
    Layout,
}

/// The transform delta a parent mutation produced
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeDelta {
    pub dx: f64,
    pub dy: f64,
    pub dw: f64,
    pub dh: f64,
    pub drotation: f64,
}

impl ShapeDelta {
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::default()
        }
    }

    pub fn resize(dw: f64, dh: f64) -> Self {
        Self {
            dw,
            dh,
            ..Self::default()
        }
    }

    pub fn rotate(drotation: f64) -> Self {
        Self {
            drotation,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn effect_in_scope(effect: &RelationshipEffect, scope: EffectScope) -> bool {
    match scope {
        EffectScope::Position => matches!(
            effect,
            RelationshipEffect::MoveWithParent { .. }
                | RelationshipEffect::ResizeWithParent
                | RelationshipEffect::RotateWithParent
                | RelationshipEffect::MaintainDistance { .. }
                | RelationshipEffect::ClipByParent
        ),
        EffectScope::Style => matches!(effect, RelationshipEffect::InheritStyle),
        EffectScope::Layout => matches!(effect, RelationshipEffect::AutoLayout),
    }
}

/// Compute the per-descendant updates a parent mutation calls for,
/// transitively, without applying anything. The returned patches are
/// absolute, so they can be applied in any order (or replayed as
/// commands inside a batch).
pub fn plan_child_updates(
    state: &DocumentState,
    parent_id: ShapeId,
    delta: &ShapeDelta,
    scope: EffectScope,
) -> Vec<(ShapeId, ShapePatch)> {
    let mut visited = HashSet::from([parent_id]);
    let mut plan = Vec::new();
    plan_recursive(state, parent_id, delta, scope, &mut visited, &mut plan);
    plan
}

fn plan_recursive(
    state: &DocumentState,
    parent_id: ShapeId,
    delta: &ShapeDelta,
    scope: EffectScope,
    visited: &mut HashSet<ShapeId>,
    plan: &mut Vec<(ShapeId, ShapePatch)>,
) {
    let parent = state.shape(parent_id);
    let child_rels: Vec<_> = state
        .relationships()
        .child_relationships(parent_id)
        .into_iter()
        .map(|r| (r.child_id, r.effects.clone()))
        .collect();

    for (child_id, effects) in child_rels {
        if !visited.insert(child_id) {
            continue;
        }
        let Some(child) = state.shape(child_id) else {
            continue;
        };

        let mut patch = ShapePatch::default();
        let mut clip = false;
        for effect in effects.iter().filter(|e| effect_in_scope(e, scope)) {
            match effect {
                RelationshipEffect::MoveWithParent { offset: None }
                | RelationshipEffect::MaintainDistance { .. } => {
                    patch.x = Some(child.x + delta.dx);
                    patch.y = Some(child.y + delta.dy);
                }
                RelationshipEffect::MoveWithParent {
                    offset: Some((ox, oy)),
                } => {
                    // Pin to a fixed offset from the (already mutated)
                    // parent position
                    if let Some(parent) = parent {
                        patch.x = Some(parent.x + ox);
                        patch.y = Some(parent.y + oy);
                    }
                }
                RelationshipEffect::ResizeWithParent => {
                    patch.width = Some(child.width + delta.dw);
                    patch.height = Some(child.height + delta.dh);
                }
                RelationshipEffect::RotateWithParent => {
                    patch.rotation = Some(child.rotation + delta.drotation);
                }
                RelationshipEffect::ClipByParent => clip = true,
                RelationshipEffect::InheritStyle => {
                    if let Some(parent) = parent {
                        patch.fill = Some(parent.style.fill.clone());
                        patch.stroke = Some(parent.style.stroke.clone());
                        patch.stroke_width = Some(parent.style.stroke_width);
                        patch.opacity = Some(parent.style.opacity);
                    }
                }
                RelationshipEffect::AutoLayout => {}
            }
        }

        if clip && let Some(parent) = parent {
            let x = patch.x.unwrap_or(child.x);
            let y = patch.y.unwrap_or(child.y);
            let max_x = (parent.x + parent.width - child.width).max(parent.x);
            let max_y = (parent.y + parent.height - child.height).max(parent.y);
            patch.x = Some(x.clamp(parent.x, max_x));
            patch.y = Some(y.clamp(parent.y, max_y));
        }

        if patch.is_empty() {
            continue;
        }

        // Grandchildren inherit the delta the child actually received,
        // which may differ from the parent's after pinning or clipping
        let child_delta = ShapeDelta {
            dx: patch.x.map_or(0.0, |x| x - child.x),
            dy: patch.y.map_or(0.0, |y| y - child.y),
            dw: patch.width.map_or(0.0, |w| w - child.width),
            dh: patch.height.map_or(0.0, |h| h - child.height),
            drotation: patch.rotation.map_or(0.0, |r| r - child.rotation),
        };
        plan.push((child_id, patch));

        if scope == EffectScope::Style || !child_delta.is_empty() {
            plan_recursive(state, child_id, &child_delta, scope, visited, plan);
        }
    }
}

/// Apply a parent mutation's effects to all descendants via the store.
/// Locked descendants reject their update and simply stay put. Returns
/// the number of shapes updated.
pub fn apply_effects_to_children(
    store: &mut DocumentStore,
    parent_id: ShapeId,
    delta: &ShapeDelta,
    scope: EffectScope,
) -> usize {
    let plan = plan_child_updates(store.state(), parent_id, delta, scope);
    let mut applied = 0;
    for (child_id, patch) in plan {
        if store.update_shape(child_id, &patch).is_applied() {
            applied += 1;
        }
    }
    applied
}
