//! Auto-formation of relationships from geometric overlap.
//!
//! Rules are evaluated in descending priority order against every other
//! shape in the store; the first satisfied rule wins for a given pair.
//! Bounds come from the external geometry capability, never from shape
//! internals.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{GeometryProvider, OverlapCondition};
use crate::relationships::{RelationshipEffect, RelationshipId, RelationshipKind, ShapeRelationship};
use crate::shapes::{ShapeId, ShapeKind};
use crate::store::DocumentStore;

/// A prioritized rule deciding when a relationship auto-forms between two
/// overlapping shapes, and which effects it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRule {
    pub id: String,
    pub kind: RelationshipKind,
    /// Required parent shape kind; `None` matches any
    pub parent_kind: Option<ShapeKind>,
    /// Required child shape kind; `None` matches any
    pub child_kind: Option<ShapeKind>,
    pub can_form_on_overlap: bool,
    pub overlap: OverlapCondition,
    pub allow_multiple_parents: bool,
    pub priority: i32,
    /// Effect template copied onto every relationship this rule forms
    pub effects: Vec<RelationshipEffect>,
}

impl RelationshipRule {
    pub fn new(id: impl Into<String>, kind: RelationshipKind, overlap: OverlapCondition) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_kind: None,
            child_kind: None,
            can_form_on_overlap: true,
            overlap,
            allow_multiple_parents: false,
            priority: 0,
            effects: Vec::new(),
        }
    }

    pub fn with_parent_kind(mut self, kind: ShapeKind) -> Self {
        self.parent_kind = Some(kind);
        self
    }

    pub fn with_child_kind(mut self, kind: ShapeKind) -> Self {
        self.child_kind = Some(kind);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_effects(mut self, effects: Vec<RelationshipEffect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn allowing_multiple_parents(mut self) -> Self {
        self.allow_multiple_parents = true;
        self
    }

    fn matches_kinds(&self, parent: ShapeKind, child: ShapeKind) -> bool {
        self.parent_kind.is_none_or(|k| k == parent)
            && self.child_kind.is_none_or(|k| k == child)
    }
}

/// Prioritized ruleset evaluated whenever a shape moves or is created
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    /// Sorted by descending priority; first match wins
    rules: Vec<RelationshipRule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, keeping the set sorted by descending priority.
    /// Rules of equal priority keep registration order.
    pub fn register(&mut self, rule: RelationshipRule) {
        let pos = self
            .rules
            .iter()
            .position(|r| r.priority < rule.priority)
            .unwrap_or(self.rules.len());
        self.rules.insert(pos, rule);
    }

    pub fn rules(&self) -> &[RelationshipRule] {
        &self.rules
    }

    /// Evaluate a moved or newly created shape against every other shape
    /// and form the relationships the ruleset calls for. Returns the ids
    /// of the relationships that were added.
    ///
    /// This is an O(shapes) scan per call; fine for interactive shape
    /// counts. Spatial indexing is a future optimization, not a current
    /// requirement.
    pub fn check_and_form(
        &self,
        moved_id: ShapeId,
        store: &mut DocumentStore,
        geometry: &dyn GeometryProvider,
    ) -> Vec<RelationshipId> {
        let mut candidates = Vec::new();
        // Parents formed earlier in this same scan, so a single-parent
        // rule cannot claim the same child twice in one pass
        let mut formed_in_pass: HashSet<(ShapeId, RelationshipKind)> = HashSet::new();
        {
            let state = store.state();
            let Some(moved) = state.shape(moved_id) else {
                return Vec::new();
            };
            let moved_bounds = geometry.bounds(moved);

            for other_id in state.shape_ids() {
                if other_id == moved_id {
                    continue;
                }
                let Some(other) = state.shape(other_id) else {
                    continue;
                };
                let other_bounds = geometry.bounds(other);

                'rules: for rule in &self.rules {
                    if !rule.can_form_on_overlap {
                        continue;
                    }
                    // The moved shape may sit on either side of the edge
                    let orientations = [
                        (other.id, other.kind, &other_bounds, moved.id, moved.kind, &moved_bounds),
                        (moved.id, moved.kind, &moved_bounds, other.id, other.kind, &other_bounds),
                    ];
                    for (parent_id, parent_kind, parent_bounds, child_id, child_kind, child_bounds)
                        in orientations
                    {
                        if !rule.matches_kinds(parent_kind, child_kind) {
                            continue;
                        }
                        if !rule.overlap.matches(parent_bounds, child_bounds) {
                            continue;
                        }
                        let existing = state.relationships().parent_relationships(child_id);
                        if existing
                            .iter()
                            .any(|r| r.kind == rule.kind && r.parent_id == parent_id)
                        {
                            continue;
                        }
                        if !rule.allow_multiple_parents
                            && (existing.iter().any(|r| r.kind == rule.kind)
                                || formed_in_pass.contains(&(child_id, rule.kind)))
                        {
                            continue;
                        }
                        debug!(
                            rule = %rule.id,
                            parent = %parent_id,
                            child = %child_id,
                            "rule matched, forming relationship"
                        );
                        formed_in_pass.insert((child_id, rule.kind));
                        candidates.push(ShapeRelationship::new(
                            rule.kind,
                            parent_id,
                            child_id,
                            rule.effects.clone(),
                        ));
                        break 'rules;
                    }
                }
            }
        }

        let mut formed = Vec::new();
        for rel in candidates {
            let id = rel.id;
            // The graph re-checks acyclicity at insertion
            if store.set_state(|state| state.relationships_mut().add(rel)) {
                formed.push(id);
            }
        }
        formed
    }
}
