//! Relationship model and the directed graph over shape ids.
//!
//! Records are stored by id; an insertion-order list keeps iteration
//! deterministic, and the two adjacency indexes (parent to children,
//! child to parents) hold relationship ids only. All three are kept in
//! lock-step with the record map on every insert and removal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::shapes::ShapeId;

/// Relationship identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub Uuid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of directed edge between two shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    Containment,
    Attachment,
    Connection,
    Clip,
    Mask,
    Instance,
    Layout,
}

impl RelationshipKind {
    pub fn name(&self) -> &'static str {
        match self {
            RelationshipKind::Containment => "Containment",
            RelationshipKind::Attachment => "Attachment",
            RelationshipKind::Connection => "Connection",
            RelationshipKind::Clip => "Clip",
            RelationshipKind::Mask => "Mask",
            RelationshipKind::Instance => "Instance",
            RelationshipKind::Layout => "Layout",
        }
    }
}

/// Declarative rule for how a child reacts to its parent's mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationshipEffect {
    /// Child translates with the parent. An explicit offset pins the child
    /// at a fixed position relative to the parent instead of applying the
    /// raw delta.
    MoveWithParent { offset: Option<(f64, f64)> },
    RotateWithParent,
    ResizeWithParent,
    /// Child position is clamped inside the parent bounds after a move
    ClipByParent,
    /// Child copies the parent's style fields
    InheritStyle,
    MaintainDistance { distance: f64 },
    AutoLayout,
}

/// A directed parent-child edge carrying a kind and its effects.
/// Invariant: `parent_id != child_id` and the graph stays acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRelationship {
    pub id: RelationshipId,
    pub kind: RelationshipKind,
    pub parent_id: ShapeId,
    pub child_id: ShapeId,
    pub created_at: SystemTime,
    pub effects: Vec<RelationshipEffect>,
}

impl ShapeRelationship {
    pub fn new(
        kind: RelationshipKind,
        parent_id: ShapeId,
        child_id: ShapeId,
        effects: Vec<RelationshipEffect>,
    ) -> Self {
        Self {
            id: RelationshipId::new(),
            kind,
            parent_id,
            child_id,
            created_at: SystemTime::now(),
            effects,
        }
    }
}

/// Directed graph over shape ids: id-keyed relationship records plus
/// both adjacency indexes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipGraph {
    by_id: HashMap<RelationshipId, ShapeRelationship>,
    /// Relationship ids in insertion order
    order: Vec<RelationshipId>,
    /// parent id -> relationship ids where it is the parent
    children: HashMap<ShapeId, Vec<RelationshipId>>,
    /// child id -> relationship ids where it is the child
    parents: HashMap<ShapeId, Vec<RelationshipId>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate the relationships in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ShapeRelationship> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn get(&self, id: RelationshipId) -> Option<&ShapeRelationship> {
        self.by_id.get(&id)
    }

    /// Insert a relationship. Self-loops and edges that would make the
    /// prospective parent a descendant of its own child are rejected with
    /// a warning, leaving the graph unchanged.
    pub fn add(&mut self, rel: ShapeRelationship) -> bool {
        if rel.parent_id == rel.child_id {
            warn!(
                shape = %rel.parent_id,
                "rejected self-relationship"
            );
            return false;
        }
        if self.descendants(rel.child_id).contains(&rel.parent_id) {
            warn!(
                parent = %rel.parent_id,
                child = %rel.child_id,
                "rejected relationship that would create a cycle"
            );
            return false;
        }

        let id = rel.id;
        self.children.entry(rel.parent_id).or_default().push(id);
        self.parents.entry(rel.child_id).or_default().push(id);
        self.order.push(id);
        self.by_id.insert(id, rel);
        true
    }

    /// Remove a relationship by id from the records, the order list, and
    /// both indexes
    pub fn remove(&mut self, id: RelationshipId) -> Option<ShapeRelationship> {
        let rel = self.by_id.remove(&id)?;
        self.order.retain(|i| *i != id);
        self.unindex(&rel);
        Some(rel)
    }

    fn unindex(&mut self, rel: &ShapeRelationship) {
        if let Some(ids) = self.children.get_mut(&rel.parent_id) {
            ids.retain(|i| *i != rel.id);
            if ids.is_empty() {
                self.children.remove(&rel.parent_id);
            }
        }
        if let Some(ids) = self.parents.get_mut(&rel.child_id) {
            ids.retain(|i| *i != rel.id);
            if ids.is_empty() {
                self.parents.remove(&rel.child_id);
            }
        }
    }

    /// Relationships where the given shape is the parent
    pub fn child_relationships(&self, parent_id: ShapeId) -> Vec<&ShapeRelationship> {
        self.children
            .get(&parent_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Relationships where the given shape is the child
    pub fn parent_relationships(&self, child_id: ShapeId) -> Vec<&ShapeRelationship> {
        self.parents
            .get(&child_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// All shapes transitively reachable through parent-to-child edges,
    /// breadth-first. The graph is acyclic by invariant so this always
    /// terminates; the visited set guards against an invariant violation
    /// turning a bug into an infinite loop.
    pub fn descendants(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::from([id]);
        visited.insert(id);

        while let Some(current) = queue.pop_front() {
            for rel in self.child_relationships(current) {
                if visited.insert(rel.child_id) {
                    result.push(rel.child_id);
                    queue.push_back(rel.child_id);
                }
            }
        }
        result
    }

    /// Remove every relationship where the shape is parent or child.
    /// Returns the removed relationships so a delete command can restore
    /// them on undo.
    pub fn break_for_shape(&mut self, id: ShapeId) -> Vec<ShapeRelationship> {
        let mut touching: HashSet<RelationshipId> = HashSet::new();
        if let Some(ids) = self.children.get(&id) {
            touching.extend(ids.iter().copied());
        }
        if let Some(ids) = self.parents.get(&id) {
            touching.extend(ids.iter().copied());
        }
        // Removal in insertion order keeps restore deterministic
        let ordered: Vec<RelationshipId> = self
            .order
            .iter()
            .copied()
            .filter(|i| touching.contains(i))
            .collect();
        ordered.into_iter().filter_map(|i| self.remove(i)).collect()
    }
}
