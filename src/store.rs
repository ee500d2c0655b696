//! The document store - THE source of truth for all shape data.
//!
//! Commands are the only writers, and they write through exactly two
//! entry points: `state()` for reads and `set_state()` for mutation.
//! The store enforces one authorization rule at the shape-update path
//! (locked shapes and members of locked groups reject everything except
//! layer-metadata updates) and notifies subscribers after every committed
//! mutation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::relationships::{RelationshipGraph, ShapeRelationship};
use crate::shapes::{GroupId, Shape, ShapeGroup, ShapeId, ShapePatch};

/// Result of an attempted mutation. A rejected mutation is not an error:
/// state is unchanged and the caller must not record a command for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Rejected,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Everything a delete command needs to restore a shape exactly where it
/// was: the shape itself, its z-order slot, its selection membership, and
/// the relationships broken by the deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedShape {
    pub shape: Shape,
    pub z_pos: usize,
    pub selected: bool,
    pub relationships: Vec<ShapeRelationship>,
}

/// The canonical document state: shapes, groups, layer order, selection,
/// relationships
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    shapes: HashMap<ShapeId, Shape>,
    groups: HashMap<GroupId, ShapeGroup>,
    /// Layer order, bottom to top
    z_order: Vec<ShapeId>,
    selection: HashSet<ShapeId>,
    relationships: RelationshipGraph,
}

impl DocumentState {
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn shape_ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.z_order.iter().copied()
    }

    pub fn group(&self, id: GroupId) -> Option<&ShapeGroup> {
        self.groups.get(&id)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }

    pub fn selection(&self) -> &HashSet<ShapeId> {
        &self.selection
    }

    pub fn relationships(&self) -> &RelationshipGraph {
        &self.relationships
    }

    pub fn relationships_mut(&mut self) -> &mut RelationshipGraph {
        &mut self.relationships
    }

    /// True when the shape itself or its structural parent group is locked
    pub fn is_shape_locked(&self, id: ShapeId) -> bool {
        let Some(shape) = self.shapes.get(&id) else {
            return false;
        };
        if shape.layer.locked {
            return true;
        }
        shape
            .layer
            .parent_group
            .and_then(|gid| self.groups.get(&gid))
            .is_some_and(|g| g.locked)
    }

    /// Insert a new shape on top of the layer order. An id that is
    /// already present is rejected - overwriting would orphan the
    /// original shape and leave a stale z-order slot.
    pub fn add_shape(&mut self, shape: Shape) -> bool {
        if self.shapes.contains_key(&shape.id) {
            warn!(shape = %shape.id, "rejected add of duplicate shape id");
            return false;
        }
        let id = shape.id;
        self.shapes.insert(id, shape);
        self.z_order.push(id);
        true
    }

    /// Re-insert a previously removed shape at its original position
    pub fn restore_shape(&mut self, removed: RemovedShape) {
        let id = removed.shape.id;
        self.shapes.insert(id, removed.shape);
        let pos = removed.z_pos.min(self.z_order.len());
        self.z_order.insert(pos, id);
        if removed.selected {
            self.selection.insert(id);
        }
        for rel in removed.relationships {
            self.relationships.add(rel);
        }
    }

    /// Remove a shape, its z-order slot, its selection membership, and
    /// every relationship touching it
    pub fn remove_shape(&mut self, id: ShapeId) -> Option<RemovedShape> {
        let shape = self.shapes.remove(&id)?;
        let z_pos = self
            .z_order
            .iter()
            .position(|s| *s == id)
            .unwrap_or(self.z_order.len());
        self.z_order.retain(|s| *s != id);
        let selected = self.selection.remove(&id);
        let relationships = self.relationships.break_for_shape(id);
        Some(RemovedShape {
            shape,
            z_pos,
            selected,
            relationships,
        })
    }

    /// Apply a patch without any lock check. Callers go through
    /// [`DocumentStore::update_shape`]; this is the raw transition used
    /// by undo, which must be able to restore locked shapes.
    pub fn patch_shape(&mut self, id: ShapeId, patch: &ShapePatch) -> bool {
        match self.shapes.get_mut(&id) {
            Some(shape) => {
                shape.apply_patch(patch);
                true
            }
            None => false,
        }
    }

    pub fn add_group(&mut self, group: ShapeGroup) {
        self.groups.insert(group.id, group);
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<ShapeGroup> {
        self.groups.remove(&id)
    }

    /// Replace the selection (not undoable - selection is UI state)
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = ShapeId>) {
        self.selection = ids.into_iter().filter(|id| self.shapes.contains_key(id)).collect();
    }
}

type Subscriber = Box<dyn Fn(&DocumentState)>;

/// Owner of the document state. Reads go through [`state`](Self::state),
/// writes through [`set_state`](Self::set_state); `&mut self` on the write
/// path statically rules out reentrant mutation while a mutator runs.
#[derive(Default)]
pub struct DocumentStore {
    state: DocumentState,
    subscribers: Vec<Subscriber>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the current state
    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Apply a state-transition function, then notify subscribers of the
    /// committed state
    pub fn set_state<R>(&mut self, mutator: impl FnOnce(&mut DocumentState) -> R) -> R {
        let result = mutator(&mut self.state);
        self.notify();
        result
    }

    /// Register a read-only observer, called after every committed
    /// mutation
    pub fn subscribe(&mut self, f: impl Fn(&DocumentState) + 'static) {
        self.subscribers.push(Box::new(f));
    }

    fn notify(&self) {
        for sub in &self.subscribers {
            sub(&self.state);
        }
    }

    /// Patch a shape, enforcing the lock rule: a locked shape (or a member
    /// of a locked group) rejects everything except layer-metadata
    /// updates. Empty patches are rejected too: a no-op transition leaves
    /// no undo obligation. A rejection leaves the state untouched and must
    /// not be recorded as a command.
    pub fn update_shape(&mut self, id: ShapeId, patch: &ShapePatch) -> Outcome {
        if patch.is_empty() {
            debug!(shape = %id, "ignored empty shape update");
            return Outcome::Rejected;
        }
        if self.state.shape(id).is_none() {
            warn!(shape = %id, "update for unknown shape");
            return Outcome::Rejected;
        }
        if self.state.is_shape_locked(id) && !patch.is_layer_only() {
            warn!(shape = %id, "rejected update of locked shape");
            return Outcome::Rejected;
        }
        self.set_state(|state| {
            state.patch_shape(id, patch);
        });
        Outcome::Applied
    }
}
