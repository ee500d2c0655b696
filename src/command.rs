//! Reversible document mutations.
//!
//! `Command` is a closed enum over the finite set of mutation kinds, so
//! merge compatibility is a `match` over tags instead of runtime type
//! tests. Every command captures, during `execute`, the minimal fragment
//! of pre-mutation state its `undo` needs - never a full document copy.
//! Commands receive the store explicitly; nothing in this module reaches
//! for ambient state.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::debug;

use crate::relationships::{RelationshipId, ShapeRelationship};
use crate::shapes::{GroupId, Shape, ShapeGroup, ShapeId, ShapePatch};
use crate::store::{DocumentStore, Outcome, RemovedShape};

/// Time window within which two consecutive compatible commands coalesce
/// into one undo step. The default mirrors the interactive feel of rapid
/// drag updates; the value is configuration, not a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeWindows {
    pub shape_update: Duration,
}

impl Default for MergeWindows {
    fn default() -> Self {
        Self {
            shape_update: Duration::from_millis(1000),
        }
    }
}

/// An atomic, reversible mutation of the document store
#[derive(Debug, Clone)]
pub enum Command {
    AddShape {
        shape: Shape,
    },
    DeleteShape {
        shape_id: ShapeId,
        removed: Option<RemovedShape>,
    },
    UpdateShape {
        shape_id: ShapeId,
        patch: ShapePatch,
        /// Pre-execute values of the touched fields, captured on execute
        previous: Option<ShapePatch>,
        created_at: Instant,
    },
    GroupShapes {
        group: ShapeGroup,
        previous_parents: Vec<(ShapeId, Option<GroupId>)>,
    },
    UngroupShapes {
        group_id: GroupId,
        removed: Option<(ShapeGroup, Vec<(ShapeId, Option<GroupId>)>)>,
    },
    AddRelationship {
        relationship: ShapeRelationship,
    },
    RemoveRelationship {
        relationship_id: RelationshipId,
        removed: Option<ShapeRelationship>,
    },
    /// Composite formed by a batch transaction: executes members in
    /// order, undoes them in reverse order, as one atomic undo unit
    Batch {
        description: String,
        commands: Vec<Command>,
    },
}

impl Command {
    pub fn add_shape(shape: Shape) -> Self {
        Command::AddShape { shape }
    }

    pub fn delete_shape(shape_id: ShapeId) -> Self {
        Command::DeleteShape {
            shape_id,
            removed: None,
        }
    }

    pub fn update_shape(shape_id: ShapeId, patch: ShapePatch) -> Self {
        Command::UpdateShape {
            shape_id,
            patch,
            previous: None,
            created_at: Instant::now(),
        }
    }

    pub fn group_shapes(group: ShapeGroup) -> Self {
        Command::GroupShapes {
            group,
            previous_parents: Vec::new(),
        }
    }

    pub fn ungroup_shapes(group_id: GroupId) -> Self {
        Command::UngroupShapes {
            group_id,
            removed: None,
        }
    }

    pub fn add_relationship(relationship: ShapeRelationship) -> Self {
        Command::AddRelationship { relationship }
    }

    pub fn remove_relationship(relationship_id: RelationshipId) -> Self {
        Command::RemoveRelationship {
            relationship_id,
            removed: None,
        }
    }

    /// Human-readable description, e.g. for an edit-menu undo label
    pub fn describe(&self) -> String {
        match self {
            Command::AddShape { shape } => format!("Add {}", shape.kind.name()),
            Command::DeleteShape { .. } => "Delete shape".to_string(),
            Command::UpdateShape { .. } => "Update shape".to_string(),
            Command::GroupShapes { group, .. } => format!("Group into {}", group.name),
            Command::UngroupShapes { .. } => "Ungroup".to_string(),
            Command::AddRelationship { relationship } => {
                format!("Link shapes ({})", relationship.kind.name())
            }
            Command::RemoveRelationship { .. } => "Unlink shapes".to_string(),
            Command::Batch { description, .. } => description.clone(),
        }
    }

    /// Apply the mutation. Callers invoke this exactly once; re-applying
    /// goes through [`redo`](Self::redo). A `Rejected` outcome means the
    /// state is untouched and the command must not be pushed.
    pub fn execute(&mut self, store: &mut DocumentStore) -> Result<Outcome> {
        match self {
            Command::AddShape { shape } => {
                let shape = shape.clone();
                let added = store.set_state(|state| state.add_shape(shape));
                if added {
                    Ok(Outcome::Applied)
                } else {
                    // Duplicate id, already logged by the store
                    Ok(Outcome::Rejected)
                }
            }
            Command::DeleteShape { shape_id, removed } => {
                let id = *shape_id;
                match store.set_state(|state| state.remove_shape(id)) {
                    Some(data) => {
                        *removed = Some(data);
                        Ok(Outcome::Applied)
                    }
                    None => Ok(Outcome::Rejected),
                }
            }
            Command::UpdateShape {
                shape_id,
                patch,
                previous,
                ..
            } => {
                let Some(shape) = store.state().shape(*shape_id) else {
                    return Ok(Outcome::Rejected);
                };
                let captured = shape.capture_patch(patch);
                let outcome = store.update_shape(*shape_id, patch);
                if outcome.is_applied() {
                    *previous = Some(captured);
                }
                Ok(outcome)
            }
            Command::GroupShapes {
                group,
                previous_parents,
            } => {
                let group = group.clone();
                *previous_parents = store.set_state(|state| {
                    let mut parents = Vec::new();
                    for member in &group.child_ids {
                        if let Some(shape) = state.shape(*member) {
                            parents.push((*member, shape.layer.parent_group));
                            state.patch_shape(
                                *member,
                                &ShapePatch {
                                    parent_group: Some(Some(group.id)),
                                    ..ShapePatch::default()
                                },
                            );
                        }
                    }
                    state.add_group(group.clone());
                    parents
                });
                Ok(Outcome::Applied)
            }
            Command::UngroupShapes { group_id, removed } => {
                let id = *group_id;
                let result = store.set_state(|state| {
                    let group = state.remove_group(id)?;
                    let mut parents = Vec::new();
                    for member in &group.child_ids {
                        if let Some(shape) = state.shape(*member) {
                            parents.push((*member, shape.layer.parent_group));
                            if shape.layer.parent_group == Some(id) {
                                state.patch_shape(
                                    *member,
                                    &ShapePatch {
                                        parent_group: Some(None),
                                        ..ShapePatch::default()
                                    },
                                );
                            }
                        }
                    }
                    Some((group, parents))
                });
                match result {
                    Some(data) => {
                        *removed = Some(data);
                        Ok(Outcome::Applied)
                    }
                    None => Ok(Outcome::Rejected),
                }
            }
            Command::AddRelationship { relationship } => {
                let rel = relationship.clone();
                let added = store.set_state(|state| state.relationships_mut().add(rel));
                if added {
                    Ok(Outcome::Applied)
                } else {
                    // Cycle or self-loop, already logged by the graph
                    Ok(Outcome::Rejected)
                }
            }
            Command::RemoveRelationship {
                relationship_id,
                removed,
            } => {
                let id = *relationship_id;
                match store.set_state(|state| state.relationships_mut().remove(id)) {
                    Some(rel) => {
                        *removed = Some(rel);
                        Ok(Outcome::Applied)
                    }
                    None => Ok(Outcome::Rejected),
                }
            }
            Command::Batch { commands, .. } => {
                for cmd in commands.iter_mut() {
                    cmd.execute(store)?;
                }
                Ok(Outcome::Applied)
            }
        }
    }

    /// Restore exactly the pre-execute state for the fields this command
    /// touched. Undo bypasses the lock gate: a command that locked a shape
    /// must still be reversible.
    pub fn undo(&self, store: &mut DocumentStore) -> Result<()> {
        match self {
            Command::AddShape { shape } => {
                let id = shape.id;
                store.set_state(|state| state.remove_shape(id));
                Ok(())
            }
            Command::DeleteShape { shape_id, removed } => {
                let Some(data) = removed.clone() else {
                    bail!("undo of delete command that never executed ({shape_id})");
                };
                store.set_state(|state| state.restore_shape(data));
                Ok(())
            }
            Command::UpdateShape {
                shape_id, previous, ..
            } => {
                let Some(previous) = previous else {
                    bail!("undo of update command that never executed ({shape_id})");
                };
                let id = *shape_id;
                store.set_state(|state| state.patch_shape(id, previous));
                Ok(())
            }
            Command::GroupShapes {
                group,
                previous_parents,
            } => {
                let id = group.id;
                store.set_state(|state| {
                    state.remove_group(id);
                    for (member, parent) in previous_parents {
                        state.patch_shape(
                            *member,
                            &ShapePatch {
                                parent_group: Some(*parent),
                                ..ShapePatch::default()
                            },
                        );
                    }
                });
                Ok(())
            }
            Command::UngroupShapes { group_id, removed } => {
                let Some((group, parents)) = removed.clone() else {
                    bail!("undo of ungroup command that never executed ({group_id})");
                };
                store.set_state(|state| {
                    state.add_group(group);
                    for (member, parent) in parents {
                        state.patch_shape(
                            member,
                            &ShapePatch {
                                parent_group: Some(parent),
                                ..ShapePatch::default()
                            },
                        );
                    }
                });
                Ok(())
            }
            Command::AddRelationship { relationship } => {
                let id = relationship.id;
                store.set_state(|state| state.relationships_mut().remove(id));
                Ok(())
            }
            Command::RemoveRelationship {
                relationship_id,
                removed,
            } => {
                let Some(rel) = removed.clone() else {
                    bail!("undo of remove-relationship command that never executed ({relationship_id})");
                };
                store.set_state(|state| state.relationships_mut().add(rel));
                Ok(())
            }
            Command::Batch { commands, .. } => {
                for cmd in commands.iter().rev() {
                    cmd.undo(store)?;
                }
                Ok(())
            }
        }
    }

    /// Re-apply after an undo. Defaults to `execute`.
    pub fn redo(&mut self, store: &mut DocumentStore) -> Result<Outcome> {
        self.execute(store)
    }

    /// Whether `next` can coalesce into this command: same kind, same
    /// shape, issued within the merge window. Batches never merge.
    pub fn can_merge(&self, next: &Command, windows: &MergeWindows) -> bool {
        match (self, next) {
            (
                Command::UpdateShape {
                    shape_id: a,
                    created_at: t_a,
                    ..
                },
                Command::UpdateShape {
                    shape_id: b,
                    created_at: t_b,
                    ..
                },
            ) => a == b && t_b.duration_since(*t_a) <= windows.shape_update,
            _ => false,
        }
    }

    /// Coalesce `next` into this command. The merged command's undo
    /// reverts to the state before the *first* of the two: the earliest
    /// captured previous values win, the latest patch values win.
    ///
    /// Callers only invoke this after `can_merge` returned true; a
    /// mismatch is an internal invariant violation and fails fast.
    pub fn merge(self, next: Command) -> Result<Command> {
        match (self, next) {
            (
                Command::UpdateShape {
                    shape_id: a,
                    patch: first_patch,
                    previous: first_prev,
                    ..
                },
                Command::UpdateShape {
                    shape_id: b,
                    patch: second_patch,
                    previous: second_prev,
                    created_at,
                },
            ) if a == b => {
                debug!(shape = %a, "coalescing consecutive shape updates");
                let previous = match (first_prev, second_prev) {
                    // Earliest capture wins for fields both commands
                    // touched; fields only the second touched keep its
                    // capture.
                    (Some(first), Some(second)) => Some(second.overlaid_with(&first)),
                    (first, second) => first.or(second),
                };
                Ok(Command::UpdateShape {
                    shape_id: a,
                    patch: first_patch.overlaid_with(&second_patch),
                    previous,
                    created_at,
                })
            }
            (a, b) => bail!(
                "cannot merge incompatible commands: {} / {}",
                a.describe(),
                b.describe()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;

    fn store_with_shape() -> (DocumentStore, ShapeId) {
        let mut store = DocumentStore::new();
        let shape = Shape::new(ShapeKind::Rect, 0.0, 0.0, 10.0, 10.0);
        let id = shape.id;
        store.set_state(|s| s.add_shape(shape));
        (store, id)
    }

    #[test]
    fn add_shape_round_trip() {
        let mut store = DocumentStore::new();
        let before = store.state().clone();
        let mut cmd = Command::add_shape(Shape::new(ShapeKind::Ellipse, 1.0, 2.0, 3.0, 4.0));

        assert!(cmd.execute(&mut store).unwrap().is_applied());
        assert_eq!(store.state().shape_count(), 1);

        cmd.undo(&mut store).unwrap();
        assert_eq!(*store.state(), before);
    }

    #[test]
    fn delete_restores_exact_state_on_undo() {
        let (mut store, id) = store_with_shape();
        store.set_state(|s| s.set_selection([id]));
        let before = store.state().clone();

        let mut cmd = Command::delete_shape(id);
        assert!(cmd.execute(&mut store).unwrap().is_applied());
        assert_eq!(store.state().shape_count(), 0);

        cmd.undo(&mut store).unwrap();
        assert_eq!(*store.state(), before);
    }

    #[test]
    fn update_redo_reproduces_post_execute_state() {
        let (mut store, id) = store_with_shape();
        let mut cmd = Command::update_shape(id, ShapePatch::move_to(7.0, 8.0));

        cmd.execute(&mut store).unwrap();
        let after = store.state().clone();

        cmd.undo(&mut store).unwrap();
        assert_eq!(store.state().shape(id).unwrap().x, 0.0);

        cmd.redo(&mut store).unwrap();
        assert_eq!(*store.state(), after);
    }

    #[test]
    fn merged_update_undoes_to_before_the_first() {
        let (mut store, id) = store_with_shape();

        let mut first = Command::update_shape(id, ShapePatch::move_to(10.0, 0.0));
        first.execute(&mut store).unwrap();
        let mut second = Command::update_shape(id, ShapePatch::move_to(20.0, 0.0));
        second.execute(&mut store).unwrap();

        assert!(first.can_merge(&second, &MergeWindows::default()));
        let merged = first.merge(second).unwrap();

        merged.undo(&mut store).unwrap();
        assert_eq!(store.state().shape(id).unwrap().x, 0.0);
    }

    #[test]
    fn merge_keeps_fields_only_one_side_touched() {
        let (mut store, id) = store_with_shape();

        let mut first = Command::update_shape(id, ShapePatch::move_to(10.0, 10.0));
        first.execute(&mut store).unwrap();
        let mut second = Command::update_shape(
            id,
            ShapePatch {
                fill: Some("red".to_string()),
                ..ShapePatch::default()
            },
        );
        second.execute(&mut store).unwrap();

        let merged = first.merge(second).unwrap();
        merged.undo(&mut store).unwrap();

        let shape = store.state().shape(id).unwrap();
        assert_eq!(shape.x, 0.0);
        assert_eq!(shape.style.fill, "transparent");
    }

    #[test]
    fn merge_window_expiry_blocks_coalescing() {
        let id = ShapeId::new();
        let first = Command::UpdateShape {
            shape_id: id,
            patch: ShapePatch::move_to(1.0, 0.0),
            previous: None,
            created_at: Instant::now() - Duration::from_secs(5),
        };
        let second = Command::update_shape(id, ShapePatch::move_to(2.0, 0.0));
        assert!(!first.can_merge(&second, &MergeWindows::default()));
    }

    #[test]
    fn different_shapes_never_merge() {
        let first = Command::update_shape(ShapeId::new(), ShapePatch::move_to(1.0, 0.0));
        let second = Command::update_shape(ShapeId::new(), ShapePatch::move_to(2.0, 0.0));
        assert!(!first.can_merge(&second, &MergeWindows::default()));
    }

    #[test]
    fn incompatible_merge_fails_fast() {
        let first = Command::add_shape(Shape::new(ShapeKind::Rect, 0.0, 0.0, 1.0, 1.0));
        let second = Command::delete_shape(ShapeId::new());
        assert!(first.merge(second).is_err());
    }

    #[test]
    fn update_of_locked_shape_is_rejected_with_no_capture() {
        let mut store = DocumentStore::new();
        let shape = Shape::new(ShapeKind::Rect, 0.0, 0.0, 1.0, 1.0).locked();
        let id = shape.id;
        store.set_state(|s| s.add_shape(shape));

        let mut cmd = Command::update_shape(id, ShapePatch::move_to(9.0, 9.0));
        assert_eq!(cmd.execute(&mut store).unwrap(), Outcome::Rejected);
        match cmd {
            Command::UpdateShape { previous, .. } => assert!(previous.is_none()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn group_and_ungroup_round_trip() {
        let mut store = DocumentStore::new();
        let a = Shape::new(ShapeKind::Rect, 0.0, 0.0, 1.0, 1.0);
        let b = Shape::new(ShapeKind::Rect, 2.0, 0.0, 1.0, 1.0);
        let (a_id, b_id) = (a.id, b.id);
        store.set_state(|s| {
            s.add_shape(a);
            s.add_shape(b);
        });
        let before = store.state().clone();

        let group = ShapeGroup::new("pair", vec![a_id, b_id]);
        let group_id = group.id;
        let mut group_cmd = Command::group_shapes(group);
        group_cmd.execute(&mut store).unwrap();
        assert_eq!(
            store.state().shape(a_id).unwrap().layer.parent_group,
            Some(group_id)
        );

        let grouped = store.state().clone();
        let mut ungroup_cmd = Command::ungroup_shapes(group_id);
        ungroup_cmd.execute(&mut store).unwrap();
        assert!(store.state().shape(b_id).unwrap().layer.parent_group.is_none());

        ungroup_cmd.undo(&mut store).unwrap();
        assert_eq!(*store.state(), grouped);

        group_cmd.undo(&mut store).unwrap();
        assert_eq!(*store.state(), before);
    }
}
