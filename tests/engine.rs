//! End-to-end scenarios over the whiteboard engine: undo/redo round
//! trips, batch atomicity, relationship cascades, and lock enforcement.

use proptest::prelude::*;

use slateboard::{
    Command, DocumentStore, History, Outcome, RelationshipEffect, RelationshipKind, Shape,
    ShapeId, ShapeKind, ShapePatch, ShapeRelationship, Whiteboard,
};

fn rect(x: f64, y: f64) -> Shape {
    Shape::new(ShapeKind::Rect, x, y, 10.0, 10.0)
}

fn move_link(parent: ShapeId, child: ShapeId) -> ShapeRelationship {
    ShapeRelationship::new(
        RelationshipKind::Attachment,
        parent,
        child,
        vec![RelationshipEffect::MoveWithParent { offset: None }],
    )
}

#[test]
fn two_adds_undo_and_redo_step_by_step() {
    let mut board = Whiteboard::new();
    let r1 = board.add_shape(rect(0.0, 0.0)).unwrap();
    let r2 = board.add_shape(rect(20.0, 0.0)).unwrap();
    assert_eq!(board.history().undo_count(), 2);

    assert!(board.undo().unwrap());
    assert!(board.state().shape(r1).is_some());
    assert!(board.state().shape(r2).is_none());

    assert!(board.undo().unwrap());
    assert_eq!(board.state().shape_count(), 0);
    assert!(!board.undo().unwrap());

    assert!(board.redo().unwrap());
    assert_eq!(board.state().shape_count(), 1);
    assert!(board.redo().unwrap());
    assert!(board.state().shape(r1).is_some());
    assert!(board.state().shape(r2).is_some());
}

#[test]
fn redo_reproduces_the_post_execute_state_exactly() {
    let mut board = Whiteboard::new();
    let id = board.add_shape(rect(1.0, 2.0)).unwrap();
    board
        .update_shape(
            id,
            ShapePatch {
                x: Some(9.0),
                fill: Some("red".to_string()),
                ..ShapePatch::default()
            },
        )
        .unwrap();
    let after = board.state().clone();

    board.undo().unwrap();
    board.redo().unwrap();
    assert_eq!(*board.state(), after);
}

#[test]
fn merged_updates_undo_to_before_the_first() {
    let mut board = Whiteboard::new();
    let shape = rect(3.0, 0.0);
    let id = shape.id;
    board.execute(Command::add_shape(shape)).unwrap();

    board
        .update_shape(id, ShapePatch { x: Some(10.0), ..ShapePatch::default() })
        .unwrap();
    board
        .update_shape(id, ShapePatch { x: Some(20.0), ..ShapePatch::default() })
        .unwrap();
    assert_eq!(board.state().shape(id).unwrap().x, 20.0);

    assert!(board.undo().unwrap());
    assert_eq!(board.state().shape(id).unwrap().x, 3.0);
}

#[test]
fn batched_adds_undo_and_redo_atomically() {
    let mut board = Whiteboard::new();
    board.begin_batch("Paste five shapes").unwrap();
    for i in 0..5 {
        board
            .execute(Command::add_shape(rect(i as f64 * 20.0, 0.0)))
            .unwrap();
    }
    board.end_batch().unwrap();
    assert_eq!(board.state().shape_count(), 5);

    assert!(board.undo().unwrap());
    assert_eq!(board.state().shape_count(), 0);

    assert!(board.redo().unwrap());
    assert_eq!(board.state().shape_count(), 5);
}

#[test]
fn cycle_attempt_through_commands_is_rejected() {
    let mut board = Whiteboard::new();
    let a = board.add_shape(rect(0.0, 0.0)).unwrap();
    let b = board.add_shape(rect(20.0, 0.0)).unwrap();
    let c = board.add_shape(rect(40.0, 0.0)).unwrap();
    board.execute(Command::add_relationship(move_link(a, b))).unwrap();
    board.execute(Command::add_relationship(move_link(b, c))).unwrap();
    let undo_count = board.history().undo_count();

    // c is a descendant of a; c -> a would close a cycle
    let outcome = board
        .execute(Command::add_relationship(move_link(c, a)))
        .unwrap();
    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(board.state().relationships().len(), 2);
    assert_eq!(board.history().undo_count(), undo_count);
}

#[test]
fn parent_motion_cascades_through_the_graph() {
    let mut board = Whiteboard::new();
    let p = board.add_shape(rect(0.0, 0.0)).unwrap();
    let c = board.add_shape(rect(30.0, 10.0)).unwrap();
    let g = board.add_shape(rect(60.0, 20.0)).unwrap();
    board.execute(Command::add_relationship(move_link(p, c))).unwrap();
    board.execute(Command::add_relationship(move_link(c, g))).unwrap();

    board.move_shape(p, 10.0, 20.0).unwrap();
    let child = board.state().shape(c).unwrap();
    assert_eq!((child.x, child.y), (40.0, 30.0));
    let grandchild = board.state().shape(g).unwrap();
    assert_eq!((grandchild.x, grandchild.y), (70.0, 40.0));

    // The whole cascade is one undo unit
    board.undo().unwrap();
    assert_eq!(board.state().shape(c).unwrap().x, 30.0);
    assert_eq!(board.state().shape(g).unwrap().x, 60.0);
}

#[test]
fn deleting_a_shape_breaks_relationships_in_both_directions() {
    let mut board = Whiteboard::new();
    let a = board.add_shape(rect(0.0, 0.0)).unwrap();
    let b = board.add_shape(rect(20.0, 0.0)).unwrap();
    let c = board.add_shape(rect(40.0, 0.0)).unwrap();
    board.execute(Command::add_relationship(move_link(a, b))).unwrap();
    board.execute(Command::add_relationship(move_link(b, c))).unwrap();

    board.delete_shape(b).unwrap();
    let rels = board.state().relationships();
    assert!(rels.is_empty());
    assert!(rels.child_relationships(a).is_empty());
    assert!(rels.parent_relationships(c).is_empty());

    // Undo restores the shape with both of its relationships
    board.undo().unwrap();
    assert_eq!(board.state().relationships().len(), 2);
    assert_eq!(board.state().relationships().descendants(a), vec![b, c]);
}

#[test]
fn locked_shape_update_leaves_no_trace() {
    let mut board = Whiteboard::new();
    let shape = rect(0.0, 0.0).locked();
    let id = shape.id;
    board.execute(Command::add_shape(shape)).unwrap();
    let undo_count = board.history().undo_count();

    let outcome = board
        .update_shape(id, ShapePatch::move_to(50.0, 50.0))
        .unwrap();
    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(board.state().shape(id).unwrap().x, 0.0);
    assert_eq!(board.history().undo_count(), undo_count);
}

// --- Property: any command sequence fully undoes back to the initial
// state ---

#[derive(Debug, Clone)]
enum Op {
    Add { x: f64, y: f64 },
    Update { slot: usize, x: f64 },
    Delete { slot: usize },
    Link { parent: usize, child: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0.0..200.0f64, 0.0..200.0f64).prop_map(|(x, y)| Op::Add { x, y }),
        (0usize..8, 0.0..200.0f64).prop_map(|(slot, x)| Op::Update { slot, x }),
        (0usize..8).prop_map(|slot| Op::Delete { slot }),
        (0usize..8, 0usize..8).prop_map(|(parent, child)| Op::Link { parent, child }),
    ]
}

proptest! {
    #[test]
    fn any_command_sequence_undoes_to_the_initial_state(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut store = DocumentStore::new();
        let mut history = History::new();
        let initial = store.state().clone();
        let mut ids: Vec<ShapeId> = Vec::new();

        for op in ops {
            match op {
                Op::Add { x, y } => {
                    let shape = rect(x, y);
                    ids.push(shape.id);
                    history.execute(Command::add_shape(shape), &mut store).unwrap();
                }
                Op::Update { slot, x } if !ids.is_empty() => {
                    let id = ids[slot % ids.len()];
                    let patch = ShapePatch { x: Some(x), ..ShapePatch::default() };
                    history.execute(Command::update_shape(id, patch), &mut store).unwrap();
                }
                Op::Delete { slot } if !ids.is_empty() => {
                    let id = ids[slot % ids.len()];
                    history.execute(Command::delete_shape(id), &mut store).unwrap();
                }
                Op::Link { parent, child } if ids.len() >= 2 => {
                    let rel = move_link(ids[parent % ids.len()], ids[child % ids.len()]);
                    history.execute(Command::add_relationship(rel), &mut store).unwrap();
                }
                _ => {}
            }
        }

        while history.undo(&mut store).unwrap() {}
        prop_assert_eq!(store.state(), &initial);
    }
}
