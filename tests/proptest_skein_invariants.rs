//! Property-based invariant tests for the skein.
//!
//! 1. Any sequence of edits leaves one root, no cycles, consistent links.
//! 2. add_child twice returns the same node.
//! 3. Diffing is deterministic and both texts can be rebuilt from the edits.
//! 4. Loose packing keeps sibling subtrees apart; tight keeps levels apart.
//! 5. Saving then loading gives back an equal skein.
//! 6. Undoing every recorded edit gets back to the starting document.

use proptest::prelude::*;
use skein_wasm::diff::{diff, EditKind};
use skein_wasm::layout::{LayoutConfig, PackingStyle, SkeinLayout};
use skein_wasm::models::{NodeId, Skein};
use skein_wasm::undo::UndoStack;
use skein_wasm::xml::{from_xml, to_xml};
use std::collections::BTreeSet;

// ── Helpers ─────────────────────────────────────────────────────────────

const COMMANDS: &[&str] = &["north", "south", "open door", "take lamp", "x me", "test me"];

#[derive(Clone, Debug)]
enum Op {
    Add { parent: usize, command: usize },
    AddTest { parent: usize, command: usize },
    Remove { node: usize },
    Move { node: usize, parent: usize },
    Rename { node: usize, command: usize },
    Unlink { node: usize },
    Activate { node: usize },
    SetActual { node: usize, text: String },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let pick = 0usize..32;
    let command = 0..COMMANDS.len();
    prop_oneof![
        4 => (pick.clone(), command.clone()).prop_map(|(parent, command)| Op::Add { parent, command }),
        1 => (pick.clone(), command.clone()).prop_map(|(parent, command)| Op::AddTest { parent, command }),
        1 => pick.clone().prop_map(|node| Op::Remove { node }),
        1 => (pick.clone(), pick.clone()).prop_map(|(node, parent)| Op::Move { node, parent }),
        1 => (pick.clone(), command).prop_map(|(node, command)| Op::Rename { node, command }),
        1 => pick.clone().prop_map(|node| Op::Unlink { node }),
        1 => pick.clone().prop_map(|node| Op::Activate { node }),
        1 => (pick, "[a-z .\n]{0,12}").prop_map(|(node, text)| Op::SetActual { node, text }),
    ]
}

/// Pick an attached node by position in pre-order
fn nth(skein: &Skein, n: usize) -> NodeId {
    let order = skein.preorder(skein.root_item());
    order[n % order.len()]
}

/// Apply an edit; rejected edits are expected and ignored
fn apply(skein: &mut Skein, op: &Op) {
    match op {
        Op::Add { parent, command } => {
            let _ = skein.add_child(nth(skein, *parent), COMMANDS[*command]);
        }
        Op::AddTest { parent, command } => {
            let _ = skein.add_test_child(nth(skein, *parent), COMMANDS[*command]);
        }
        Op::Remove { node } => {
            let _ = skein.remove_from_parent(nth(skein, *node));
        }
        Op::Move { node, parent } => {
            let _ = skein.set_parent_of(nth(skein, *node), nth(skein, *parent));
        }
        Op::Rename { node, command } => {
            skein.set_command_of(nth(skein, *node), COMMANDS[*command]);
        }
        Op::Unlink { node } => {
            let child = nth(skein, *node);
            if let Some(parent) = skein.parent_of(child) {
                let _ = skein.remove_from_children_array_of(parent, child);
            }
        }
        Op::Activate { node } => {
            let _ = skein.set_active_item(Some(nth(skein, *node)));
        }
        Op::SetActual { node, text } => {
            skein.set_actual_of(nth(skein, *node), Some(text.clone()));
        }
    }
}

fn build(ops: &[Op]) -> Skein {
    let mut skein = Skein::new();
    for op in ops {
        apply(&mut skein, op);
    }
    skein
}

fn assert_tree_invariant(skein: &Skein) -> Result<(), TestCaseError> {
    let root = skein.root_item();
    prop_assert_eq!(skein.parent_of(root), None, "root has a parent");

    let order = skein.preorder(root);
    let unique: BTreeSet<NodeId> = order.iter().copied().collect();
    prop_assert_eq!(unique.len(), order.len(), "node reached twice: cycle or shared child");

    for id in &order {
        let mut keys = BTreeSet::new();
        for child in skein.children_of(*id) {
            prop_assert_eq!(skein.parent_of(*child), Some(*id), "child {} does not point back", child);
            let node = skein.node(*child).expect("listed child exists");
            prop_assert!(
                keys.insert((node.command().to_string(), node.is_test_sub_item())),
                "duplicate sibling key under {}",
                id
            );
        }
        if *id != root {
            let parent = skein.parent_of(*id).expect("non-root node has a parent");
            prop_assert!(skein.children_of(parent).contains(id));
        }
    }

    if let Some(active) = skein.active_item() {
        prop_assert!(skein.is_attached(active), "active item is detached");
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Tree invariant
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn tree_invariant_holds(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut skein = Skein::new();
        for op in &ops {
            apply(&mut skein, op);
            assert_tree_invariant(&skein)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Idempotent add_child
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn add_child_idempotent(ops in prop::collection::vec(op_strategy(), 0..30), parent in 0usize..32) {
        let mut skein = build(&ops);
        let parent = nth(&skein, parent);
        let before = skein.children_of(parent).len();

        let first = skein.add_child(parent, "go north").unwrap();
        let second = skein.add_child(parent, "go north").unwrap();
        prop_assert_eq!(first, second);

        let count = skein
            .children_of(parent)
            .iter()
            .filter(|c| skein.node(**c).map_or(false, |n| n.command() == "go north" && !n.is_test_sub_item()))
            .count();
        prop_assert_eq!(count, 1);
        prop_assert!(skein.children_of(parent).len() <= before + 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Diff determinism and reconstruction
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn diff_deterministic_and_complete(ideal in "[a-c \n]{0,40}", actual in "[a-c \n]{0,40}") {
        let first = diff(Some(ideal.as_str()), Some(actual.as_str())).unwrap();
        let second = diff(Some(ideal.as_str()), Some(actual.as_str())).unwrap();
        prop_assert_eq!(&first, &second);

        let mut rebuilt_ideal = String::new();
        let mut rebuilt_actual = String::new();
        for edit in &first.edits {
            match edit.kind {
                EditKind::Delete => rebuilt_ideal.push_str(first.ideal_text(&ideal, edit)),
                EditKind::Insert => rebuilt_actual.push_str(first.actual_text(&actual, edit)),
                EditKind::Preserve | EditKind::PreserveActual => {
                    rebuilt_ideal.push_str(first.ideal_text(&ideal, edit));
                    rebuilt_actual.push_str(first.actual_text(&actual, edit));
                }
            }
        }
        prop_assert_eq!(rebuilt_ideal, ideal);
        prop_assert_eq!(rebuilt_actual, actual);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Layout non-overlap
// ═════════════════════════════════════════════════════════════════════════

fn label_width(text: &str) -> f32 {
    text.chars().count() as f32 * 6.0
}

proptest! {
    #[test]
    fn loose_siblings_do_not_overlap(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let skein = build(&ops);
        let config = LayoutConfig::with_packing(PackingStyle::Loose);
        let layout = SkeinLayout::compute(&skein, None, &config, &label_width);

        for node in layout.nodes() {
            for pair in node.children.windows(2) {
                let left = &layout.nodes()[pair[0]];
                let right = &layout.nodes()[pair[1]];
                prop_assert!(
                    left.centre_x + left.subtree_width / 2.0 <= right.centre_x - right.subtree_width / 2.0 + 1e-3,
                    "siblings {} and {} overlap",
                    left.item,
                    right.item
                );
            }
        }
    }
}

proptest! {
    #[test]
    fn tight_levels_do_not_overlap(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let skein = build(&ops);
        let config = LayoutConfig::with_packing(PackingStyle::Tight);
        let layout = SkeinLayout::compute(&skein, None, &config, &label_width);

        for level in 0..layout.levels() {
            let mut spans: Vec<(f32, f32)> = layout
                .items_on_level(level)
                .into_iter()
                .map(|i| {
                    let node = &layout.nodes()[i];
                    (node.centre_x - node.command_width / 2.0, node.centre_x + node.command_width / 2.0)
                })
                .collect();
            spans.sort_by(|a, b| a.0.total_cmp(&b.0));
            for pair in spans.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0 + 1e-3, "labels overlap on level {}", level);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Round trip through XML
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn xml_round_trip(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let skein = build(&ops);
        let loaded = from_xml(&to_xml(&skein)).unwrap();
        prop_assert_eq!(loaded, skein);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Undo everything
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn undo_all_restores_start(
        setup in prop::collection::vec(op_strategy(), 0..20),
        edits in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let mut skein = build(&setup);
        skein.take_journal();
        let start = to_xml(&skein);

        let mut undo = UndoStack::new(1000);
        for op in &edits {
            apply(&mut skein, op);
            undo.record(&mut skein);
        }
        while undo.can_undo() {
            undo.undo(&mut skein).unwrap();
        }
        prop_assert_eq!(to_xml(&skein), start);
    }
}
