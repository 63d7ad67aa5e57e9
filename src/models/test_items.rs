//! "test me" style batch commands
//!
//! Running a test script prints every step of the script in one go:
//!
//! ```text
//! (Testing.)
//!
//! >[1] open door
//! You open the door.
//!
//! >[2] north
//! A garden.
//! ```
//!
//! Decomposition turns that output into a chain of test sub-items below the
//! node that ran the script, one per `>[n]` section. Composition walks the
//! chain and puts the text back together with the markers reinserted in
//! their normal form `>[n] command\n`.

use super::errors::SkeinError;
use super::node::{NodeId, SkeinNode};
use super::skein::Skein;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SECTION_MARKER: Regex = Regex::new(r"(?m)^>[ \t]*\[(\d+)\][ \t]*(.*)$")
        .expect("section marker pattern is valid");
}

/// Is this command one that runs a test script?
pub fn is_test_command(command: &str) -> bool {
    command
        .trim_start()
        .get(..5)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("test "))
}

/// One `>[n] command` section of a test script's output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section<'a> {
    pub command: &'a str,
    pub text: &'a str,
}

/// Split raw test output into the text before the first marker and the
/// sections that follow it
pub fn split_sections(raw: &str) -> (&str, Vec<Section<'_>>) {
    let markers: Vec<_> = SECTION_MARKER.captures_iter(raw).collect();
    let Some(first) = markers.first().and_then(|c| c.get(0)) else {
        return (raw, Vec::new());
    };

    let head = &raw[..first.start()];
    let mut sections = Vec::with_capacity(markers.len());
    for (i, captures) in markers.iter().enumerate() {
        let (Some(marker), Some(command)) = (captures.get(0), captures.get(2)) else {
            continue;
        };

        let mut start = marker.end();
        if raw[start..].starts_with('\n') {
            start += 1;
        }
        let end = markers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(raw.len(), |m| m.start());

        sections.push(Section {
            command: command.as_str().trim_end(),
            text: &raw[start..end],
        });
    }
    (head, sections)
}

impl Skein {
    /// Split `raw` test output over a chain of test sub-items below `node`
    ///
    /// The node keeps the text before the first marker; existing sub-items
    /// with the same command are reused. Sub-items left over from an earlier
    /// run that no longer match a section are removed with everything below
    /// them. Returns `node`, the top of the chain.
    pub fn decompose_actual(&mut self, node: NodeId, raw: &str) -> Result<NodeId, SkeinError> {
        if self.node(node).is_none() {
            return Err(SkeinError::UnknownNode(node));
        }

        let (head, sections) = split_sections(raw);
        let mark = self.journal_len();
        let result = self.build_test_chain(node, head, &sections);
        self.close_batch(mark);
        result?;

        if !sections.is_empty() {
            log::debug!("Decomposed output of {} into {} test steps", node, sections.len());
        }
        Ok(node)
    }

    fn build_test_chain(&mut self, node: NodeId, head: &str, sections: &[Section<'_>]) -> Result<(), SkeinError> {
        self.set_actual_of(node, Some(head.to_string()));
        let mut current = node;
        for section in sections {
            let next = self.add_test_child(current, section.command)?;
            self.remove_test_sub_items(current, Some(next))?;
            self.set_actual_of(next, Some(section.text.to_string()));
            current = next;
        }
        self.remove_test_sub_items(current, None)
    }

    /// Remove the test sub-items of `parent` other than `keep`
    fn remove_test_sub_items(&mut self, parent: NodeId, keep: Option<NodeId>) -> Result<(), SkeinError> {
        let stale: Vec<NodeId> = self
            .children_of(parent)
            .iter()
            .copied()
            .filter(|c| Some(*c) != keep && self.node(*c).map_or(false, |n| n.is_test_sub_item()))
            .collect();

        for id in stale {
            if self.is_on_active_path(id) {
                self.set_active_item(Some(parent))?;
            }
            log::debug!("Removing stale test step {} below {}", id, parent);
            self.remove_from_parent(id)?;
        }
        Ok(())
    }

    /// Decompose the node's current output
    pub fn decompose(&mut self, node: NodeId) -> Result<NodeId, SkeinError> {
        let actual = self
            .node(node)
            .ok_or(SkeinError::UnknownNode(node))?
            .actual()
            .map(str::to_string);
        match actual {
            Some(actual) => self.decompose_actual(node, &actual),
            None => Ok(node),
        }
    }

    /// Output of `node` and its test sub-item chain, reassembled
    pub fn composed_actual(&self, node: NodeId) -> Option<String> {
        self.compose(node, |n| n.actual())
    }

    /// Ideal of `node` and its test sub-item chain, reassembled
    pub fn composed_ideal(&self, node: NodeId) -> Option<String> {
        self.compose(node, |n| n.ideal())
    }

    fn compose(&self, node: NodeId, field: impl Fn(&SkeinNode) -> Option<&str>) -> Option<String> {
        let top = self.node(node)?;
        let mut any = field(top).is_some();
        let mut text = field(top).unwrap_or_default().to_string();

        let mut current = node;
        let mut step = 1;
        while let Some(sub) = self.test_sub_item_of(current) {
            let Some(item) = self.node(sub) else {
                break;
            };
            any |= field(item).is_some();
            text.push_str(&format!(">[{}] {}\n", step, item.command()));
            text.push_str(field(item).unwrap_or_default());
            current = sub;
            step += 1;
        }

        any.then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT_OUTPUT: &str = "(Testing.)\n\n>[1] open door\nYou open the door.\n\n>[2] north\nA garden.\n\n";

    #[test]
    fn test_is_test_command() {
        assert!(is_test_command("test me"));
        assert!(is_test_command("TEST garden"));
        assert!(is_test_command("  test me"));
        assert!(!is_test_command("testify"));
        assert!(!is_test_command("test"));
        assert!(!is_test_command("look"));
    }

    #[test]
    fn test_split_sections() {
        let (head, sections) = split_sections(SCRIPT_OUTPUT);
        assert_eq!(head, "(Testing.)\n\n");
        assert_eq!(
            sections,
            vec![
                Section { command: "open door", text: "You open the door.\n\n" },
                Section { command: "north", text: "A garden.\n\n" },
            ]
        );
    }

    #[test]
    fn test_split_without_markers() {
        let (head, sections) = split_sections("Nothing to test.\n");
        assert_eq!(head, "Nothing to test.\n");
        assert!(sections.is_empty());
    }

    #[test]
    fn test_decompose_compose_inverse() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        let top = skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        assert_eq!(top, node);
        assert_eq!(skein.composed_actual(node).as_deref(), Some(SCRIPT_OUTPUT));

        let first = skein.test_sub_item_of(node).unwrap();
        assert!(skein.node(first).unwrap().is_test_sub_item());
        assert!(skein.non_test_children(node).is_empty());
    }

    #[test]
    fn test_compose_normalizes_markers() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein
            .decompose_actual(node, "> [1]   open door\nYou open the door.\n>[7] wait")
            .unwrap();
        assert_eq!(
            skein.composed_actual(node).as_deref(),
            Some(">[1] open door\nYou open the door.\n>[2] wait\n")
        );
    }

    #[test]
    fn test_decompose_twice_reuses_chain() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        let count = skein.len();
        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        assert_eq!(skein.len(), count);
    }

    #[test]
    fn test_redecompose_replaces_changed_step() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        let old_first = skein.test_sub_item_of(node).unwrap();

        let rerun = ">[1] close door\nYou close the door.\n";
        skein.decompose_actual(node, rerun).unwrap();
        assert_eq!(skein.composed_actual(node).as_deref(), Some(rerun));
        assert_eq!(skein.children_of(node).len(), 1);
        assert!(skein.node(old_first).is_none());
    }

    #[test]
    fn test_redecompose_with_fewer_sections() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein.decompose_actual(node, ">[1] a\nA.\n>[2] b\nB.\n").unwrap();
        skein.decompose_actual(node, ">[1] a\nA.\n").unwrap();

        assert_eq!(skein.composed_actual(node).as_deref(), Some(">[1] a\nA.\n"));
        let first = skein.test_sub_item_of(node).unwrap();
        assert!(skein.children_of(first).is_empty());
        assert_eq!(skein.len(), 3);
    }

    #[test]
    fn test_redecompose_keeps_user_branches_on_kept_steps() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        let first = skein.test_sub_item_of(node).unwrap();
        let look = skein.add_child(first, "look").unwrap();

        skein.decompose_actual(node, ">[1] open door\nIt opens.\n").unwrap();
        assert_eq!(skein.children_of(first), &[look]);
        assert_eq!(skein.node(first).unwrap().actual(), Some("It opens.\n"));
    }

    #[test]
    fn test_redecompose_moves_active_item_off_stale_steps() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();

        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        let first = skein.test_sub_item_of(node).unwrap();
        let second = skein.test_sub_item_of(first).unwrap();
        skein.set_active_item(Some(second)).unwrap();

        skein.decompose_actual(node, ">[1] open door\nYou open the door.\n").unwrap();
        assert!(skein.node(second).is_none());
        assert_eq!(skein.active_item(), Some(first));
    }

    #[test]
    fn test_decompose_is_one_journal_step() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();
        skein.take_journal();

        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        assert_eq!(skein.take_journal().len(), 1);
    }

    #[test]
    fn test_composed_ideal_absent() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let node = skein.add_child(root, "test me").unwrap();
        skein.decompose_actual(node, SCRIPT_OUTPUT).unwrap();
        assert_eq!(skein.composed_ideal(node), None);

        let first = skein.test_sub_item_of(node).unwrap();
        skein.set_ideal_of(first, Some("You open the door.\n\n".into()));
        assert_eq!(
            skein.composed_ideal(node).as_deref(),
            Some(">[1] open door\nYou open the door.\n\n>[2] north\n")
        );
    }
}
