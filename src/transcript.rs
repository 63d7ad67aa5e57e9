//! Transcripts and command recordings along a skein path
//!
//! A transcript interleaves the commands on the path from the root to a node
//! with the output each one produced. A recording is the bare command list,
//! one per line, which an interpreter can replay to reach the node again.

use crate::models::{NodeId, Skein, SkeinError};

/// Node used when the caller does not name one: the winning item, else the
/// active item
pub fn default_point(skein: &Skein) -> Option<NodeId> {
    skein.winning_item().or_else(|| skein.active_item())
}

/// Full transcript from the start of the story to `point`
pub fn transcript_to_point(skein: &Skein, point: Option<NodeId>) -> String {
    let target = point.or_else(|| default_point(skein)).unwrap_or_else(|| skein.root_item());

    let mut text = String::new();
    for id in skein.path_to(target) {
        let Some(node) = skein.node(id) else {
            continue;
        };
        if id != skein.root_item() {
            text.push('>');
            text.push_str(node.command());
            text.push('\n');
        }
        text.push_str(node.actual().unwrap_or_default());
    }
    text
}

/// Commands to type from the start of the story to reach `point`
pub fn recording_to_point(skein: &Skein, point: Option<NodeId>) -> String {
    let target = point.or_else(|| default_point(skein)).unwrap_or_else(|| skein.root_item());

    let path = skein.path_to(target);
    let mut text = String::new();
    for command in replay_commands(skein, path.get(1..).unwrap_or_default()) {
        text.push_str(&command);
        text.push('\n');
    }
    text
}

/// Commands leading from `from` down to `to`
///
/// Test sub-items are skipped: the "test" command that created them
/// reproduces them.
pub fn commands_between(skein: &Skein, from: NodeId, to: NodeId) -> Result<Vec<String>, SkeinError> {
    if skein.node(from).is_none() {
        return Err(SkeinError::UnknownNode(from));
    }
    if skein.node(to).is_none() {
        return Err(SkeinError::UnknownNode(to));
    }
    if !skein.is_ancestor_or_self(from, to) {
        return Err(SkeinError::NotAncestor { from, to });
    }

    let path = skein.path_to(to);
    let start = path.iter().position(|id| *id == from).map_or(path.len(), |i| i + 1);
    Ok(replay_commands(skein, &path[start..]))
}

fn replay_commands(skein: &Skein, path: &[NodeId]) -> Vec<String> {
    path.iter()
        .filter_map(|id| skein.node(*id))
        .filter(|node| !node.is_test_sub_item())
        .map(|node| node.command().to_string())
        .collect()
}
