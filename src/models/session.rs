//! Interpreter session events
//!
//! A running game drives the skein through these calls: each command moves
//! the active item one step down the tree, creating temporary nodes for paths
//! that have not been explored yet, and output accumulates on the active node
//! until the next command boundary. None of this is journaled for undo.

use super::errors::SkeinError;
use super::node::NodeId;
use super::skein::Skein;
use super::test_items::is_test_command;

/// The command whose output is still being collected
#[derive(Clone, Debug)]
pub(crate) struct Turn {
    pub node: NodeId,
    /// Output the node had before this turn, for the `changed` flag
    pub previous_actual: Option<String>,
}

/// Trailing prompt of a transcript chunk (its last, unterminated line)
pub fn prompt_of(text: &str) -> Option<&str> {
    let last = match text.rfind('\n') {
        Some(pos) => &text[pos + 1..],
        None => text,
    };
    if last.trim().is_empty() {
        None
    } else {
        Some(last)
    }
}

/// Remove the trailing prompt, if any
pub fn strip_prompt(text: &str) -> &str {
    match prompt_of(text) {
        Some(prompt) => &text[..text.len() - prompt.len()],
        None => text,
    }
}

impl Skein {
    /// Commands entered since the session was last restarted
    pub fn previous_commands(&self) -> &[String] {
        &self.previous_commands
    }

    /// The player typed `text`: advance to (or create) the matching child
    ///
    /// Returns the node that is now active.
    pub fn on_command_entered(&mut self, text: &str) -> Result<NodeId, SkeinError> {
        self.without_journal(|skein| skein.enter_command(text))
    }

    fn enter_command(&mut self, text: &str) -> Result<NodeId, SkeinError> {
        self.finish_turn();

        let command = text.trim_end_matches(&['\r', '\n'][..]);
        let mut parent = self.active_item().unwrap_or_else(|| self.root_item());
        while let Some(sub) = self.test_sub_item_of(parent) {
            parent = sub;
        }

        let node = match self.child_with_command(parent, command, false) {
            Some(existing) => existing,
            None => {
                let created = self.add_child(parent, command)?;
                let score = self.next_temporary_score();
                self.set_temporary_of(created, true, score);
                created
            }
        };

        self.set_played_of(node, true);
        self.increase_temporary_score(node);
        self.start_turn(node);
        self.raw_set_active(Some(node));

        self.previous_commands.push(command.to_string());
        self.set_skein_changed();
        log::debug!("Command '{}' entered, active item is now {}", command, node);
        Ok(node)
    }

    /// Append game output to the active node
    pub fn on_output_produced(&mut self, text: &str) {
        let Some(active) = self.active_item() else {
            log::debug!("Output with no active item dropped");
            return;
        };
        let mut actual = self
            .node(active)
            .and_then(|n| n.actual())
            .unwrap_or_default()
            .to_string();
        actual.push_str(text);
        self.without_journal(|skein| skein.set_actual_of(active, Some(actual)));
    }

    /// The game is waiting at a prompt: the current turn's output is complete
    pub fn on_waiting_for_input(&mut self) {
        self.finish_turn();
    }

    /// The story restarted: back to the root, with fresh opening text
    pub fn on_session_restarted(&mut self) {
        self.without_journal(|skein| {
            skein.finish_turn();
            let root = skein.root_item();
            skein.start_turn(root);
            skein.raw_set_active(Some(root));
        });
        self.previous_commands.clear();
        log::info!("Session restarted");
    }

    /// The story finished or was closed; nothing is active any more
    pub fn on_session_stopped(&mut self) {
        self.finish_turn();
        self.raw_set_active(None);
        log::info!("Session stopped");
    }

    fn start_turn(&mut self, node: NodeId) {
        let previous_actual = self.node(node).and_then(|n| n.actual()).map(str::to_string);
        self.set_actual_of(node, Some(String::new()));
        self.turn = Some(Turn { node, previous_actual });
    }

    /// Close the open turn: drop the prompt, flag changed output and
    /// split "test ..." output into sub-items
    fn finish_turn(&mut self) {
        let Some(turn) = self.turn.take() else {
            return;
        };

        self.without_journal(|skein| {
            let Some(node) = skein.node(turn.node) else {
                return;
            };
            let command = node.command().to_string();
            let raw = node.actual().unwrap_or_default();
            let actual = strip_prompt(raw).to_string();

            let changed = turn
                .previous_actual
                .as_deref()
                .map_or(false, |previous| previous != actual);
            skein.set_changed_of(turn.node, changed);

            if is_test_command(&command) {
                if let Err(e) = skein.decompose_actual(turn.node, &actual) {
                    log::warn!("⚠️ Could not decompose output of '{}': {}", command, e);
                }
            } else {
                skein.set_actual_of(turn.node, Some(actual));
            }
        });
    }
}
