//! Ideal vs actual transcript comparison
//!
//! Runs the character-level edit script and turns it into ranges that the UI
//! renders inline: deletions struck through, insertions highlighted, and
//! whitespace-only changes shown using the actual text's formatting.

use super::myers::{shortest_edit_script, Step};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Form of an edit in a transcript diff
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    /// Present only in the ideal text
    Delete,
    /// Identical in both texts
    Preserve,
    /// Present in both, but the whitespace differs; render from actual
    PreserveActual,
    /// Present only in the actual text
    Insert,
}

/// One span of a diff
///
/// `ideal` and `actual` are byte ranges into the two compared strings. A
/// `Delete` has an empty `actual` range, an `Insert` an empty `ideal` range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEdit {
    pub kind: EditKind,
    pub ideal: Range<usize>,
    pub actual: Range<usize>,
}

/// Result of comparing two pieces of text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    /// One side of the comparison doesn't exist
    NoResult,
    /// Sides are identical
    Identical,
    /// Sides are different, but only in terms of whitespace
    DiffersOnlyByWhitespace,
    /// Sides are different
    Different,
}

/// Edit script between an ideal and an actual transcript
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub edits: Vec<DiffEdit>,
}

impl DiffResult {
    /// Text of an edit as it appears in the ideal transcript
    pub fn ideal_text<'a>(&self, ideal: &'a str, edit: &DiffEdit) -> &'a str {
        &ideal[edit.ideal.clone()]
    }

    /// Text of an edit as it appears in the actual transcript
    pub fn actual_text<'a>(&self, actual: &'a str, edit: &DiffEdit) -> &'a str {
        &actual[edit.actual.clone()]
    }

    /// Three-valued classification of this diff
    pub fn comparison(&self) -> Comparison {
        let mut whitespace = false;
        for edit in &self.edits {
            match edit.kind {
                EditKind::Preserve => {}
                EditKind::PreserveActual => whitespace = true,
                EditKind::Delete | EditKind::Insert => return Comparison::Different,
            }
        }

        if whitespace {
            Comparison::DiffersOnlyByWhitespace
        } else {
            Comparison::Identical
        }
    }

    pub fn is_identical(&self) -> bool {
        self.comparison() == Comparison::Identical
    }

    pub fn differs_only_by_whitespace(&self) -> bool {
        self.comparison() == Comparison::DiffersOnlyByWhitespace
    }

    /// Any edit other than a plain `Preserve`
    pub fn has_changes(&self) -> bool {
        self.edits.iter().any(|e| e.kind != EditKind::Preserve)
    }
}

/// Compute the diff between an ideal and an actual transcript
///
/// Returns `None` when either side is absent: a node that was never played
/// has nothing to compare, which is not the same as producing empty output.
pub fn diff(ideal: Option<&str>, actual: Option<&str>) -> Option<DiffResult> {
    let (ideal, actual) = (ideal?, actual?);
    Some(diff_text(ideal, actual))
}

/// Classify two optional texts without keeping the edit script
pub fn compare(ideal: Option<&str>, actual: Option<&str>) -> Comparison {
    match diff(ideal, actual) {
        Some(result) => result.comparison(),
        None => Comparison::NoResult,
    }
}

/// A run of consecutive script steps, as byte ranges into both texts
#[derive(Clone, Debug)]
enum Run {
    Same { ideal: Range<usize>, actual: Range<usize> },
    Changed { ideal: Range<usize>, actual: Range<usize> },
}

fn diff_text(ideal: &str, actual: &str) -> DiffResult {
    let ideal_chars: Vec<char> = ideal.chars().collect();
    let actual_chars: Vec<char> = actual.chars().collect();
    let ideal_offsets = byte_offsets(ideal);
    let actual_offsets = byte_offsets(actual);

    let steps = shortest_edit_script(&ideal_chars, &actual_chars);
    let runs = collect_runs(&steps, &ideal_offsets, &actual_offsets);
    let edits = classify_runs(runs, ideal, actual);

    DiffResult { edits }
}

/// Byte offset of every char boundary, including the end of the string
fn byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn collect_runs(steps: &[Step], ideal_offsets: &[usize], actual_offsets: &[usize]) -> Vec<Run> {
    let mut runs = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut pos = 0;

    while pos < steps.len() {
        let (start_i, start_j) = (i, j);

        if steps[pos] == Step::Keep {
            while pos < steps.len() && steps[pos] == Step::Keep {
                i += 1;
                j += 1;
                pos += 1;
            }
            runs.push(Run::Same {
                ideal: ideal_offsets[start_i]..ideal_offsets[i],
                actual: actual_offsets[start_j]..actual_offsets[j],
            });
        } else {
            // Deleted chars in a cluster are contiguous in ideal, inserted
            // ones contiguous in actual, however the script interleaves them.
            while pos < steps.len() && steps[pos] != Step::Keep {
                match steps[pos] {
                    Step::Delete => i += 1,
                    Step::Insert => j += 1,
                    Step::Keep => {}
                }
                pos += 1;
            }
            runs.push(Run::Changed {
                ideal: ideal_offsets[start_i]..ideal_offsets[i],
                actual: actual_offsets[start_j]..actual_offsets[j],
            });
        }
    }

    runs
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// Length in bytes of the whitespace at the end of `text`
fn trailing_whitespace(text: &str) -> usize {
    text.len() - text.trim_end_matches(char::is_whitespace).len()
}

/// Length in bytes of the whitespace at the start of `text`
fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start_matches(char::is_whitespace).len()
}

fn classify_runs(mut runs: Vec<Run>, ideal: &str, actual: &str) -> Vec<DiffEdit> {
    let mut edits: Vec<DiffEdit> = Vec::with_capacity(runs.len() + 4);

    for index in 0..runs.len() {
        match runs[index].clone() {
            Run::Same { ideal: ir, actual: ar } => {
                if !ir.is_empty() {
                    edits.push(DiffEdit { kind: EditKind::Preserve, ideal: ir, actual: ar });
                }
            }
            Run::Changed { ideal: ir, actual: ar }
                if is_blank(&ideal[ir.clone()]) && is_blank(&actual[ar.clone()]) =>
            {
                let (mut ir, mut ar) = (ir, ar);

                // Absorb the whitespace before the change
                if let Some(last) = edits.last_mut() {
                    if last.kind == EditKind::Preserve {
                        let n = trailing_whitespace(&ideal[last.ideal.clone()]);
                        last.ideal.end -= n;
                        last.actual.end -= n;
                        ir.start -= n;
                        ar.start -= n;
                        if last.ideal.is_empty() {
                            edits.pop();
                        }
                    }
                }

                // Absorb the whitespace after the change
                if let Some(Run::Same { ideal: next_i, actual: next_a }) = runs.get_mut(index + 1) {
                    let n = leading_whitespace(&ideal[next_i.clone()]);
                    next_i.start += n;
                    next_a.start += n;
                    ir.end += n;
                    ar.end += n;
                }

                match edits.last_mut() {
                    Some(last) if last.kind == EditKind::PreserveActual && last.ideal.end == ir.start => {
                        last.ideal.end = ir.end;
                        last.actual.end = ar.end;
                    }
                    _ => edits.push(DiffEdit { kind: EditKind::PreserveActual, ideal: ir, actual: ar }),
                }
            }
            Run::Changed { ideal: ir, actual: ar } => {
                if !ir.is_empty() {
                    edits.push(DiffEdit {
                        kind: EditKind::Delete,
                        ideal: ir.clone(),
                        actual: ar.start..ar.start,
                    });
                }
                if !ar.is_empty() {
                    edits.push(DiffEdit {
                        kind: EditKind::Insert,
                        ideal: ir.end..ir.end,
                        actual: ar,
                    });
                }
            }
        }
    }

    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild_ideal(ideal: &str, result: &DiffResult) -> String {
        result.edits.iter().map(|e| result.ideal_text(ideal, e)).collect()
    }

    fn rebuild_actual(actual: &str, result: &DiffResult) -> String {
        result.edits.iter().map(|e| result.actual_text(actual, e)).collect()
    }

    #[test]
    fn test_missing_side_gives_no_result() {
        assert!(diff(None, Some("text")).is_none());
        assert!(diff(Some("text"), None).is_none());
        assert_eq!(compare(None, None), Comparison::NoResult);
    }

    #[test]
    fn test_empty_strings_are_identical() {
        let result = diff(Some(""), Some("")).unwrap();
        assert!(result.edits.is_empty());
        assert_eq!(result.comparison(), Comparison::Identical);
    }

    #[test]
    fn test_dark_room_spans_rebuild_both_sides() {
        let ideal = "You are in a room.";
        let actual = "You are in a dark room.";
        let result = diff(Some(ideal), Some(actual)).unwrap();

        let with_inserts: String = result
            .edits
            .iter()
            .filter(|e| matches!(e.kind, EditKind::Preserve | EditKind::Insert))
            .map(|e| result.actual_text(actual, e))
            .collect();
        let with_deletes: String = result
            .edits
            .iter()
            .filter(|e| matches!(e.kind, EditKind::Preserve | EditKind::Delete))
            .map(|e| result.ideal_text(ideal, e))
            .collect();

        assert_eq!(with_inserts, actual);
        assert_eq!(with_deletes, ideal);
        assert_eq!(result.comparison(), Comparison::Different);
    }

    #[test]
    fn test_whitespace_only_difference() {
        let ideal = "Hello there";
        let actual = "Hello  there";
        let result = diff(Some(ideal), Some(actual)).unwrap();

        assert_eq!(result.comparison(), Comparison::DiffersOnlyByWhitespace);
        let ws: Vec<_> = result
            .edits
            .iter()
            .filter(|e| e.kind == EditKind::PreserveActual)
            .collect();
        assert_eq!(ws.len(), 1);
        assert_eq!(result.ideal_text(ideal, ws[0]), " ");
        assert_eq!(result.actual_text(actual, ws[0]), "  ");
        assert_eq!(rebuild_ideal(ideal, &result), ideal);
        assert_eq!(rebuild_actual(actual, &result), actual);
    }

    #[test]
    fn test_word_change_is_different() {
        assert_eq!(
            compare(Some("Hello there"), Some("Goodbye there")),
            Comparison::Different
        );
    }

    #[test]
    fn test_newline_versus_space_is_whitespace() {
        assert_eq!(
            compare(Some("A garden.\nExits: north"), Some("A garden. Exits: north")),
            Comparison::DiffersOnlyByWhitespace
        );
    }

    #[test]
    fn test_multibyte_ranges_are_char_boundaries() {
        let ideal = "Café au lait";
        let actual = "Café noir";
        let result = diff(Some(ideal), Some(actual)).unwrap();
        assert_eq!(rebuild_ideal(ideal, &result), ideal);
        assert_eq!(rebuild_actual(actual, &result), actual);
    }

    #[test]
    fn test_has_changes_counts_whitespace() {
        let result = diff(Some("A garden."), Some("A  garden.")).unwrap();
        assert!(result.has_changes());
        assert!(result.differs_only_by_whitespace());
        assert!(!diff(Some("same"), Some("same")).unwrap().has_changes());
    }

    #[test]
    fn test_long_rewrite_still_rebuilds_both_sides() {
        // Nothing in common between the middles, so the edit distance is 5000
        let ideal = format!("Intro\n{}\n", "0123456789".repeat(250));
        let actual = format!("Intro\n{}\n", "ABCDEFGHIJ".repeat(250));
        let result = diff(Some(ideal.as_str()), Some(actual.as_str())).unwrap();

        assert_eq!(result.comparison(), Comparison::Different);
        assert_eq!(rebuild_ideal(&ideal, &result), ideal);
        assert_eq!(rebuild_actual(&actual, &result), actual);
    }
}
