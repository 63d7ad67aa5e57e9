//! Shortest edit script using Myers' O(ND) greedy algorithm
//!
//! Works over any slice of comparable items. The transcript differ feeds it
//! characters, but nothing here knows about text.

/// One step of an edit script, in sequence order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Item present in both sequences
    Keep,
    /// Item present only in the source sequence
    Delete,
    /// Item present only in the destination sequence
    Insert,
}

/// Largest edit distance explored before giving up on a minimal script.
///
/// The trace kept for backtracking grows with the square of the distance, so
/// beyond this point the middle section is reported as one delete + insert.
pub const MAX_EDIT_DISTANCE: usize = 2048;

/// Compute a shortest edit script turning `a` into `b`
///
/// Deterministic: on equal cost the algorithm prefers deletions before
/// insertions, so identical inputs always produce identical scripts.
pub fn shortest_edit_script<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Step> {
    // Strip the common prefix and suffix first: transcripts usually differ in
    // a small region, and this keeps the traced area tiny.
    let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut steps = Vec::with_capacity(a.len().max(b.len()));
    steps.extend(std::iter::repeat(Step::Keep).take(prefix));

    match middle_script(a_mid, b_mid) {
        Some(middle) => steps.extend(middle),
        None => {
            log::debug!(
                "edit distance above {} ({} vs {} items), reporting replacement",
                MAX_EDIT_DISTANCE,
                a_mid.len(),
                b_mid.len()
            );
            steps.extend(std::iter::repeat(Step::Delete).take(a_mid.len()));
            steps.extend(std::iter::repeat(Step::Insert).take(b_mid.len()));
        }
    }

    steps.extend(std::iter::repeat(Step::Keep).take(suffix));
    steps
}

/// V-array snapshot taken before exploring edit distance `d`
///
/// Only the diagonals `-(d+1)..=(d+1)` can be read while exploring `d`, so
/// that is all we keep.
struct Snapshot {
    d: isize,
    values: Vec<isize>,
}

impl Snapshot {
    fn get(&self, k: isize) -> isize {
        self.values[(k + self.d + 1) as usize]
    }
}

fn middle_script<T: PartialEq>(a: &[T], b: &[T]) -> Option<Vec<Step>> {
    let n = a.len() as isize;
    let m = b.len() as isize;

    if n == 0 || m == 0 {
        let mut steps = Vec::with_capacity((n + m) as usize);
        steps.extend(std::iter::repeat(Step::Delete).take(a.len()));
        steps.extend(std::iter::repeat(Step::Insert).take(b.len()));
        return Some(steps);
    }

    let max = n + m;
    let offset = max + 1;
    let mut v = vec![0isize; (2 * max + 3) as usize];
    let mut trace: Vec<Snapshot> = Vec::new();

    for d in 0..=max {
        if d as usize > MAX_EDIT_DISTANCE {
            return None;
        }

        let lo = (offset - d - 1) as usize;
        let hi = (offset + d + 1) as usize;
        trace.push(Snapshot {
            d,
            values: v[lo..=hi].to_vec(),
        });

        let mut k = -d;
        while k <= d {
            let idx = (offset + k) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;

            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }

            v[idx] = x;

            if x >= n && y >= m {
                return Some(backtrack(&trace, n, m));
            }

            k += 2;
        }
    }

    // Unreachable: distance n + m always reaches the end point.
    None
}

fn backtrack(trace: &[Snapshot], n: isize, m: isize) -> Vec<Step> {
    let mut x = n;
    let mut y = m;
    let mut reversed = Vec::with_capacity((n + m) as usize);

    for snapshot in trace.iter().rev() {
        let d = snapshot.d;
        let k = x - y;

        let prev_k = if k == -d || (k != d && snapshot.get(k - 1) < snapshot.get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = snapshot.get(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            reversed.push(Step::Keep);
            x -= 1;
            y -= 1;
        }

        if d > 0 {
            if x == prev_x {
                reversed.push(Step::Insert);
            } else {
                reversed.push(Step::Delete);
            }
        }

        x = prev_x;
        y = prev_y;
    }

    reversed.reverse();
    reversed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn cost(steps: &[Step]) -> usize {
        steps.iter().filter(|s| **s != Step::Keep).count()
    }

    /// Rebuild both sides from a script to check it is a valid edit script
    fn apply(a: &[char], b: &[char], steps: &[Step]) -> (String, String) {
        let (mut i, mut j) = (0, 0);
        let (mut src, mut dst) = (String::new(), String::new());
        for step in steps {
            match step {
                Step::Keep => {
                    assert_eq!(a[i], b[j]);
                    src.push(a[i]);
                    dst.push(b[j]);
                    i += 1;
                    j += 1;
                }
                Step::Delete => {
                    src.push(a[i]);
                    i += 1;
                }
                Step::Insert => {
                    dst.push(b[j]);
                    j += 1;
                }
            }
        }
        (src, dst)
    }

    #[test]
    fn test_identical_sequences_keep_everything() {
        let a = chars("north");
        let steps = shortest_edit_script(&a, &a);
        assert!(steps.iter().all(|s| *s == Step::Keep));
        assert_eq!(steps.len(), 5);
    }

    #[test]
    fn test_empty_sides() {
        let empty: Vec<char> = Vec::new();
        assert_eq!(shortest_edit_script(&empty, &chars("ab")), vec![Step::Insert, Step::Insert]);
        assert_eq!(shortest_edit_script(&chars("ab"), &empty), vec![Step::Delete, Step::Delete]);
        assert!(shortest_edit_script(&empty, &empty).is_empty());
    }

    #[test]
    fn test_classic_example_is_minimal() {
        // The example from Myers' paper has edit distance 5
        let a = chars("ABCABBA");
        let b = chars("CBABAC");
        let steps = shortest_edit_script(&a, &b);
        assert_eq!(cost(&steps), 5);
        let (src, dst) = apply(&a, &b, &steps);
        assert_eq!(src, "ABCABBA");
        assert_eq!(dst, "CBABAC");
    }

    #[test]
    fn test_insertion_in_middle() {
        let a = chars("You are in a room.");
        let b = chars("You are in a dark room.");
        let steps = shortest_edit_script(&a, &b);
        assert_eq!(cost(&steps), 5);
        let (src, dst) = apply(&a, &b, &steps);
        assert_eq!(src, "You are in a room.");
        assert_eq!(dst, "You are in a dark room.");
    }

    #[test]
    fn test_script_is_deterministic() {
        let a = chars("the quick brown fox");
        let b = chars("a quick red fox jumps");
        assert_eq!(shortest_edit_script(&a, &b), shortest_edit_script(&a, &b));
    }

    #[test]
    fn test_past_cut_off_reports_valid_replacement() {
        // Minimal distance is 6000 (keeping the "m"), well past the cut-off
        let a: Vec<char> = format!("West\n{}m{}\n>", "a".repeat(1500), "b".repeat(1500)).chars().collect();
        let b: Vec<char> = format!("West\n{}m{}\n>", "c".repeat(1500), "d".repeat(1500)).chars().collect();

        let steps = shortest_edit_script(&a, &b);
        assert_eq!(cost(&steps), 6002);
        assert!(steps[..5].iter().all(|s| *s == Step::Keep));
        assert!(steps[steps.len() - 2..].iter().all(|s| *s == Step::Keep));

        let (src, dst) = apply(&a, &b, &steps);
        assert_eq!(src, a.iter().collect::<String>());
        assert_eq!(dst, b.iter().collect::<String>());
    }
}
