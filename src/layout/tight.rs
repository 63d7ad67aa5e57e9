//! Tight packing
//!
//! Every subtree is summarised by its contour: the leftmost and rightmost
//! extent of each of its levels, relative to the subtree's own centre.
//! Siblings are then packed strictly left to right. Each child goes at the
//! smallest offset where, on every level it shares with the siblings already
//! placed, its left contour clears their merged right contour by the item
//! padding. The parent is centred between its first and last child.
//!
//! Each contour is consumed by its parent, so the whole pass touches every
//! (node, level) pair once.

use super::tree::LayoutNode;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Contour {
    /// `(left, right)` per level, top level first
    levels: Vec<(f32, f32)>,
}

impl Contour {
    fn single(left: f32, right: f32) -> Self {
        Self { levels: vec![(left, right)] }
    }

    fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Smallest offset for `other` that keeps it `padding` clear of `self`
    /// on every shared level
    fn separation(&self, other: &Contour, padding: f32) -> f32 {
        self.levels
            .iter()
            .zip(other.levels.iter())
            .map(|((_, right), (left, _))| right + padding - left)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Merge `other`, shifted by `offset`, in as the right-hand neighbour
    fn append_right(&mut self, other: &Contour, offset: f32) {
        for (level, (left, right)) in other.levels.iter().enumerate() {
            let (left, right) = (left + offset, right + offset);
            match self.levels.get_mut(level) {
                Some(extent) => {
                    extent.0 = extent.0.min(left);
                    extent.1 = extent.1.max(right);
                }
                None => self.levels.push((left, right)),
            }
        }
    }

    /// Distance between the leftmost and rightmost extent over all levels
    fn width(&self) -> f32 {
        let (left, right) = self
            .levels
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(l, r), (left, right)| {
                (l.min(*left), r.max(*right))
            });
        (right - left).max(0.0)
    }

    fn extend_below(&mut self, below: &Contour, shift: f32) {
        self.levels
            .extend(below.levels.iter().map(|(left, right)| (left + shift, right + shift)));
    }
}

/// Position `nodes` (pre-order arena, root first) with tight packing
pub(crate) fn place_tight(nodes: &mut [LayoutNode], padding: f32) {
    let mut contours: Vec<Contour> = vec![Contour::default(); nodes.len()];
    let mut offsets = vec![0.0f32; nodes.len()];

    for i in (0..nodes.len()).rev() {
        let half = nodes[i].command_width / 2.0;
        let mut contour = Contour::single(-half, half);

        let children = &nodes[i].children;
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            let mut merged = Contour::default();
            for &child in children {
                let child_contour = std::mem::take(&mut contours[child]);
                let offset = if merged.is_empty() {
                    0.0
                } else {
                    merged.separation(&child_contour, padding)
                };
                merged.append_right(&child_contour, offset);
                offsets[child] = offset;
            }

            let middle = (offsets[first] + offsets[last]) / 2.0;
            for &child in children {
                offsets[child] -= middle;
            }
            contour.extend_below(&merged, -middle);
        }

        nodes[i].subtree_width = contour.width();
        contours[i] = contour;
    }

    for i in 0..nodes.len() {
        let centre = if nodes[i].parent.is_none() {
            0.0
        } else {
            nodes[i].centre_x
        };
        nodes[i].centre_x = centre;

        for c in 0..nodes[i].children.len() {
            let child = nodes[i].children[c];
            nodes[child].centre_x = centre + offsets[child];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutConfig, PackingStyle, SkeinLayout};
    use crate::models::Skein;

    fn fixed(width: f32) -> impl Fn(&str) -> f32 {
        move |_| width
    }

    #[test]
    fn test_contour_separation() {
        let mut left = Contour::single(-10.0, 10.0);
        left.extend_below(&Contour::single(-50.0, 50.0), 0.0);
        let right = Contour::single(-10.0, 10.0);

        // Only the top level is shared
        assert_eq!(left.separation(&right, 5.0), 25.0);
        left.append_right(&right, 25.0);
        assert_eq!(left.levels, vec![(-10.0, 35.0), (-50.0, 50.0)]);
        assert_eq!(left.width(), 100.0);
        assert_eq!(Contour::default().width(), 0.0);
    }

    #[test]
    fn test_leaf_tucks_under_wide_neighbour() {
        // root -> [a -> [a1, a2, a3], b]
        let mut skein = Skein::new();
        let root = skein.root_item();
        let a = skein.add_child(root, "a").unwrap();
        for cmd in ["a1", "a2", "a3"] {
            skein.add_child(a, cmd).unwrap();
        }
        let b = skein.add_child(root, "b").unwrap();

        let tight = SkeinLayout::compute(&skein, None, &LayoutConfig::default(), &fixed(20.0));
        let loose = SkeinLayout::compute(
            &skein,
            None,
            &LayoutConfig::with_packing(PackingStyle::Loose),
            &fixed(20.0),
        );

        let gap = |layout: &SkeinLayout| {
            layout.layout_for(b).unwrap().centre_x - layout.layout_for(a).unwrap().centre_x
        };
        // Loose keeps b clear of a's whole subtree, tight only of a itself
        assert_eq!(gap(&loose), 60.0);
        assert_eq!(gap(&tight), 30.0);
        assert_eq!(tight.layout_for(root).unwrap().centre_x, 0.0);
        assert_eq!(tight.layout_for(a).unwrap().centre_x, -15.0);

        // Widths follow the packing: a1..a3 span -55..25, a and b span -25..25
        assert_eq!(loose.root_layout_node().unwrap().subtree_width, 110.0);
        assert_eq!(tight.root_layout_node().unwrap().subtree_width, 80.0);
        assert_eq!(tight.layout_for(a).unwrap().subtree_width, 80.0);
        assert_eq!(tight.layout_for(b).unwrap().subtree_width, 20.0);
    }

    #[test]
    fn test_cascade_is_left_to_right() {
        // Three wide subtrees: each is pushed right by everything already placed
        let mut skein = Skein::new();
        let root = skein.root_item();
        let mut tops = Vec::new();
        for top in ["x", "y", "z"] {
            let id = skein.add_child(root, top).unwrap();
            skein.add_child(id, "1").unwrap();
            skein.add_child(id, "2").unwrap();
            tops.push(id);
        }

        let layout = SkeinLayout::compute(&skein, None, &LayoutConfig::default(), &fixed(20.0));
        let xs: Vec<f32> = tops.iter().map(|t| layout.layout_for(*t).unwrap().centre_x).collect();
        assert_eq!(xs, vec![-60.0, 0.0, 60.0]);
    }

    #[test]
    fn test_levels_never_overlap() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let a = skein.add_child(root, "a").unwrap();
        let b = skein.add_child(root, "bbbbbbbbbbbb").unwrap();
        let c = skein.add_child(root, "c").unwrap();
        skein.add_child(a, "deep one").unwrap();
        let b1 = skein.add_child(b, "b1").unwrap();
        skein.add_child(b1, "b11").unwrap();
        skein.add_child(c, "c1 is long").unwrap();

        let config = LayoutConfig::default();
        let measure = |text: &str| text.len() as f32 * 6.0;
        let layout = SkeinLayout::compute(&skein, None, &config, &measure);
        for level in 0..layout.levels() {
            let items = layout.items_on_level(level);
            for pair in items.windows(2) {
                let left = layout.node(pair[0]).unwrap();
                let right = layout.node(pair[1]).unwrap();
                let clearance = (right.centre_x - right.command_width / 2.0)
                    - (left.centre_x + left.command_width / 2.0);
                assert!(clearance >= config.item_padding - 1e-3, "level {} overlaps", level);
            }
        }
    }
}
