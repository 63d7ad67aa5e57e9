//! View-space queries
//!
//! Layout space has the root centred on x = 0 and level 0 at y = 0. View
//! space shifts everything right and down so that the leftmost lozenge starts
//! one border in from the edge.

use super::tree::SkeinLayout;
use crate::models::NodeId;
use serde::Serialize;
use std::ops::Range;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl SkeinLayout {
    fn lozenge_half_width(&self, index: usize) -> f32 {
        self.nodes[index].command_width / 2.0 + self.config.frame_extension
    }

    /// Left edge of the leftmost lozenge, in layout space
    fn min_left(&self) -> f32 {
        (0..self.nodes.len())
            .map(|i| self.nodes[i].centre_x - self.lozenge_half_width(i))
            .reduce(f32::min)
            .unwrap_or(0.0)
    }

    fn max_right(&self) -> f32 {
        (0..self.nodes.len())
            .map(|i| self.nodes[i].centre_x + self.lozenge_half_width(i))
            .reduce(f32::max)
            .unwrap_or(0.0)
    }

    /// Convert a layout-space x coordinate to view space
    pub fn view_x(&self, layout_x: f32) -> f32 {
        layout_x - self.min_left() + self.config.border
    }

    /// Top of a level in view space
    pub fn level_top(&self, level: usize) -> f32 {
        self.config.border + level as f32 * self.config.level_height
    }

    /// Lozenge of the node at `index`, in view space
    pub fn lozenge_rect(&self, index: usize) -> Option<Rect> {
        let node = self.nodes.get(index)?;
        let half = self.lozenge_half_width(index);
        let inset = ((self.config.level_height - self.config.item_height) / 2.0).max(0.0);

        Some(Rect {
            x: self.view_x(node.centre_x - half),
            y: self.level_top(node.level) + inset,
            width: half * 2.0,
            height: self.config.item_height,
        })
    }

    /// Size of the view needed to show the whole skein, borders included
    pub fn bounding_size(&self) -> Size {
        let border = self.config.border;
        if self.nodes.is_empty() {
            return Size { width: border * 2.0, height: border * 2.0 };
        }

        Size {
            width: self.max_right() - self.min_left() + border * 2.0,
            height: self.levels() as f32 * self.config.level_height + border * 2.0,
        }
    }

    /// Skein node whose lozenge contains the view-space point
    pub fn item_at_position(&self, x: f32, y: f32) -> Option<NodeId> {
        let levels = self.range_of_levels_between(y, y);
        if levels.is_empty() {
            return None;
        }

        self.items_on_level(levels.start)
            .into_iter()
            .find(|i| self.lozenge_rect(*i).map_or(false, |r| r.contains(x, y)))
            .map(|i| self.nodes[i].item)
    }

    /// Levels that intersect the view-space band `min_y..=max_y`
    pub fn range_of_levels_between(&self, min_y: f32, max_y: f32) -> Range<usize> {
        let levels = self.levels();
        let height = self.config.level_height;
        if levels == 0 || height <= 0.0 || max_y < min_y {
            return 0..0;
        }

        let level_at = |y: f32| ((y - self.config.border) / height).floor();
        let first = level_at(min_y).max(0.0) as usize;
        let last = level_at(max_y);
        if last < 0.0 {
            return 0..0;
        }

        let end = (last as usize + 1).min(levels);
        let start = first.min(end);
        start..end
    }
}
