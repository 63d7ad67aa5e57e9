//! Layout tree construction
//!
//! A layout is rebuilt from scratch on every pass: one [`LayoutNode`] per
//! attached skein node, stored in a flat arena in pre-order so that index 0
//! is always the root and every parent comes before its children.

use super::config::{LayoutConfig, PackingStyle, TextMeasure};
use super::tight;
use crate::models::{NodeId, Skein};
use serde::Serialize;
use std::collections::BTreeMap;

/// Position of one skein node
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub item: NodeId,

    /// Measured width of the command label
    pub command_width: f32,

    /// Width needed by this node and everything below it
    ///
    /// With tight packing this is the packed extent, which is not always
    /// centred on `centre_x` and can overlap a sibling's.
    pub subtree_width: f32,

    /// Horizontal centre in layout space (the root sits at 0)
    pub centre_x: f32,

    /// Distance from the root
    pub level: usize,

    /// Number of levels below this node
    pub depth: usize,

    /// On the path from the root to the selected item
    pub on_selected_line: bool,

    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Positioned layout of a whole skein
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkeinLayout {
    pub(crate) nodes: Vec<LayoutNode>,
    pub(crate) config: LayoutConfig,
    pub(crate) selected: Option<NodeId>,
    #[serde(skip)]
    pub(crate) index: BTreeMap<NodeId, usize>,
}

impl SkeinLayout {
    /// Lay out the skein
    ///
    /// `selected` defaults to the skein's active item. The result depends only
    /// on the tree, the selection, the configuration and the measured widths.
    pub fn compute(
        skein: &Skein,
        selected: Option<NodeId>,
        config: &LayoutConfig,
        measure: &dyn TextMeasure,
    ) -> Self {
        let mut layout = Self::build(skein, config, measure);
        layout.compute_widths();

        match config.packing {
            PackingStyle::Loose => layout.place_loose(),
            PackingStyle::Tight => tight::place_tight(&mut layout.nodes, config.item_padding),
        }

        layout.selected = selected.or_else(|| skein.active_item());
        layout.mark_selected_line();

        log::debug!(
            "Laid out {} items over {} levels ({:?})",
            layout.nodes.len(),
            layout.levels(),
            config.packing
        );
        layout
    }

    /// Create the node arena in pre-order with measured command widths
    fn build(skein: &Skein, config: &LayoutConfig, measure: &dyn TextMeasure) -> Self {
        let mut nodes: Vec<LayoutNode> = Vec::with_capacity(skein.len());
        let mut index = BTreeMap::new();

        let mut stack: Vec<(NodeId, Option<usize>, usize)> = vec![(skein.root_item(), None, 0)];
        while let Some((id, parent, level)) = stack.pop() {
            let Some(node) = skein.node(id) else {
                continue;
            };

            let position = nodes.len();
            let command_width = measure.measure(node.label()).max(0.0);
            nodes.push(LayoutNode {
                item: id,
                command_width,
                subtree_width: command_width,
                centre_x: 0.0,
                level,
                depth: 0,
                on_selected_line: false,
                parent,
                children: Vec::new(),
            });
            index.insert(id, position);
            if let Some(parent) = parent {
                nodes[parent].children.push(position);
            }

            for child in node.children().iter().rev() {
                stack.push((*child, Some(position), level + 1));
            }
        }

        Self {
            nodes,
            config: config.clone(),
            selected: None,
            index,
        }
    }

    /// Bottom-up width pass
    ///
    /// Reverse pre-order visits every child before its parent.
    fn compute_widths(&mut self) {
        let padding = self.config.item_padding;
        for i in (0..self.nodes.len()).rev() {
            let children = &self.nodes[i].children;
            if children.is_empty() {
                continue;
            }

            let block: f32 = children.iter().map(|c| self.nodes[*c].subtree_width).sum::<f32>()
                + padding * (children.len() - 1) as f32;
            let depth = children.iter().map(|c| self.nodes[*c].depth).max().unwrap_or(0) + 1;

            let node = &mut self.nodes[i];
            node.subtree_width = node.command_width.max(block);
            node.depth = depth;
        }
    }

    /// Top-down pass: each child gets a box as wide as its subtree, left to
    /// right, with the block of boxes centred under the parent
    fn place_loose(&mut self) {
        let padding = self.config.item_padding;
        for i in 0..self.nodes.len() {
            let children = self.nodes[i].children.clone();
            if children.is_empty() {
                continue;
            }

            let block: f32 = children.iter().map(|c| self.nodes[*c].subtree_width).sum::<f32>()
                + padding * (children.len() - 1) as f32;
            let mut offset = self.nodes[i].centre_x - block / 2.0;
            for child in children {
                let width = self.nodes[child].subtree_width;
                self.nodes[child].centre_x = offset + width / 2.0;
                offset += width + padding;
            }
        }
    }

    fn mark_selected_line(&mut self) {
        let mut current = self.selected.and_then(|id| self.index.get(&id).copied());
        while let Some(i) = current {
            self.nodes[i].on_selected_line = true;
            current = self.nodes[i].parent;
        }
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LayoutNode> {
        self.nodes.get(index)
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn selected_item(&self) -> Option<NodeId> {
        self.selected
    }

    /// Index 0 holds the root whenever the skein had one
    pub fn root_layout_node(&self) -> Option<&LayoutNode> {
        self.nodes.first()
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn layout_for(&self, id: NodeId) -> Option<&LayoutNode> {
        self.index_of(id).and_then(|i| self.nodes.get(i))
    }

    /// Number of levels in use (the root alone is one level)
    pub fn levels(&self) -> usize {
        self.root_layout_node().map_or(0, |root| root.depth + 1)
    }

    /// Indices of the nodes on one level, left to right
    pub fn items_on_level(&self, level: usize) -> Vec<usize> {
        let mut items: Vec<usize> = (0..self.nodes.len())
            .filter(|i| self.nodes[*i].level == level)
            .collect();
        items.sort_by(|a, b| self.nodes[*a].centre_x.total_cmp(&self.nodes[*b].centre_x));
        items
    }

    /// Child of `index` that continues the selected line
    pub fn selected_line_child(&self, index: usize) -> Option<usize> {
        self.nodes
            .get(index)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[*c].on_selected_line)
    }

    /// Deepest node of the selected line
    ///
    /// Past the selected item itself the line continues through first
    /// children, so this names the leaf the view scrolls towards.
    pub fn leaf_selected_line_item(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut current = 0;
        loop {
            let next = self
                .selected_line_child(current)
                .or_else(|| self.nodes[current].children.first().copied());
            match next {
                Some(child) => current = child,
                None => return Some(self.nodes[current].item),
            }
        }
    }
}
