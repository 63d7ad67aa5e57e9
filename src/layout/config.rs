use serde::{Deserialize, Serialize};

/// How sibling subtrees are spread out
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PackingStyle {
    /// Each subtree gets a box as wide as its widest level
    Loose,
    /// Subtrees slide together until their level outlines would touch
    #[default]
    Tight,
}

/// Configuration for skein layout
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Horizontal space between neighbouring items
    pub item_padding: f32,

    /// Vertical distance between the tops of two levels
    pub level_height: f32,

    /// Empty margin around the whole skein in view space
    pub border: f32,

    /// Height of an item's lozenge
    pub item_height: f32,

    /// How far the lozenge extends beyond the command text on each side
    pub frame_extension: f32,

    pub packing: PackingStyle,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            item_padding: 10.0,
            level_height: 34.0,
            border: 20.0,
            item_height: 34.0,
            frame_extension: 5.0,
            packing: PackingStyle::Tight,
        }
    }
}

impl LayoutConfig {
    pub fn with_packing(packing: PackingStyle) -> Self {
        Self { packing, ..Self::default() }
    }
}

/// Width of a command label as rendered by the view
///
/// Must be a pure function of the text for a given style.
pub trait TextMeasure {
    fn measure(&self, text: &str) -> f32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str) -> f32,
{
    fn measure(&self, text: &str) -> f32 {
        self(text)
    }
}

/// Fixed advance per character, for hosts without font metrics (and tests)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonospaceMeasure {
    pub char_width: f32,
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self { char_width: 7.0 }
    }
}

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }
}
