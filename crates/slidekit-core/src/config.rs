//! Editor configuration.
//!
//! All values have defaults matching the stock editor, so a partial JSON
//! object (or none at all) is a valid configuration.

use serde::{Deserialize, Serialize};

/// Distance (in logical pixels) under which a guide captures the selection.
pub const SNAP_THRESHOLD: f64 = 5.0;
/// Maximum number of undo snapshots kept.
pub const MAX_UNDO_STACK: usize = 100;
/// Default logical canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: f64 = 1280.0;
/// Default logical canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 720.0;
/// Default font size for new text elements.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;
/// Smallest font size a resize can produce.
pub const MIN_FONT_SIZE: f64 = 8.0;
/// Smallest width/height (percent of the canvas dimension) a resize can produce.
pub const MIN_SIZE_PERCENT: f64 = 2.0;

/// Tunable editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Snap capture distance in logical pixels.
    pub snap_threshold: f64,
    /// Whether drag/resize snapping is active.
    pub snap_enabled: bool,
    /// Undo history capacity.
    pub max_undo_stack: usize,
    /// Font size given to new text elements.
    pub default_font_size: f64,
    /// Lower bound for font sizes produced by resizing.
    pub min_font_size: f64,
    /// Lower bound (percent) for widths/heights produced by resizing.
    pub min_size_percent: f64,
    /// Minimum user zoom.
    pub min_zoom: f64,
    /// Maximum user zoom.
    pub max_zoom: f64,
    /// Initial user zoom.
    pub default_zoom: f64,
    /// Logical canvas width for new presentations.
    pub canvas_width: f64,
    /// Logical canvas height for new presentations.
    pub canvas_height: f64,
    /// Offset (percent) applied to duplicated elements.
    pub duplicate_offset_percent: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_threshold: SNAP_THRESHOLD,
            snap_enabled: true,
            max_undo_stack: MAX_UNDO_STACK,
            default_font_size: DEFAULT_FONT_SIZE,
            min_font_size: MIN_FONT_SIZE,
            min_size_percent: MIN_SIZE_PERCENT,
            min_zoom: 0.2,
            max_zoom: 5.0,
            default_zoom: 1.0,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            duplicate_offset_percent: 2.0,
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.snap_threshold, 5.0);
        assert_eq!(config.max_undo_stack, 100);
        assert!(config.snap_enabled);
    }

    #[test]
    fn test_partial_json() {
        let config = EditorConfig::from_json(r#"{"snapThreshold": 8, "maxUndoStack": 10}"#).unwrap();
        assert_eq!(config.snap_threshold, 8.0);
        assert_eq!(config.max_undo_stack, 10);
        assert_eq!(config.canvas_width, DEFAULT_CANVAS_WIDTH);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(EditorConfig::from_json("{}").unwrap(), EditorConfig::default());
    }
}
