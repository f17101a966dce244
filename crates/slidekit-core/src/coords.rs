//! Coordinate mapping between document percentages, logical canvas pixels,
//! and on-screen (viewport) pixels.
//!
//! Element geometry is stored as percentages of the logical canvas. The
//! logical canvas is rendered at an effective scale that combines a
//! "fit to container" factor with the user's zoom.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Convert a percentage of a dimension to pixels.
pub fn percent_to_pixels(percent: f64, dim_size: f64) -> f64 {
    percent / 100.0 * dim_size
}

/// Convert pixels to a percentage of a dimension.
///
/// A zero-sized dimension maps everything to 0%.
pub fn pixels_to_percent(pixels: f64, dim_size: f64) -> f64 {
    if dim_size == 0.0 {
        return 0.0;
    }
    pixels / dim_size * 100.0
}

/// Round a percentage to the two decimals used when persisting.
pub fn round_percent(percent: f64) -> f64 {
    (percent * 100.0).round() / 100.0
}

/// Scale at which the canvas fits inside its container (never above 1).
pub fn base_fit_scale(container: Size, canvas: Size) -> f64 {
    if canvas.width <= 0.0 || canvas.height <= 0.0 {
        return 1.0;
    }
    (container.width / canvas.width)
        .min(container.height / canvas.height)
        .min(1.0)
}

/// Fit scale multiplied by the user's zoom.
pub fn effective_scale(container: Size, canvas: Size, user_zoom: f64) -> f64 {
    base_fit_scale(container, canvas) * user_zoom
}

/// Convert an on-screen delta to a logical (unscaled) delta.
///
/// A non-positive scale is treated as the identity.
pub fn screen_delta_to_logical(delta: Vec2, effective_scale: f64) -> Vec2 {
    if effective_scale <= 0.0 {
        return delta;
    }
    delta / effective_scale
}

/// Map a viewport rect into logical canvas pixels, given the canvas's own
/// viewport rect and the effective scale.
pub fn viewport_rect_to_logical(rect: Rect, canvas_viewport: Rect, effective_scale: f64) -> Rect {
    let scale = if effective_scale > 0.0 { effective_scale } else { 1.0 };
    Rect::new(
        (rect.x0 - canvas_viewport.x0) / scale,
        (rect.y0 - canvas_viewport.y0) / scale,
        (rect.x1 - canvas_viewport.x0) / scale,
        (rect.y1 - canvas_viewport.y0) / scale,
    )
}

/// Inverse of [`viewport_rect_to_logical`].
pub fn logical_rect_to_viewport(rect: Rect, canvas_viewport: Rect, effective_scale: f64) -> Rect {
    Rect::new(
        rect.x0 * effective_scale + canvas_viewport.x0,
        rect.y0 * effective_scale + canvas_viewport.y0,
        rect.x1 * effective_scale + canvas_viewport.x0,
        rect.y1 * effective_scale + canvas_viewport.y0,
    )
}

/// Convert a logical pixel rect to percentages of the canvas.
pub fn rect_to_percent(rect: Rect, canvas: Size) -> Rect {
    Rect::new(
        pixels_to_percent(rect.x0, canvas.width),
        pixels_to_percent(rect.y0, canvas.height),
        pixels_to_percent(rect.x1, canvas.width),
        pixels_to_percent(rect.y1, canvas.height),
    )
}

/// View state of the slide canvas: zoom, pan and measured sizes.
///
/// Purely a view concern; never part of undo history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasView {
    /// User zoom factor (1.0 = fit).
    pub zoom: f64,
    /// Pan offset in screen pixels.
    pub pan: Vec2,
    /// Size of the element hosting the canvas, in screen pixels.
    pub container: Size,
    /// Logical canvas size.
    pub canvas: Size,
    /// Minimum allowed zoom.
    pub min_zoom: f64,
    /// Maximum allowed zoom.
    pub max_zoom: f64,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            container: Size::new(crate::config::DEFAULT_CANVAS_WIDTH, crate::config::DEFAULT_CANVAS_HEIGHT),
            canvas: Size::new(crate::config::DEFAULT_CANVAS_WIDTH, crate::config::DEFAULT_CANVAS_HEIGHT),
            min_zoom: 0.2,
            max_zoom: 5.0,
        }
    }
}

impl CanvasView {
    /// Create a view for the given canvas size using the configured zoom limits.
    pub fn new(canvas: Size, config: &crate::config::EditorConfig) -> Self {
        Self {
            zoom: config.default_zoom.clamp(config.min_zoom, config.max_zoom),
            pan: Vec2::ZERO,
            container: canvas,
            canvas,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    /// Record a new container size (after a layout pass).
    pub fn set_container_size(&mut self, container: Size) {
        self.container = container;
    }

    /// Record a new logical canvas size.
    pub fn set_canvas_size(&mut self, canvas: Size) {
        self.canvas = canvas;
    }

    /// Current fit scale.
    pub fn base_fit_scale(&self) -> f64 {
        base_fit_scale(self.container, self.canvas)
    }

    /// Current effective scale (fit * zoom).
    pub fn effective_scale(&self) -> f64 {
        effective_scale(self.container, self.canvas, self.zoom)
    }

    /// Transform from logical canvas pixels to screen pixels (relative to the container).
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.effective_scale())
    }

    /// Convert a screen delta into a logical delta.
    pub fn screen_delta_to_logical(&self, delta: Vec2) -> Vec2 {
        screen_delta_to_logical(delta, self.effective_scale())
    }

    /// Set the zoom, clamped to the allowed range.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Pan by a screen delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let logical = self.transform().inverse() * screen_point;
        self.zoom = new_zoom;

        let moved = self.transform() * logical;
        self.pan += Vec2::new(screen_point.x - moved.x, screen_point.y - moved.y);
    }

    /// Reset zoom and pan.
    pub fn reset(&mut self) {
        self.zoom = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
        self.pan = Vec2::ZERO;
    }
}
