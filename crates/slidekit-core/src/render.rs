//! The rendered element tree, as seen by the editor.
//!
//! Hosts implement [`RenderSurface`] over whatever draws the slide (a DOM,
//! a GPU scene). [`HeadlessSurface`] lays elements out from their styles
//! and is used by hosts without a layout engine and by tests.

use std::collections::HashMap;

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::coords::{CanvasView, percent_to_pixels};
use crate::document::{ElementId, Slide, Width};
use crate::snap::Guide;

/// A live, uncommitted transform applied to one element during a gesture.
///
/// Expressed in logical canvas pixels, with the element's top-left corner
/// as the transform origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewTransform {
    pub translate: Vec2,
    pub scale: Vec2,
}

impl Default for PreviewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PreviewTransform {
    pub const IDENTITY: PreviewTransform = PreviewTransform {
        translate: Vec2::ZERO,
        scale: Vec2::new(1.0, 1.0),
    };

    pub fn translate(translate: Vec2) -> Self {
        Self {
            translate,
            ..Self::IDENTITY
        }
    }

    /// The transform mapping `from` onto `to`.
    pub fn between(from: Rect, to: Rect) -> Self {
        let sx = if from.width() > 0.0 { to.width() / from.width() } else { 1.0 };
        let sy = if from.height() > 0.0 { to.height() / from.height() } else { 1.0 };
        Self {
            translate: to.origin() - from.origin(),
            scale: Vec2::new(sx, sy),
        }
    }

    /// Apply to a rect whose top-left is the transform origin.
    pub fn apply(&self, rect: Rect) -> Rect {
        let origin = rect.origin() + self.translate;
        Rect::from_origin_size(
            origin,
            Size::new(rect.width() * self.scale.x, rect.height() * self.scale.y),
        )
    }

    /// As an affine transform about `origin`.
    pub fn to_affine(&self, origin: Point) -> Affine {
        Affine::translate(origin.to_vec2() + self.translate)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::translate(-origin.to_vec2())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// What the editor needs from the rendered slide.
///
/// All rects are in viewport (client) pixels unless noted.
pub trait RenderSurface {
    /// Re-render `slide` after a committed change.
    fn render_slide(&mut self, slide: &Slide, view: &CanvasView);

    /// Current on-screen rect of an element, or `None` if it is not rendered.
    fn measure(&self, id: &str) -> Option<Rect>;

    /// On-screen rect of the canvas.
    fn canvas_rect(&self) -> Rect;

    /// Apply a preview transform (logical pixels) without re-rendering.
    fn set_preview_transform(&mut self, id: &str, transform: PreviewTransform);

    fn clear_preview_transform(&mut self, id: &str);

    /// Draw snap guides, in logical canvas pixels.
    fn show_guides(&mut self, guides: &[Guide]);

    fn clear_guides(&mut self);

    /// Outline around the selection, or `None` to hide it.
    fn show_selection_outline(&mut self, bounds: Option<Rect>);

    /// Rubber-band rectangle, or `None` to hide it.
    fn show_rubber_band(&mut self, rect: Option<Rect>);

    /// Ask for one `on_animation_frame` call.
    fn request_animation_frame(&mut self);
}

/// A render surface that lays elements out from their stored styles.
///
/// Auto widths and intrinsic heights come from sizes registered with
/// [`HeadlessSurface::set_intrinsic_size`]; unregistered ones measure as zero.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    /// Viewport position of the canvas container.
    origin: Point,
    canvas: Rect,
    rects: HashMap<ElementId, Rect>,
    /// Content sizes in logical pixels.
    intrinsic: HashMap<ElementId, Size>,
    /// Element ids in paint order (bottom first).
    order: Vec<ElementId>,
    pub previews: HashMap<ElementId, PreviewTransform>,
    pub guides: Vec<Guide>,
    pub selection_outline: Option<Rect>,
    pub rubber_band: Option<Rect>,
    pub frame_requests: usize,
}

impl HeadlessSurface {
    /// A surface whose container starts at `origin` in the viewport.
    pub fn new(origin: Point) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn set_intrinsic_size(&mut self, id: impl Into<ElementId>, size: Size) {
        self.intrinsic.insert(id.into(), size);
    }

    /// Override the measured rect of an element until the next render.
    pub fn set_rect(&mut self, id: impl Into<ElementId>, rect: Rect) {
        self.rects.insert(id.into(), rect);
    }

    /// Topmost element whose rect contains `point`.
    pub fn element_at(&self, point: Point) -> Option<&ElementId> {
        self.order
            .iter()
            .rev()
            .find(|id| self.rects.get(*id).is_some_and(|rect| rect.contains(point)))
    }

    /// Whether a frame was requested since the last call.
    pub fn take_frame_request(&mut self) -> bool {
        let requested = self.frame_requests > 0;
        self.frame_requests = 0;
        requested
    }
}

impl RenderSurface for HeadlessSurface {
    fn render_slide(&mut self, slide: &Slide, view: &CanvasView) {
        let scale = view.effective_scale();
        let canvas_origin = self.origin + view.pan;
        self.canvas = Rect::from_origin_size(canvas_origin, view.canvas * scale);

        let mut elements: Vec<_> = slide.elements.iter().collect();
        elements.sort_by_key(|el| el.style.z_index);

        self.rects.clear();
        self.order.clear();
        for el in elements {
            let intrinsic = self.intrinsic.get(&el.id).copied().unwrap_or(Size::ZERO);
            let width = match el.style.width {
                Width::Percent(p) => percent_to_pixels(p, view.canvas.width),
                Width::Auto => intrinsic.width,
            };
            let height = el
                .style
                .height
                .map_or(intrinsic.height, |h| percent_to_pixels(h, view.canvas.height));
            let logical = Rect::from_origin_size(
                Point::new(
                    percent_to_pixels(el.style.left, view.canvas.width),
                    percent_to_pixels(el.style.top, view.canvas.height),
                ),
                Size::new(width, height),
            );
            let viewport = crate::coords::logical_rect_to_viewport(logical, self.canvas, scale);
            self.rects.insert(el.id.clone(), viewport);
            self.order.push(el.id.clone());
        }
        self.previews.clear();
    }

    fn measure(&self, id: &str) -> Option<Rect> {
        self.rects.get(id).copied()
    }

    fn canvas_rect(&self) -> Rect {
        self.canvas
    }

    fn set_preview_transform(&mut self, id: &str, transform: PreviewTransform) {
        self.previews.insert(id.to_string(), transform);
    }

    fn clear_preview_transform(&mut self, id: &str) {
        self.previews.remove(id);
    }

    fn show_guides(&mut self, guides: &[Guide]) {
        self.guides = guides.to_vec();
    }

    fn clear_guides(&mut self) {
        self.guides.clear();
    }

    fn show_selection_outline(&mut self, bounds: Option<Rect>) {
        self.selection_outline = bounds;
    }

    fn show_rubber_band(&mut self, rect: Option<Rect>) {
        self.rubber_band = rect;
    }

    fn request_animation_frame(&mut self) {
        self.frame_requests += 1;
    }
}
