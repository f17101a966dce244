//! Selection bounds, resize handles and resize geometry.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::coords::pixels_to_percent;
use crate::document::{ElementId, ElementKind, ElementStyle};
use crate::snap::Axis;

/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;

/// One of the eight resize grips on a selection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "w")]
    West,
    #[serde(rename = "ne")]
    NorthEast,
    #[serde(rename = "nw")]
    NorthWest,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "sw")]
    SouthWest,
}

impl HandleKind {
    pub const ALL: [HandleKind; 8] = [
        HandleKind::NorthWest,
        HandleKind::North,
        HandleKind::NorthEast,
        HandleKind::East,
        HandleKind::SouthEast,
        HandleKind::South,
        HandleKind::SouthWest,
        HandleKind::West,
    ];

    /// Parse a compass tag (`"n"`, `"se"`, ...).
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "n" => HandleKind::North,
            "s" => HandleKind::South,
            "e" => HandleKind::East,
            "w" => HandleKind::West,
            "ne" => HandleKind::NorthEast,
            "nw" => HandleKind::NorthWest,
            "se" => HandleKind::SouthEast,
            "sw" => HandleKind::SouthWest,
            _ => return None,
        })
    }

    pub fn touches_north(self) -> bool {
        matches!(self, HandleKind::North | HandleKind::NorthEast | HandleKind::NorthWest)
    }

    pub fn touches_south(self) -> bool {
        matches!(self, HandleKind::South | HandleKind::SouthEast | HandleKind::SouthWest)
    }

    pub fn touches_east(self) -> bool {
        matches!(self, HandleKind::East | HandleKind::NorthEast | HandleKind::SouthEast)
    }

    pub fn touches_west(self) -> bool {
        matches!(self, HandleKind::West | HandleKind::NorthWest | HandleKind::SouthWest)
    }

    /// Which edge this handle moves on `axis`: `Some(true)` for the end
    /// edge (right/bottom), `Some(false)` for the start edge, `None` if the
    /// handle does not resize along `axis`.
    pub fn moving_edge(self, axis: Axis) -> Option<bool> {
        match axis {
            Axis::X if self.touches_east() => Some(true),
            Axis::X if self.touches_west() => Some(false),
            Axis::Y if self.touches_south() => Some(true),
            Axis::Y if self.touches_north() => Some(false),
            _ => None,
        }
    }

    /// The axis that drives an aspect-locked resize.
    pub fn primary_axis(self) -> Axis {
        if self.touches_east() || self.touches_west() {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Position of this handle on `rect`.
    pub fn position(self, rect: Rect) -> Point {
        let x = if self.touches_west() {
            rect.x0
        } else if self.touches_east() {
            rect.x1
        } else {
            rect.center().x
        };
        let y = if self.touches_north() {
            rect.y0
        } else if self.touches_south() {
            rect.y1
        } else {
            rect.center().y
        };
        Point::new(x, y)
    }
}

/// The handle on `rect` within `tolerance` of `point`, if any.
pub fn hit_test_handles(rect: Rect, point: Point, tolerance: f64) -> Option<HandleKind> {
    HandleKind::ALL
        .into_iter()
        .find(|handle| handle.position(rect).distance(point) <= tolerance)
}

/// Union of the given rects.
pub fn selection_bounds<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// An element frozen at gesture start.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub kind: ElementKind,
    /// Position of the element in the store at gesture start.
    pub slide_index: usize,
    pub element_index: usize,
    /// Committed style before the gesture.
    pub style: ElementStyle,
    /// Measured rect in logical canvas pixels.
    pub rect: Rect,
}

impl ElementSnapshot {
    /// Rendered width over height, used for aspect-locked resizing.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.rect.width() > 0.0 && self.rect.height() > 0.0).then(|| self.rect.width() / self.rect.height())
    }
}

/// Grow or shrink `rect` to `ratio` (width / height), driven by the
/// handle's primary axis and keeping the handle's opposite edges fixed.
pub fn fit_aspect(rect: Rect, handle: HandleKind, ratio: f64, min: Size) -> Rect {
    if ratio <= 0.0 {
        return rect;
    }
    let (mut width, mut height) = match handle.primary_axis() {
        Axis::X => (rect.width(), rect.width() / ratio),
        Axis::Y => (rect.height() * ratio, rect.height()),
    };
    if width < min.width {
        width = min.width;
        height = width / ratio;
    }
    if height < min.height {
        height = min.height;
        width = height * ratio;
    }
    anchored(rect, handle, width, height)
}

/// A `width` x `height` rect placed so the edges the handle does not move
/// stay where they are in `rect`.
fn anchored(rect: Rect, handle: HandleKind, width: f64, height: f64) -> Rect {
    let (x0, x1) = if handle.touches_west() {
        (rect.x1 - width, rect.x1)
    } else {
        (rect.x0, rect.x0 + width)
    };
    let (y0, y1) = if handle.touches_north() {
        (rect.y1 - height, rect.y1)
    } else {
        (rect.y0, rect.y0 + height)
    };
    Rect::new(x0, y0, x1, y1)
}

/// Resize `start` by the logical pointer `delta` through `handle`.
///
/// Sizes never drop below `min`. West/north handles keep the right/bottom
/// edge fixed. With an aspect ratio the primary axis drives the other one.
pub fn resize_rect(start: Rect, handle: HandleKind, delta: Vec2, min: Size, aspect: Option<f64>) -> Rect {
    let mut width = start.width();
    let mut height = start.height();
    if handle.touches_east() {
        width = (start.width() + delta.x).max(min.width);
    } else if handle.touches_west() {
        width = (start.width() - delta.x).max(min.width);
    }
    if handle.touches_south() {
        height = (start.height() + delta.y).max(min.height);
    } else if handle.touches_north() {
        height = (start.height() - delta.y).max(min.height);
    }
    let rect = anchored(start, handle, width, height);
    match aspect {
        Some(ratio) => fit_aspect(rect, handle, ratio, min),
        None => rect,
    }
}

/// Style values to commit after a resize, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeCommit {
    pub left: f64,
    pub top: f64,
    /// New width, when the resize changed it.
    pub width: Option<f64>,
    /// New height, when the resize changed it.
    pub height: Option<f64>,
    pub font_size: Option<f64>,
}

/// Convert the final rect of a resize into style values.
///
/// Positions and sizes are the committed values plus the pixel change,
/// so an untouched dimension keeps its exact stored value.
pub fn resize_commit(
    snapshot: &ElementSnapshot,
    handle: HandleKind,
    final_rect: Rect,
    canvas: Size,
    min_font_size: f64,
) -> ResizeCommit {
    let start = snapshot.rect;
    let locked = snapshot.kind.is_aspect_locked();
    let resizes_x = locked || handle.touches_east() || handle.touches_west();
    let resizes_y = locked || handle.touches_north() || handle.touches_south();

    let left = snapshot.style.left + pixels_to_percent(final_rect.x0 - start.x0, canvas.width);
    let top = snapshot.style.top + pixels_to_percent(final_rect.y0 - start.y0, canvas.height);

    let width = resizes_x.then(|| {
        let base = snapshot
            .style
            .width
            .percent()
            .unwrap_or_else(|| pixels_to_percent(start.width(), canvas.width));
        base + pixels_to_percent(final_rect.width() - start.width(), canvas.width)
    });
    let height = resizes_y.then(|| {
        let base = snapshot
            .style
            .height
            .unwrap_or_else(|| pixels_to_percent(start.height(), canvas.height));
        base + pixels_to_percent(final_rect.height() - start.height(), canvas.height)
    });

    let font_size = match snapshot.style.font_size {
        Some(size) if snapshot.kind.scales_font() && start.width() > 0.0 && resizes_x => {
            Some((size * final_rect.width() / start.width()).round().max(min_font_size))
        }
        _ => None,
    };

    ResizeCommit {
        left,
        top,
        width,
        height,
        font_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Width;

    const MIN: Size = Size::new(25.6, 14.4);

    fn snapshot(kind: ElementKind, style: ElementStyle, rect: Rect) -> ElementSnapshot {
        ElementSnapshot {
            id: "el-1".into(),
            kind,
            slide_index: 0,
            element_index: 0,
            style,
            rect,
        }
    }

    #[test]
    fn test_selection_bounds() {
        let rects = [Rect::new(0.0, 0.0, 100.0, 50.0), Rect::new(200.0, 100.0, 250.0, 150.0)];
        let bounds = selection_bounds(rects).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 250.0, 150.0));
        assert_eq!(bounds.size(), Size::new(250.0, 150.0));
        assert!(selection_bounds(Vec::new()).is_none());
    }

    #[test]
    fn test_handle_parse_and_edges() {
        assert_eq!(HandleKind::parse("sw"), Some(HandleKind::SouthWest));
        assert_eq!(HandleKind::parse("x"), None);
        assert_eq!(HandleKind::SouthWest.moving_edge(Axis::X), Some(false));
        assert_eq!(HandleKind::SouthWest.moving_edge(Axis::Y), Some(true));
        assert_eq!(HandleKind::North.moving_edge(Axis::X), None);
    }

    #[test]
    fn test_hit_test_handles() {
        let rect = Rect::new(100.0, 100.0, 200.0, 150.0);
        assert_eq!(hit_test_handles(rect, Point::new(203.0, 152.0), 8.0), Some(HandleKind::SouthEast));
        assert_eq!(hit_test_handles(rect, Point::new(150.0, 98.0), 8.0), Some(HandleKind::North));
        assert_eq!(hit_test_handles(rect, Point::new(150.0, 125.0), 8.0), None);
    }

    #[test]
    fn test_west_resize_keeps_right_edge() {
        let start = Rect::new(100.0, 100.0, 300.0, 200.0);
        let rect = resize_rect(start, HandleKind::West, Vec2::new(50.0, 0.0), MIN, None);
        assert_eq!(rect, Rect::new(150.0, 100.0, 300.0, 200.0));
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let start = Rect::new(100.0, 100.0, 300.0, 200.0);
        let rect = resize_rect(start, HandleKind::West, Vec2::new(500.0, 0.0), MIN, None);
        assert!((rect.width() - MIN.width).abs() < 1e-9);
        assert_eq!(rect.x1, 300.0);
    }

    #[test]
    fn test_aspect_locked_resize() {
        let start = Rect::new(0.0, 0.0, 128.0, 72.0);
        let rect = resize_rect(start, HandleKind::SouthEast, Vec2::new(128.0, 5.0), MIN, Some(128.0 / 72.0));
        assert!((rect.width() - 256.0).abs() < 1e-9);
        assert!((rect.height() - 144.0).abs() < 1e-9);
    }

    #[test]
    fn test_icon_resize_commit() {
        let style = ElementStyle {
            left: 0.0,
            top: 0.0,
            width: Width::Percent(10.0),
            height: Some(10.0),
            font_size: Some(48.0),
            ..ElementStyle::default()
        };
        let snap = snapshot(ElementKind::Icon, style, Rect::new(0.0, 0.0, 128.0, 72.0));
        let commit = resize_commit(
            &snap,
            HandleKind::SouthEast,
            Rect::new(0.0, 0.0, 256.0, 144.0),
            Size::new(1280.0, 720.0),
            8.0,
        );
        assert!((commit.width.unwrap() - 20.0).abs() < 1e-9);
        assert!((commit.height.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(commit.font_size, Some(96.0));
    }

    #[test]
    fn test_font_floor() {
        let style = ElementStyle {
            font_size: Some(10.0),
            ..ElementStyle::default()
        };
        let snap = snapshot(ElementKind::Text, style, Rect::new(0.0, 0.0, 400.0, 50.0));
        let commit = resize_commit(
            &snap,
            HandleKind::East,
            Rect::new(0.0, 0.0, 40.0, 50.0),
            Size::new(1280.0, 720.0),
            8.0,
        );
        assert_eq!(commit.font_size, Some(8.0));
        assert_eq!(commit.height, None);
    }
}
