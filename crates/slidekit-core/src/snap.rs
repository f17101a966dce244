//! Smart guides: snapping a moving or resizing selection to the canvas, to
//! other elements, and to equal-gap distributions.
//!
//! Everything here works in logical canvas pixels. Callers convert screen
//! deltas before calling in and convert the returned offset back out.

use kurbo::{Rect, Vec2};

use crate::selection::HandleKind;

/// Two lines closer than this are considered the same line.
const LINE_EPSILON: f64 = 1e-6;

/// A snapping axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal positions (left/center/right).
    X,
    /// Vertical positions (top/center/bottom).
    Y,
}

impl Axis {
    /// Start and end of `rect` along this axis.
    pub fn span(self, rect: Rect) -> (f64, f64) {
        match self {
            Axis::X => (rect.x0, rect.x1),
            Axis::Y => (rect.y0, rect.y1),
        }
    }

    /// Start and end of `rect` along the other axis.
    pub fn cross_span(self, rect: Rect) -> (f64, f64) {
        self.other().span(rect)
    }

    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    /// Start, center and end lines of `rect` along this axis.
    pub fn lines(self, rect: Rect) -> [f64; 3] {
        let (start, end) = self.span(rect);
        [start, (start + end) / 2.0, end]
    }

    /// Extent of `rect` along this axis.
    pub fn size(self, rect: Rect) -> f64 {
        let (start, end) = self.span(rect);
        end - start
    }

    /// `rect` moved by `d` along this axis.
    pub fn shift(self, rect: Rect, d: f64) -> Rect {
        rect + self.vec(d)
    }

    /// A vector of length `d` along this axis.
    pub fn vec(self, d: f64) -> Vec2 {
        match self {
            Axis::X => Vec2::new(d, 0.0),
            Axis::Y => Vec2::new(0.0, d),
        }
    }

    /// Whether `a` and `b` share some extent along this axis.
    pub fn overlaps(self, a: Rect, b: Rect) -> bool {
        let (a0, a1) = self.span(a);
        let (b0, b1) = self.span(b);
        a0 < b1 && a1 > b0
    }

    fn with_span(self, rect: Rect, start: f64, end: f64) -> Rect {
        match self {
            Axis::X => Rect::new(start, rect.y0, end, rect.y1),
            Axis::Y => Rect::new(rect.x0, start, rect.x1, end),
        }
    }
}

/// A guide to draw while snapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guide {
    /// Alignment line at `position` on `axis`, drawn from `start` to `end`
    /// on the other axis. An X guide is a vertical line.
    Align {
        axis: Axis,
        position: f64,
        start: f64,
        end: f64,
    },
    /// Gap marker covering `start..end` on `axis`, drawn at `cross` on the
    /// other axis, labelled with `size`.
    Gap {
        axis: Axis,
        start: f64,
        end: f64,
        cross: f64,
        size: f64,
    },
    /// The selection matches another element's `size` along `axis`; the
    /// marker spans `start..end` on the other axis, covering both elements.
    SizeMatch {
        axis: Axis,
        size: f64,
        start: f64,
        end: f64,
    },
}

/// Result of snapping a drag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapResult {
    /// Correction to add to the raw movement.
    pub offset: Vec2,
    /// Guides to draw.
    pub guides: Vec<Guide>,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

impl SnapResult {
    /// No snapping.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Result of snapping a resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeSnap {
    /// The adjusted rectangle.
    pub rect: Rect,
    pub guides: Vec<Guide>,
}

/// Snap calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapEngine {
    /// Capture distance in logical pixels (exclusive).
    pub threshold: f64,
    pub enabled: bool,
}

impl Default for SnapEngine {
    fn default() -> Self {
        Self {
            threshold: crate::config::SNAP_THRESHOLD,
            enabled: true,
        }
    }
}

impl SnapEngine {
    pub fn new(threshold: f64, enabled: bool) -> Self {
        Self { threshold, enabled }
    }

    /// Snap a dragged selection whose bounds are `selection` against the
    /// `statics` and the `canvas`. Per axis, edge/center alignment wins
    /// over equal-gap distribution.
    pub fn snap_drag(&self, selection: Rect, statics: &[Rect], canvas: Rect) -> SnapResult {
        let mut result = SnapResult::none();
        if !self.enabled {
            return result;
        }
        for axis in [Axis::X, Axis::Y] {
            let snapped = self
                .align_axis(axis, selection, statics, canvas)
                .or_else(|| self.gap_axis(axis, selection, statics));
            if let Some((d, guides)) = snapped {
                result.offset += axis.vec(d);
                result.guides.extend(guides);
                match axis {
                    Axis::X => result.snapped_x = true,
                    Axis::Y => result.snapped_y = true,
                }
            }
        }
        result
    }

    /// Target rects in stable order: canvas first, then elements.
    fn targets<'a>(statics: &'a [Rect], canvas: &'a Rect) -> impl Iterator<Item = &'a Rect> {
        std::iter::once(canvas).chain(statics.iter())
    }

    /// Smallest alignment correction below the threshold. The first
    /// candidate found wins ties.
    fn nearest_line(&self, axis: Axis, moving: &[f64], statics: &[Rect], canvas: Rect) -> Option<f64> {
        let mut best: Option<f64> = None;
        for target in Self::targets(statics, &canvas) {
            for line in axis.lines(*target) {
                for &own in moving {
                    let d = line - own;
                    if d.abs() < self.threshold && best.is_none_or(|b| d.abs() < b.abs()) {
                        best = Some(d);
                    }
                }
            }
        }
        best
    }

    fn align_axis(&self, axis: Axis, selection: Rect, statics: &[Rect], canvas: Rect) -> Option<(f64, Vec<Guide>)> {
        let d = self.nearest_line(axis, &axis.lines(selection), statics, canvas)?;
        let moved = axis.shift(selection, d);
        Some((d, alignment_guides(axis, moved, &axis.lines(moved), statics, canvas)))
    }

    /// Equal-gap snapping. Existing gaps are measured between neighbours
    /// sorted by position; the selection is tried after and before each
    /// static element in that order, and the first placement within the
    /// threshold of an existing gap wins. An anchor only counts when it
    /// shares cross-axis extent with the selection and no other static
    /// element sits between the two.
    fn gap_axis(&self, axis: Axis, selection: Rect, statics: &[Rect]) -> Option<(f64, Vec<Guide>)> {
        if statics.len() < 2 {
            return None;
        }
        let mut sorted = statics.to_vec();
        sorted.sort_by(|a, b| axis.span(*a).0.total_cmp(&axis.span(*b).0));

        let gaps: Vec<(f64, Rect, Rect)> = sorted
            .windows(2)
            .filter_map(|pair| {
                let size = axis.span(pair[1]).0 - axis.span(pair[0]).1;
                (size > 0.0).then_some((size, pair[0], pair[1]))
            })
            .collect();
        if gaps.is_empty() {
            return None;
        }

        let (sel_start, sel_end) = axis.span(selection);
        for anchor in &sorted {
            if !axis.other().overlaps(*anchor, selection) {
                continue;
            }
            let (anchor_start, anchor_end) = axis.span(*anchor);
            let blocked = |lo: f64, hi: f64| {
                sorted.iter().any(|other| {
                    let (start, end) = axis.span(*other);
                    other != anchor && start < hi && end > lo && axis.other().overlaps(*other, selection)
                })
            };
            let after_clear = !blocked(anchor_end, sel_start);
            let before_clear = !blocked(sel_end, anchor_start);
            for &(size, a, b) in &gaps {
                let after = sel_start - anchor_end;
                if after_clear && (size - after).abs() < self.threshold {
                    let d = size - after;
                    let moved = axis.shift(selection, d);
                    let guides = vec![
                        gap_guide(axis, a, b, size),
                        gap_guide(axis, *anchor, moved, size),
                    ];
                    return Some((d, guides));
                }

                let before = anchor_start - sel_end;
                if before_clear && (size - before).abs() < self.threshold {
                    let d = before - size;
                    let moved = axis.shift(selection, d);
                    let guides = vec![
                        gap_guide(axis, a, b, size),
                        gap_guide(axis, moved, *anchor, size),
                    ];
                    return Some((d, guides));
                }
            }
        }
        None
    }

    /// Snap a resize. `rect` is the proposed rectangle; only the edges the
    /// `handle` moves are snapped. On an axis with no edge snap, the size
    /// may match another element's size, keeping the opposite edge fixed.
    /// With `lock_aspect` only the handle's primary axis is snapped.
    pub fn snap_resize(
        &self,
        rect: Rect,
        handle: HandleKind,
        statics: &[Rect],
        canvas: Rect,
        lock_aspect: bool,
    ) -> ResizeSnap {
        let mut snapped = ResizeSnap {
            rect,
            guides: Vec::new(),
        };
        if !self.enabled {
            return snapped;
        }

        for axis in [Axis::X, Axis::Y] {
            if lock_aspect && axis != handle.primary_axis() {
                continue;
            }
            let Some(moves_end) = handle.moving_edge(axis) else {
                continue;
            };
            let (start, end) = axis.span(snapped.rect);
            let edge = if moves_end { end } else { start };

            if let Some(d) = self.nearest_line(axis, &[edge], statics, canvas) {
                let line = edge + d;
                snapped.rect = if moves_end {
                    axis.with_span(snapped.rect, start, line)
                } else {
                    axis.with_span(snapped.rect, line, end)
                };
                snapped
                    .guides
                    .extend(alignment_guides(axis, snapped.rect, &[line], statics, canvas));
                continue;
            }

            let size = end - start;
            let mut best: Option<(f64, Rect)> = None;
            for other in statics {
                let other_size = axis.size(*other);
                let d = other_size - size;
                if d.abs() < self.threshold && best.is_none_or(|(b, _)| d.abs() < (b - size).abs()) {
                    best = Some((other_size, *other));
                }
            }
            if let Some((matched, other)) = best {
                snapped.rect = if moves_end {
                    axis.with_span(snapped.rect, start, start + matched)
                } else {
                    axis.with_span(snapped.rect, end - matched, end)
                };
                let (a0, a1) = axis.cross_span(snapped.rect);
                let (b0, b1) = axis.cross_span(other);
                snapped.guides.push(Guide::SizeMatch {
                    axis,
                    size: matched,
                    start: a0.min(b0),
                    end: a1.max(b1),
                });
            }
        }
        snapped
    }
}

/// Guides for every target line that coincides with one of `lines`.
/// Guides at the same position are merged.
fn alignment_guides(axis: Axis, moved: Rect, lines: &[f64], statics: &[Rect], canvas: Rect) -> Vec<Guide> {
    let mut guides: Vec<Guide> = Vec::new();
    let (moved_start, moved_end) = axis.cross_span(moved);
    for target in SnapEngine::targets(statics, &canvas) {
        let (target_start, target_end) = axis.cross_span(*target);
        for line in axis.lines(*target) {
            if !lines.iter().any(|own| (own - line).abs() < LINE_EPSILON) {
                continue;
            }
            let (start, end) = (moved_start.min(target_start), moved_end.max(target_end));
            let existing = guides.iter_mut().find(|g| {
                matches!(g, Guide::Align { position, .. } if (*position - line).abs() < LINE_EPSILON)
            });
            match existing {
                Some(Guide::Align { start: s, end: e, .. }) => {
                    *s = s.min(start);
                    *e = e.max(end);
                }
                _ => guides.push(Guide::Align {
                    axis,
                    position: line,
                    start,
                    end,
                }),
            }
        }
    }
    guides
}

/// Gap marker between `first` and `second` (in that order along `axis`).
fn gap_guide(axis: Axis, first: Rect, second: Rect, size: f64) -> Guide {
    let start = axis.span(first).1;
    let (a0, a1) = axis.cross_span(first);
    let (b0, b1) = axis.cross_span(second);
    Guide::Gap {
        axis,
        start,
        end: start + size,
        cross: (a0.min(b0) + a1.max(b1)) / 2.0,
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Rect = Rect::new(0.0, 0.0, 1280.0, 720.0);

    fn engine() -> SnapEngine {
        SnapEngine::default()
    }

    #[test]
    fn test_snap_to_right_edge() {
        let statics = [Rect::new(200.0, 400.0, 300.0, 450.0)];
        // Left edge lands at 303, vertically far from anything.
        let selection = Rect::new(303.0, 100.0, 353.0, 140.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(result.snapped_x);
        assert!((result.offset.x + 3.0).abs() < 1e-9);
        assert!(result.guides.iter().any(|g| matches!(
            g,
            Guide::Align { axis: Axis::X, position, .. } if (*position - 300.0).abs() < 1e-9
        )));
    }

    #[test]
    fn test_no_snap_beyond_threshold() {
        let statics = [Rect::new(200.0, 400.0, 300.0, 450.0)];
        let selection = Rect::new(312.0, 100.0, 362.0, 140.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(!result.snapped_x);
        assert_eq!(result.offset.x, 0.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let statics = [Rect::new(200.0, 400.0, 300.0, 450.0)];
        let selection = Rect::new(305.0, 100.0, 355.0, 140.0);
        assert!(!engine().snap_drag(selection, &statics, CANVAS).snapped_x);
    }

    #[test]
    fn test_snap_to_canvas_center() {
        let selection = Rect::new(588.0, 10.0, 688.0, 60.0);
        let result = engine().snap_drag(selection, &[], CANVAS);
        assert!((result.offset.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_smallest_distance_wins() {
        // Right edge at 300 is 3px away, left edge at 304 is 1px away.
        let statics = [
            Rect::new(200.0, 400.0, 300.0, 450.0),
            Rect::new(304.0, 500.0, 400.0, 550.0),
        ];
        let selection = Rect::new(303.0, 100.0, 353.0, 140.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!((result.offset.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_engine() {
        let statics = [Rect::new(200.0, 400.0, 300.0, 450.0)];
        let selection = Rect::new(301.0, 100.0, 351.0, 140.0);
        let result = SnapEngine::new(5.0, false).snap_drag(selection, &statics, CANVAS);
        assert_eq!(result, SnapResult::none());
    }

    #[test]
    fn test_equal_gap_after_last() {
        // Two statics 50px apart on X; selection lands 53px after the second.
        let statics = [
            Rect::new(100.0, 300.0, 200.0, 350.0),
            Rect::new(250.0, 300.0, 350.0, 350.0),
        ];
        let selection = Rect::new(403.0, 313.0, 463.0, 337.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(result.snapped_x);
        assert!((result.offset.x + 3.0).abs() < 1e-9);
        let gaps: Vec<_> = result
            .guides
            .iter()
            .filter(|g| matches!(g, Guide::Gap { axis: Axis::X, .. }))
            .collect();
        assert_eq!(gaps.len(), 2);
        assert!(gaps.iter().all(|g| matches!(g, Guide::Gap { size, .. } if (*size - 50.0).abs() < 1e-9)));
    }

    #[test]
    fn test_equal_gap_first_found_wins() {
        // Existing gaps: 40 (a..b) then 44 (b..c). The selection sits 42px
        // after `c`, equally close to both; the first gap in sorted order wins.
        let statics = [
            Rect::new(0.0, 600.0, 100.0, 650.0),
            Rect::new(140.0, 600.0, 240.0, 650.0),
            Rect::new(284.0, 600.0, 384.0, 650.0),
        ];
        let selection = Rect::new(426.0, 613.0, 476.0, 637.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(result.snapped_x);
        assert!((result.offset.x + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_gap_needs_cross_axis_overlap() {
        // Same X spacing as a valid equal gap, but the selection is far
        // above both statics.
        let statics = [
            Rect::new(0.0, 600.0, 100.0, 650.0),
            Rect::new(150.0, 600.0, 250.0, 650.0),
        ];
        let selection = Rect::new(303.0, 30.0, 353.0, 70.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(!result.snapped_x);
        assert_eq!(result, SnapResult::none());
    }

    #[test]
    fn test_equal_gap_skips_blocked_anchor() {
        // 53px after `b` would match the 50px gap, but `c` sits in between.
        let statics = [
            Rect::new(0.0, 600.0, 100.0, 650.0),
            Rect::new(150.0, 600.0, 250.0, 650.0),
            Rect::new(260.0, 600.0, 270.0, 650.0),
        ];
        let selection = Rect::new(303.0, 613.0, 353.0, 637.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!(!result.snapped_x);
        assert_eq!(result.offset.x, 0.0);
        assert!(result.guides.iter().all(|g| !matches!(g, Guide::Gap { axis: Axis::X, .. })));

        let result = engine().snap_drag(selection, &statics[..2], CANVAS);
        assert!((result.offset.x + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_beats_gap() {
        let statics = [
            Rect::new(100.0, 300.0, 200.0, 350.0),
            Rect::new(250.0, 300.0, 350.0, 350.0),
        ];
        // Left edge 1px from B's right edge; the 1px gap to B is not a
        // distribution candidate because alignment is tried first.
        let selection = Rect::new(351.0, 100.0, 401.0, 140.0);
        let result = engine().snap_drag(selection, &statics, CANVAS);
        assert!((result.offset.x + 1.0).abs() < 1e-9);
        assert!(result.guides.iter().all(|g| !matches!(g, Guide::Gap { .. })));
    }

    #[test]
    fn test_resize_edge_snap() {
        let statics = [Rect::new(500.0, 400.0, 600.0, 450.0)];
        let proposed = Rect::new(100.0, 100.0, 497.0, 200.0);
        let snapped = engine().snap_resize(proposed, HandleKind::East, &statics, CANVAS, false);
        assert_eq!(snapped.rect, Rect::new(100.0, 100.0, 500.0, 200.0));
    }

    #[test]
    fn test_resize_size_match_keeps_opposite_edge() {
        let statics = [Rect::new(900.0, 400.0, 1020.0, 450.0)];
        // West handle: right edge fixed at 700, width 117 -> 120.
        let proposed = Rect::new(583.0, 100.0, 700.0, 200.0);
        let snapped = engine().snap_resize(proposed, HandleKind::West, &statics, CANVAS, false);
        assert!((snapped.rect.x1 - 700.0).abs() < 1e-9);
        assert!((snapped.rect.width() - 120.0).abs() < 1e-9);
        assert!(snapped.guides.iter().any(|g| matches!(g, Guide::SizeMatch { axis: Axis::X, .. })));
    }

    #[test]
    fn test_resize_ignores_unmoved_axis() {
        let statics = [Rect::new(500.0, 203.0, 600.0, 450.0)];
        let proposed = Rect::new(100.0, 100.0, 300.0, 200.0);
        let snapped = engine().snap_resize(proposed, HandleKind::East, &statics, CANVAS, false);
        assert_eq!(snapped.rect.y1, 200.0);
    }
}
