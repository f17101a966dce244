//! Align and distribute for toolbar actions.
//!
//! Both work on measured rects in logical canvas pixels and produce new
//! `left`/`top` percentages.

use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};

use crate::coords::pixels_to_percent;
use crate::document::ElementId;
use crate::selection::selection_bounds;
use crate::snap::Axis;

/// Alignment against the selection's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignKind {
    Left,
    CenterH,
    Right,
    Top,
    CenterV,
    Bottom,
}

impl AlignKind {
    pub fn axis(self) -> Axis {
        match self {
            AlignKind::Left | AlignKind::CenterH | AlignKind::Right => Axis::X,
            AlignKind::Top | AlignKind::CenterV | AlignKind::Bottom => Axis::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributeDirection {
    Horizontal,
    Vertical,
}

impl DistributeDirection {
    pub fn axis(self) -> Axis {
        match self {
            DistributeDirection::Horizontal => Axis::X,
            DistributeDirection::Vertical => Axis::Y,
        }
    }
}

/// New position of one element, in percent. `None` leaves it unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: ElementId,
    pub left: Option<f64>,
    pub top: Option<f64>,
}

impl Placement {
    fn along(id: &ElementId, axis: Axis, start: f64, canvas: Size) -> Self {
        let (left, top) = match axis {
            Axis::X => (Some(pixels_to_percent(start, canvas.width)), None),
            Axis::Y => (None, Some(pixels_to_percent(start, canvas.height))),
        };
        Self {
            id: id.clone(),
            left,
            top,
        }
    }
}

/// Result of a distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub placements: Vec<Placement>,
    /// Equal gap between neighbours, in logical pixels.
    pub gap: f64,
    /// Guide positions along the axis, in logical pixels: the leading edge
    /// of every element after the first, then the far edge of the set.
    pub guides: Vec<f64>,
}

/// Align at least two elements. Returns `None` for fewer.
pub fn align(elements: &[(ElementId, Rect)], kind: AlignKind, canvas: Size) -> Option<Vec<Placement>> {
    if elements.len() < 2 {
        return None;
    }
    let bounds = selection_bounds(elements.iter().map(|(_, r)| *r))?;
    let axis = kind.axis();
    let (lo, hi) = axis.span(bounds);
    let center = (lo + hi) / 2.0;

    let placements = elements
        .iter()
        .map(|(id, rect)| {
            let size = axis.size(*rect);
            let start = match kind {
                AlignKind::Left | AlignKind::Top => lo,
                AlignKind::CenterH | AlignKind::CenterV => center - size / 2.0,
                AlignKind::Right | AlignKind::Bottom => hi - size,
            };
            Placement::along(id, axis, start, canvas)
        })
        .collect();
    Some(placements)
}

/// Spread at least three elements so the gaps between neighbours are
/// equal, keeping the outermost two in place. Returns `None` for fewer.
pub fn distribute(
    elements: &[(ElementId, Rect)],
    direction: DistributeDirection,
    canvas: Size,
) -> Option<Distribution> {
    if elements.len() < 3 {
        return None;
    }
    let axis = direction.axis();
    let mut sorted: Vec<_> = elements.iter().collect();
    sorted.sort_by(|a, b| axis.span(a.1).0.total_cmp(&axis.span(b.1).0));

    let bounds = selection_bounds(sorted.iter().map(|(_, r)| *r))?;
    let (lo, hi) = axis.span(bounds);
    let total: f64 = sorted.iter().map(|(_, r)| axis.size(*r)).sum();
    let gap = (hi - lo - total) / (sorted.len() - 1) as f64;

    let mut placements = Vec::with_capacity(sorted.len());
    let mut guides = Vec::with_capacity(sorted.len());
    let mut cursor = lo;
    for (index, (id, rect)) in sorted.into_iter().enumerate() {
        placements.push(Placement::along(id, axis, cursor, canvas));
        if index > 0 {
            guides.push(cursor);
        }
        cursor += axis.size(*rect) + gap;
    }
    guides.push(hi);

    Some(Distribution { placements, gap, guides })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Size = Size::new(1000.0, 500.0);

    fn boxes(rects: &[Rect]) -> Vec<(ElementId, Rect)> {
        rects
            .iter()
            .enumerate()
            .map(|(i, r)| (format!("el-{}", i), *r))
            .collect()
    }

    #[test]
    fn test_align_left_and_center() {
        let els = boxes(&[Rect::new(100.0, 0.0, 200.0, 50.0), Rect::new(300.0, 100.0, 500.0, 150.0)]);
        let left = align(&els, AlignKind::Left, CANVAS).unwrap();
        assert_eq!(left[0].left, Some(10.0));
        assert_eq!(left[1].left, Some(10.0));
        assert_eq!(left[1].top, None);

        let center = align(&els, AlignKind::CenterH, CANVAS).unwrap();
        // bounds 100..500, center 300
        assert_eq!(center[0].left, Some(25.0));
        assert_eq!(center[1].left, Some(20.0));

        let bottom = align(&els, AlignKind::Bottom, CANVAS).unwrap();
        assert_eq!(bottom[0].top, Some(20.0));
        assert_eq!(bottom[0].left, None);
    }

    #[test]
    fn test_align_needs_two() {
        let els = boxes(&[Rect::new(0.0, 0.0, 10.0, 10.0)]);
        assert!(align(&els, AlignKind::Right, CANVAS).is_none());
    }

    #[test]
    fn test_distribute_horizontal() {
        // Widths 100, 50, 100 between 0 and 500: gap 125.
        let els = boxes(&[
            Rect::new(400.0, 0.0, 500.0, 10.0),
            Rect::new(0.0, 0.0, 100.0, 10.0),
            Rect::new(150.0, 0.0, 200.0, 10.0),
        ]);
        let dist = distribute(&els, DistributeDirection::Horizontal, CANVAS).unwrap();
        assert_eq!(dist.gap, 125.0);
        let ids: Vec<_> = dist.placements.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["el-1", "el-2", "el-0"]);
        let lefts: Vec<_> = dist.placements.iter().map(|p| p.left.unwrap()).collect();
        assert_eq!(lefts, [0.0, 22.5, 40.0]);
        assert_eq!(dist.guides, [225.0, 400.0, 500.0]);
    }

    #[test]
    fn test_distribute_needs_three() {
        let els = boxes(&[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(20.0, 0.0, 30.0, 10.0)]);
        assert!(distribute(&els, DistributeDirection::Vertical, CANVAS).is_none());
    }
}
