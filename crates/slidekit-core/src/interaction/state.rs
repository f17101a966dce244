//! Per-gesture state.

use kurbo::{Point, Rect, Vec2};

use crate::selection::{ElementSnapshot, HandleKind, selection_bounds};

/// Fieldless view of the controller's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    Idle,
    Dragging,
    Resizing { handle: HandleKind },
    RubberBand,
}

/// Whether the gesture's elements have been measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Ready,
    /// A zero-size rect was seen; measure again on the next frame.
    Retry,
}

/// State shared by drags and resizes.
#[derive(Debug, Clone)]
pub struct ManipulationState {
    pub pointer_start: Point,
    pub pointer_current: Point,
    /// Ids the gesture acts on, in selection order.
    pub targets: Vec<String>,
    /// Frozen targets; empty until measured.
    pub initial: Vec<ElementSnapshot>,
    /// Logical rects of every other element on the slide.
    pub statics: Vec<Rect>,
    pub measurement: Measurement,
    /// Logical pointer delta of the last frame.
    pub last_delta: Vec2,
    /// Snap correction of the last frame.
    pub last_snap: Vec2,
    /// A frame has been requested and not yet delivered.
    pub frame_pending: bool,
}

impl ManipulationState {
    pub fn new(pointer_start: Point, targets: Vec<String>) -> Self {
        Self {
            pointer_start,
            pointer_current: pointer_start,
            targets,
            initial: Vec::new(),
            statics: Vec::new(),
            measurement: Measurement::Retry,
            last_delta: Vec2::ZERO,
            last_snap: Vec2::ZERO,
            frame_pending: false,
        }
    }

    /// Screen-space pointer movement.
    pub fn screen_delta(&self) -> Vec2 {
        self.pointer_current - self.pointer_start
    }

    /// Union of the targets' start rects.
    pub fn start_bounds(&self) -> Option<Rect> {
        selection_bounds(self.initial.iter().map(|s| s.rect))
    }

    pub fn is_measured(&self) -> bool {
        self.measurement == Measurement::Ready
    }
}

/// Live result of a resize.
#[derive(Debug, Clone)]
pub struct ResizeState {
    pub handle: HandleKind,
    pub manipulation: ManipulationState,
    /// Current logical rect.
    pub rect: Option<Rect>,
}

/// Marquee selection, in viewport pixels.
#[derive(Debug, Clone)]
pub struct SelectionRect {
    pub start: Point,
    pub current: Point,
    /// Selection when the band started; kept when `additive`.
    pub base: Vec<String>,
    pub additive: bool,
}

impl SelectionRect {
    pub fn to_rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}

/// Active gesture.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging(ManipulationState),
    Resizing(ResizeState),
    RubberBand(SelectionRect),
}

impl Gesture {
    pub fn mode(&self) -> GestureMode {
        match self {
            Gesture::Idle => GestureMode::Idle,
            Gesture::Dragging(_) => GestureMode::Dragging,
            Gesture::Resizing(resize) => GestureMode::Resizing { handle: resize.handle },
            Gesture::RubberBand(_) => GestureMode::RubberBand,
        }
    }

    pub fn manipulation(&self) -> Option<&ManipulationState> {
        match self {
            Gesture::Dragging(state) => Some(state),
            Gesture::Resizing(resize) => Some(&resize.manipulation),
            _ => None,
        }
    }

    pub fn manipulation_mut(&mut self) -> Option<&mut ManipulationState> {
        match self {
            Gesture::Dragging(state) => Some(state),
            Gesture::Resizing(resize) => Some(&mut resize.manipulation),
            _ => None,
        }
    }
}
