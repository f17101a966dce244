//! Pointer-driven gestures: selection, drag, resize and rubber-band.
//!
//! While a gesture runs nothing is written to the document; the affected
//! elements only receive preview transforms. Releasing the pointer writes
//! one batch inside the gesture's transaction, so the whole gesture is a
//! single undo step. Cancelling rolls the transaction back.

mod state;

pub use state::{Gesture, GestureMode, ManipulationState, Measurement, ResizeState, SelectionRect};

use kurbo::{Point, Rect, Size, Vec2};

use crate::config::EditorConfig;
use crate::coords::{CanvasView, logical_rect_to_viewport, percent_to_pixels, pixels_to_percent, viewport_rect_to_logical};
use crate::document::{ElementId, Presentation};
use crate::input::{Modifiers, MouseButton, PointerTarget};
use crate::render::{PreviewTransform, RenderSurface};
use crate::selection::{
    ElementSnapshot, HANDLE_HIT_TOLERANCE, HandleKind, fit_aspect, hit_test_handles, resize_commit, resize_rect,
    selection_bounds,
};
use crate::snap::SnapEngine;
use crate::store::{DocumentStore, SetOptions, StatePath, StateValue, StoreResult, StyleField, paths};

/// Everything a gesture touches, borrowed from the editor for one call.
pub struct InteractionContext<'a, R: RenderSurface + ?Sized> {
    pub store: &'a mut DocumentStore,
    pub surface: &'a mut R,
    pub view: &'a CanvasView,
    pub snap: &'a SnapEngine,
    pub config: &'a EditorConfig,
}

/// What a pointer call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Nothing changed.
    Ignored,
    /// Only the selection changed.
    SelectionChanged,
    /// A drag or resize started.
    Started,
    /// The live preview will change on the next frame.
    Updated,
    /// The gesture wrote its result to the document.
    Committed,
    /// The gesture ended without writing.
    Cancelled,
}

/// The pointer state machine.
#[derive(Debug, Default)]
pub struct InteractionController {
    gesture: Gesture,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> GestureMode {
        self.gesture.mode()
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_active(&self) -> bool {
        self.mode() != GestureMode::Idle
    }

    /// Open the history entry for a logical user action. Programmatic
    /// mutations wrapped in `on_gesture_start`/`on_gesture_end` undo as one
    /// step, like a drag. Returns false if one is already open.
    pub fn on_gesture_start(store: &mut DocumentStore) -> bool {
        store.begin_transaction()
    }

    /// Close the history entry opened by [`Self::on_gesture_start`],
    /// keeping (`commit`) or discarding its writes. Returns whether the
    /// document changed.
    pub fn on_gesture_end(store: &mut DocumentStore, commit: bool) -> bool {
        if commit {
            store.commit_transaction()
        } else {
            store.rollback_transaction();
            false
        }
    }

    pub fn pointer_down<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        target: PointerTarget,
    ) -> GestureOutcome {
        if self.is_active() {
            log::debug!("Pointer down ignored during {:?}", self.mode());
            return GestureOutcome::Ignored;
        }
        if button != MouseButton::Left {
            return GestureOutcome::Ignored;
        }
        if ctx.store.in_transaction() {
            log::debug!("Pointer down ignored while an action is open");
            return GestureOutcome::Ignored;
        }

        match target {
            PointerTarget::Outside => GestureOutcome::Ignored,
            PointerTarget::Canvas => self.start_rubber_band(ctx, position, modifiers),
            PointerTarget::Handle(id, handle) if ctx.store.selected_ids() == [id.clone()] => {
                self.start_resize(ctx, position, id, handle)
            }
            PointerTarget::Handle(id, _) | PointerTarget::Element(id) => {
                self.press_element(ctx, position, modifiers, id)
            }
        }
    }

    fn press_element<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
        modifiers: Modifiers,
        id: ElementId,
    ) -> GestureOutcome {
        if !on_active_slide(ctx.store, &id) {
            log::warn!("Pointer down on {} which is not on the active slide", id);
            return GestureOutcome::Ignored;
        }
        let members = selection_unit(ctx.store, &id);
        let mut selection = ctx.store.selected_ids();

        if modifiers.command() {
            if members.iter().all(|m| selection.contains(m)) {
                selection.retain(|s| !members.contains(s));
            } else {
                for m in members {
                    if !selection.contains(&m) {
                        selection.push(m);
                    }
                }
            }
            set_selection(ctx, selection);
            return GestureOutcome::SelectionChanged;
        }

        if !selection.contains(&id) {
            selection = members;
            set_selection(ctx, selection.clone());
        }

        if !InteractionController::on_gesture_start(ctx.store) {
            return GestureOutcome::Ignored;
        }
        let mut state = ManipulationState::new(position, selection);
        prepare(ctx, &mut state);
        self.gesture = Gesture::Dragging(state);
        GestureOutcome::Started
    }

    fn start_resize<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
        id: ElementId,
        handle: HandleKind,
    ) -> GestureOutcome {
        if !InteractionController::on_gesture_start(ctx.store) {
            return GestureOutcome::Ignored;
        }
        let mut manipulation = ManipulationState::new(position, vec![id]);
        prepare(ctx, &mut manipulation);
        self.gesture = Gesture::Resizing(ResizeState {
            handle,
            manipulation,
            rect: None,
        });
        GestureOutcome::Started
    }

    fn start_rubber_band<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
        modifiers: Modifiers,
    ) -> GestureOutcome {
        let additive = modifiers.shift || modifiers.command();
        let base = if additive { ctx.store.selected_ids() } else { Vec::new() };
        if !additive {
            set_selection(ctx, Vec::new());
        }
        self.gesture = Gesture::RubberBand(SelectionRect {
            start: position,
            current: position,
            base,
            additive,
        });
        GestureOutcome::SelectionChanged
    }

    /// Record the pointer position. Heavy work waits for the next frame;
    /// at most one frame is requested at a time.
    pub fn pointer_move<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
    ) -> GestureOutcome {
        match &mut self.gesture {
            Gesture::Idle => GestureOutcome::Ignored,
            Gesture::RubberBand(band) => {
                band.current = position;
                ctx.surface.show_rubber_band(Some(band.to_rect()));
                GestureOutcome::Updated
            }
            Gesture::Dragging(state) | Gesture::Resizing(ResizeState { manipulation: state, .. }) => {
                state.pointer_current = position;
                if !state.frame_pending {
                    state.frame_pending = true;
                    ctx.surface.request_animation_frame();
                }
                GestureOutcome::Updated
            }
        }
    }

    /// Apply the latest pointer position to the live preview.
    pub fn on_animation_frame<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
    ) -> GestureOutcome {
        let Some(state) = self.gesture.manipulation_mut() else {
            return GestureOutcome::Ignored;
        };
        state.frame_pending = false;
        if !state.is_measured() && !measure(ctx, state) {
            log::warn!("Elements still unmeasured after one frame, cancelling gesture");
            return self.cancel(ctx);
        }
        update_preview(ctx, &mut self.gesture);
        GestureOutcome::Updated
    }

    pub fn pointer_up<R: RenderSurface + ?Sized>(
        &mut self,
        ctx: &mut InteractionContext<'_, R>,
        position: Point,
    ) -> GestureOutcome {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => GestureOutcome::Ignored,
            Gesture::RubberBand(mut band) => {
                band.current = position;
                finish_rubber_band(ctx, &band);
                GestureOutcome::SelectionChanged
            }
            mut gesture => {
                let Some(state) = gesture.manipulation_mut() else {
                    return GestureOutcome::Ignored;
                };
                state.pointer_current = position;
                if !state.is_measured() && !measure(ctx, state) {
                    log::warn!("Released before elements could be measured, discarding gesture");
                    self.gesture = gesture;
                    return self.cancel(ctx);
                }
                update_preview(ctx, &mut gesture);
                commit(ctx, &gesture)
            }
        }
    }

    /// Abort the current gesture: previews are dropped and the document is
    /// restored to where the gesture started.
    pub fn cancel<R: RenderSurface + ?Sized>(&mut self, ctx: &mut InteractionContext<'_, R>) -> GestureOutcome {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => GestureOutcome::Ignored,
            Gesture::RubberBand(band) => {
                ctx.surface.show_rubber_band(None);
                if band.additive {
                    set_selection(ctx, band.base);
                }
                GestureOutcome::Cancelled
            }
            gesture => {
                if let Some(state) = gesture.manipulation() {
                    clear_previews(ctx, &state.targets);
                }
                InteractionController::on_gesture_end(ctx.store, false);
                refresh_outline(ctx);
                log::debug!("Gesture cancelled");
                GestureOutcome::Cancelled
            }
        }
    }

    /// Redraw the selection outline from the current measurements.
    pub fn refresh_outline<R: RenderSurface + ?Sized>(&self, ctx: &mut InteractionContext<'_, R>) {
        refresh_outline(ctx);
    }

    /// Resolve what lies under `point` (viewport pixels) for hosts without
    /// their own hit testing. Handles of a single selected element win,
    /// then the topmost element.
    pub fn hit_test<R: RenderSurface + ?Sized>(&self, ctx: &InteractionContext<'_, R>, point: Point) -> PointerTarget {
        let selected = ctx.store.selected_ids();
        if let [id] = selected.as_slice() {
            if let Some(handle) = ctx
                .surface
                .measure(id)
                .and_then(|rect| hit_test_handles(rect, point, HANDLE_HIT_TOLERANCE))
            {
                return PointerTarget::Handle(id.clone(), handle);
            }
        }

        if let Some((presentation, slide_index)) = active_slide(ctx.store) {
            let mut elements: Vec<_> = presentation.slides[slide_index].elements.iter().enumerate().collect();
            elements.sort_by_key(|(index, el)| (el.style.z_index, *index));
            let hit = elements
                .into_iter()
                .rev()
                .find(|(_, el)| ctx.surface.measure(&el.id).is_some_and(|rect| rect.contains(point)));
            if let Some((_, el)) = hit {
                return PointerTarget::Element(el.id.clone());
            }
        }

        if ctx.surface.canvas_rect().contains(point) {
            PointerTarget::Canvas
        } else {
            PointerTarget::Outside
        }
    }
}

/// The presentation and the index of its active slide.
fn active_slide(store: &DocumentStore) -> Option<(Presentation, usize)> {
    let presentation = match store.presentation() {
        Ok(p) => p,
        Err(err) => {
            log::error!("Could not decode presentation: {}", err);
            return None;
        }
    };
    let active = store.active_slide_id()?;
    let index = presentation.slide_index(&active)?;
    Some((presentation, index))
}

fn on_active_slide(store: &DocumentStore, id: &str) -> bool {
    active_slide(store).is_some_and(|(presentation, index)| presentation.slides[index].element_index(id).is_some())
}

/// Ids selected together with `id`: its whole group, or just itself.
fn selection_unit(store: &DocumentStore, id: &str) -> Vec<ElementId> {
    let grouped = active_slide(store).and_then(|(presentation, index)| {
        let slide_id = &presentation.slides[index].id;
        presentation.group_of(slide_id, id).map(|g| g.element_ids.clone())
    });
    grouped.unwrap_or_else(|| vec![id.to_string()])
}

fn set_selection<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, ids: Vec<ElementId>) {
    if let Err(err) = ctx.store.set_selection(ids) {
        log::error!("Failed to update selection: {}", err);
    }
    refresh_outline(ctx);
}

fn refresh_outline<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>) {
    let ids = ctx.store.selected_ids();
    let bounds = selection_bounds(ids.iter().filter_map(|id| ctx.surface.measure(id)));
    ctx.surface.show_selection_outline(bounds);
}

fn clear_previews<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, ids: &[ElementId]) {
    for id in ids {
        ctx.surface.clear_preview_transform(id);
    }
    ctx.surface.clear_guides();
}

/// Measure at gesture start; on a zero-size rect ask for one more frame.
fn prepare<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, state: &mut ManipulationState) {
    if !measure(ctx, state) {
        log::debug!("Zero-size measurement, retrying next frame");
        state.frame_pending = true;
        ctx.surface.request_animation_frame();
    }
}

fn is_measurable(rect: Rect) -> bool {
    rect.width() > 0.0 && rect.height() > 0.0
}

/// Snapshot the targets and the static elements in logical pixels.
/// Returns false if any target is missing or has zero size.
fn measure<R: RenderSurface + ?Sized>(ctx: &InteractionContext<'_, R>, state: &mut ManipulationState) -> bool {
    let Some((presentation, slide_index)) = active_slide(ctx.store) else {
        return false;
    };
    let slide = &presentation.slides[slide_index];
    let canvas_rect = ctx.surface.canvas_rect();
    let scale = ctx.view.effective_scale();

    let mut initial = Vec::with_capacity(state.targets.len());
    for id in &state.targets {
        let (Some(element_index), Some(rect)) = (slide.element_index(id), ctx.surface.measure(id)) else {
            return false;
        };
        if !is_measurable(rect) {
            return false;
        }
        let element = &slide.elements[element_index];
        initial.push(ElementSnapshot {
            id: id.clone(),
            kind: element.kind.clone(),
            slide_index,
            element_index,
            style: element.style.clone(),
            rect: viewport_rect_to_logical(rect, canvas_rect, scale),
        });
    }
    if initial.is_empty() {
        return false;
    }

    state.statics = slide
        .elements
        .iter()
        .filter(|el| !state.targets.contains(&el.id))
        .filter_map(|el| ctx.surface.measure(&el.id))
        .filter(|rect| is_measurable(*rect))
        .map(|rect| viewport_rect_to_logical(rect, canvas_rect, scale))
        .collect();
    state.initial = initial;
    state.measurement = Measurement::Ready;
    true
}

fn logical_canvas(view: &CanvasView) -> Rect {
    Rect::from_origin_size(Point::ZERO, view.canvas)
}

fn min_size(view: &CanvasView, config: &EditorConfig) -> Size {
    Size::new(
        percent_to_pixels(config.min_size_percent, view.canvas.width),
        percent_to_pixels(config.min_size_percent, view.canvas.height),
    )
}

/// Recompute snapping and preview transforms for the current pointer.
fn update_preview<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, gesture: &mut Gesture) {
    let canvas = logical_canvas(ctx.view);
    let canvas_rect = ctx.surface.canvas_rect();
    let scale = ctx.view.effective_scale();

    match gesture {
        Gesture::Dragging(state) => {
            let Some(start) = state.start_bounds() else {
                return;
            };
            let delta = ctx.view.screen_delta_to_logical(state.screen_delta());
            let snap = ctx.snap.snap_drag(start + delta, &state.statics, canvas);
            state.last_delta = delta;
            state.last_snap = snap.offset;

            let moved = delta + snap.offset;
            for snapshot in &state.initial {
                ctx.surface
                    .set_preview_transform(&snapshot.id, PreviewTransform::translate(moved));
            }
            ctx.surface.show_guides(&snap.guides);
            ctx.surface
                .show_selection_outline(Some(logical_rect_to_viewport(start + moved, canvas_rect, scale)));
        }
        Gesture::Resizing(resize) => {
            let state = &mut resize.manipulation;
            let Some(snapshot) = state.initial.first() else {
                return;
            };
            let delta = ctx.view.screen_delta_to_logical(state.screen_delta());
            let min = min_size(ctx.view, ctx.config);
            let locked = snapshot.kind.is_aspect_locked();
            let aspect = if locked { snapshot.aspect_ratio() } else { None };

            let proposed = resize_rect(snapshot.rect, resize.handle, delta, min, aspect);
            let snapped = ctx
                .snap
                .snap_resize(proposed, resize.handle, &state.statics, canvas, locked);
            let mut rect = snapped.rect;
            let mut guides = snapped.guides;
            if let Some(ratio) = aspect {
                rect = fit_aspect(rect, resize.handle, ratio, min);
            }
            if rect.width() < min.width || rect.height() < min.height {
                rect = proposed;
                guides.clear();
            }

            state.last_delta = delta;
            state.last_snap = Vec2::new(rect.width() - proposed.width(), rect.height() - proposed.height());
            resize.rect = Some(rect);

            ctx.surface
                .set_preview_transform(&snapshot.id, PreviewTransform::between(snapshot.rect, rect));
            ctx.surface.show_guides(&guides);
            ctx.surface
                .show_selection_outline(Some(logical_rect_to_viewport(rect, canvas_rect, scale)));
        }
        Gesture::Idle | Gesture::RubberBand(_) => {}
    }
}

fn style_path(snapshot: &ElementSnapshot, field: StyleField) -> StatePath {
    paths::style_field(snapshot.slide_index, snapshot.element_index, field)
}

/// Style writes for the finished gesture.
fn commit_updates<R: RenderSurface + ?Sized>(
    ctx: &InteractionContext<'_, R>,
    gesture: &Gesture,
) -> Vec<(StatePath, StateValue)> {
    let canvas = ctx.view.canvas;
    let mut updates = Vec::new();
    match gesture {
        Gesture::Dragging(state) => {
            let moved = state.last_delta + state.last_snap;
            for snapshot in &state.initial {
                let left = snapshot.style.left + pixels_to_percent(moved.x, canvas.width);
                let top = snapshot.style.top + pixels_to_percent(moved.y, canvas.height);
                updates.push((style_path(snapshot, StyleField::Left), left.into()));
                updates.push((style_path(snapshot, StyleField::Top), top.into()));
            }
        }
        Gesture::Resizing(resize) => {
            let (Some(snapshot), Some(rect)) = (resize.manipulation.initial.first(), resize.rect) else {
                return updates;
            };
            let values = resize_commit(snapshot, resize.handle, rect, canvas, ctx.config.min_font_size);
            updates.push((style_path(snapshot, StyleField::Left), values.left.into()));
            updates.push((style_path(snapshot, StyleField::Top), values.top.into()));
            if let Some(width) = values.width {
                updates.push((style_path(snapshot, StyleField::Width), width.into()));
            }
            if let Some(height) = values.height {
                updates.push((style_path(snapshot, StyleField::Height), height.into()));
            }
            if let Some(font_size) = values.font_size {
                updates.push((style_path(snapshot, StyleField::FontSize), font_size.into()));
            }
        }
        Gesture::Idle | Gesture::RubberBand(_) => {}
    }
    updates
}

/// Write the gesture's result as one batch and close its transaction.
fn commit<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, gesture: &Gesture) -> GestureOutcome {
    let Some(state) = gesture.manipulation() else {
        return GestureOutcome::Ignored;
    };
    clear_previews(ctx, &state.targets);

    let updates = commit_updates(ctx, gesture);
    let written: StoreResult<()> = ctx.store.batch(updates, SetOptions::default());
    if let Err(err) = written {
        log::error!("Failed to commit gesture: {}", err);
        InteractionController::on_gesture_end(ctx.store, false);
        refresh_outline(ctx);
        return GestureOutcome::Cancelled;
    }
    if !InteractionController::on_gesture_end(ctx.store, true) {
        log::debug!("Gesture ended without changes");
    }
    GestureOutcome::Committed
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// Select every element whose on-screen rect overlaps the band. Grouped
/// elements bring their whole group.
fn finish_rubber_band<R: RenderSurface + ?Sized>(ctx: &mut InteractionContext<'_, R>, band: &SelectionRect) {
    ctx.surface.show_rubber_band(None);
    let area = band.to_rect();
    let mut selection = band.base.clone();

    if let Some((presentation, index)) = active_slide(ctx.store) {
        let slide = &presentation.slides[index];
        for el in &slide.elements {
            let hit = ctx.surface.measure(&el.id).is_some_and(|rect| overlaps(rect, area));
            if !hit {
                continue;
            }
            let unit = presentation
                .group_of(&slide.id, &el.id)
                .map(|g| g.element_ids.clone())
                .unwrap_or_else(|| vec![el.id.clone()]);
            for id in unit {
                if !selection.contains(&id) {
                    selection.push(id);
                }
            }
        }
    }
    set_selection(ctx, selection);
}
