//! The editor engine: one instance per open presentation.
//!
//! Owns the store, the interaction controller and the view state, and is
//! handed its renderer and persistence at construction. Every committed
//! gesture or document operation is one undo step and is passed to
//! [`Persistence::save_current`].

use kurbo::{Point, Rect, Size, Vec2};
use serde_json::Value;
use thiserror::Error;

use crate::config::EditorConfig;
use crate::coords::{CanvasView, viewport_rect_to_logical};
use crate::document::{DocumentError, ElementId, ElementKind, GroupId, Presentation, SlideId};
use crate::input::{KeyCommand, KeyEvent, PointerEvent, PointerTarget};
use crate::interaction::{GestureMode, GestureOutcome, InteractionContext, InteractionController};
use crate::layout::{self, AlignKind, DistributeDirection, Placement};
use crate::render::RenderSurface;
use crate::snap::SnapEngine;
use crate::storage::Persistence;
use crate::store::{DocumentStore, SetOptions, StateValue, StoreError, StyleField, paths};

/// Errors from editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("No active slide")]
    NoActiveSlide,
    #[error("Operation not allowed while a gesture is in progress")]
    GestureActive,
}

pub type EditorResult<T> = Result<T, EditorError>;

/// The editor engine.
pub struct Editor<R: RenderSurface, P: Persistence> {
    store: DocumentStore,
    controller: InteractionController,
    view: CanvasView,
    config: EditorConfig,
    snap: SnapEngine,
    renderer: R,
    persistence: P,
}

impl<R: RenderSurface, P: Persistence> Editor<R, P> {
    /// Create an editor for `presentation`.
    pub fn new(presentation: Presentation, config: EditorConfig, renderer: R, persistence: P) -> EditorResult<Self> {
        presentation.validate()?;
        let store = DocumentStore::new(&presentation, config.max_undo_stack)?;
        let canvas = Size::new(presentation.settings.width, presentation.settings.height);
        let mut editor = Self {
            store,
            controller: InteractionController::new(),
            view: CanvasView::new(canvas, &config),
            snap: SnapEngine::new(config.snap_threshold, config.snap_enabled),
            config,
            renderer,
            persistence,
        };
        editor.render();
        Ok(editor)
    }

    /// Create an editor on the last saved presentation, or a blank one.
    pub fn open(config: EditorConfig, renderer: R, mut persistence: P) -> EditorResult<Self> {
        let presentation = match persistence.load_last() {
            Some(doc) if doc.validate().is_ok() => doc,
            Some(_) => {
                log::warn!("Last saved presentation is invalid, starting blank");
                Presentation::new(config.canvas_width, config.canvas_height)
            }
            None => Presentation::new(config.canvas_width, config.canvas_height),
        };
        Self::new(presentation, config, renderer, persistence)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Direct store access for subscriptions and host-driven writes.
    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn mode(&self) -> GestureMode {
        self.controller.mode()
    }

    pub fn view(&self) -> &CanvasView {
        &self.view
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn presentation(&self) -> EditorResult<Presentation> {
        Ok(self.store.presentation()?)
    }

    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.store.selected_ids()
    }

    pub fn active_slide_id(&self) -> Option<SlideId> {
        self.store.active_slide_id()
    }

    fn with_controller<T>(
        &mut self,
        f: impl FnOnce(&mut InteractionController, &mut InteractionContext<'_, R>) -> T,
    ) -> T {
        let Self {
            store,
            controller,
            view,
            config,
            snap,
            renderer,
            ..
        } = self;
        let mut ctx = InteractionContext {
            store,
            surface: renderer,
            view,
            snap,
            config,
        };
        f(controller, &mut ctx)
    }

    /// Re-render the active slide and the selection outline.
    fn render(&mut self) {
        let Ok((doc, slide_id)) = self.active() else {
            log::warn!("Nothing to render");
            return;
        };
        self.view
            .set_canvas_size(Size::new(doc.settings.width, doc.settings.height));
        if let Ok(slide) = doc.slide(&slide_id) {
            self.renderer.render_slide(slide, &self.view);
        }
        self.with_controller(|controller, ctx| controller.refresh_outline(ctx));
    }

    fn save(&mut self) {
        match self.store.presentation() {
            Ok(doc) => self.persistence.save_current(&doc),
            Err(err) => log::error!("Could not save presentation: {}", err),
        }
    }

    fn ensure_idle(&self) -> EditorResult<()> {
        if self.controller.is_active() {
            return Err(EditorError::GestureActive);
        }
        Ok(())
    }

    /// The presentation and its active slide id, falling back to the first
    /// slide if the stored one is gone.
    fn active(&self) -> EditorResult<(Presentation, SlideId)> {
        let doc = self.store.presentation()?;
        let active = self
            .store
            .active_slide_id()
            .filter(|id| doc.slide_index(id).is_some())
            .or_else(|| doc.slides.first().map(|s| s.id.clone()))
            .ok_or(EditorError::NoActiveSlide)?;
        Ok((doc, active))
    }

    /// Write an edited presentation together with the active slide and
    /// selection as one undo step, then re-render and save.
    fn commit_document(&mut self, doc: &Presentation, active: &str, selection: Vec<ElementId>) -> EditorResult<()> {
        self.store.batch(
            [
                (paths::presentation(), StateValue::from_serialize(doc)?),
                (paths::active_slide_id(), StateValue::from(active)),
                (paths::selected_element_ids(), StateValue::from(selection)),
            ],
            SetOptions::default(),
        )?;
        self.render();
        self.persistence.save_current(doc);
        Ok(())
    }

    // --- View ---

    pub fn set_container_size(&mut self, size: Size) {
        self.view.set_container_size(size);
        self.render();
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.view.set_zoom(zoom);
        self.render();
    }

    /// Zoom by `factor` keeping `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.view.zoom_at(screen_point, factor);
        self.render();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.view.pan_by(delta);
        self.render();
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
        self.render();
    }

    pub fn snap_enabled(&self) -> bool {
        self.snap.enabled
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.snap.enabled = enabled;
        self.config.snap_enabled = enabled;
    }

    // --- Input ---

    /// Route a pointer event to the interaction controller.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> GestureOutcome {
        let outcome = self.with_controller(|controller, ctx| match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
                target,
            } => controller.pointer_down(ctx, position, button, modifiers, target),
            PointerEvent::Move { position } => controller.pointer_move(ctx, position),
            PointerEvent::Up { position, .. } => controller.pointer_up(ctx, position),
        });
        if outcome == GestureOutcome::Committed {
            self.render();
            self.save();
        }
        outcome
    }

    /// Deliver a requested animation frame.
    pub fn on_animation_frame(&mut self) -> GestureOutcome {
        self.with_controller(|controller, ctx| controller.on_animation_frame(ctx))
    }

    /// Abort any gesture, e.g. when the window loses focus or a context
    /// menu opens.
    pub fn cancel_gesture(&mut self) -> GestureOutcome {
        self.with_controller(|controller, ctx| controller.cancel(ctx))
    }

    pub fn focus_lost(&mut self) {
        if self.cancel_gesture() == GestureOutcome::Cancelled {
            log::debug!("Gesture cancelled on focus loss");
        }
    }

    /// What is under `point` (viewport pixels).
    pub fn hit_test(&mut self, point: Point) -> PointerTarget {
        self.with_controller(|controller, ctx| controller.hit_test(ctx, point))
    }

    /// Handle a key press. Returns whether the key was bound.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        let Some(command) = KeyCommand::from_event(event) else {
            return false;
        };
        if self.controller.is_active() && command != KeyCommand::Cancel {
            return false;
        }

        let result = match command {
            KeyCommand::Cancel => {
                if self.controller.is_active() {
                    self.cancel_gesture();
                    Ok(())
                } else {
                    self.clear_selection()
                }
            }
            KeyCommand::Delete => self.delete_selected().map(|_| ()),
            KeyCommand::Undo => {
                self.undo();
                Ok(())
            }
            KeyCommand::Redo => {
                self.redo();
                Ok(())
            }
            KeyCommand::Duplicate => self.duplicate_selected().map(|_| ()),
            KeyCommand::SelectAll => self.select_all(),
        };
        if let Err(err) = result {
            log::warn!("{:?} failed: {}", command, err);
        }
        true
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        if self.controller.is_active() || !self.store.undo() {
            return false;
        }
        self.after_history_step();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.controller.is_active() || !self.store.redo() {
            return false;
        }
        self.after_history_step();
        true
    }

    /// Drop selected ids that no longer exist after an undo/redo.
    fn after_history_step(&mut self) {
        if let Ok((doc, active)) = self.active() {
            if self.store.active_slide_id().as_deref() != Some(active.as_str()) {
                if let Err(err) = self.store.set_active_slide(&active) {
                    log::error!("Could not restore active slide: {}", err);
                }
            }
            if let Ok(slide) = doc.slide(&active) {
                let kept: Vec<_> = self
                    .store
                    .selected_ids()
                    .into_iter()
                    .filter(|id| slide.element(id).is_some())
                    .collect();
                if let Err(err) = self.store.set_selection(kept) {
                    log::error!("Could not prune selection: {}", err);
                }
            }
        }
        self.render();
        self.save();
    }

    /// Open one history entry for a programmatic action (auto-layout,
    /// toolbar buttons). Returns false if a gesture or action is open.
    pub fn on_gesture_start(&mut self) -> bool {
        if self.controller.is_active() {
            return false;
        }
        InteractionController::on_gesture_start(&mut self.store)
    }

    /// Close the action opened by [`Editor::on_gesture_start`]. Returns
    /// whether the document changed.
    pub fn on_gesture_end(&mut self, commit: bool) -> bool {
        if self.controller.is_active() {
            return false;
        }
        let changed = InteractionController::on_gesture_end(&mut self.store, commit);
        self.render();
        if changed {
            self.save();
        }
        changed
    }

    /// Replace the document with the last saved one. Clears history.
    pub fn restore_last(&mut self) -> EditorResult<bool> {
        self.ensure_idle()?;
        let Some(doc) = self.persistence.load_last() else {
            return Ok(false);
        };
        doc.validate()?;
        self.store.reset(&doc)?;
        self.render();
        Ok(true)
    }

    // --- Selection ---

    pub fn set_selection(&mut self, ids: Vec<ElementId>) -> EditorResult<()> {
        self.ensure_idle()?;
        self.store.set_selection(ids)?;
        self.with_controller(|controller, ctx| controller.refresh_outline(ctx));
        Ok(())
    }

    pub fn clear_selection(&mut self) -> EditorResult<()> {
        self.set_selection(Vec::new())
    }

    /// Select every element on the active slide.
    pub fn select_all(&mut self) -> EditorResult<()> {
        let (doc, active) = self.active()?;
        let ids = doc.slide(&active)?.elements.iter().map(|el| el.id.clone()).collect();
        self.set_selection(ids)
    }

    // --- Slides ---

    pub fn set_active_slide(&mut self, id: &str) -> EditorResult<()> {
        self.ensure_idle()?;
        let doc = self.store.presentation()?;
        doc.slide(id)?;
        self.store.set_active_slide(id)?;
        self.render();
        Ok(())
    }

    /// Insert a blank slide after the active one and activate it.
    pub fn add_slide(&mut self) -> EditorResult<SlideId> {
        self.ensure_idle()?;
        let (mut doc, active) = self.active()?;
        let id = doc.add_slide(Some(active.as_str()));
        self.commit_document(&doc, &id, Vec::new())?;
        Ok(id)
    }

    /// Delete a slide. The last remaining slide cannot be deleted.
    pub fn delete_slide(&mut self, id: &str) -> EditorResult<()> {
        self.ensure_idle()?;
        let (mut doc, active) = self.active()?;
        let fallback = doc.delete_slide(id)?;
        if active == id {
            self.commit_document(&doc, &fallback, Vec::new())
        } else {
            let selection = self.store.selected_ids();
            self.commit_document(&doc, &active, selection)
        }
    }

    /// Copy a slide after itself and activate the copy.
    pub fn duplicate_slide(&mut self, id: &str) -> EditorResult<SlideId> {
        self.ensure_idle()?;
        let (mut doc, _) = self.active()?;
        let copy = doc.duplicate_slide(id)?;
        self.commit_document(&doc, &copy, Vec::new())?;
        Ok(copy)
    }

    pub fn move_slide(&mut self, from: usize, to: usize) -> EditorResult<()> {
        self.ensure_idle()?;
        let (mut doc, active) = self.active()?;
        doc.move_slide(from, to)?;
        let selection = self.store.selected_ids();
        self.commit_document(&doc, &active, selection)
    }

    // --- Elements ---

    /// Add an element to the active slide and select it.
    pub fn add_element(&mut self, kind: ElementKind, content: Value) -> EditorResult<ElementId> {
        self.ensure_idle()?;
        let (mut doc, active) = self.active()?;
        let id = doc.add_element(&active, kind, content, self.config.default_font_size)?;
        self.commit_document(&doc, &active, vec![id.clone()])?;
        Ok(id)
    }

    /// Delete the selected elements. Returns how many were removed.
    pub fn delete_selected(&mut self) -> EditorResult<usize> {
        let ids = self.store.selected_ids();
        self.delete_elements(&ids)
    }

    pub fn delete_elements(&mut self, ids: &[ElementId]) -> EditorResult<usize> {
        self.ensure_idle()?;
        if ids.is_empty() {
            return Ok(0);
        }
        let (mut doc, active) = self.active()?;
        let removed = doc.delete_elements(&active, ids)?;
        let selection = self
            .store
            .selected_ids()
            .into_iter()
            .filter(|id| !ids.contains(id))
            .collect();
        self.commit_document(&doc, &active, selection)?;
        Ok(removed)
    }

    /// Copy the selection, offset and on top, and select the copies.
    pub fn duplicate_selected(&mut self) -> EditorResult<Vec<ElementId>> {
        self.ensure_idle()?;
        let selected = self.store.selected_ids();
        if selected.is_empty() {
            return Ok(Vec::new());
        }
        let (mut doc, active) = self.active()?;
        let copies = doc.duplicate_elements(&active, &selected, self.config.duplicate_offset_percent)?;
        self.commit_document(&doc, &active, copies.clone())?;
        Ok(copies)
    }

    pub fn bring_to_front(&mut self) -> EditorResult<()> {
        self.reorder(Presentation::bring_to_front)
    }

    pub fn send_to_back(&mut self) -> EditorResult<()> {
        self.reorder(Presentation::send_to_back)
    }

    fn reorder(
        &mut self,
        op: fn(&mut Presentation, &str, &[ElementId]) -> Result<(), DocumentError>,
    ) -> EditorResult<()> {
        self.ensure_idle()?;
        let selected = self.store.selected_ids();
        if selected.is_empty() {
            return Ok(());
        }
        let (mut doc, active) = self.active()?;
        op(&mut doc, &active, &selected)?;
        self.commit_document(&doc, &active, selected)
    }

    /// Group the selected elements.
    pub fn group_selected(&mut self) -> EditorResult<GroupId> {
        self.ensure_idle()?;
        let selected = self.store.selected_ids();
        let (mut doc, active) = self.active()?;
        let group = doc.group_elements(&active, &selected)?;
        self.commit_document(&doc, &active, selected)?;
        Ok(group)
    }

    /// Dissolve every group touched by the selection. Returns how many.
    pub fn ungroup_selected(&mut self) -> EditorResult<usize> {
        self.ensure_idle()?;
        let selected = self.store.selected_ids();
        let (mut doc, active) = self.active()?;
        let mut groups: Vec<GroupId> = Vec::new();
        for id in &selected {
            if let Some(group) = doc.group_of(&active, id) {
                if !groups.contains(&group.id) {
                    groups.push(group.id.clone());
                }
            }
        }
        if groups.is_empty() {
            return Ok(0);
        }
        for group in &groups {
            doc.ungroup(&active, group)?;
        }
        self.commit_document(&doc, &active, selected)?;
        Ok(groups.len())
    }

    // --- Layout ---

    /// Measured rects of the selection in logical pixels. Unmeasurable
    /// elements are skipped.
    fn selected_rects(&self) -> Vec<(ElementId, Rect)> {
        let canvas_rect = self.renderer.canvas_rect();
        let scale = self.view.effective_scale();
        self.store
            .selected_ids()
            .into_iter()
            .filter_map(|id| {
                let rect = self.renderer.measure(&id).filter(|r| r.width() > 0.0 && r.height() > 0.0);
                if rect.is_none() {
                    log::debug!("Skipping unmeasured element {}", id);
                }
                rect.map(|r| (id, viewport_rect_to_logical(r, canvas_rect, scale)))
            })
            .collect()
    }

    /// Write `left`/`top` of each placement as one undo step.
    fn apply_placements(&mut self, placements: &[Placement]) -> EditorResult<()> {
        let (doc, active) = self.active()?;
        let slide_index = doc.slide_index(&active).ok_or(EditorError::NoActiveSlide)?;
        let slide = doc.slide(&active)?;
        let mut updates = Vec::new();
        for placement in placements {
            let index = slide
                .element_index(&placement.id)
                .ok_or_else(|| DocumentError::ElementNotFound(placement.id.clone()))?;
            if let Some(left) = placement.left {
                updates.push((paths::style_field(slide_index, index, StyleField::Left), StateValue::from(left)));
            }
            if let Some(top) = placement.top {
                updates.push((paths::style_field(slide_index, index, StyleField::Top), StateValue::from(top)));
            }
        }
        self.store.batch(updates, SetOptions::default())?;
        self.render();
        self.save();
        Ok(())
    }

    /// Align the selection (at least two elements). Returns false if there
    /// were too few.
    pub fn align_selected(&mut self, kind: AlignKind) -> EditorResult<bool> {
        self.ensure_idle()?;
        let rects = self.selected_rects();
        let Some(placements) = layout::align(&rects, kind, self.view.canvas) else {
            return Ok(false);
        };
        self.apply_placements(&placements)?;
        Ok(true)
    }

    /// Distribute the selection (at least three elements) with equal gaps.
    /// Returns the guide positions in logical pixels, or `None` if there
    /// were too few.
    pub fn distribute_selected(&mut self, direction: DistributeDirection) -> EditorResult<Option<Vec<f64>>> {
        self.ensure_idle()?;
        let rects = self.selected_rects();
        let Some(distribution) = layout::distribute(&rects, direction, self.view.canvas) else {
            return Ok(None);
        };
        self.apply_placements(&distribution.placements)?;
        Ok(Some(distribution.guides))
    }
}
