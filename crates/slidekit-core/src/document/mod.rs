//! Presentation document: slides, elements and groups.
//!
//! All element geometry is stored as percentages of the logical canvas
//! (`settings.width` x `settings.height`). The operations here are plain
//! edits of the typed document; the editor writes the result back through
//! the store as a single undoable step.

pub mod element;

pub use element::{
    ChartContent, Element, ElementContent, ElementId, ElementKind, ElementStyle, ElementView, IframeContent,
    TableContent, ValidationError, VideoContent, Width,
};

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

/// Slide identifier.
pub type SlideId = String;
/// Group identifier.
pub type GroupId = String;

/// Errors from structural document operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("slide not found: {0}")]
    SlideNotFound(SlideId),
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),
    #[error("the last slide cannot be deleted")]
    LastSlide,
    #[error("duplicate element id `{0}` on slide {1}")]
    DuplicateElementId(ElementId, SlideId),
    #[error("element {0} already belongs to a group")]
    AlreadyGrouped(ElementId),
    #[error("group {0} references missing element {1}")]
    DanglingGroupMember(GroupId, ElementId),
    #[error("operation needs at least {needed} elements, got {got}")]
    NotEnoughElements { needed: usize, got: usize },
    #[error("slide index {0} out of range")]
    SlideIndexOutOfRange(usize),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

pub fn new_slide_id() -> SlideId {
    format!("slide-{}", Uuid::new_v4().simple())
}

pub fn new_group_id() -> GroupId {
    format!("group-{}", Uuid::new_v4().simple())
}

/// Presentation-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Logical canvas width in pixels.
    pub width: f64,
    /// Logical canvas height in pixels.
    pub height: f64,
    #[serde(default)]
    pub global_style_sheet: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            global_style_sheet: String::new(),
            extra: Map::new(),
        }
    }
}

/// A slide. Element order is z-order (later = on top).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: SlideId,
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Other slide fields (background, notes, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slide {
    pub fn new() -> Self {
        Self {
            id: new_slide_id(),
            elements: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|el| el.id == id)
    }

    pub fn element_index(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|el| el.id == id)
    }

    fn next_z_index(&self) -> i64 {
        self.elements.len() as i64 + 1
    }

    /// A z-index above every element on the slide.
    fn top_z_index(&self) -> i64 {
        self.elements.iter().map(|el| el.style.z_index).max().map_or(1, |z| z + 1)
    }
}

impl Default for Slide {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of elements on one slide that select and move together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub element_ids: Vec<ElementId>,
}

/// A presentation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    pub settings: Settings,
    pub slides: Vec<Slide>,
    /// Groups per slide id.
    #[serde(default)]
    pub groups: BTreeMap<SlideId, Vec<Group>>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl Presentation {
    /// A presentation with one empty slide.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            settings: Settings {
                width,
                height,
                ..Settings::default()
            },
            slides: vec![Slide::new()],
            groups: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the structural invariants: unique element ids per slide, and
    /// every group member live and in at most one group.
    pub fn validate(&self) -> DocumentResult<()> {
        for slide in &self.slides {
            let mut seen = HashSet::new();
            for el in &slide.elements {
                if !seen.insert(el.id.as_str()) {
                    return Err(DocumentError::DuplicateElementId(el.id.clone(), slide.id.clone()));
                }
            }
            let mut grouped = HashSet::new();
            for group in self.groups.get(&slide.id).into_iter().flatten() {
                for id in &group.element_ids {
                    if !seen.contains(id.as_str()) {
                        return Err(DocumentError::DanglingGroupMember(group.id.clone(), id.clone()));
                    }
                    if !grouped.insert(id.as_str()) {
                        return Err(DocumentError::AlreadyGrouped(id.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn slide_index(&self, id: &str) -> Option<usize> {
        self.slides.iter().position(|s| s.id == id)
    }

    pub fn slide(&self, id: &str) -> DocumentResult<&Slide> {
        self.slides
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| DocumentError::SlideNotFound(id.to_string()))
    }

    pub fn slide_mut(&mut self, id: &str) -> DocumentResult<&mut Slide> {
        self.slides
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| DocumentError::SlideNotFound(id.to_string()))
    }

    /// Insert an empty slide after `after` (or at the end) and return its id.
    pub fn add_slide(&mut self, after: Option<&str>) -> SlideId {
        let slide = Slide::new();
        let id = slide.id.clone();
        let at = after
            .and_then(|after| self.slide_index(after))
            .map_or(self.slides.len(), |i| i + 1);
        self.slides.insert(at, slide);
        id
    }

    /// Delete a slide and its groups. Returns the id of the slide that
    /// takes its place (the previous one, or the new first).
    pub fn delete_slide(&mut self, id: &str) -> DocumentResult<SlideId> {
        if self.slides.len() <= 1 {
            return Err(DocumentError::LastSlide);
        }
        let index = self
            .slide_index(id)
            .ok_or_else(|| DocumentError::SlideNotFound(id.to_string()))?;
        self.slides.remove(index);
        self.groups.remove(id);
        let fallback = index.saturating_sub(1);
        Ok(self.slides[fallback.min(self.slides.len() - 1)].id.clone())
    }

    /// Deep-copy a slide with fresh slide, element and group ids, inserted
    /// right after the source.
    pub fn duplicate_slide(&mut self, id: &str) -> DocumentResult<SlideId> {
        let index = self
            .slide_index(id)
            .ok_or_else(|| DocumentError::SlideNotFound(id.to_string()))?;
        let mut copy = self.slides[index].clone();
        copy.id = new_slide_id();

        let mut remap = HashMap::new();
        for el in &mut copy.elements {
            let fresh = element::new_element_id();
            remap.insert(std::mem::replace(&mut el.id, fresh.clone()), fresh);
        }
        if let Some(groups) = self.groups.get(id) {
            let copied = groups
                .iter()
                .map(|g| Group {
                    id: new_group_id(),
                    element_ids: g.element_ids.iter().filter_map(|e| remap.get(e).cloned()).collect(),
                })
                .collect();
            self.groups.insert(copy.id.clone(), copied);
        }

        let new_id = copy.id.clone();
        self.slides.insert(index + 1, copy);
        Ok(new_id)
    }

    /// Move the slide at `from` to index `to`.
    pub fn move_slide(&mut self, from: usize, to: usize) -> DocumentResult<()> {
        let len = self.slides.len();
        if from >= len {
            return Err(DocumentError::SlideIndexOutOfRange(from));
        }
        if to >= len {
            return Err(DocumentError::SlideIndexOutOfRange(to));
        }
        let slide = self.slides.remove(from);
        self.slides.insert(to, slide);
        Ok(())
    }

    /// Append a new element with the default geometry for its kind.
    pub fn add_element(
        &mut self,
        slide_id: &str,
        kind: ElementKind,
        content: Value,
        default_font_size: f64,
    ) -> DocumentResult<ElementId> {
        let slide = self.slide_mut(slide_id)?;
        let el = Element::new(kind, content, slide.next_z_index(), default_font_size);
        if let ElementView::ErrorPlaceholder(err) = el.view() {
            log::debug!("Added element {} with invalid content: {}", el.id, err);
        }
        let id = el.id.clone();
        slide.elements.push(el);
        Ok(id)
    }

    /// Append an existing element (e.g. from a paste), re-id'ing it if the
    /// id is already taken.
    pub fn insert_element(&mut self, slide_id: &str, mut el: Element) -> DocumentResult<ElementId> {
        let slide = self.slide_mut(slide_id)?;
        if slide.element(&el.id).is_some() {
            el.id = element::new_element_id();
        }
        el.style.z_index = slide.top_z_index();
        let id = el.id.clone();
        slide.elements.push(el);
        Ok(id)
    }

    /// Delete elements and drop them from their groups. Groups left empty
    /// are removed. Returns how many were deleted.
    pub fn delete_elements(&mut self, slide_id: &str, ids: &[ElementId]) -> DocumentResult<usize> {
        let slide = self.slide_mut(slide_id)?;
        let before = slide.elements.len();
        slide.elements.retain(|el| !ids.contains(&el.id));
        let removed = before - slide.elements.len();

        if let Some(groups) = self.groups.get_mut(slide_id) {
            for group in groups.iter_mut() {
                group.element_ids.retain(|id| !ids.contains(id));
            }
            groups.retain(|g| !g.element_ids.is_empty());
            if groups.is_empty() {
                self.groups.remove(slide_id);
            }
        }
        Ok(removed)
    }

    /// Copy elements, offsetting them by `offset` percent and stacking the
    /// copies on top. Returns the new ids in the order given.
    pub fn duplicate_elements(
        &mut self,
        slide_id: &str,
        ids: &[ElementId],
        offset: f64,
    ) -> DocumentResult<Vec<ElementId>> {
        let slide = self.slide_mut(slide_id)?;
        let originals = ids
            .iter()
            .map(|id| {
                slide
                    .element(id)
                    .cloned()
                    .ok_or_else(|| DocumentError::ElementNotFound(id.clone()))
            })
            .collect::<DocumentResult<Vec<_>>>()?;

        let mut new_ids = Vec::with_capacity(originals.len());
        for original in originals {
            let mut copy = original.duplicate();
            copy.style.left += offset;
            copy.style.top += offset;
            copy.style.z_index = slide.top_z_index();
            new_ids.push(copy.id.clone());
            slide.elements.push(copy);
        }
        Ok(new_ids)
    }

    /// Move elements to the top of the stack, keeping their relative order.
    pub fn bring_to_front(&mut self, slide_id: &str, ids: &[ElementId]) -> DocumentResult<()> {
        let slide = self.slide_mut(slide_id)?;
        let (mut moved, rest): (Vec<_>, Vec<_>) = slide.elements.drain(..).partition(|el| ids.contains(&el.id));
        let mut top = rest.iter().map(|el| el.style.z_index).max().unwrap_or(0);
        for el in &mut moved {
            top += 1;
            el.style.z_index = top;
        }
        slide.elements = rest;
        slide.elements.extend(moved);
        Ok(())
    }

    /// Move elements to the bottom of the stack, keeping their relative order.
    pub fn send_to_back(&mut self, slide_id: &str, ids: &[ElementId]) -> DocumentResult<()> {
        let slide = self.slide_mut(slide_id)?;
        let (mut moved, rest): (Vec<_>, Vec<_>) = slide.elements.drain(..).partition(|el| ids.contains(&el.id));
        let bottom = rest.iter().map(|el| el.style.z_index).min().unwrap_or(0);
        let count = moved.len() as i64;
        for (i, el) in moved.iter_mut().enumerate() {
            el.style.z_index = bottom - count + i as i64;
        }
        moved.extend(rest);
        slide.elements = moved;
        Ok(())
    }

    /// The group containing `element_id`, if any.
    pub fn group_of(&self, slide_id: &str, element_id: &str) -> Option<&Group> {
        self.groups
            .get(slide_id)?
            .iter()
            .find(|g| g.element_ids.iter().any(|id| id == element_id))
    }

    /// Group at least two live, ungrouped elements.
    pub fn group_elements(&mut self, slide_id: &str, ids: &[ElementId]) -> DocumentResult<GroupId> {
        let slide = self.slide(slide_id)?;
        let mut members: Vec<ElementId> = Vec::new();
        for id in ids {
            if slide.element(id).is_none() {
                return Err(DocumentError::ElementNotFound(id.clone()));
            }
            if self.group_of(slide_id, id).is_some() {
                return Err(DocumentError::AlreadyGrouped(id.clone()));
            }
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
        if members.len() < 2 {
            return Err(DocumentError::NotEnoughElements {
                needed: 2,
                got: members.len(),
            });
        }

        let group = Group {
            id: new_group_id(),
            element_ids: members,
        };
        let id = group.id.clone();
        self.groups.entry(slide_id.to_string()).or_default().push(group);
        Ok(id)
    }

    /// Dissolve a group. Returns its former members.
    pub fn ungroup(&mut self, slide_id: &str, group_id: &str) -> DocumentResult<Vec<ElementId>> {
        let groups = self
            .groups
            .get_mut(slide_id)
            .ok_or_else(|| DocumentError::GroupNotFound(group_id.to_string()))?;
        let index = groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or_else(|| DocumentError::GroupNotFound(group_id.to_string()))?;
        let group = groups.remove(index);
        if groups.is_empty() {
            self.groups.remove(slide_id);
        }
        Ok(group.element_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with(n: usize) -> (Presentation, SlideId, Vec<ElementId>) {
        let mut doc = Presentation::default();
        let slide = doc.slides[0].id.clone();
        let ids = (0..n)
            .map(|i| {
                doc.add_element(&slide, ElementKind::Text, json!(format!("t{i}")), 24.0)
                    .unwrap()
            })
            .collect();
        (doc, slide, ids)
    }

    #[test]
    fn test_json_shape() {
        let (doc, slide, _) = doc_with(1);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["settings"]["width"], json!(1280.0));
        assert_eq!(value["settings"]["globalStyleSheet"], json!(""));
        assert_eq!(value["slides"][0]["id"], json!(slide));
        assert!(value["slides"][0]["elements"][0]["style"]["zIndex"].is_number());

        let back = Presentation::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_add_element_defaults() {
        let (doc, slide, ids) = doc_with(2);
        let el = doc.slide(&slide).unwrap().element(&ids[1]).unwrap();
        assert_eq!(el.style.left, 20.0);
        assert_eq!(el.style.top, 20.0);
        assert_eq!(el.style.z_index, 2);
        assert_eq!(el.style.width, Width::Auto);
    }

    #[test]
    fn test_add_slide_after() {
        let mut doc = Presentation::default();
        let first = doc.slides[0].id.clone();
        let third = doc.add_slide(None);
        let second = doc.add_slide(Some(&first));
        let order: Vec<_> = doc.slides.iter().map(|s| s.id.clone()).collect();
        assert_eq!(order, vec![first, second, third]);
    }

    #[test]
    fn test_delete_last_slide_refused() {
        let mut doc = Presentation::default();
        let only = doc.slides[0].id.clone();
        assert_eq!(doc.delete_slide(&only), Err(DocumentError::LastSlide));
    }

    #[test]
    fn test_delete_slide_falls_back_to_previous() {
        let mut doc = Presentation::default();
        let first = doc.slides[0].id.clone();
        let second = doc.add_slide(Some(&first));
        let third = doc.add_slide(Some(&second));
        assert_eq!(doc.delete_slide(&third).unwrap(), second);
        assert_eq!(doc.delete_slide(&first).unwrap(), second);
    }

    #[test]
    fn test_duplicate_slide_fresh_ids() {
        let (mut doc, slide, ids) = doc_with(2);
        doc.group_elements(&slide, &ids).unwrap();
        let copy = doc.duplicate_slide(&slide).unwrap();

        assert_eq!(doc.slides[1].id, copy);
        let copied = &doc.slides[1];
        assert!(copied.elements.iter().all(|el| !ids.contains(&el.id)));
        let group = &doc.groups[&copy][0];
        assert_eq!(group.element_ids.len(), 2);
        assert!(group.element_ids.iter().all(|id| copied.element(id).is_some()));
        doc.validate().unwrap();
    }

    #[test]
    fn test_move_slide() {
        let mut doc = Presentation::default();
        let a = doc.slides[0].id.clone();
        let b = doc.add_slide(None);
        doc.move_slide(0, 1).unwrap();
        assert_eq!(doc.slides[0].id, b);
        assert_eq!(doc.slides[1].id, a);
        assert!(doc.move_slide(0, 5).is_err());
    }

    #[test]
    fn test_group_integrity_on_delete() {
        let (mut doc, slide, ids) = doc_with(3);
        let group = doc.group_elements(&slide, &ids[..2]).unwrap();

        doc.delete_elements(&slide, &ids[..1]).unwrap();
        let g = &doc.groups[&slide][0];
        assert_eq!(g.id, group);
        assert_eq!(g.element_ids, vec![ids[1].clone()]);

        doc.delete_elements(&slide, &ids[1..2]).unwrap();
        assert!(!doc.groups.contains_key(&slide));
        doc.validate().unwrap();
    }

    #[test]
    fn test_group_rules() {
        let (mut doc, slide, ids) = doc_with(3);
        assert!(matches!(
            doc.group_elements(&slide, &ids[..1]),
            Err(DocumentError::NotEnoughElements { needed: 2, got: 1 })
        ));
        doc.group_elements(&slide, &ids[..2]).unwrap();
        assert!(matches!(
            doc.group_elements(&slide, &ids[1..]),
            Err(DocumentError::AlreadyGrouped(_))
        ));
        let group = doc.groups[&slide][0].id.clone();
        assert_eq!(doc.ungroup(&slide, &group).unwrap().len(), 2);
        assert!(doc.group_of(&slide, &ids[0]).is_none());
    }

    #[test]
    fn test_duplicate_elements_offset() {
        let (mut doc, slide, ids) = doc_with(2);
        let copies = doc.duplicate_elements(&slide, &ids[..1], 2.0).unwrap();
        let s = doc.slide(&slide).unwrap();
        let copy = s.element(&copies[0]).unwrap();
        assert_eq!(copy.style.left, 22.0);
        assert_eq!(copy.style.top, 22.0);
        assert_eq!(copy.style.z_index, 3);
        assert_eq!(s.elements.last().map(|el| el.id.clone()), Some(copies[0].clone()));
    }

    #[test]
    fn test_duplicate_stacks_above_raised_elements() {
        let (mut doc, slide, ids) = doc_with(3);
        doc.bring_to_front(&slide, &ids[..1]).unwrap();
        doc.bring_to_front(&slide, &ids[1..2]).unwrap();
        let copies = doc.duplicate_elements(&slide, &ids[2..], 2.0).unwrap();

        let s = doc.slide(&slide).unwrap();
        let copy = s.element(&copies[0]).unwrap();
        let highest_other = s
            .elements
            .iter()
            .filter(|el| el.id != copies[0])
            .map(|el| el.style.z_index)
            .max()
            .unwrap();
        assert_eq!(highest_other, 5);
        assert_eq!(copy.style.z_index, 6);
    }

    #[test]
    fn test_z_order_ops() {
        let (mut doc, slide, ids) = doc_with(3);
        doc.bring_to_front(&slide, &ids[..1]).unwrap();
        let s = doc.slide(&slide).unwrap();
        assert_eq!(s.elements[2].id, ids[0]);
        assert_eq!(s.elements[2].style.z_index, 4);

        doc.send_to_back(&slide, &ids[2..]).unwrap();
        let s = doc.slide(&slide).unwrap();
        assert_eq!(s.elements[0].id, ids[2]);
        assert!(s.elements[0].style.z_index < s.elements[1].style.z_index);
    }

    #[test]
    fn test_validate_detects_dangling_group() {
        let (mut doc, slide, ids) = doc_with(2);
        doc.groups.insert(
            slide.clone(),
            vec![Group {
                id: "g".into(),
                element_ids: vec![ids[0].clone(), "ghost".into()],
            }],
        );
        assert!(matches!(doc.validate(), Err(DocumentError::DanglingGroupMember(_, _))));
    }
}
