//! Validated paths into the state tree.
//!
//! Dotted strings (`"presentation.slides.0.elements"`) are accepted at the
//! boundary; internally a path is a list of typed segments. The [`paths`]
//! module builds the paths the editor itself uses, so a typo in a field
//! name is caught by the compiler instead of silently creating a new key.

use std::fmt;
use std::str::FromStr;

use super::StoreError;

/// One step in a path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A path from the state root. The empty path is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatePath {
    segments: Vec<Segment>,
}

impl StatePath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. All-digit segments become list indices.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        if path.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                return Err(StoreError::InvalidPath(path.to_string()));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let index = part
                    .parse()
                    .map_err(|_| StoreError::InvalidPath(path.to_string()))?;
                segments.push(Segment::Index(index));
            } else {
                segments.push(Segment::Key(part.to_string()));
            }
        }
        Ok(Self { segments })
    }

    /// Extend with an object key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(Segment::Key(key.into()));
        self
    }

    /// Extend with a list index.
    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<StatePath> {
        let (_, head) = self.segments.split_last()?;
        Some(Self {
            segments: head.to_vec(),
        })
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &StatePath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for StatePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Style fields written by gestures and layout commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleField {
    Left,
    Top,
    Width,
    Height,
    ZIndex,
    Rotation,
    FontSize,
}

impl StyleField {
    /// The JSON key of the field.
    pub fn key(self) -> &'static str {
        match self {
            StyleField::Left => "left",
            StyleField::Top => "top",
            StyleField::Width => "width",
            StyleField::Height => "height",
            StyleField::ZIndex => "zIndex",
            StyleField::Rotation => "rotation",
            StyleField::FontSize => "fontSize",
        }
    }
}

/// Typed accessors for the paths the editor reads and writes.
pub mod paths {
    use super::{StatePath, StyleField};

    pub const PRESENTATION: &str = "presentation";
    pub const ACTIVE_SLIDE_ID: &str = "activeSlideId";
    pub const SELECTED_ELEMENT_IDS: &str = "selectedElementIds";

    pub fn presentation() -> StatePath {
        StatePath::root().key(PRESENTATION)
    }

    pub fn settings() -> StatePath {
        presentation().key("settings")
    }

    pub fn slides() -> StatePath {
        presentation().key("slides")
    }

    pub fn slide(slide: usize) -> StatePath {
        slides().index(slide)
    }

    pub fn elements(slide: usize) -> StatePath {
        self::slide(slide).key("elements")
    }

    pub fn element(slide: usize, element: usize) -> StatePath {
        elements(slide).index(element)
    }

    pub fn element_style(slide: usize, element: usize) -> StatePath {
        self::element(slide, element).key("style")
    }

    pub fn style_field(slide: usize, element: usize, field: StyleField) -> StatePath {
        element_style(slide, element).key(field.key())
    }

    pub fn groups(slide_id: &str) -> StatePath {
        presentation().key("groups").key(slide_id)
    }

    pub fn active_slide_id() -> StatePath {
        StatePath::root().key(ACTIVE_SLIDE_ID)
    }

    pub fn selected_element_ids() -> StatePath {
        StatePath::root().key(SELECTED_ELEMENT_IDS)
    }
}
