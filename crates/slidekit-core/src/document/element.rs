//! Slide elements: kind tag, variant content and style.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Element identifier (unique within a slide).
pub type ElementId = String;

/// Generate a fresh element id.
pub fn new_element_id() -> ElementId {
    format!("el-{}", Uuid::new_v4().simple())
}

/// The fixed set of element kinds. Unrecognized tags are kept verbatim so
/// that a document from a newer editor survives a load/save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Text,
    Image,
    Video,
    Chart,
    Table,
    Icon,
    Iframe,
    Shape,
    /// A tag outside the known set.
    Unknown(String),
}

impl ElementKind {
    /// The wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Image => "image",
            ElementKind::Video => "video",
            ElementKind::Chart => "chart",
            ElementKind::Table => "table",
            ElementKind::Icon => "icon",
            ElementKind::Iframe => "iframe",
            ElementKind::Shape => "shape",
            ElementKind::Unknown(tag) => tag,
        }
    }

    /// Icons keep their aspect ratio while resizing.
    pub fn is_aspect_locked(&self) -> bool {
        matches!(self, ElementKind::Icon)
    }

    /// Text and icons scale their font size with their width.
    pub fn scales_font(&self) -> bool {
        matches!(self, ElementKind::Text | ElementKind::Icon)
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => ElementKind::Text,
            "image" => ElementKind::Image,
            "video" => ElementKind::Video,
            "chart" => ElementKind::Chart,
            "table" => ElementKind::Table,
            "icon" => ElementKind::Icon,
            "iframe" => ElementKind::Iframe,
            "shape" => ElementKind::Shape,
            _ => ElementKind::Unknown(tag),
        }
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element width: a percentage of the canvas width, or intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Width {
    Percent(f64),
    #[default]
    Auto,
}

impl Width {
    /// The percentage, if explicit.
    pub fn percent(self) -> Option<f64> {
        match self {
            Width::Percent(p) => Some(p),
            Width::Auto => None,
        }
    }
}

impl Serialize for Width {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Width::Percent(p) => serializer.serialize_f64(*p),
            Width::Auto => serializer.serialize_str("auto"),
        }
    }
}

impl<'de> Deserialize<'de> for Width {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older documents store icons with `width: null`.
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .map(Width::Percent)
                .ok_or_else(|| de::Error::custom("width is not a finite number")),
            Value::String(s) if s == "auto" => Ok(Width::Auto),
            Value::Null => Ok(Width::Auto),
            other => Err(de::Error::custom(format!("invalid width: {other}"))),
        }
    }
}

/// Geometry and presentation style of an element.
///
/// `top`/`left`/`width`/`height` are percentages of the canvas height/width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    pub top: f64,
    pub left: f64,
    #[serde(default)]
    pub width: Width,
    /// `None` = intrinsic height.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub z_index: i64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Remaining presentational properties (color, fontFamily, animation, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            top: 20.0,
            left: 20.0,
            width: Width::Percent(30.0),
            height: None,
            z_index: 1,
            rotation: 0.0,
            font_size: None,
            extra: Map::new(),
        }
    }
}

/// An element on a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Raw, variant-specific payload. Use [`Element::content`] for the typed view.
    #[serde(default)]
    pub content: Value,
    pub style: ElementStyle,
    /// Extra top-level fields some kinds carry (e.g. `iconType`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Content failed its variant's invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown element type `{0}`")]
    UnknownKind(String),
    #[error("invalid {kind} content: {reason}")]
    InvalidContent { kind: ElementKind, reason: String },
}

/// Video payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoContent {
    pub url: String,
    #[serde(default)]
    pub autoplay: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default = "default_true")]
    pub controls: bool,
}

fn default_true() -> bool {
    true
}

/// Chart payload; the data/options are opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartContent {
    #[serde(rename = "type")]
    pub chart_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub options: Value,
}

/// Table payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<String>>,
}

/// Embedded frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IframeContent {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

/// Typed view of an element's content.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementContent {
    Text(String),
    /// Data URL, http(s) URL or blob URL.
    Image(String),
    Video(VideoContent),
    Chart(ChartContent),
    Table(TableContent),
    /// Icon class string.
    Icon(String),
    Iframe(IframeContent),
    Shape(Value),
}

type Decoder = fn(&Value) -> Result<ElementContent, String>;

/// Per-kind content decoder, resolved statically.
fn decoder_for(kind: &ElementKind) -> Option<Decoder> {
    match kind {
        ElementKind::Text => Some(decode_text),
        ElementKind::Image => Some(decode_image),
        ElementKind::Video => Some(decode_video),
        ElementKind::Chart => Some(decode_chart),
        ElementKind::Table => Some(decode_table),
        ElementKind::Icon => Some(decode_icon),
        ElementKind::Iframe => Some(decode_iframe),
        ElementKind::Shape => Some(decode_shape),
        ElementKind::Unknown(_) => None,
    }
}

fn decode_text(value: &Value) -> Result<ElementContent, String> {
    match value {
        Value::String(s) => Ok(ElementContent::Text(s.clone())),
        Value::Null => Ok(ElementContent::Text(String::new())),
        _ => Err("expected a string".into()),
    }
}

fn decode_icon(value: &Value) -> Result<ElementContent, String> {
    match value {
        Value::String(s) => Ok(ElementContent::Icon(s.clone())),
        _ => Err("expected an icon class string".into()),
    }
}

fn decode_image(value: &Value) -> Result<ElementContent, String> {
    match value {
        Value::String(s) if s.starts_with("data:") || s.starts_with("http") || s.starts_with("blob:") => {
            Ok(ElementContent::Image(s.clone()))
        }
        Value::String(_) => Err("source must be a data:, http or blob: URL".into()),
        _ => Err("expected a source string".into()),
    }
}

fn decode_video(value: &Value) -> Result<ElementContent, String> {
    serde_json::from_value(value.clone())
        .map(ElementContent::Video)
        .map_err(|e| e.to_string())
}

fn decode_chart(value: &Value) -> Result<ElementContent, String> {
    serde_json::from_value(value.clone())
        .map(ElementContent::Chart)
        .map_err(|e| e.to_string())
}

fn decode_table(value: &Value) -> Result<ElementContent, String> {
    let table: TableContent = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if table.data.len() != table.rows || table.data.iter().any(|row| row.len() != table.cols) {
        return Err(format!("data does not match {}x{}", table.rows, table.cols));
    }
    Ok(ElementContent::Table(table))
}

fn decode_iframe(value: &Value) -> Result<ElementContent, String> {
    serde_json::from_value(value.clone())
        .map(ElementContent::Iframe)
        .map_err(|e| e.to_string())
}

fn decode_shape(value: &Value) -> Result<ElementContent, String> {
    Ok(ElementContent::Shape(value.clone()))
}

/// What the renderer should draw for an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementView {
    Content(ElementContent),
    /// Visible error placeholder; the raw content is still stored.
    ErrorPlaceholder(ValidationError),
}

impl Element {
    /// Create an element with the default geometry for its kind.
    pub fn new(kind: ElementKind, content: Value, z_index: i64, default_font_size: f64) -> Self {
        let mut style = ElementStyle {
            z_index,
            ..ElementStyle::default()
        };
        match kind {
            ElementKind::Text => {
                style.width = Width::Auto;
                style.font_size = Some(default_font_size);
            }
            ElementKind::Image | ElementKind::Video | ElementKind::Table => {
                style.height = Some(30.0);
            }
            ElementKind::Iframe => {
                style.width = Width::Percent(50.0);
                style.height = Some(50.0);
            }
            ElementKind::Icon => {
                style.width = Width::Auto;
                style.font_size = Some(48.0);
            }
            _ => {}
        }
        Self {
            id: new_element_id(),
            kind,
            content,
            style,
            extra: Map::new(),
        }
    }

    /// Decode the typed content for this element's kind.
    pub fn content(&self) -> Result<ElementContent, ValidationError> {
        let decode = decoder_for(&self.kind)
            .ok_or_else(|| ValidationError::UnknownKind(self.kind.as_str().to_string()))?;
        decode(&self.content).map_err(|reason| ValidationError::InvalidContent {
            kind: self.kind.clone(),
            reason,
        })
    }

    /// The renderable view: typed content, or an error placeholder.
    pub fn view(&self) -> ElementView {
        match self.content() {
            Ok(content) => ElementView::Content(content),
            Err(err) => {
                log::warn!("Element {} renders as placeholder: {}", self.id, err);
                ElementView::ErrorPlaceholder(err)
            }
        }
    }

    /// Deep copy with a fresh id.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = new_element_id();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_element_json_shape() {
        let el: Element = serde_json::from_value(json!({
            "id": "el-1",
            "type": "text",
            "content": "Hello",
            "style": {"top": 10, "left": 5.5, "width": "auto", "height": null, "zIndex": 3, "rotation": 0, "fontSize": 24, "color": "#212529"}
        }))
        .unwrap();

        assert_eq!(el.kind, ElementKind::Text);
        assert_eq!(el.style.width, Width::Auto);
        assert_eq!(el.style.height, None);
        assert_eq!(el.style.z_index, 3);
        assert_eq!(el.style.extra.get("color"), Some(&json!("#212529")));
        assert_eq!(el.content().unwrap(), ElementContent::Text("Hello".into()));

        let back = serde_json::to_value(&el).unwrap();
        assert_eq!(back["type"], json!("text"));
        assert_eq!(back["style"]["zIndex"], json!(3));
        assert_eq!(back["style"]["width"], json!("auto"));
    }

    #[test]
    fn test_unknown_kind_is_placeholder() {
        let el: Element = serde_json::from_value(json!({
            "id": "el-2",
            "type": "hologram",
            "content": {"beam": 1},
            "style": {"top": 0, "left": 0, "width": 10}
        }))
        .unwrap();

        assert_eq!(el.kind, ElementKind::Unknown("hologram".into()));
        assert!(matches!(el.view(), ElementView::ErrorPlaceholder(ValidationError::UnknownKind(_))));
        // Raw content survives serialization.
        let back = serde_json::to_value(&el).unwrap();
        assert_eq!(back["type"], json!("hologram"));
        assert_eq!(back["content"], json!({"beam": 1}));
    }

    #[test]
    fn test_invalid_image_source() {
        let mut el = Element::new(ElementKind::Image, json!("ftp://nope"), 1, 24.0);
        assert!(matches!(el.content(), Err(ValidationError::InvalidContent { .. })));

        el.content = json!("data:image/png;base64,AAAA");
        assert!(matches!(el.content(), Ok(ElementContent::Image(_))));
    }

    #[test]
    fn test_table_shape_checked() {
        let el = Element::new(
            ElementKind::Table,
            json!({"rows": 2, "cols": 2, "data": [["a", "b"], ["c"]]}),
            1,
            24.0,
        );
        assert!(el.content().is_err());
    }

    #[test]
    fn test_defaults_per_kind() {
        let text = Element::new(ElementKind::Text, json!("hi"), 4, 24.0);
        assert_eq!(text.style.width, Width::Auto);
        assert_eq!(text.style.font_size, Some(24.0));
        assert_eq!(text.style.z_index, 4);

        let frame = Element::new(ElementKind::Iframe, json!({"url": "https://example.com"}), 1, 24.0);
        assert_eq!(frame.style.width, Width::Percent(50.0));
        assert_eq!(frame.style.height, Some(50.0));
    }

    #[test]
    fn test_null_width_reads_as_auto() {
        let style: ElementStyle = serde_json::from_value(json!({"top": 1, "left": 2, "width": null})).unwrap();
        assert_eq!(style.width, Width::Auto);
    }
}
