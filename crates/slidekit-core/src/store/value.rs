//! Persistent state tree.
//!
//! Containers sit behind `Arc`, so cloning a tree is cheap and a write
//! only copies the nodes along the written path. Untouched branches keep
//! their pointer identity, which is what change detection relies on.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::StoreError;
use super::path::{Segment, StatePath};

/// A node in the state tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    List(Arc<Vec<StateValue>>),
    Map(Arc<BTreeMap<String, StateValue>>),
}

impl StateValue {
    /// An empty map node.
    pub fn map() -> Self {
        StateValue::Map(Arc::new(BTreeMap::new()))
    }

    /// Build a tree from any serializable value.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, StoreError> {
        serde_json::to_value(value)
            .map(StateValue::from)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode this tree into a typed value.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::from(self)).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::List(items) => Some(items),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StateValue::Null => "null",
            StateValue::Bool(_) => "bool",
            StateValue::Number(_) => "number",
            StateValue::String(_) => "string",
            StateValue::List(_) => "list",
            StateValue::Map(_) => "map",
        }
    }

    /// Identity comparison: containers by pointer, scalars by value.
    pub fn same(&self, other: &StateValue) -> bool {
        match (self, other) {
            (StateValue::List(a), StateValue::List(b)) => Arc::ptr_eq(a, b),
            (StateValue::Map(a), StateValue::Map(b)) => Arc::ptr_eq(a, b),
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::List(_) | StateValue::Map(_), _) | (_, StateValue::List(_) | StateValue::Map(_)) => false,
            (a, b) => a == b,
        }
    }

    /// Child at one segment. Index segments also address map keys.
    pub fn child(&self, segment: &Segment) -> Option<&StateValue> {
        match (self, segment) {
            (StateValue::Map(map), Segment::Key(key)) => map.get(key),
            (StateValue::Map(map), Segment::Index(index)) => map.get(&index.to_string()),
            (StateValue::List(items), Segment::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    /// Value at `path`, or `None` if any step does not resolve.
    pub fn get(&self, path: &StatePath) -> Option<&StateValue> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Replace the value at `path`, copying only the nodes along it.
    ///
    /// Null intermediates become empty maps. A list index equal to the
    /// length appends.
    pub fn set(&mut self, path: &StatePath, value: StateValue) -> Result<(), StoreError> {
        let mut node = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            if node.is_null() {
                *node = StateValue::map();
            }
            let found = node.kind();
            node = match (node, segment) {
                (StateValue::Map(map), segment) => {
                    let key = match segment {
                        Segment::Key(key) => key.clone(),
                        Segment::Index(index) => index.to_string(),
                    };
                    Arc::make_mut(map).entry(key).or_default()
                }
                (StateValue::List(items), Segment::Index(index)) => {
                    let items = Arc::make_mut(items);
                    if *index == items.len() {
                        items.push(StateValue::Null);
                    }
                    let len = items.len();
                    items.get_mut(*index).ok_or_else(|| StoreError::IndexOutOfBounds {
                        path: prefix(path, depth),
                        index: *index,
                        len,
                    })?
                }
                _ => {
                    return Err(StoreError::PathConflict {
                        path: prefix(path, depth),
                        found,
                    });
                }
            };
        }
        let mut value = value;
        value.share_with(node);
        *node = value;
        Ok(())
    }

    /// Reuse `old`'s nodes wherever this tree is deep-equal to them, so
    /// replacing a subtree with an equal copy does not change identity.
    pub fn share_with(&mut self, old: &StateValue) {
        if self == old {
            *self = old.clone();
            return;
        }
        match (self, old) {
            (StateValue::Map(new), StateValue::Map(old)) => {
                for (key, child) in Arc::make_mut(new).iter_mut() {
                    if let Some(old_child) = old.get(key) {
                        child.share_with(old_child);
                    }
                }
            }
            (StateValue::List(new), StateValue::List(old)) => {
                for (child, old_child) in Arc::make_mut(new).iter_mut().zip(old.iter()) {
                    child.share_with(old_child);
                }
            }
            _ => {}
        }
    }
}

fn prefix(path: &StatePath, depth: usize) -> String {
    let mut partial = StatePath::root();
    for segment in &path.segments()[..depth] {
        partial = match segment {
            Segment::Key(key) => partial.key(key.clone()),
            Segment::Index(index) => partial.index(*index),
        };
    }
    partial.to_string()
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(b),
            Value::Number(n) => n.as_f64().map_or(StateValue::Null, StateValue::Number),
            Value::String(s) => StateValue::String(s.into()),
            Value::Array(items) => StateValue::List(Arc::new(items.into_iter().map(StateValue::from).collect())),
            Value::Object(map) => StateValue::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, StateValue::from(v))).collect(),
            )),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    // Integral values go out as integers so `zIndex` stays an integer.
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&StateValue> for Value {
    fn from(value: &StateValue) -> Self {
        match value {
            StateValue::Null => Value::Null,
            StateValue::Bool(b) => Value::Bool(*b),
            StateValue::Number(n) => number_to_json(*n),
            StateValue::String(s) => Value::String(s.to_string()),
            StateValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            StateValue::Map(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()),
        }
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        StateValue::Number(n)
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        StateValue::Number(n as f64)
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::String(s.into())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::String(s.into())
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(StateValue::Null, Into::into)
    }
}

impl<T: Into<StateValue>> From<Vec<T>> for StateValue {
    fn from(items: Vec<T>) -> Self {
        StateValue::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StateValue::Null => serializer.serialize_unit(),
            StateValue::Bool(b) => serializer.serialize_bool(*b),
            StateValue::Number(n) => number_to_json(*n).serialize(serializer),
            StateValue::String(s) => serializer.serialize_str(s),
            StateValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            StateValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(StateValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> StateValue {
        StateValue::from(json!({
            "a": {"b": [1, 2, {"c": "x"}]},
            "d": {"e": true}
        }))
    }

    #[test]
    fn test_get_paths() {
        let t = tree();
        assert_eq!(t.get(&StatePath::parse("a.b.1").unwrap()), Some(&StateValue::Number(2.0)));
        assert_eq!(t.get(&StatePath::parse("a.b.2.c").unwrap()).and_then(|v| v.as_str()), Some("x"));
        assert_eq!(t.get(&StatePath::parse("a.missing.deeper").unwrap()), None);
        assert_eq!(t.get(&StatePath::root()), Some(&t));
    }

    #[test]
    fn test_set_copy_on_write() {
        let before = tree();
        let mut after = before.clone();
        after.set(&StatePath::parse("a.b.0").unwrap(), 10.0.into()).unwrap();

        // Previous snapshot untouched.
        assert_eq!(before.get(&StatePath::parse("a.b.0").unwrap()), Some(&StateValue::Number(1.0)));
        assert_eq!(after.get(&StatePath::parse("a.b.0").unwrap()), Some(&StateValue::Number(10.0)));

        // Sibling branch shares identity; written branch does not.
        let d = StatePath::parse("d").unwrap();
        let a = StatePath::parse("a").unwrap();
        assert!(before.get(&d).unwrap().same(after.get(&d).unwrap()));
        assert!(!before.get(&a).unwrap().same(after.get(&a).unwrap()));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut t = StateValue::Null;
        t.set(&StatePath::parse("x.y.z").unwrap(), "v".into()).unwrap();
        assert_eq!(Value::from(&t), json!({"x": {"y": {"z": "v"}}}));
    }

    #[test]
    fn test_set_list_append_and_bounds() {
        let mut t = tree();
        t.set(&StatePath::parse("a.b.3").unwrap(), 4.0.into()).unwrap();
        assert_eq!(t.get(&StatePath::parse("a.b").unwrap()).and_then(|v| v.as_list()).map(|l| l.len()), Some(4));

        let err = t.set(&StatePath::parse("a.b.9").unwrap(), 0.0.into()).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfBounds { index: 9, len: 4, .. }));
    }

    #[test]
    fn test_set_through_scalar_is_conflict() {
        let mut t = tree();
        let err = t.set(&StatePath::parse("d.e.f").unwrap(), 1.0.into()).unwrap_err();
        assert!(matches!(err, StoreError::PathConflict { found: "bool", .. }));
    }

    #[test]
    fn test_equal_write_keeps_identity() {
        let before = tree();
        let mut after = before.clone();
        let copy = StateValue::from(json!({"b": [1, 2, {"c": "x"}]}));
        after.set(&StatePath::parse("a").unwrap(), copy).unwrap();
        let a = StatePath::parse("a").unwrap();
        assert!(before.get(&a).unwrap().same(after.get(&a).unwrap()));
    }

    #[test]
    fn test_json_roundtrip_keeps_integers() {
        let t = StateValue::from(json!({"zIndex": 3, "left": 12.5}));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!({"zIndex": 3, "left": 12.5}));
    }
}
