//! Value types shared by normalization, evaluation and query results.
//!
//! A query yields a node handle, a fragment of results, a text leaf or a
//! scalar. All of them live in one [`Value`] family so bindings, assignments
//! and imports can pass results around without re-wrapping.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use indexmap::IndexMap;

use crate::tree::NodeId;

/// A string-valued leaf result.
///
/// Every string operation on a `TextLeaf` yields another `TextLeaf`, keeping
/// chained results within the tree-result type family (`:text:trim` is still
/// a text leaf, not a plain string).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextLeaf(pub String);

impl TextLeaf {
    pub fn new(text: impl Into<String>) -> Self {
        TextLeaf(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn trim(&self) -> TextLeaf {
        TextLeaf(self.0.trim().to_string())
    }

    pub fn to_uppercase(&self) -> TextLeaf {
        TextLeaf(self.0.to_uppercase())
    }

    pub fn to_lowercase(&self) -> TextLeaf {
        TextLeaf(self.0.to_lowercase())
    }

    pub fn concat(&self, other: &str) -> TextLeaf {
        let mut out = self.0.clone();
        out.push_str(other);
        TextLeaf(out)
    }

    pub fn replace(&self, from: &str, to: &str) -> TextLeaf {
        TextLeaf(self.0.replace(from, to))
    }

    /// Character slice with JS-style negative indexing.
    pub fn slice(&self, start: i64, end: Option<i64>) -> TextLeaf {
        let chars: Vec<char> = self.0.chars().collect();
        let len = chars.len() as i64;
        let clamp = |i: i64| -> usize {
            let i = if i < 0 { len + i } else { i };
            i.clamp(0, len) as usize
        };
        let from = clamp(start);
        let to = clamp(end.unwrap_or(len));
        if from >= to {
            return TextLeaf(String::new());
        }
        TextLeaf(chars[from..to].iter().collect())
    }
}

impl fmt::Display for TextLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TextLeaf {
    fn from(s: &str) -> Self {
        TextLeaf(s.to_string())
    }
}

/// An ordered, parentless collection of query results.
///
/// Frozen at construction; item nodes keep their real parents. Serialization
/// and recursive query treat the items as children of a synthetic unnamed
/// container, which never owns them.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    items: Arc<[Value]>,
}

impl Fragment {
    pub fn new(items: Vec<Value>) -> Self {
        Fragment {
            items: items.into(),
        }
    }

    pub fn empty() -> Self {
        Fragment { items: Arc::from([]) }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    /// Index with negative-from-end semantics.
    pub fn get(&self, index: i64) -> Option<&Value> {
        let len = self.items.len() as i64;
        let i = if index < 0 { len + index } else { index };
        if i < 0 || i >= len {
            None
        } else {
            Some(&self.items[i as usize])
        }
    }
}

impl FromIterator<Value> for Fragment {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Fragment::new(iter.into_iter().collect())
    }
}

/// The value family produced by normalization, evaluation and queries.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Date(DateTime<FixedOffset>),
    Str(String),
    Text(TextLeaf),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Handle into the tree being queried.
    Node(NodeId),
    Fragment(Fragment),
}

impl Value {
    /// Truthiness: empty-ish values are false, everything else true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Date(_) => true,
            Value::Str(s) => !s.is_empty(),
            Value::Text(t) => !t.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Node(_) => true,
            Value::Fragment(f) => !f.is_empty(),
        }
    }

    /// Numeric coercion. Non-numeric values become NaN; a singleton
    /// collection coerces through its item; dates coerce to epoch seconds.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Text(t) => t.as_str().trim().parse().unwrap_or(f64::NAN),
            Value::Date(d) => d.timestamp_millis() as f64 / 1000.0,
            Value::Array(items) if items.len() == 1 => items[0].as_number(),
            Value::Fragment(f) if f.len() == 1 => f.items()[0].as_number(),
            _ => f64::NAN,
        }
    }

    /// Borrow the string content when this value carries one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Text(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Empty results: `Null` or an empty collection.
    pub fn is_empty_result(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Fragment(f) => f.is_empty(),
            _ => false,
        }
    }

    /// The value's type name, ignoring node/document distinction (which
    /// needs tree access; see `model::type_name`).
    pub fn base_type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::Str(_) => "string",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Node(_) => "node",
            Value::Fragment(_) => "fragment",
        }
    }

    /// Collection items when this value is a collection.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            Value::Fragment(f) => Some(f.items()),
            _ => None,
        }
    }

    /// Convert a JSON document into a value.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render tree-free variants as JSON. Node handles and fragments need
    /// tree access and come out as null here; use `model::to_json_value`
    /// when a tree is at hand.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Text(t) => serde_json::Value::String(t.as_str().to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Node(_) | Value::Fragment(_) => serde_json::Value::Null,
        }
    }
}

/// Number formatting: integral values print without a decimal point.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    /// Display form used by `print`, `join` and interpolation. Node handles
    /// render as an empty string here; tree-aware rendering lives in
    /// `model::display_value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Str(s) => f.write_str(s),
            Value::Text(t) => f.write_str(t.as_str()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Fragment(frag) => {
                f.write_str("[")?;
                for (i, item) in frag.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                let json = serde_json::Value::Object(
                    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                );
                f.write_str(&json.to_string())
            }
            Value::Node(_) => Ok(()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<TextLeaf> for Value {
    fn from(t: TextLeaf) -> Self {
        Value::Text(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Fragment> for Value {
    fn from(f: Fragment) -> Self {
        Value::Fragment(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::Number(2.0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".into()).truthy());
        assert!(!Value::Fragment(Fragment::empty()).truthy());
    }

    #[test]
    fn number_coercion() {
        assert_eq!(Value::Bool(true).as_number(), 1.0);
        assert_eq!(Value::Str(" 42 ".into()).as_number(), 42.0);
        assert!(Value::Str("abc".into()).as_number().is_nan());
        assert_eq!(
            Value::Fragment(Fragment::new(vec![Value::Number(7.0)])).as_number(),
            7.0
        );
    }

    #[test]
    fn display_formats() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(3.25).to_string(), "3.25");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(
            Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn text_leaf_ops_stay_text() {
        let t = TextLeaf::new("  Hello  ");
        assert_eq!(t.trim().as_str(), "Hello");
        assert_eq!(t.trim().to_uppercase().as_str(), "HELLO");
        assert_eq!(TextLeaf::new("abcdef").slice(1, Some(-1)).as_str(), "bcde");
        assert_eq!(TextLeaf::new("abc").slice(-2, None).as_str(), "bc");
    }

    #[test]
    fn fragment_negative_index() {
        let f = Fragment::new(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(f.get(-1), Some(&Value::Number(2.0)));
        assert_eq!(f.get(2), None);
    }

    #[test]
    fn json_round_trip_tree_free() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1.5, true, "x"], "b": null}"#).unwrap();
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), json);
    }
}
