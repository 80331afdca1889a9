//! Answer values, field paths and the answer map.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

// ──────────────────────────────────────────────
// FieldPath
// ──────────────────────────────────────────────

/// Dotted path of group ids ending in a field id (`address.state`).
///
/// The empty path is the form root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        FieldPath(String::new())
    }

    pub fn new(path: impl Into<String>) -> Self {
        FieldPath(path.into())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, id: &str) -> FieldPath {
        if self.is_root() {
            FieldPath(id.to_string())
        } else {
            FieldPath(format!("{}.{}", self.0, id))
        }
    }

    pub fn parent(&self) -> FieldPath {
        match self.0.rfind('.') {
            Some(i) => FieldPath(self.0[..i].to_string()),
            None => FieldPath::root(),
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// True for the path itself and every path below it.
    pub fn contains(&self, other: &FieldPath) -> bool {
        if self.is_root() {
            return true;
        }
        other.0 == self.0
            || (other.0.starts_with(&self.0) && other.0.as_bytes().get(self.0.len()) == Some(&b'.'))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> Self {
        FieldPath::new(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ──────────────────────────────────────────────
// AnswerValue
// ──────────────────────────────────────────────

/// A user's answer to one field.
///
/// Numbers use `rust_decimal::Decimal`, never `f64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Text(String),
    Number(Decimal),
    Bool(bool),
    /// Selected options of a checkbox field.
    Choices(Vec<String>),
}

impl AnswerValue {
    /// Empty text or no selected choices.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Text(s) => s.is_empty(),
            AnswerValue::Choices(c) => c.is_empty(),
            AnswerValue::Number(_) | AnswerValue::Bool(_) => false,
        }
    }

    /// Numeric reading of the answer; text is parsed.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AnswerValue::Number(d) => Some(*d),
            AnswerValue::Text(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AnswerValue::Text(_) => "text",
            AnswerValue::Number(_) => "number",
            AnswerValue::Bool(_) => "boolean",
            AnswerValue::Choices(_) => "choices",
        }
    }

    /// Convert a JSON scalar (or string array) into an answer. `null` and
    /// objects have no answer form.
    pub fn from_json(v: &serde_json::Value) -> Option<AnswerValue> {
        match v {
            serde_json::Value::String(s) => Some(AnswerValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(AnswerValue::Bool(*b)),
            serde_json::Value::Number(_) => {
                dynform_schema::parse_decimal(v).map(AnswerValue::Number)
            }
            serde_json::Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(|s| s.to_string()))
                .collect::<Option<Vec<_>>>()
                .map(AnswerValue::Choices),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AnswerValue::Text(s) => serde_json::Value::String(s.clone()),
            AnswerValue::Bool(b) => serde_json::Value::Bool(*b),
            AnswerValue::Number(d) => d
                .normalize()
                .to_string()
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or_else(|_| serde_json::Value::String(d.to_string())),
            AnswerValue::Choices(c) => {
                serde_json::Value::Array(c.iter().cloned().map(serde_json::Value::String).collect())
            }
        }
    }
}

/// String form used for visibility comparison.
impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Text(s) => f.write_str(s),
            AnswerValue::Number(d) => write!(f, "{}", d.normalize()),
            AnswerValue::Bool(b) => write!(f, "{}", b),
            AnswerValue::Choices(c) => f.write_str(&c.join(",")),
        }
    }
}

impl Serialize for AnswerValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        AnswerValue::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        AnswerValue::Text(s)
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        AnswerValue::Bool(b)
    }
}

impl From<i64> for AnswerValue {
    fn from(i: i64) -> Self {
        AnswerValue::Number(Decimal::from(i))
    }
}

impl From<Decimal> for AnswerValue {
    fn from(d: Decimal) -> Self {
        AnswerValue::Number(d)
    }
}

// ──────────────────────────────────────────────
// AnswerMap
// ──────────────────────────────────────────────

/// Current answers keyed by field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnswerMap(pub BTreeMap<FieldPath, AnswerValue>);

impl AnswerMap {
    pub fn new() -> Self {
        AnswerMap(BTreeMap::new())
    }

    pub fn get(&self, path: &FieldPath) -> Option<&AnswerValue> {
        self.0.get(path)
    }

    pub fn insert(&mut self, path: FieldPath, value: AnswerValue) {
        self.0.insert(path, value);
    }

    pub fn remove(&mut self, path: &FieldPath) -> Option<AnswerValue> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Remove the answer at `path` and every answer below it, returning the
    /// removed paths.
    pub fn clear_subtree(&mut self, path: &FieldPath) -> Vec<FieldPath> {
        let doomed: Vec<FieldPath> = self
            .0
            .range(path.clone()..)
            .take_while(|(k, _)| k.as_str().starts_with(path.as_str()))
            .filter(|(k, _)| path.contains(k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.0.remove(key);
        }
        doomed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &AnswerValue)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_child_and_parent() {
        let root = FieldPath::root();
        let group = root.child("address");
        let leaf = group.child("state");
        assert_eq!(leaf.as_str(), "address.state");
        assert_eq!(leaf.parent(), group);
        assert_eq!(group.parent(), root);
        assert_eq!(leaf.segments().collect::<Vec<_>>(), vec!["address", "state"]);
    }

    #[test]
    fn path_contains_respects_segment_boundaries() {
        let a = FieldPath::new("addr");
        assert!(a.contains(&FieldPath::new("addr")));
        assert!(a.contains(&FieldPath::new("addr.zip")));
        assert!(!a.contains(&FieldPath::new("address")));
        assert!(FieldPath::root().contains(&a));
    }

    #[test]
    fn clear_subtree_leaves_lookalike_siblings() {
        let mut answers = AnswerMap::new();
        answers.insert("addr".into(), "x".into());
        answers.insert("addr.zip".into(), "12345".into());
        answers.insert("addr.inner.city".into(), "Oslo".into());
        answers.insert("address".into(), "keep".into());
        answers.insert("b".into(), "keep".into());

        let removed = answers.clear_subtree(&FieldPath::new("addr"));
        assert_eq!(removed.len(), 3);
        assert_eq!(answers.len(), 2);
        assert!(answers.get(&FieldPath::new("address")).is_some());
    }

    #[test]
    fn display_normalizes_numbers() {
        let v = AnswerValue::Number(Decimal::from_str("5.00").unwrap());
        assert_eq!(v.to_string(), "5");
        assert_eq!(AnswerValue::Bool(true).to_string(), "true");
        assert_eq!(
            AnswerValue::Choices(vec!["a".into(), "b".into()]).to_string(),
            "a,b"
        );
    }

    #[test]
    fn json_conversion() {
        assert_eq!(AnswerValue::from_json(&json!("x")), Some("x".into()));
        assert_eq!(AnswerValue::from_json(&json!(3)), Some(AnswerValue::from(3)));
        assert_eq!(
            AnswerValue::from_json(&json!(["a"])),
            Some(AnswerValue::Choices(vec!["a".into()]))
        );
        assert_eq!(AnswerValue::from_json(&json!(null)), None);
        assert_eq!(AnswerValue::from_json(&json!([1])), None);

        assert_eq!(AnswerValue::from(7).to_json(), json!(7));
        assert_eq!(
            AnswerValue::Number(Decimal::from_str("2.50").unwrap()).to_json(),
            json!(2.5)
        );
    }

    #[test]
    fn text_numbers_parse() {
        assert_eq!(
            AnswerValue::from(" 12 ").as_decimal(),
            Some(Decimal::from(12))
        );
        assert_eq!(AnswerValue::from("twelve").as_decimal(), None);
    }
}
