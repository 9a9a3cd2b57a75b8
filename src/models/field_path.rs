//! Field paths into configuration documents.
//!
//! A field path addresses one leaf of a configuration document using dotted
//! object keys and named list selectors, e.g. `pay_components[OT1].factor`.
//! Lists whose elements are all objects with a string `name` are addressed by
//! name; any other array is treated as a single leaf value.
//!
//! Patterns use the same syntax with `*` standing for any key or any name
//! (`allowances[*].*`).

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// An object key.
    Key(String),
    /// A list element selected by its `name` field.
    Named(String),
}

/// A parsed field path.
///
/// # Example
///
/// ```
/// use award_interpreter::models::FieldPath;
///
/// let path: FieldPath = "pay_components[OT1].factor".parse().unwrap();
/// assert_eq!(path.to_string(), "pay_components[OT1].factor");
/// assert_eq!(path.root(), Some("pay_components"));
/// assert_eq!(path.slot_pattern().to_string(), "pay_components[*].factor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Creates a path from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Builds `root.key`.
    pub fn key(root: &str, key: &str) -> Self {
        Self::new(vec![Segment::Key(root.to_string()), Segment::Key(key.to_string())])
    }

    /// Builds `list[name].key`.
    pub fn named(list: &str, name: &str, key: &str) -> Self {
        Self::new(vec![
            Segment::Key(list.to_string()),
            Segment::Named(name.to_string()),
            Segment::Key(key.to_string()),
        ])
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the first key, which names the top-level configuration area.
    pub fn root(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Returns the list element name selected by this path, if any.
    pub fn element_name(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Named(n) => Some(n.as_str()),
            Segment::Key(_) => None,
        })
    }

    /// Returns the last key of the path.
    pub fn leaf_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Replaces every named selector with `*`.
    pub fn slot_pattern(&self) -> FieldPath {
        FieldPath::new(
            self.segments
                .iter()
                .map(|s| match s {
                    Segment::Named(_) => Segment::Named("*".to_string()),
                    other => other.clone(),
                })
                .collect(),
        )
    }

    /// Returns true if this path (used as a pattern) matches `path`.
    pub fn matches(&self, path: &FieldPath) -> bool {
        self.segments.len() == path.segments.len()
            && self
                .segments
                .iter()
                .zip(&path.segments)
                .all(|(pattern, segment)| match (pattern, segment) {
                    (Segment::Key(p), Segment::Key(s)) => p == "*" || p == s,
                    (Segment::Named(p), Segment::Named(s)) => p == "*" || p == s,
                    _ => false,
                })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => write!(f, "{}", k)?,
                Segment::Key(k) => write!(f, ".{}", k)?,
                Segment::Named(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        for part in s.split('.') {
            let (key, rest) = match part.find('[') {
                Some(idx) => (&part[..idx], &part[idx..]),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(format!("empty key in field path '{}'", s));
            }
            segments.push(Segment::Key(key.to_string()));

            let mut rest = rest;
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| format!("unclosed selector in field path '{}'", s))?;
                let name = &rest[1..close];
                if name.is_empty() {
                    return Err(format!("empty selector in field path '{}'", s));
                }
                segments.push(Segment::Named(name.to_string()));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(format!("unexpected '{}' in field path '{}'", rest, s));
                }
            }
        }
        Ok(Self { segments })
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn is_named_list(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.get("name").is_some_and(Value::is_string))
}

/// Flattens a document into `(path, leaf)` pairs in document order.
pub fn flatten(value: &Value) -> Vec<(FieldPath, Value)> {
    let mut out = Vec::new();
    flatten_into(value, &mut Vec::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &mut Vec<Segment>, out: &mut Vec<(FieldPath, Value)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(Segment::Key(key.clone()));
                flatten_into(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) if is_named_list(items) => {
            for item in items {
                let name = item["name"].as_str().unwrap_or_default().to_string();
                prefix.push(Segment::Named(name));
                flatten_into(item, prefix, out);
                prefix.pop();
            }
        }
        leaf => out.push((FieldPath::new(prefix.clone()), leaf.clone())),
    }
}

/// Names of the elements of the top-level list `list`, in document order.
pub fn element_names(document: &Value, list: &str) -> Vec<String> {
    document
        .get(list)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Looks up the value at `path`.
pub fn get<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            Segment::Key(k) => current.as_object()?.get(k)?,
            Segment::Named(n) => current
                .as_array()?
                .iter()
                .find(|item| item.get("name").and_then(Value::as_str) == Some(n))?,
        };
    }
    Some(current)
}

/// Writes `new_value` at `path`.
///
/// Object keys must already exist. A missing named list element is created
/// from `template` (an element of the same list with default values) when one
/// is given; otherwise the write fails.
pub fn set(
    root: &mut Value,
    path: &FieldPath,
    new_value: Value,
    template: Option<&Value>,
) -> Result<(), String> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            Segment::Key(k) => current
                .as_object_mut()
                .and_then(|map| map.get_mut(k))
                .ok_or_else(|| format!("no slot '{}' for {}", k, path))?,
            Segment::Named(n) => {
                let items = current
                    .as_array_mut()
                    .ok_or_else(|| format!("{} does not address a list", path))?;
                let position = items
                    .iter()
                    .position(|item| item.get("name").and_then(Value::as_str) == Some(n));
                let index = match position {
                    Some(index) => index,
                    None => {
                        let mut element = template
                            .cloned()
                            .ok_or_else(|| format!("no element '{}' for {}", n, path))?;
                        if let Some(map) = element.as_object_mut() {
                            map.insert("name".to_string(), Value::String(n.clone()));
                        }
                        items.push(element);
                        items.len() - 1
                    }
                };
                &mut items[index]
            }
        };
    }
    *current = new_value;
    Ok(())
}

/// Compares two leaf values, treating numeric strings and numbers by value.
///
/// # Example
///
/// ```
/// use award_interpreter::models::values_equal;
/// use serde_json::json;
///
/// assert!(values_equal(&json!("38"), &json!("38.0")));
/// assert!(values_equal(&json!("38"), &json!(38)));
/// assert!(!values_equal(&json!("06:00"), &json!("07:00")));
/// ```
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_decimal(a), as_decimal(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Builds an object from ordered `(key, value)` pairs.
pub(crate) fn object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}
