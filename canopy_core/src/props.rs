// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed attribute maps.
//!
//! [`Props`] is an ordered map from attribute name to [`Value`]. Host
//! renderers diff two `Props` to build update payloads; class components use
//! the same type for their local state.

use alloc::collections::BTreeMap;
use alloc::collections::btree_map;
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

use kurbo::{Point, Rect, Vec2};

/// Attribute names that are never copied by [`Props::spread`].
///
/// Spreading an untrusted map must not be able to smuggle in a prototype
/// override for hosts that forward attributes to a script runtime.
pub const RESERVED_KEYS: &[&str] = &["__proto__"];

/// A single attribute value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Absent or cleared.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Shared string.
    Str(Rc<str>),
    /// A position.
    Point(Point),
    /// An offset or size.
    Vec2(Vec2),
    /// A rectangle.
    Rect(Rect),
    /// A list of values.
    List(Rc<[Value]>),
}

impl Value {
    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the number as `f64`, converting integers.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "attribute integers are small; f64 is the common numeric view"
    )]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the point, if this is one.
    #[must_use]
    pub fn as_point(&self) -> Option<Point> {
        match self {
            Self::Point(p) => Some(*p),
            _ => None,
        }
    }

    /// Returns the rectangle, if this is one.
    #[must_use]
    pub fn as_rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Point(p) => write!(f, "({}, {})", p.x, p.y),
            Self::Vec2(v) => write!(f, "<{}, {}>", v.x, v.y),
            Self::Rect(r) => write!(f, "[{}, {}, {}, {}]", r.x0, r.y0, r.x1, r.y1),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Self::Str(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Self::Point(v)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Rect> for Value {
    fn from(v: Rect) -> Self {
        Self::Rect(v)
    }
}

/// Ordered attribute map.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    attrs: BTreeMap<String, Value>,
}

/// Component-local state. Same shape as props.
pub type State = Props;

impl Props {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attrs: BTreeMap::new(),
        }
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets an attribute, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.insert(key.into(), value.into())
    }

    /// Returns an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Removes an attribute.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.attrs.iter()
    }

    /// Copies every attribute of `other` into `self`, overwriting existing
    /// keys. Keys in [`RESERVED_KEYS`] are skipped.
    pub fn spread(&mut self, other: &Self) {
        for (key, value) in &other.attrs {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.attrs.insert(key.clone(), value.clone());
        }
    }

    /// Returns `self` with `partial` spread over it.
    #[must_use]
    pub fn merged(&self, partial: &Self) -> Self {
        let mut out = self.clone();
        out.spread(partial);
        out
    }

    /// Lists the attribute changes from `self` to `next`.
    ///
    /// Removed keys appear with [`Value::Null`]. Returns an empty list when
    /// the maps are equal.
    #[must_use]
    pub fn diff(&self, next: &Self) -> alloc::vec::Vec<(String, Value)> {
        let mut changes = alloc::vec::Vec::new();
        for key in self.attrs.keys() {
            if !next.attrs.contains_key(key) {
                changes.push((key.clone(), Value::Null));
            }
        }
        for (key, value) in &next.attrs {
            if self.attrs.get(key) != Some(value) {
                changes.push((key.clone(), value.clone()));
            }
        }
        changes
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.attrs.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (key, value) in iter {
            props.set(key, value);
        }
        props
    }
}

impl<'a> IntoIterator for &'a Props {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn spread_overwrites_and_skips_proto() {
        let mut base = Props::new().with("a", 1).with("b", "x");
        let other = Props::new().with("b", "y").with("__proto__", true).with("c", 2.5);
        base.spread(&other);
        assert_eq!(base.get("b"), Some(&Value::from("y")));
        assert_eq!(base.get("c").and_then(Value::as_f64), Some(2.5));
        assert!(!base.contains("__proto__"));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn diff_reports_changes_and_removals() {
        let old = Props::new().with("a", 1).with("b", 2);
        let new = Props::new().with("b", 3).with("c", 4);
        let changes = old.diff(&new);
        assert_eq!(
            changes,
            [
                ("a".to_string(), Value::Null),
                ("b".to_string(), Value::Int(3)),
                ("c".to_string(), Value::Int(4)),
            ]
        );
        assert!(new.diff(&new.clone()).is_empty());
    }

    #[test]
    fn geometry_values() {
        let props = Props::new()
            .with("origin", Point::new(1.0, 2.0))
            .with("bounds", Rect::new(0.0, 0.0, 10.0, 5.0));
        assert_eq!(props.get("origin").and_then(Value::as_point), Some(Point::new(1.0, 2.0)));
        assert_eq!(
            props.get("bounds").and_then(Value::as_rect).map(|r| r.width()),
            Some(10.0)
        );
        assert_eq!(props.get("bounds").map(ToString::to_string).as_deref(), Some("[0, 0, 10, 5]"));
    }

    #[test]
    fn collects_from_pairs() {
        let props: Props = [("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(props.iter().count(), 2);
        assert_eq!(props.get("y").and_then(Value::as_int), Some(2));
    }
}
