// models/src/properties.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// f64 does not implement `Eq` or `Hash` directly.
/// We need a newtype wrapper to implement these traits manually.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializableFloat(pub f64);

impl PartialEq for SerializableFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for SerializableFloat {}

impl PartialOrd for SerializableFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SerializableFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.to_bits().cmp(&other.0.to_bits())
    }
}
impl std::hash::Hash for SerializableFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Represents a generic property or query-parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(SerializableFloat),
    String(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form used when the value is embedded into a rendered query.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => f.0.to_string(),
            PropertyValue::String(s) => s.clone(),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self { PropertyValue::String(s) }
}
impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self { PropertyValue::String(s.to_string()) }
}
impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self { PropertyValue::Integer(i) }
}
impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self { PropertyValue::Float(SerializableFloat(f)) }
}
impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self { PropertyValue::Boolean(b) }
}

/// A map of property names to their values.
pub type PropertyMap = HashMap<String, PropertyValue>;

/// Query parameters keyed by placeholder name (without the `$` sigil).
pub type ParamMap = HashMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::PropertyValue;

    #[test]
    fn should_expose_string_values_via_as_str() {
        let value = PropertyValue::from("I21.9");
        assert_eq!(value.as_str(), Some("I21.9"));
        assert_eq!(PropertyValue::from(5i64).as_str(), None);
    }

    #[test]
    fn should_render_scalars_as_query_text() {
        assert_eq!(PropertyValue::from(true).render(), "true");
        assert_eq!(PropertyValue::from(42i64).render(), "42");
        assert_eq!(PropertyValue::from("Cardiology").render(), "Cardiology");
    }
}
