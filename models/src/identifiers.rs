use core::{hash::Hash, ops::Deref};
use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use internment::Intern;
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializableInternString(pub Intern<String>);

impl From<Intern<String>> for SerializableInternString {
    fn from(intern_str: Intern<String>) -> Self {
        SerializableInternString(intern_str)
    }
}

impl AsRef<str> for SerializableInternString {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Deref for SerializableInternString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl fmt::Display for SerializableInternString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interned identifier used for vertex labels and edge type names.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Identifier(pub SerializableInternString);

impl Identifier {
    pub fn new(value: String) -> ValidationResult<Self> {
        if value.is_empty() || value.len() > u8::MAX as usize {
            return Err(ValidationError::InvalidIdentifierLength);
        }
        Ok(Self(SerializableInternString(Intern::new(value))))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Deref for Identifier {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Generates a 24-character lowercase hex record id.
///
/// Match records and other audit rows use CHAR(24) ids; derived from a
/// v4 UUID so collisions are as unlikely as the UUID space allows.
pub fn generate_record_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..24].to_string()
}

#[cfg(test)]
mod tests {
    use super::{generate_record_id, Identifier};
    use crate::errors::ValidationError;
    use core::str::FromStr;

    #[test]
    fn should_not_create_empty_identifier() {
        let identifier = Identifier::new("".to_string());
        assert!(identifier.is_err());
        assert_eq!(identifier.unwrap_err(), ValidationError::InvalidIdentifierLength);
    }

    #[test]
    fn should_not_create_too_long_identifier() {
        let identifier = Identifier::new("a".repeat(256));
        assert!(identifier.is_err());
        assert_eq!(identifier.unwrap_err(), ValidationError::InvalidIdentifierLength);
    }

    #[test]
    fn should_create_identifier() {
        let identifier = Identifier::new("Doctor".to_string());
        assert!(identifier.is_ok());
        assert_eq!(identifier.unwrap().as_ref(), "Doctor");
    }

    #[test]
    fn should_convert_identifier_from_str() {
        let identifier = Identifier::from_str("TREATED");
        assert!(identifier.is_ok());
        assert_eq!(identifier.unwrap().as_ref(), "TREATED");
    }

    #[test]
    fn should_generate_24_char_hex_record_id() {
        let id = generate_record_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
