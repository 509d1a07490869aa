use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{KeystoneError, KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// Reference to an entity owned by another vendor application:
/// `vendor/app/type/id`.
///
/// Parsing reads components right to left, so `id`, `type/id` and
/// `app/type/id` are all accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId {
    pub vendor_id: String,
    pub app_id: String,
    pub entity_type: String,
    pub id: String,
}

impl ExternalId {
    pub fn new(
        vendor_id: impl Into<String>,
        app_id: impl Into<String>,
        entity_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            app_id: app_id.into(),
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn parse(text: &str) -> Self {
        let mut parts = text.rsplitn(4, '/');
        let id = parts.next().unwrap_or_default().to_string();
        let entity_type = parts.next().unwrap_or_default().to_string();
        let app_id = parts.next().unwrap_or_default().to_string();
        let vendor_id = parts.next().unwrap_or_default().to_string();
        Self {
            vendor_id,
            app_id,
            entity_type,
            id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_empty() && self.app_id.is_empty() && self.entity_type.is_empty() && self.id.is_empty()
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.vendor_id.is_empty() {
            write!(f, "{}/{}/{}/{}", self.vendor_id, self.app_id, self.entity_type, self.id)
        } else if !self.app_id.is_empty() {
            write!(f, "{}/{}/{}", self.app_id, self.entity_type, self.id)
        } else if !self.entity_type.is_empty() {
            write!(f, "{}/{}", self.entity_type, self.id)
        } else {
            f.write_str(&self.id)
        }
    }
}

impl FromStr for ExternalId {
    type Err = KeystoneError;

    fn from_str(text: &str) -> Result<Self> {
        Ok(Self::parse(text))
    }
}

impl ValueMarshaler for ExternalId {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::text(self.to_string()))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = Self::parse(&value.text);
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Text)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

crate::value_field!(ExternalId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_the_right() {
        assert_eq!(ExternalId::parse("abc"), ExternalId::new("", "", "", "abc"));
        assert_eq!(ExternalId::parse("user/abc"), ExternalId::new("", "", "user", "abc"));
        assert_eq!(
            ExternalId::parse("crm/user/abc"),
            ExternalId::new("", "crm", "user", "abc")
        );
        assert_eq!(
            ExternalId::parse("acme/crm/user/abc"),
            ExternalId::new("acme", "crm", "user", "abc")
        );
    }

    #[test]
    fn extra_segments_stay_with_vendor() {
        let parsed = ExternalId::parse("a/b/c/d/e");
        assert_eq!(parsed.vendor_id, "a/b");
        assert_eq!(parsed.id, "e");
    }

    #[test]
    fn display_is_shortest_form() {
        for text in ["abc", "user/abc", "crm/user/abc", "acme/crm/user/abc"] {
            assert_eq!(ExternalId::parse(text).to_string(), text);
        }
    }
}
