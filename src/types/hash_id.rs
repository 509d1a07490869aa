use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{KeystoneError, KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// Key the server hashes into an entity id, stored as `#raw#` or
/// `#raw#-child`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashId {
    raw: String,
    child: Option<String>,
}

impl HashId {
    /// The raw key must be non-empty and free of `#`.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self { raw, child: None })
    }

    /// Id of a child keyed under this hash.
    pub fn with_child(mut self, child: impl Into<String>) -> Result<Self> {
        let child = child.into();
        validate(&child)?;
        self.child = Some(child);
        Ok(self)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn child(&self) -> Option<&str> {
        self.child.as_deref()
    }

    /// Parses the stored `#raw#` / `#raw#-child` form.
    pub fn parse(stored: &str) -> Result<Self> {
        let invalid = || KeystoneError::InvalidHashId(stored.to_string());
        let body = stored.strip_prefix('#').ok_or_else(invalid)?;
        let (raw, rest) = body.split_once('#').ok_or_else(invalid)?;
        let hash = Self::new(raw).map_err(|_| invalid())?;
        match rest {
            "" => Ok(hash),
            _ => {
                let child = rest.strip_prefix('-').ok_or_else(invalid)?;
                hash.with_child(child).map_err(|_| invalid())
            }
        }
    }
}

fn validate(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(KeystoneError::InvalidHashId("hash id cannot be empty".to_string()));
    }
    if raw.contains('#') {
        return Err(KeystoneError::InvalidHashId(format!(
            "'{}' must not contain '#'",
            raw
        )));
    }
    Ok(())
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.child {
            Some(child) => write!(f, "#{}#-{}", self.raw, child),
            None => write!(f, "#{}#", self.raw),
        }
    }
}

impl ValueMarshaler for HashId {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::text(self.to_string()))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        if value.text.is_empty() {
            *self = HashId::default();
            return Ok(());
        }
        *self = HashId::parse(&value.text)?;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Text)
    }

    fn is_zero(&self) -> bool {
        self.raw.is_empty()
    }
}

crate::value_field!(HashId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_forms() {
        assert_eq!(HashId::new("order-7").unwrap().to_string(), "#order-7#");
        let child = HashId::new("order-7").unwrap().with_child("line-2").unwrap();
        assert_eq!(child.to_string(), "#order-7#-line-2");
        assert_eq!(HashId::parse("#order-7#-line-2").unwrap(), child);
    }

    #[test]
    fn rejects_hash_in_raw() {
        assert!(matches!(
            HashId::new("bad#key"),
            Err(KeystoneError::InvalidHashId(_))
        ));
        assert!(HashId::new("").is_err());
        assert!(HashId::parse("order-7").is_err());
        assert!(HashId::parse("#a#b").is_err());
    }
}
