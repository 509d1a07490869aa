use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// Heterogeneous scalar; any subset of its slots may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mixed {
    pub text: String,
    pub int: i64,
    pub bool: bool,
    pub float: f64,
    pub time: Option<DateTime<Utc>>,
    pub raw: Vec<u8>,
}

impl Mixed {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn from_int(int: i64) -> Self {
        Self {
            int,
            ..Self::default()
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            bool: value,
            ..Self::default()
        }
    }

    pub fn from_float(float: f64) -> Self {
        Self {
            float,
            ..Self::default()
        }
    }

    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            ..Self::default()
        }
    }

    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.int == 0
            && !self.bool
            && self.float == 0.0
            && self.time.is_none()
            && self.raw.is_empty()
    }

    /// Slot-by-slot equality with times compared at millisecond precision.
    pub fn matches(&self, other: &Mixed) -> bool {
        self.text == other.text
            && self.int == other.int
            && self.bool == other.bool
            && self.float == other.float
            && self.time.map(|t| t.timestamp_millis()) == other.time.map(|t| t.timestamp_millis())
            && self.raw == other.raw
    }

    pub fn to_wire(&self) -> Value {
        Value {
            text: self.text.clone(),
            int: self.int,
            bool: self.bool,
            float: self.float,
            time: self.time,
            raw: self.raw.clone(),
            known_type: KnownType::Mixed,
            ..Value::default()
        }
    }

    pub fn from_wire(value: &Value) -> Self {
        Self {
            text: value.text.clone(),
            int: value.int,
            bool: value.bool,
            float: value.float,
            time: value.time,
            raw: value.raw.clone(),
        }
    }
}

impl From<&str> for Mixed {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<String> for Mixed {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}

impl From<i64> for Mixed {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl From<bool> for Mixed {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl From<f64> for Mixed {
    fn from(value: f64) -> Self {
        Self::from_float(value)
    }
}

impl From<DateTime<Utc>> for Mixed {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_time(value)
    }
}

impl ValueMarshaler for Mixed {
    fn marshal_value(&self) -> Result<Value> {
        Ok(self.to_wire())
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = Mixed::from_wire(value);
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Mixed)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

crate::value_field!(Mixed);
