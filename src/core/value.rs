use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hint telling the server how to interpret a wire value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownType {
    #[default]
    Unspecified,
    Text,
    Number,
    Float,
    Boolean,
    Time,
    Strings,
    Ints,
    KeyValue,
    Bytes,
    Amount,
    Interval,
    KeyMixed,
    IntSet,
    StringSet,
    SecureText,
    VerifyText,
    Mixed,
}

impl KnownType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Text => "text",
            Self::Number => "number",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Time => "time",
            Self::Strings => "strings",
            Self::Ints => "ints",
            Self::KeyValue => "key_value",
            Self::Bytes => "bytes",
            Self::Amount => "amount",
            Self::Interval => "interval",
            Self::KeyMixed => "key_mixed",
            Self::IntSet => "int_set",
            Self::StringSet => "string_set",
            Self::SecureText => "secure_text",
            Self::VerifyText => "verify_text",
            Self::Mixed => "mixed",
        }
    }
}

/// Repeated group carried by the `array`, `array_append` and `array_reduce`
/// slots of a [`Value`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatedValue {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ints: Vec<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub key_value: BTreeMap<String, Vec<u8>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mixed: BTreeMap<String, Value>,
}

impl RepeatedValue {
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
            && self.ints.is_empty()
            && self.key_value.is_empty()
            && self.mixed.is_empty()
    }

    pub fn with_strings(strings: Vec<String>) -> Self {
        Self {
            strings,
            ..Self::default()
        }
    }

    pub fn with_ints(ints: Vec<i64>) -> Self {
        Self {
            ints,
            ..Self::default()
        }
    }

    pub fn with_key_value(key_value: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            key_value,
            ..Self::default()
        }
    }

    pub fn with_mixed(mixed: BTreeMap<String, Value>) -> Self {
        Self {
            mixed,
            ..Self::default()
        }
    }

    /// Component-wise equality; nested mixed values compare with [`Value::matches`].
    pub fn matches(&self, other: &RepeatedValue) -> bool {
        self.strings == other.strings
            && self.ints == other.ints
            && self.key_value == other.key_value
            && self.mixed.len() == other.mixed.len()
            && self
                .mixed
                .iter()
                .zip(other.mixed.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.matches(vb))
    }
}

/// Tagged union exchanged with the server for a single property.
///
/// Every slot is independent; a slot at its zero value is treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Value {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secure_text: String,
    #[serde(default)]
    pub int: i64,
    #[serde(default)]
    pub bool: bool,
    #[serde(default)]
    pub float: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<RepeatedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_append: Option<RepeatedValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_reduce: Option<RepeatedValue>,
    #[serde(default)]
    pub known_type: KnownType,
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            known_type: KnownType::Text,
            ..Self::default()
        }
    }

    pub fn int(int: i64) -> Self {
        Self {
            int,
            known_type: KnownType::Number,
            ..Self::default()
        }
    }

    pub fn float(float: f64) -> Self {
        Self {
            float,
            known_type: KnownType::Float,
            ..Self::default()
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            bool: value,
            known_type: KnownType::Boolean,
            ..Self::default()
        }
    }

    pub fn time(time: DateTime<Utc>) -> Self {
        Self {
            time: Some(time),
            known_type: KnownType::Time,
            ..Self::default()
        }
    }

    pub fn bytes(raw: Vec<u8>) -> Self {
        Self {
            raw,
            known_type: KnownType::Bytes,
            ..Self::default()
        }
    }

    pub fn strings(strings: Vec<String>) -> Self {
        Self {
            array: Some(RepeatedValue::with_strings(strings)),
            known_type: KnownType::Strings,
            ..Self::default()
        }
    }

    pub fn ints(ints: Vec<i64>) -> Self {
        Self {
            array: Some(RepeatedValue::with_ints(ints)),
            known_type: KnownType::Ints,
            ..Self::default()
        }
    }

    pub fn with_known_type(mut self, known_type: KnownType) -> Self {
        self.known_type = known_type;
        self
    }

    /// The baseline repeated group, or an empty one.
    pub fn array_or_empty(&self) -> RepeatedValue {
        self.array.clone().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.secure_text.is_empty()
            && self.int == 0
            && !self.bool
            && self.float == 0.0
            && self.time.is_none()
            && self.raw.is_empty()
            && self.array.as_ref().map_or(true, RepeatedValue::is_empty)
            && self.array_append.as_ref().map_or(true, RepeatedValue::is_empty)
            && self.array_reduce.as_ref().map_or(true, RepeatedValue::is_empty)
    }

    /// Wire equality: every scalar slot and every repeated group compared
    /// component-wise, times at millisecond precision. The known-type hint is
    /// not part of the comparison.
    pub fn matches(&self, other: &Value) -> bool {
        self.text == other.text
            && self.secure_text == other.secure_text
            && self.int == other.int
            && self.bool == other.bool
            && self.float == other.float
            && self.time.map(|t| t.timestamp_millis()) == other.time.map(|t| t.timestamp_millis())
            && self.raw == other.raw
            && repeated_matches(&self.array, &other.array)
            && repeated_matches(&self.array_append, &other.array_append)
            && repeated_matches(&self.array_reduce, &other.array_reduce)
    }
}

fn repeated_matches(a: &Option<RepeatedValue>, b: &Option<RepeatedValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.matches(b),
        (Some(only), None) | (None, Some(only)) => only.is_empty(),
        (None, None) => true,
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::text(text)
    }
}

macro_rules! int_value_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(int: $ty) -> Self {
                    Value::int(i64::from(int))
                }
            }
        )+
    };
}

int_value_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(float: f64) -> Self {
        Value::float(float)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::boolean(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(time: DateTime<Utc>) -> Self {
        Value::time(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn matches_ignores_known_type_and_sub_millisecond_time() {
        let base = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let a = Value::time(base);
        let mut b = Value::time(base + chrono::Duration::microseconds(400));
        b.known_type = KnownType::Unspecified;
        assert!(a.matches(&b));
    }

    #[test]
    fn empty_repeated_group_matches_missing_group() {
        let mut a = Value::text("x");
        a.array_append = Some(RepeatedValue::default());
        assert!(a.matches(&Value::text("x")));
        assert!(!a.matches(&Value::text("y")));
    }

    #[test]
    fn repeated_groups_compare_component_wise() {
        let mut a = Value::strings(vec!["a".into()]);
        let b = a.clone();
        a.array_reduce = Some(RepeatedValue::with_strings(vec!["z".into()]));
        assert!(!a.matches(&b));
    }
}
