use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::core::{KeystoneError, KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    #[default]
    None,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Indefinite,
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::Indefinite => "indefinite",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let parsed = match tag.trim().trim_end_matches('s') {
            "" | "none" => Self::None,
            "second" => Self::Second,
            "minute" => Self::Minute,
            "hour" => Self::Hour,
            "day" => Self::Day,
            "week" => Self::Week,
            "month" => Self::Month,
            "year" => Self::Year,
            "indefinite" => Self::Indefinite,
            _ => return None,
        };
        Some(parsed)
    }

    /// Length of one unit in seconds. A month counts as 30 days.
    fn unit_seconds(&self) -> i64 {
        match self {
            Self::None | Self::Indefinite => 0,
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
            Self::Year => 365 * 86_400,
        }
    }

    fn has_count(&self) -> bool {
        !matches!(self, Self::None | Self::Indefinite)
    }
}

/// A count of calendar units, e.g. `3 days`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    interval_type: IntervalType,
    count: i64,
}

impl Interval {
    /// `None` and `Indefinite` intervals always have a zero count.
    pub fn new(interval_type: IntervalType, count: i64) -> Self {
        let count = if interval_type.has_count() { count } else { 0 };
        Self {
            interval_type,
            count,
        }
    }

    pub fn indefinite() -> Self {
        Self::new(IntervalType::Indefinite, 0)
    }

    pub fn interval_type(&self) -> IntervalType {
        self.interval_type
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn is_indefinite(&self) -> bool {
        self.interval_type == IntervalType::Indefinite
    }

    /// Length in seconds, `None` for an indefinite interval.
    pub fn seconds(&self) -> Option<i64> {
        if self.is_indefinite() {
            return None;
        }
        Some(self.count.saturating_mul(self.interval_type.unit_seconds()))
    }

    pub fn to_duration(&self) -> Option<chrono::Duration> {
        self.seconds().map(chrono::Duration::seconds)
    }

    /// Orders by normalized length; indefinite is longer than any finite interval.
    pub fn compare(&self, other: &Interval) -> Ordering {
        match (self.seconds(), other.seconds()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }

    pub fn longer_than(&self, other: &Interval) -> bool {
        self.compare(other) == Ordering::Greater
    }

    pub fn shorter_than(&self, other: &Interval) -> bool {
        self.compare(other) == Ordering::Less
    }

    pub fn same_length(&self, other: &Interval) -> bool {
        self.compare(other) == Ordering::Equal
    }

    /// Parses `"<count> <unit>"`, `"none"` or `"indefinite"`.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || KeystoneError::invalid_value("interval", format!("cannot parse '{}'", text));
        let mut parts = text.split_whitespace();
        let first = parts.next().ok_or_else(invalid)?;
        match first.parse::<i64>() {
            Ok(count) => {
                let unit = parts.next().ok_or_else(invalid)?;
                let interval_type = IntervalType::parse(unit).ok_or_else(invalid)?;
                Ok(Self::new(interval_type, count))
            }
            Err(_) => {
                let interval_type = IntervalType::parse(first).ok_or_else(invalid)?;
                Ok(Self::new(interval_type, 0))
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.interval_type.has_count() {
            return f.write_str(self.interval_type.as_str());
        }
        let suffix = if self.count == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.count, self.interval_type.as_str(), suffix)
    }
}

impl ValueMarshaler for Interval {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value {
            text: self.interval_type.as_str().to_string(),
            int: self.count,
            known_type: KnownType::Interval,
            ..Value::default()
        })
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        let interval_type = IntervalType::parse(&value.text).ok_or_else(|| {
            KeystoneError::invalid_value("", format!("unknown interval type '{}'", value.text))
        })?;
        *self = Interval::new(interval_type, value.int);
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Interval)
    }

    fn is_zero(&self) -> bool {
        self.interval_type == IntervalType::None && self.count == 0
    }
}

crate::value_field!(Interval);
