use serde::{Deserialize, Serialize};

use crate::core::{KnownType, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// Ordered pair of integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinMax {
    min: i64,
    max: i64,
}

impl MinMax {
    /// Builds a pair from two bounds in either order.
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Smallest and largest of `values`; `None` when empty.
    pub fn from_values(values: &[i64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) => Some(Self {
                min: *first,
                max: *last,
            }),
            _ => None,
        }
    }
}

impl ValueMarshaler for MinMax {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::ints(vec![self.min, self.max]))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        let ints = value.array.as_ref().map(|array| array.ints.as_slice()).unwrap_or(&[]);
        *self = MinMax::from_values(ints).unwrap_or_default();
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Ints)
    }

    fn is_zero(&self) -> bool {
        self.min == 0 && self.max == 0
    }
}

crate::value_field!(MinMax);
