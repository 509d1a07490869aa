use chrono::{DateTime, Utc};

use super::ValueMarshaler;
use crate::core::{KeystoneError, KnownType, Result, Value};
use crate::schema::ValueType;

impl ValueMarshaler for String {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::text(self.clone()))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value.text.clone();
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Text)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn elide_zero() -> bool {
        false
    }
}

impl ValueMarshaler for bool {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::boolean(*self))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value.bool;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Boolean)
    }

    fn is_zero(&self) -> bool {
        !*self
    }

    fn elide_zero() -> bool {
        false
    }
}

/// Integers narrower than 64 bits widen into the single int slot and
/// narrow back on decode, failing when the wire value does not fit.
macro_rules! integer_marshaler {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ValueMarshaler for $ty {
                fn marshal_value(&self) -> Result<Value> {
                    Ok(Value::int(i64::from(*self)))
                }

                fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
                    *self = <$ty>::try_from(value.int).map_err(|_| {
                        KeystoneError::invalid_value(
                            "",
                            format!("{} does not fit in {}", value.int, stringify!($ty)),
                        )
                    })?;
                    Ok(())
                }

                fn value_type() -> ValueType {
                    ValueType::of(KnownType::Number)
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }

                fn elide_zero() -> bool {
                    false
                }
            }
        )+
    };
}

integer_marshaler!(i8, i16, i32, i64, u8, u16, u32);

impl ValueMarshaler for f64 {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::float(*self))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value.float;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Float)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn elide_zero() -> bool {
        false
    }
}

/// Widens an `f32` through its six-decimal rendering so the wire does not
/// carry the binary expansion noise (`0.1f32` becomes `0.1`, not
/// `0.10000000149011612`).
pub fn normalize_f32(value: f32) -> f64 {
    if !value.is_finite() {
        return f64::from(value);
    }
    format!("{:.6}", value)
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(value))
}

impl ValueMarshaler for f32 {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::float(normalize_f32(*self)))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value.float as f32;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Float)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn elide_zero() -> bool {
        false
    }
}

impl ValueMarshaler for DateTime<Utc> {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::time(*self))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        if let Some(time) = value.time {
            *self = time;
        }
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Time)
    }

    fn is_zero(&self) -> bool {
        self.timestamp() == 0 && self.timestamp_subsec_nanos() == 0
    }

    fn elide_zero() -> bool {
        false
    }
}

crate::value_field!(String, bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, DateTime<Utc>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_round_trips_without_drift() {
        let wire = 0.1f32.marshal_value().unwrap();
        assert_eq!(wire.float, 0.1f64);

        let mut decoded = 0f32;
        decoded.unmarshal_value(&wire).unwrap();
        assert_eq!(decoded, 0.1f32);
    }

    #[test]
    fn narrow_integers_widen_and_narrow_back() {
        let wire = (-12i8).marshal_value().unwrap();
        assert_eq!(wire.int, -12);
        assert_eq!(wire.known_type, KnownType::Number);

        let mut decoded = 0i8;
        decoded.unmarshal_value(&wire).unwrap();
        assert_eq!(decoded, -12);

        let mut small = 0u8;
        assert!(small.unmarshal_value(&Value::int(300)).is_err());
    }

    #[test]
    fn time_decode_keeps_existing_value_when_slot_empty() {
        let now = Utc::now();
        let mut value = now;
        value.unmarshal_value(&Value::default()).unwrap();
        assert_eq!(value, now);
    }
}
