use std::collections::{BTreeMap, HashMap};

use super::ValueMarshaler;
use crate::core::{KeystoneError, KnownType, RepeatedValue, Result, Value};
use crate::schema::ValueType;

impl ValueMarshaler for Vec<u8> {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::bytes(self.clone()))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value.raw.clone();
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Bytes)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn elide_zero() -> bool {
        false
    }
}

impl ValueMarshaler for Vec<String> {
    fn marshal_value(&self) -> Result<Value> {
        Ok(Value::strings(self.clone()))
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        *self = value
            .array
            .as_ref()
            .map(|array| array.strings.clone())
            .unwrap_or_default();
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::Strings)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn elide_zero() -> bool {
        false
    }
}

macro_rules! int_list_marshaler {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ValueMarshaler for Vec<$ty> {
                fn marshal_value(&self) -> Result<Value> {
                    Ok(Value::ints(self.iter().map(|v| i64::from(*v)).collect()))
                }

                fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
                    let ints = value.array.as_ref().map(|array| array.ints.as_slice()).unwrap_or(&[]);
                    *self = ints
                        .iter()
                        .map(|v| {
                            <$ty>::try_from(*v).map_err(|_| {
                                KeystoneError::invalid_value(
                                    "",
                                    format!("{} does not fit in {}", v, stringify!($ty)),
                                )
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(())
                }

                fn value_type() -> ValueType {
                    ValueType::of(KnownType::Ints)
                }

                fn is_zero(&self) -> bool {
                    self.is_empty()
                }

                fn elide_zero() -> bool {
                    false
                }
            }
        )+
    };
}

int_list_marshaler!(i8, i16, i32, i64);

/// Map values that travel as raw bytes in the key-value repeated group.
pub trait KeyedBytes: Sized {
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

impl KeyedBytes for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| KeystoneError::invalid_value("", format!("invalid utf-8: {}", err)))
    }
}

impl KeyedBytes for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl KeyedBytes for bool {
    fn to_bytes(&self) -> Vec<u8> {
        if *self { b"1".to_vec() } else { b"0".to_vec() }
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bytes == b"1" || bytes.eq_ignore_ascii_case(b"true"))
    }
}

macro_rules! keyed_int {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl KeyedBytes for $ty {
                fn to_bytes(&self) -> Vec<u8> {
                    self.to_string().into_bytes()
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self> {
                    std::str::from_utf8(bytes)
                        .ok()
                        .and_then(|text| text.trim().parse::<$ty>().ok())
                        .ok_or_else(|| {
                            KeystoneError::invalid_value(
                                "",
                                format!("'{}' is not a valid {}", String::from_utf8_lossy(bytes), stringify!($ty)),
                            )
                        })
                }
            }
        )+
    };
}

keyed_int!(i32, i64);

macro_rules! keyed_map_marshaler {
    ($map:ident: $($value:ty),+ $(,)?) => {
        $(
            impl ValueMarshaler for $map<String, $value> {
                fn marshal_value(&self) -> Result<Value> {
                    let key_value = self
                        .iter()
                        .map(|(key, value)| (key.clone(), KeyedBytes::to_bytes(value)))
                        .collect::<BTreeMap<_, _>>();
                    Ok(Value {
                        array: Some(RepeatedValue::with_key_value(key_value)),
                        known_type: KnownType::KeyValue,
                        ..Value::default()
                    })
                }

                fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
                    let mut decoded = $map::new();
                    if let Some(array) = &value.array {
                        for (key, bytes) in &array.key_value {
                            decoded.insert(key.clone(), <$value as KeyedBytes>::from_bytes(bytes)?);
                        }
                    }
                    *self = decoded;
                    Ok(())
                }

                fn value_type() -> ValueType {
                    ValueType::of(KnownType::KeyValue)
                }

                fn is_zero(&self) -> bool {
                    self.is_empty()
                }

                fn elide_zero() -> bool {
                    false
                }
            }

            crate::value_field!($map<String, $value>);
        )+
    };
}

keyed_map_marshaler!(HashMap: String, i32, i64, Vec<u8>, bool);
keyed_map_marshaler!(BTreeMap: String, i32, i64, Vec<u8>, bool);

crate::value_field!(Vec<u8>, Vec<String>, Vec<i8>, Vec<i16>, Vec<i32>, Vec<i64>);
