use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::buckets::KeyedBuckets;
use crate::core::{KeystoneError, KnownType, RepeatedValue, Result, Value};
use crate::mapper::{FieldTag, FieldValue, ValueMarshaler};
use crate::schema::{PropertyDefinition, ValueType};
use crate::{Property, PropertyMap};

/// String-keyed map of JSON-serialisable values with pending add / remove
/// buckets. Each value travels as its JSON encoding in the key-value group;
/// removed keys travel as strings in `array_reduce`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T> {
    buckets: KeyedBuckets<T>,
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self {
            buckets: KeyedBuckets::default(),
        }
    }
}

impl<T> Keyed<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(values: impl IntoIterator<Item = (impl Into<String>, T)>) -> Self {
        Self {
            buckets: KeyedBuckets::from_values(
                values.into_iter().map(|(key, value)| (key.into(), value)).collect(),
            ),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.buckets.set(key.into(), value);
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.buckets.remove(key);
        self
    }

    pub fn replace_with(&mut self, values: BTreeMap<String, T>) -> &mut Self {
        self.buckets.replace_with(values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.buckets.get(key)
    }

    pub fn values(&self) -> BTreeMap<String, T> {
        self.buckets.current()
    }

    pub fn has_pending(&self) -> bool {
        self.buckets.has_pending()
    }

    pub fn merge(&mut self) {
        self.buckets.merge();
    }

    fn encode(entries: &BTreeMap<String, T>) -> Result<RepeatedValue> {
        let mut key_value = BTreeMap::new();
        for (key, value) in entries {
            key_value.insert(key.clone(), serde_json::to_vec(value)?);
        }
        Ok(RepeatedValue::with_key_value(key_value))
    }

    fn decode(group: &RepeatedValue) -> Result<BTreeMap<String, T>> {
        group
            .key_value
            .iter()
            .map(|(key, bytes)| {
                serde_json::from_slice(bytes)
                    .map(|value| (key.clone(), value))
                    .map_err(|err| KeystoneError::invalid_value("", format!("key '{}': {}", key, err)))
            })
            .collect()
    }
}

impl<T> ValueMarshaler for Keyed<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn marshal_value(&self) -> Result<Value> {
        let mut value = Value {
            array: Some(Self::encode(&self.buckets.values)?),
            known_type: KnownType::KeyValue,
            ..Value::default()
        };
        if !self.buckets.to_add.is_empty() {
            value.array_append = Some(Self::encode(&self.buckets.to_add)?);
        }
        if !self.buckets.to_remove.is_empty() {
            value.array_reduce = Some(RepeatedValue::with_strings(self.buckets.removed_keys()));
        }
        Ok(value)
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        let mut buckets = KeyedBuckets::default();
        if let Some(array) = &value.array {
            buckets.values = Self::decode(array)?;
        }
        if let Some(append) = &value.array_append {
            buckets.to_add = Self::decode(append)?;
        }
        if let Some(reduce) = &value.array_reduce {
            buckets.to_remove = reduce.strings.iter().cloned().collect();
        }
        self.buckets = buckets;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::KeyValue)
    }

    fn is_zero(&self) -> bool {
        self.buckets.is_zero()
    }

    fn observe_mutation(&mut self, success: bool) {
        if success {
            self.merge();
        }
    }
}

impl<T> FieldValue for Keyed<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn encode_field(&self, property: Property, tag: &FieldTag, out: &mut PropertyMap) -> Result<()> {
        crate::mapper::encode_leaf(self, property, tag, out)
    }

    fn decode_field(&mut self, property: &Property, input: &PropertyMap) -> Result<()> {
        crate::mapper::decode_leaf(self, property, input)
    }

    fn describe_field(property: Property, tag: &FieldTag, out: &mut Vec<PropertyDefinition>) {
        crate::mapper::describe_leaf::<Self>(property, tag, out)
    }

    fn observe_field(&mut self, success: bool) {
        ValueMarshaler::observe_mutation(self, success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Limit {
        max: u32,
        window: String,
    }

    #[test]
    fn values_travel_as_json() {
        let mut limits = Keyed::new([(
            "api",
            Limit {
                max: 10,
                window: "1m".to_string(),
            },
        )]);
        limits.set(
            "web",
            Limit {
                max: 100,
                window: "1h".to_string(),
            },
        );
        limits.remove("batch");

        let wire = limits.marshal_value().unwrap();
        let base = &wire.array.as_ref().unwrap().key_value;
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&base["api"]).unwrap(),
            serde_json::json!({"max": 10, "window": "1m"})
        );
        assert!(wire.array_append.as_ref().unwrap().key_value.contains_key("web"));
        assert_eq!(wire.array_reduce.as_ref().unwrap().strings, vec!["batch"]);

        let mut decoded = Keyed::<Limit>::default();
        decoded.unmarshal_value(&wire).unwrap();
        assert_eq!(decoded, limits);
    }

    #[test]
    fn merge_on_successful_mutation() {
        let mut flags = Keyed::new([("a", 1i64), ("b", 2i64)]);
        flags.set("c", 3).remove("a");
        flags.observe_mutation(true);
        assert!(!flags.has_pending());
        assert_eq!(flags.values().keys().cloned().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn undecodable_entry_is_invalid_value() {
        let mut key_value = BTreeMap::new();
        key_value.insert("x".to_string(), b"not json".to_vec());
        let wire = Value {
            array: Some(RepeatedValue::with_key_value(key_value)),
            ..Value::default()
        };
        let mut decoded = Keyed::<i64>::default();
        assert!(matches!(
            decoded.unmarshal_value(&wire),
            Err(KeystoneError::InvalidValue { .. })
        ));
    }
}
