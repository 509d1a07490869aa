use std::collections::BTreeMap;

use super::buckets::KeyedBuckets;
use super::Mixed;
use crate::core::{KnownType, RepeatedValue, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// String-keyed map of [`Mixed`] scalars with pending add / remove buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMixed {
    buckets: KeyedBuckets<Mixed>,
}

impl KeyMixed {
    pub fn new(values: impl IntoIterator<Item = (impl Into<String>, impl Into<Mixed>)>) -> Self {
        Self {
            buckets: KeyedBuckets::from_values(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Mixed>) -> &mut Self {
        self.buckets.set(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.buckets.remove(key);
        self
    }

    pub fn replace_with(&mut self, values: BTreeMap<String, Mixed>) -> &mut Self {
        self.buckets.replace_with(values);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Mixed> {
        self.buckets.get(key)
    }

    pub fn values(&self) -> BTreeMap<String, Mixed> {
        self.buckets.current()
    }

    pub fn has_pending(&self) -> bool {
        self.buckets.has_pending()
    }

    pub fn merge(&mut self) {
        self.buckets.merge();
    }

    /// Same current entries, each compared with [`Mixed::matches`].
    pub fn matches(&self, other: &KeyMixed) -> bool {
        let (mine, theirs) = (self.values(), other.values());
        mine.len() == theirs.len()
            && mine
                .iter()
                .all(|(key, value)| theirs.get(key).is_some_and(|other| value.matches(other)))
    }
}

fn encode(entries: &BTreeMap<String, Mixed>) -> RepeatedValue {
    RepeatedValue::with_mixed(
        entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_wire()))
            .collect(),
    )
}

fn decode(group: &RepeatedValue) -> BTreeMap<String, Mixed> {
    group
        .mixed
        .iter()
        .map(|(key, value)| (key.clone(), Mixed::from_wire(value)))
        .collect()
}

impl ValueMarshaler for KeyMixed {
    fn marshal_value(&self) -> Result<Value> {
        let mut value = Value {
            array: Some(encode(&self.buckets.values)),
            known_type: KnownType::KeyMixed,
            ..Value::default()
        };
        if !self.buckets.to_add.is_empty() {
            value.array_append = Some(encode(&self.buckets.to_add));
        }
        if !self.buckets.to_remove.is_empty() {
            value.array_reduce = Some(RepeatedValue::with_strings(self.buckets.removed_keys()));
        }
        Ok(value)
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        self.buckets = KeyedBuckets {
            values: value.array.as_ref().map(decode).unwrap_or_default(),
            to_add: value.array_append.as_ref().map(decode).unwrap_or_default(),
            to_remove: value
                .array_reduce
                .as_ref()
                .map(|reduce| reduce.strings.iter().cloned().collect())
                .unwrap_or_default(),
            replaced: false,
        };
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(KnownType::KeyMixed)
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

crate::value_field!(KeyMixed);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_use_nested_values() {
        let mut attributes = KeyMixed::new([("colour", Mixed::from("red"))]);
        attributes.set("size", 42i64).set("fragile", true);

        let wire = attributes.marshal_value().unwrap();
        assert_eq!(wire.known_type, KnownType::KeyMixed);
        assert_eq!(wire.array.as_ref().unwrap().mixed["colour"].text, "red");
        let append = &wire.array_append.as_ref().unwrap().mixed;
        assert_eq!(append["size"].int, 42);
        assert!(append["fragile"].bool);

        let mut decoded = KeyMixed::default();
        decoded.unmarshal_value(&wire).unwrap();
        assert!(decoded.matches(&attributes));
    }

    #[test]
    fn removed_keys_leave_values() {
        let mut attributes = KeyMixed::new([("a", 1i64), ("b", 2i64)]);
        attributes.remove("a");
        assert!(attributes.get("a").is_none());
        attributes.observe_mutation(true);
        assert_eq!(attributes.values().len(), 1);
    }
}
