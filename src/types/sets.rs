use std::collections::BTreeSet;

use crate::core::{KnownType, RepeatedValue, Result, Value};
use crate::mapper::{FieldTag, FieldValue, ValueMarshaler};
use crate::schema::{PropertyDefinition, ValueType};
use crate::{Property, PropertyMap};

/// Element type that a [`Set`] can carry on the wire.
pub trait SetElement: Ord + Clone + Send + Sync + 'static {
    const KNOWN_TYPE: KnownType;

    fn write(items: &BTreeSet<Self>) -> RepeatedValue;
    fn read(group: &RepeatedValue) -> BTreeSet<Self>;
}

impl SetElement for String {
    const KNOWN_TYPE: KnownType = KnownType::StringSet;

    fn write(items: &BTreeSet<Self>) -> RepeatedValue {
        RepeatedValue::with_strings(items.iter().cloned().collect())
    }

    fn read(group: &RepeatedValue) -> BTreeSet<Self> {
        group.strings.iter().cloned().collect()
    }
}

impl SetElement for i64 {
    const KNOWN_TYPE: KnownType = KnownType::IntSet;

    fn write(items: &BTreeSet<Self>) -> RepeatedValue {
        RepeatedValue::with_ints(items.iter().copied().collect())
    }

    fn read(group: &RepeatedValue) -> BTreeSet<Self> {
        group.ints.iter().copied().collect()
    }
}

/// Set with pending add / remove buckets.
///
/// The wire carries the baseline in `array`, pending adds in `array_append`
/// and pending removes in `array_reduce`. A successful mutation folds the
/// pending buckets into the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set<T: SetElement> {
    values: BTreeSet<T>,
    to_add: BTreeSet<T>,
    to_remove: BTreeSet<T>,
    replaced: bool,
}

pub type StringSet = Set<String>;
pub type IntSet = Set<i64>;

impl<T: SetElement> Default for Set<T> {
    fn default() -> Self {
        Self {
            values: BTreeSet::new(),
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
            replaced: false,
        }
    }
}

impl<T: SetElement> Set<T> {
    /// A set whose baseline is `values`.
    pub fn new(values: impl IntoIterator<Item = impl Into<T>>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn add(&mut self, value: impl Into<T>) -> &mut Self {
        let value = value.into();
        self.to_remove.remove(&value);
        self.to_add.insert(value);
        self
    }

    pub fn remove(&mut self, value: impl Into<T>) -> &mut Self {
        let value = value.into();
        self.to_add.remove(&value);
        self.to_remove.insert(value);
        self
    }

    /// Discards baseline and pending operations and marks a full replacement.
    pub fn replace_with(&mut self, values: impl IntoIterator<Item = impl Into<T>>) -> &mut Self {
        self.values = values.into_iter().map(Into::into).collect();
        self.to_add.clear();
        self.to_remove.clear();
        self.replaced = true;
        self
    }

    /// Baseline minus pending removes plus pending adds.
    pub fn values(&self) -> BTreeSet<T> {
        let mut current: BTreeSet<T> = self.values.difference(&self.to_remove).cloned().collect();
        current.extend(self.to_add.iter().cloned());
        current
    }

    pub fn contains(&self, value: &T) -> bool {
        self.to_add.contains(value) || (self.values.contains(value) && !self.to_remove.contains(value))
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn baseline(&self) -> &BTreeSet<T> {
        &self.values
    }

    pub fn pending_add(&self) -> &BTreeSet<T> {
        &self.to_add
    }

    pub fn pending_remove(&self) -> &BTreeSet<T> {
        &self.to_remove
    }

    pub fn has_pending(&self) -> bool {
        self.replaced || !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Folds pending operations into the baseline.
    pub fn merge(&mut self) {
        self.values = self.values();
        self.to_add.clear();
        self.to_remove.clear();
        self.replaced = false;
    }

    /// Same membership, regardless of how it is split across buckets.
    pub fn matches(&self, other: &Set<T>) -> bool {
        self.values() == other.values()
    }
}

impl<T: SetElement> ValueMarshaler for Set<T> {
    fn marshal_value(&self) -> Result<Value> {
        let mut value = Value {
            array: Some(T::write(&self.values)),
            known_type: T::KNOWN_TYPE,
            ..Value::default()
        };
        if !self.to_add.is_empty() {
            value.array_append = Some(T::write(&self.to_add));
        }
        if !self.to_remove.is_empty() {
            value.array_reduce = Some(T::write(&self.to_remove));
        }
        Ok(value)
    }

    fn unmarshal_value(&mut self, value: &Value) -> Result<()> {
        self.values = value.array.as_ref().map(T::read).unwrap_or_default();
        self.to_add = value.array_append.as_ref().map(T::read).unwrap_or_default();
        self.to_remove = value.array_reduce.as_ref().map(T::read).unwrap_or_default();
        self.replaced = false;
        Ok(())
    }

    fn value_type() -> ValueType {
        ValueType::of(T::KNOWN_TYPE)
    }

    fn is_zero(&self) -> bool {
        !self.replaced && self.values.is_empty() && self.to_add.is_empty() && self.to_remove.is_empty()
    }

    fn observe_mutation(&mut self, success: bool) {
        if success {
            self.merge();
        }
    }
}

impl<T: SetElement> FieldValue for Set<T> {
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
