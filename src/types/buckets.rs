use std::collections::{BTreeMap, BTreeSet};

/// Keyed collection with pending add / remove buckets.
///
/// Shared by [`Keyed`](super::Keyed), [`KeyMixed`](super::KeyMixed) and
/// [`Translations`](super::Translations); each of them only decides how a
/// single entry is written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyedBuckets<V> {
    pub(crate) values: BTreeMap<String, V>,
    pub(crate) to_add: BTreeMap<String, V>,
    pub(crate) to_remove: BTreeSet<String>,
    pub(crate) replaced: bool,
}

impl<V> Default for KeyedBuckets<V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            to_add: BTreeMap::new(),
            to_remove: BTreeSet::new(),
            replaced: false,
        }
    }
}

impl<V: Clone> KeyedBuckets<V> {
    pub(crate) fn from_values(values: BTreeMap<String, V>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub(crate) fn set(&mut self, key: String, value: V) {
        self.to_remove.remove(&key);
        self.to_add.insert(key, value);
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.to_add.remove(key);
        self.to_remove.insert(key.to_string());
    }

    pub(crate) fn replace_with(&mut self, values: BTreeMap<String, V>) {
        self.values = values;
        self.to_add.clear();
        self.to_remove.clear();
        self.replaced = true;
    }

    pub(crate) fn get(&self, key: &str) -> Option<&V> {
        if let Some(value) = self.to_add.get(key) {
            return Some(value);
        }
        if self.to_remove.contains(key) {
            return None;
        }
        self.values.get(key)
    }

    pub(crate) fn current(&self) -> BTreeMap<String, V> {
        let mut current: BTreeMap<String, V> = self
            .values
            .iter()
            .filter(|(key, _)| !self.to_remove.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        current.extend(self.to_add.iter().map(|(key, value)| (key.clone(), value.clone())));
        current
    }

    pub(crate) fn is_zero(&self) -> bool {
        !self.replaced && self.values.is_empty() && self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.replaced || !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    pub(crate) fn merge(&mut self) {
        self.values = self.current();
        self.to_add.clear();
        self.to_remove.clear();
        self.replaced = false;
    }

    pub(crate) fn removed_keys(&self) -> Vec<String> {
        self.to_remove.iter().cloned().collect()
    }
}
