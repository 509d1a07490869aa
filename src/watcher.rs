//! Change tracking against a snapshot of a record's marshalled form.

use crate::core::{Property, PropertyMap, Result};
use crate::mapper::{self, Properties};

/// Snapshot of marshalled properties used to compute the minimum change set
/// for a mutation. Holds no reference to the record it describes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watcher {
    snapshot: PropertyMap,
}

impl Watcher {
    /// Snapshot of `value` as it is now.
    pub fn new<T: Properties>(value: &T) -> Result<Self> {
        Ok(Self {
            snapshot: mapper::marshal(value)?,
        })
    }

    /// Snapshot of `T::default()`, so that every non-default field counts as
    /// a change.
    pub fn defaults<T: Properties>() -> Result<Self> {
        Self::new(&T::default())
    }

    pub fn from_properties(snapshot: PropertyMap) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &PropertyMap {
        &self.snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Properties of `value` whose wire form differs from the snapshot.
    /// With `commit` the snapshot becomes the current marshalled form.
    pub fn changes<T: Properties>(&mut self, value: &T, commit: bool) -> Result<PropertyMap> {
        let latest = mapper::marshal(value)?;
        let changed = if self.snapshot.is_empty() {
            latest.clone()
        } else {
            latest
                .iter()
                .filter(|(property, current)| {
                    self.snapshot
                        .get(*property)
                        .is_none_or(|previous| !previous.matches(current))
                })
                .map(|(property, current)| (property.clone(), current.clone()))
                .collect()
        };
        if commit {
            self.snapshot = latest;
        }
        Ok(changed)
    }

    /// Overlays server-returned properties on the snapshot.
    pub fn hydrate(&mut self, properties: &PropertyMap) {
        for (property, value) in properties {
            self.snapshot.insert(property.clone(), value.clone());
        }
    }

    /// Drops `property` (and anything nested under it) from the snapshot so
    /// its current value is always part of the next change set.
    pub fn prune(&mut self, property: &Property) {
        let path = property.full_name();
        self.snapshot
            .retain(|candidate, _| candidate != property && !candidate.is_under(&path));
    }

    /// Replaces the snapshot with the current marshalled form of `value`.
    pub fn commit<T: Properties>(&mut self, value: &T) -> Result<()> {
        self.snapshot = mapper::marshal(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::mapper::{FieldTag, FieldValue, prefixed};
    use crate::schema::PropertyDefinition;
    use crate::types::StringSet;

    #[derive(Default, Debug, Clone)]
    struct Account {
        name: String,
        score: i64,
        tags: StringSet,
    }

    impl Properties for Account {
        fn marshal_properties(&self, prefix: &str, out: &mut PropertyMap) -> Result<()> {
            let tag = FieldTag::default();
            self.name.encode_field(prefixed(prefix, "name"), &tag, out)?;
            self.score.encode_field(prefixed(prefix, "score"), &tag, out)?;
            self.tags.encode_field(prefixed(prefix, "tags"), &tag, out)
        }

        fn unmarshal_properties(&mut self, prefix: &str, input: &PropertyMap) -> Result<()> {
            self.name.decode_field(&prefixed(prefix, "name"), input)?;
            self.score.decode_field(&prefixed(prefix, "score"), input)?;
            self.tags.decode_field(&prefixed(prefix, "tags"), input)
        }

        fn describe_properties(_prefix: &str, _out: &mut Vec<PropertyDefinition>) {}

        fn observe_properties(&mut self, success: bool) {
            self.tags.observe_field(success);
        }
    }

    fn account() -> Account {
        Account {
            name: "ada".to_string(),
            score: 10,
            tags: StringSet::new(["x"]),
        }
    }

    #[test]
    fn fresh_watcher_reports_everything() {
        let record = account();
        let mut watcher = Watcher::default();
        assert_eq!(watcher.changes(&record, false).unwrap(), mapper::marshal(&record).unwrap());
    }

    #[test]
    fn committed_watcher_reports_nothing() {
        let record = account();
        let mut watcher = Watcher::default();
        watcher.changes(&record, true).unwrap();
        assert!(watcher.changes(&record, false).unwrap().is_empty());
    }

    #[test]
    fn single_field_change() {
        let mut record = account();
        let mut watcher = Watcher::new(&record).unwrap();
        record.score = 11;
        let changes = watcher.changes(&record, false).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[&Property::new("score")].matches(&Value::int(11)));
    }

    #[test]
    fn defaults_watcher_skips_default_fields() {
        let record = Account {
            name: "ada".to_string(),
            ..Account::default()
        };
        let mut watcher = Watcher::defaults::<Account>().unwrap();
        let changes = watcher.changes(&record, false).unwrap();
        assert_eq!(changes.keys().cloned().collect::<Vec<_>>(), vec![Property::new("name")]);
    }

    #[test]
    fn pruned_property_is_forced_into_changes() {
        let record = account();
        let mut watcher = Watcher::new(&record).unwrap();
        watcher.prune(&Property::new("score"));
        let changes = watcher.changes(&record, false).unwrap();
        assert_eq!(changes.keys().cloned().collect::<Vec<_>>(), vec![Property::new("score")]);
    }

    #[test]
    fn pending_set_operations_count_as_changes() {
        let mut record = account();
        let mut watcher = Watcher::new(&record).unwrap();
        record.tags.add("y");
        let changes = watcher.changes(&record, false).unwrap();
        assert!(changes.contains_key(&Property::new("tags")));

        record.observe_properties(true);
        watcher.commit(&record).unwrap();
        assert!(watcher.changes(&record, false).unwrap().is_empty());
    }
}
