use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::buckets::KeyedBuckets;
use crate::core::{KnownType, RepeatedValue, Result, Value};
use crate::mapper::ValueMarshaler;
use crate::schema::ValueType;

/// One language's text with an optional plural form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub singular: String,
    pub plural: Option<String>,
}

impl Translation {
    pub fn new(singular: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            plural: None,
        }
    }

    pub fn with_plural(singular: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            plural: Some(plural.into()),
        }
    }

    /// Plural form when one is set, otherwise the singular.
    pub fn plural_or_singular(&self) -> &str {
        self.plural.as_deref().unwrap_or(&self.singular)
    }

    fn to_wire(&self) -> Value {
        let mut value = Value::text(self.singular.clone());
        if let Some(plural) = &self.plural {
            value.array = Some(RepeatedValue::with_strings(vec![plural.clone()]));
        }
        value
    }

    fn from_wire(value: &Value) -> Self {
        Self {
            singular: value.text.clone(),
            plural: value
                .array
                .as_ref()
                .and_then(|array| array.strings.first().cloned()),
        }
    }
}

/// Text keyed by language code, with pending add / remove buckets.
///
/// Each language is a nested value in the mixed group: `text` is the
/// singular form and `array.strings[0]` the plural form when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translations {
    buckets: KeyedBuckets<Translation>,
}

impl Translations {
    pub fn new(values: impl IntoIterator<Item = (impl Into<String>, Translation)>) -> Self {
        Self {
            buckets: KeyedBuckets::from_values(
                values.into_iter().map(|(lang, value)| (lang.into(), value)).collect(),
            ),
        }
    }

    pub fn set(&mut self, language: impl Into<String>, singular: impl Into<String>) -> &mut Self {
        self.buckets.set(language.into(), Translation::new(singular));
        self
    }

    pub fn set_plural(
        &mut self,
        language: impl Into<String>,
        singular: impl Into<String>,
        plural: impl Into<String>,
    ) -> &mut Self {
        self.buckets
            .set(language.into(), Translation::with_plural(singular, plural));
        self
    }

    pub fn remove(&mut self, language: &str) -> &mut Self {
        self.buckets.remove(language);
        self
    }

    pub fn replace_with(&mut self, values: BTreeMap<String, Translation>) -> &mut Self {
        self.buckets.replace_with(values);
        self
    }

    pub fn get(&self, language: &str) -> Option<&Translation> {
        self.buckets.get(language)
    }

    pub fn languages(&self) -> Vec<String> {
        self.values().into_keys().collect()
    }

    pub fn values(&self) -> BTreeMap<String, Translation> {
        self.buckets.current()
    }

    pub fn has_pending(&self) -> bool {
        self.buckets.has_pending()
    }

    pub fn merge(&mut self) {
        self.buckets.merge();
    }
}

fn encode(entries: &BTreeMap<String, Translation>) -> RepeatedValue {
    RepeatedValue::with_mixed(
        entries
            .iter()
            .map(|(lang, value)| (lang.clone(), value.to_wire()))
            .collect(),
    )
}

fn decode(group: &RepeatedValue) -> BTreeMap<String, Translation> {
    group
        .mixed
        .iter()
        .map(|(lang, value)| (lang.clone(), Translation::from_wire(value)))
        .collect()
}

impl ValueMarshaler for Translations {
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

crate::value_field!(Translations);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_rides_in_nested_array() {
        let mut titles = Translations::default();
        titles.set_plural("en", "box", "boxes").set("fr", "boîte");

        let wire = titles.marshal_value().unwrap();
        let append = &wire.array_append.as_ref().unwrap().mixed;
        assert_eq!(append["en"].text, "box");
        assert_eq!(append["en"].array.as_ref().unwrap().strings, vec!["boxes"]);
        assert!(append["fr"].array.is_none());

        let mut decoded = Translations::default();
        decoded.unmarshal_value(&wire).unwrap();
        assert_eq!(decoded.get("en").unwrap().plural_or_singular(), "boxes");
        assert_eq!(decoded.get("fr").unwrap().plural_or_singular(), "boîte");
    }

    #[test]
    fn replace_with_yields_exact_languages() {
        let mut titles = Translations::new([("de", Translation::new("Kiste"))]);
        titles.set("en", "crate");
        titles.replace_with(BTreeMap::from([("es".to_string(), Translation::new("caja"))]));
        assert_eq!(titles.languages(), vec!["es"]);
    }

    #[test]
    fn add_then_remove_drops_language() {
        let mut titles = Translations::default();
        titles.set("en", "crate");
        titles.remove("en");
        assert!(titles.get("en").is_none());
        titles.observe_mutation(true);
        assert!(titles.values().is_empty());
    }
}
