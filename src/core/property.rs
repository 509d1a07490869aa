use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical key in the wire property bag.
///
/// A property nested inside a composite carries the dotted path of its
/// parents as `prefix`; equality, ordering and hashing include the prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Property {
    prefix: String,
    name: String,
}

impl Property {
    /// Builds an unprefixed property from an already canonical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prefix: String::new(),
            name: name.into(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// Parses a wire identifier (`a.b.c`) into prefix `a.b` and name `c`.
    pub fn parse(identifier: &str) -> Self {
        match identifier.rsplit_once('.') {
            Some((prefix, name)) => Self::with_prefix(prefix, name),
            None => Self::new(identifier),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire identifier, `prefix.name` or just `name`.
    pub fn full_name(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.prefix, self.name)
        }
    }

    /// The property `name` nested under this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::with_prefix(self.full_name(), name)
    }

    /// A property is hydration only when its name starts with `_`.
    pub fn is_hydration_only(&self) -> bool {
        self.name.starts_with('_')
    }

    /// True when this property lives at or below `path`.
    pub fn is_under(&self, path: &str) -> bool {
        self.prefix == path
            || (self.prefix.len() > path.len()
                && self.prefix.starts_with(path)
                && self.prefix.as_bytes()[path.len()] == b'.')
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.prefix, self.name)
        }
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

/// Converts a field or type identifier into its snake_case canonical form.
///
/// Splits on lower-to-upper transitions, digit runs embedded between letters,
/// and acronym runs (`PIIToken` becomes `pii_token`). A trailing `s` after an
/// acronym is kept as a plural (`IDs` becomes `ids`), and a digit run that
/// closes the identifier stays attached (`Last4` becomes `last4`).
pub fn snake(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut raw = String::with_capacity(chars.len() + 8);

    for (index, &current) in chars.iter().enumerate() {
        if !current.is_ascii_alphanumeric() {
            raw.push('_');
            continue;
        }
        if index > 0 && is_word_boundary(&chars, index) {
            raw.push('_');
        }
        raw.push(current.to_ascii_lowercase());
    }

    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn is_word_boundary(chars: &[char], index: usize) -> bool {
    let prev = chars[index - 1];
    let current = chars[index];
    if !prev.is_ascii_alphanumeric() {
        return false;
    }

    if prev.is_ascii_lowercase() && current.is_ascii_uppercase() {
        return true;
    }

    if prev.is_ascii_digit() && current.is_ascii_alphabetic() {
        return true;
    }

    if prev.is_ascii_alphabetic() && current.is_ascii_digit() {
        let run_end = chars[index..]
            .iter()
            .position(|c| !c.is_ascii_digit())
            .map(|offset| index + offset);
        return matches!(run_end, Some(end) if chars[end].is_ascii_alphabetic());
    }

    if prev.is_ascii_uppercase() && current.is_ascii_uppercase() {
        let Some(&next) = chars.get(index + 1) else {
            return false;
        };
        if !next.is_ascii_lowercase() {
            return false;
        }
        let plural = next == 's'
            && chars
                .get(index + 2)
                .map(|after| !after.is_ascii_lowercase())
                .unwrap_or(true);
        return !plural;
    }

    false
}

/// Schema key for a type name: snake_case with hyphens.
pub fn type_key(type_name: &str) -> String {
    let simple = type_name.rsplit("::").next().unwrap_or(type_name);
    let simple = simple.split('<').next().unwrap_or(simple);
    snake(simple).replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_cases() {
        assert_eq!(snake("PIIToken"), "pii_token");
        assert_eq!(snake("camelCase"), "camel_case");
        assert_eq!(snake("With3dsData"), "with_3_ds_data");
        assert_eq!(snake("HTTP2Test"), "http_2_test");
        assert_eq!(snake("KeystoneIDsToUse"), "keystone_ids_to_use");
        assert_eq!(snake("Last4"), "last4");
        assert_eq!(snake("UserID"), "user_id");
        assert_eq!(snake("first_name"), "first_name");
        assert_eq!(snake("  Odd--Name__"), "odd_name");
    }

    #[test]
    fn snake_case_is_idempotent() {
        for input in [
            "PIIToken",
            "camelCase",
            "With3dsData",
            "HTTP2Test",
            "KeystoneIDsToUse",
            "Last4",
            "Sha256Hash",
            "v1beta",
            "APIKey",
        ] {
            let once = snake(input);
            assert_eq!(snake(&once), once, "input {input}");
        }
    }

    #[test]
    fn type_key_hyphenates_simple_name() {
        assert_eq!(type_key("RetrieveTestEntity"), "retrieve-test-entity");
        assert_eq!(type_key("crate::model::UserProfile"), "user-profile");
    }

    #[test]
    fn property_prefix_round_trip() {
        let property = Property::parse("address.geo.lat");
        assert_eq!(property.prefix(), "address.geo");
        assert_eq!(property.name(), "lat");
        assert_eq!(property.to_string(), "address.geo.lat");
        assert!(property.is_under("address"));
        assert!(property.is_under("address.geo"));
        assert!(!property.is_under("addr"));
        assert_ne!(Property::new("lat"), property);
    }
}
