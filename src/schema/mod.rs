//! Schema definitions derived from record types, and the per-connection
//! registry that registers them with the server.

mod registry;

pub use registry::{RegisteredType, SchemaRegistry};

use serde::{Deserialize, Serialize};

use crate::core::{KnownType, Property, type_key};
use crate::proto::SchemaResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Regular,
    TimeSeries,
}

/// Type-level schema flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaOption {
    /// Every mutation must carry a comment.
    RequireComments,
    /// Keep a history of every mutation.
    StoreMutations,
    /// Entities may be shared with other workspaces.
    Shareable,
}

/// Per-property schema flags, set through field tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyOption {
    Unique,
    Primary,
    Indexed,
    Searchable,
    Immutable,
    Deprecated,
    Required,
    ReverseLookup,
    VerifyOnly,
    Metric,
    MetricFilter,
    NoSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    #[default]
    Unspecified,
    Personal,
    UserInput,
}

/// Finer classification of masked content held by secure strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendedType {
    #[default]
    None,
    Personal,
    Email,
    Phone,
    PersonName,
    IpAddress,
    Country,
    Url,
    Address,
    DateOfBirth,
}

/// Wire type of a leaf codec: the known-type hint plus any extended class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueType {
    pub known_type: KnownType,
    pub extended: ExtendedType,
}

impl ValueType {
    pub const fn of(known_type: KnownType) -> Self {
        Self {
            known_type,
            extended: ExtendedType::None,
        }
    }

    pub const fn extended(known_type: KnownType, extended: ExtendedType) -> Self {
        Self {
            known_type,
            extended,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub property: Property,
    pub data_type: KnownType,
    pub extended: ExtendedType,
    pub options: Vec<PropertyOption>,
    pub classification: DataClassification,
}

impl PropertyDefinition {
    pub fn new(property: Property, value_type: ValueType) -> Self {
        Self {
            property,
            data_type: value_type.known_type,
            extended: value_type.extended,
            options: Vec::new(),
            classification: DataClassification::Unspecified,
        }
    }

    pub fn has_option(&self, option: PropertyOption) -> bool {
        self.options.contains(&option)
    }
}

/// Metadata registered with the server for one record type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Server-assigned id, empty until registration completes.
    pub id: String,
    pub type_name: String,
    pub name: String,
    pub singular: String,
    pub plural: String,
    pub description: String,
    pub kind: EntityKind,
    pub options: Vec<SchemaOption>,
    pub properties: Vec<PropertyDefinition>,
}

impl EntityDefinition {
    /// Synthesizes display names from the type name: `UserProfile` becomes
    /// key `user-profile`, name and singular `User Profile`, plural
    /// `User Profiles`.
    pub fn new(type_name: &str) -> Self {
        let key = type_key(type_name);
        let name = key
            .split('-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            id: String::new(),
            type_name: key,
            plural: format!("{}s", name),
            singular: name.clone(),
            name,
            description: String::new(),
            kind: EntityKind::Regular,
            options: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Uses an explicit schema key instead of the type-derived one.
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = singular.into();
        self
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_option(mut self, option: SchemaOption) -> Self {
        if !self.options.contains(&option) {
            self.options.push(option);
        }
        self
    }

    pub fn with_properties(mut self, properties: Vec<PropertyDefinition>) -> Self {
        self.properties = properties;
        self
    }

    pub fn requires_comment(&self) -> bool {
        self.options.contains(&SchemaOption::RequireComments)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties
            .iter()
            .find(|definition| definition.property.full_name() == name)
    }

    /// Copies the server-assigned fields of a successful `Define` response.
    pub fn apply_response(&mut self, response: &SchemaResponse) {
        self.id = response.id.clone();
        if !response.name.is_empty() {
            self.name = response.name.clone();
        }
        if !response.singular.is_empty() {
            self.singular = response.singular.clone();
        }
        if !response.plural.is_empty() {
            self.plural = response.plural.clone();
        }
        if !response.options.is_empty() {
            self.options = response.options.clone();
        }
    }
}
