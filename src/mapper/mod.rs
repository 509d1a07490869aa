//! Bidirectional mapping between typed records and the wire property bag.
//!
//! Record types derive [`Properties`] (or [`Entity`](crate::Entity)), which
//! compiles a per-type [`FieldPlan`] list once and walks it on every call.
//! Each field type supplies its codec through [`FieldValue`]; leaf types do so
//! via [`ValueMarshaler`] and the [`value_field!`](crate::value_field) macro,
//! composites via [`composite_field!`](crate::composite_field), which recurses
//! with a dotted prefix.

mod collections;
mod plan;
mod scalars;
mod tag;

pub use plan::FieldPlan;
pub use scalars::normalize_f32;
pub use tag::FieldTag;

use crate::core::{KeystoneError, KnownType, Property, PropertyMap, Result, Value};
use crate::proto::EntityProperty;
use crate::schema::{PropertyDefinition, ValueType};

/// Codec for a single leaf value type.
pub trait ValueMarshaler: Default {
    fn marshal_value(&self) -> Result<Value>;

    fn unmarshal_value(&mut self, value: &Value) -> Result<()>;

    /// Known-type hint and extended classification declared for the schema.
    fn value_type() -> ValueType;

    fn is_zero(&self) -> bool;

    /// When true a zero value is left out of the marshalled form even without
    /// `omitempty`. Domain value types elide, primitives do not.
    fn elide_zero() -> bool {
        true
    }

    /// Post-mutation hook; three-bucket types fold pending operations here.
    fn observe_mutation(&mut self, _success: bool) {}
}

/// Field-level codec used by derived record walkers.
pub trait FieldValue: Default {
    fn encode_field(&self, property: Property, tag: &FieldTag, out: &mut PropertyMap) -> Result<()>;

    /// Missing properties leave the field untouched.
    fn decode_field(&mut self, property: &Property, input: &PropertyMap) -> Result<()>;

    fn is_present(property: &Property, input: &PropertyMap) -> bool {
        input.contains_key(property)
    }

    fn describe_field(property: Property, tag: &FieldTag, out: &mut Vec<PropertyDefinition>);

    fn observe_field(&mut self, _success: bool) {}
}

/// A composite with named properties. Usually derived; implementing it by
/// hand replaces the whole-record walker.
pub trait Properties: Default {
    fn marshal_properties(&self, prefix: &str, out: &mut PropertyMap) -> Result<()>;

    fn unmarshal_properties(&mut self, prefix: &str, input: &PropertyMap) -> Result<()>;

    fn describe_properties(prefix: &str, out: &mut Vec<PropertyDefinition>);

    fn observe_properties(&mut self, _success: bool) {}
}

/// Property for `name` under a (possibly empty) dotted `prefix`.
pub fn prefixed(prefix: &str, name: &str) -> Property {
    Property::with_prefix(prefix, name)
}

pub fn encode_leaf<T: ValueMarshaler>(
    value: &T,
    property: Property,
    tag: &FieldTag,
    out: &mut PropertyMap,
) -> Result<()> {
    if value.is_zero() && (T::elide_zero() || tag.omit_empty) {
        return Ok(());
    }
    let mut wire = value.marshal_value().map_err(|err| annotate(err, &property))?;
    if wire.known_type == KnownType::Unspecified {
        wire.known_type = T::value_type().known_type;
    }
    out.insert(property, wire);
    Ok(())
}

pub fn decode_leaf<T: ValueMarshaler>(
    value: &mut T,
    property: &Property,
    input: &PropertyMap,
) -> Result<()> {
    match input.get(property) {
        Some(wire) => value.unmarshal_value(wire).map_err(|err| annotate(err, property)),
        None => Ok(()),
    }
}

pub fn describe_leaf<T: ValueMarshaler>(
    property: Property,
    tag: &FieldTag,
    out: &mut Vec<PropertyDefinition>,
) {
    let mut definition = PropertyDefinition::new(property, T::value_type());
    definition.options = tag.options.clone();
    definition.classification = tag.classification;
    out.push(definition);
}

fn annotate(err: KeystoneError, property: &Property) -> KeystoneError {
    match err {
        KeystoneError::InvalidValue { property: inner, reason } if inner.is_empty() => {
            KeystoneError::InvalidValue {
                property: property.full_name(),
                reason,
            }
        }
        other => other,
    }
}

/// Implements [`FieldValue`] for leaf types through their [`ValueMarshaler`].
#[macro_export]
macro_rules! value_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::mapper::FieldValue for $ty {
                fn encode_field(
                    &self,
                    property: $crate::Property,
                    tag: &$crate::mapper::FieldTag,
                    out: &mut $crate::PropertyMap,
                ) -> $crate::Result<()> {
                    $crate::mapper::encode_leaf(self, property, tag, out)
                }

                fn decode_field(
                    &mut self,
                    property: &$crate::Property,
                    input: &$crate::PropertyMap,
                ) -> $crate::Result<()> {
                    $crate::mapper::decode_leaf(self, property, input)
                }

                fn describe_field(
                    property: $crate::Property,
                    tag: &$crate::mapper::FieldTag,
                    out: &mut Vec<$crate::schema::PropertyDefinition>,
                ) {
                    $crate::mapper::describe_leaf::<Self>(property, tag, out)
                }

                fn observe_field(&mut self, success: bool) {
                    $crate::mapper::ValueMarshaler::observe_mutation(self, success)
                }
            }
        )+
    };
}

/// Implements [`FieldValue`] for composites: nested properties are written
/// under the field's canonical name as a dotted prefix.
#[macro_export]
macro_rules! composite_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::mapper::FieldValue for $ty {
                fn encode_field(
                    &self,
                    property: $crate::Property,
                    _tag: &$crate::mapper::FieldTag,
                    out: &mut $crate::PropertyMap,
                ) -> $crate::Result<()> {
                    $crate::mapper::Properties::marshal_properties(self, &property.full_name(), out)
                }

                fn decode_field(
                    &mut self,
                    property: &$crate::Property,
                    input: &$crate::PropertyMap,
                ) -> $crate::Result<()> {
                    $crate::mapper::Properties::unmarshal_properties(self, &property.full_name(), input)
                }

                fn is_present(property: &$crate::Property, input: &$crate::PropertyMap) -> bool {
                    let path = property.full_name();
                    input.keys().any(|candidate| candidate.is_under(&path))
                }

                fn describe_field(
                    property: $crate::Property,
                    _tag: &$crate::mapper::FieldTag,
                    out: &mut Vec<$crate::schema::PropertyDefinition>,
                ) {
                    <Self as $crate::mapper::Properties>::describe_properties(&property.full_name(), out)
                }

                fn observe_field(&mut self, success: bool) {
                    $crate::mapper::Properties::observe_properties(self, success)
                }
            }
        )+
    };
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn encode_field(&self, property: Property, tag: &FieldTag, out: &mut PropertyMap) -> Result<()> {
        match self {
            Some(value) => value.encode_field(property, tag, out),
            None => Ok(()),
        }
    }

    fn decode_field(&mut self, property: &Property, input: &PropertyMap) -> Result<()> {
        if !T::is_present(property, input) {
            return Ok(());
        }
        let mut value = self.take().unwrap_or_default();
        let decoded = value.decode_field(property, input);
        *self = Some(value);
        decoded
    }

    fn is_present(property: &Property, input: &PropertyMap) -> bool {
        T::is_present(property, input)
    }

    fn describe_field(property: Property, tag: &FieldTag, out: &mut Vec<PropertyDefinition>) {
        T::describe_field(property, tag, out)
    }

    fn observe_field(&mut self, success: bool) {
        if let Some(value) = self {
            value.observe_field(success);
        }
    }
}

/// Marshals a record into its wire property bag.
pub fn marshal<T: Properties>(record: &T) -> Result<PropertyMap> {
    let mut out = PropertyMap::new();
    record.marshal_properties("", &mut out)?;
    Ok(out)
}

/// Writes matching properties into `record`; absent properties leave fields untouched.
pub fn unmarshal<T: Properties>(input: &PropertyMap, record: &mut T) -> Result<()> {
    record.unmarshal_properties("", input)
}

/// Flattened property definitions of a record type.
pub fn describe<T: Properties>() -> Vec<PropertyDefinition> {
    let mut out = Vec::new();
    T::describe_properties("", &mut out);
    out
}

/// Runs every value-level mutation observer inside `record`.
pub fn observe_mutation<T: Properties>(record: &mut T, success: bool) {
    record.observe_properties(success);
}

pub fn to_entity_properties(properties: &PropertyMap) -> Vec<EntityProperty> {
    properties
        .iter()
        .map(|(property, value)| EntityProperty::new(property.full_name(), value.clone()))
        .collect()
}

pub fn from_entity_properties(properties: &[EntityProperty]) -> PropertyMap {
    properties
        .iter()
        .map(|entry| (Property::parse(&entry.property), entry.value.clone()))
        .collect()
}
