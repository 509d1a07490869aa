pub mod error;
pub mod property;
pub mod value;

pub use error::{KeystoneError, RemoteError, Result};
pub use property::{Property, snake, type_key};
pub use value::{KnownType, RepeatedValue, Value};

/// Marshalled form of a record: canonical property to wire value.
pub type PropertyMap = std::collections::BTreeMap<Property, Value>;
