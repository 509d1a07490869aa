//! Everyday imports for application code: `use keystone::prelude::*;`.

pub use crate::actor::{Actor, Retriever};
pub use crate::connection::{Connection, ConnectionConfig};
pub use crate::core::{KeystoneError, Property, PropertyMap, RemoteError, Result, Value};
pub use crate::entity::{
    BaseEntity, Entity, EntityChildren, EntityDocuments, EntityEvents, EntityLabels, EntityLock,
    EntityLogs, EntityObjects, EntityRelationships, EntitySensors,
};
pub use crate::filter::{self, FilterRequest, FindOption};
pub use crate::mapper::Properties;
pub use crate::mutate::{self, MutateOption};
pub use crate::proto::{EntityState, LogLevel, Transport, User};
pub use crate::retrieve::{self, RetrieveOption};
pub use crate::stream::{EventStream, LogStream, TaskStream};
pub use crate::types::{
    Amount, ExternalId, HashId, IntSet, Interval, IntervalType, KeyMixed, Keyed, MinMax, Mixed,
    SecureString, StringSet, Translations, VerifyString,
};

pub use keystone_derive::{Entity, Properties};
