//! Client core for the Keystone remote entity store.
//!
//! Records are plain structs deriving [`Entity`] (top-level) or
//! [`Properties`] (nested composites). A [`Connection`] owns the transport
//! and the schema registry; an [`Actor`] scopes every RPC to one workspace,
//! trace and user.
//!
//! ```ignore
//! use keystone::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! struct Customer {
//!     #[keystone(embed)]
//!     base: BaseEntity,
//!     #[keystone(unique)]
//!     email: String,
//!     balance: Amount,
//! }
//!
//! let connection = Connection::new(transport, ConnectionConfig::from_env()?)?;
//! let actor = connection.actor("ws-1", None);
//! let mut customer = Customer::default();
//! actor.get_by_id("cus-1", &mut customer, &[]).await?;
//! customer.balance = customer.balance.add(&Amount::new("USD", 500))?;
//! actor.mutate(&mut customer, &[]).await?;
//! ```

extern crate self as keystone;

pub mod actor;
pub mod connection;
pub mod core;
pub mod entity;
pub mod filter;
pub mod mapper;
pub mod mutate;
pub mod prelude;
pub mod proto;
pub mod retrieve;
pub mod schema;
pub mod stream;
pub mod types;
pub mod watcher;

pub use actor::{Actor, Retriever};
pub use connection::{Connection, ConnectionConfig};
pub use self::core::{KeystoneError, Property, PropertyMap, RemoteError, Result, Value};
pub use entity::{Entity, EntityTraits};
pub use mapper::Properties;

/// `#[derive(Entity)]` and `#[derive(Properties)]`.
pub use keystone_derive::{Entity, Properties};
