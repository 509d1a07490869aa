//! Wire contract shared with the Keystone service.
//!
//! The generated RPC layer is external to this crate; these message types
//! mirror its shape so the rest of the client can be written against plain
//! Rust structs. A [`Transport`] implementation adapts them to the real channel.

mod messages;
mod transport;

pub use crate::core::value::{KnownType, RepeatedValue, Value};
pub use messages::*;
pub use transport::{
    Metadata, ResponseStream, Transport, TransportCode, TransportError, TransportResult,
    with_deadline,
};
