pub mod config;

use std::future::Future;
use std::sync::Arc;

pub use config::ConnectionConfig;

use crate::actor::Actor;
use crate::core::Result;
use crate::proto::{Authorization, Transport, TransportResult, User, VendorApp, with_deadline};
use crate::schema::SchemaRegistry;

/// Application-level handle on the Keystone service
///
/// Owns the transport channel, the application identity and the schema
/// registry shared by every actor it mints. Create one per process.
pub struct Connection {
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    registry: SchemaRegistry,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            transport,
            config,
            registry: SchemaRegistry::new(),
        }))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn vendor_app(&self) -> VendorApp {
        self.config.vendor_app()
    }

    /// Authorization for app-level calls that act in no workspace.
    pub fn authorization(&self) -> Authorization {
        Authorization {
            source: self.vendor_app(),
            token: self.config.access_token.clone(),
            ..Authorization::default()
        }
    }

    /// An actor working in `workspace_id` on behalf of `user`.
    pub fn actor(self: &Arc<Self>, workspace_id: impl Into<String>, user: Option<User>) -> Actor {
        Actor::new(Arc::clone(self), workspace_id, user)
    }

    /// Registers every record type seen so far that is not registered yet.
    pub async fn sync_schema(&self) {
        self.registry
            .sync_schema(
                self.transport.as_ref(),
                &self.authorization(),
                self.config.request_timeout,
            )
            .await;
    }

    /// Awaits a unary call within the configured request timeout.
    pub(crate) async fn request<T>(
        &self,
        rpc: &str,
        call: impl Future<Output = TransportResult<T>>,
    ) -> Result<T> {
        Ok(with_deadline(self.config.request_timeout, rpc, call).await?)
    }

    /// Awaits the opening of a stream within the connect timeout.
    pub(crate) async fn open_stream<T>(
        &self,
        rpc: &str,
        call: impl Future<Output = TransportResult<T>>,
    ) -> Result<T> {
        Ok(with_deadline(Some(self.config.connect_timeout), rpc, call).await?)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint())
            .field("vendor_id", &self.config.vendor_id)
            .field("app_id", &self.config.app_id)
            .field("types", &self.registry.len())
            .finish()
    }
}
