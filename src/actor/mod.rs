//! Per-caller request context.
//!
//! An [`Actor`] bundles the connection with the workspace, trace id and end
//! user a piece of work runs for. Every RPC goes through it: it stamps the
//! authorization block, registers record schemas before first use, dispatches
//! and interprets the response.

mod mutate;
mod query;
mod retrieve;

pub use retrieve::Retriever;

use std::sync::Arc;

use tracing::{Span, info_span};
use uuid::Uuid;

use crate::connection::Connection;
use crate::core::{KeystoneError, Result};
use crate::entity::Entity;
use crate::filter::STATE_PROPERTY;
use crate::proto::{Authorization, Metadata, ResponseStatus, User};
use crate::schema::RegisteredType;

/// Workspace id addressing every workspace at once.
pub const ALL_WORKSPACES: &str = "__";

pub const META_WORKSPACE: &str = "keystone-workspace";
pub const META_TRACE_ID: &str = "keystone-trace-id";
pub const META_VENDOR: &str = "keystone-vendor";
pub const META_APP: &str = "keystone-app";
pub const META_TOKEN: &str = "keystone-token";
pub const META_CLIENT: &str = "keystone-client";
pub const META_USER_ID: &str = "keystone-user-id";
pub const META_USER_AGENT: &str = "keystone-user-agent";
pub const META_REMOTE_IP: &str = "keystone-remote-ip";

#[derive(Debug, Clone, Default)]
pub struct Actor {
    connection: Option<Arc<Connection>>,
    workspace_id: String,
    trace_id: String,
    user: Option<User>,
}

impl Actor {
    pub(crate) fn new(connection: Arc<Connection>, workspace_id: impl Into<String>, user: Option<User>) -> Self {
        Self {
            connection: Some(connection),
            workspace_id: workspace_id.into(),
            trace_id: Uuid::new_v4().to_string(),
            user,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn set_trace_id(&mut self, trace_id: impl Into<String>) {
        self.trace_id = trace_id.into();
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.set_trace_id(trace_id);
        self
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Same caller, addressing all workspaces.
    pub fn clone_without_workspace(&self) -> Self {
        Self {
            workspace_id: ALL_WORKSPACES.to_string(),
            ..self.clone()
        }
    }

    pub fn connection(&self) -> Result<&Arc<Connection>> {
        self.connection.as_ref().ok_or(KeystoneError::NilActor)
    }

    pub fn authorization(&self) -> Result<Authorization> {
        let connection = self.connection()?;
        Ok(Authorization {
            source: connection.vendor_app(),
            token: connection.config().access_token.clone(),
            trace_id: self.trace_id.clone(),
            workspace_id: self.workspace_id.clone(),
            user: Some(self.effective_user(connection)),
        })
    }

    /// The authorization fields as stream metadata.
    pub fn metadata(&self) -> Result<Metadata> {
        let connection = self.connection()?;
        let config = connection.config();
        let user = self.effective_user(connection);
        Ok(Metadata::from([
            (META_WORKSPACE.to_string(), self.workspace_id.clone()),
            (META_TRACE_ID.to_string(), self.trace_id.clone()),
            (META_VENDOR.to_string(), config.vendor_id.clone()),
            (META_APP.to_string(), config.app_id.clone()),
            (META_TOKEN.to_string(), config.access_token.clone()),
            (META_CLIENT.to_string(), user.client),
            (META_USER_ID.to_string(), user.user_id),
            (META_USER_AGENT.to_string(), user.user_agent),
            (META_REMOTE_IP.to_string(), user.remote_ip),
        ]))
    }

    /// The actor's user with connection-level client defaults filled in.
    fn effective_user(&self, connection: &Connection) -> User {
        let mut user = self.user.clone().unwrap_or_default();
        if user.client.is_empty() {
            user.client = connection.config().client_name.clone();
        }
        if user.user_agent.is_empty() {
            user.user_agent = connection.config().user_agent.clone();
        }
        user
    }

    fn span(&self, rpc: &'static str) -> Span {
        info_span!(
            "keystone.rpc",
            rpc,
            workspace = %self.workspace_id,
            trace_id = %self.trace_id,
        )
    }

    /// Finds or derives the schema of `T`, registering it before returning.
    async fn register<T: Entity>(&self, connection: &Connection) -> Result<RegisteredType> {
        let (registered, known) = connection.registry().register_type::<T>(T::definition);
        if registered.has_property(STATE_PROPERTY) {
            return Err(KeystoneError::ReservedProperty(STATE_PROPERTY.to_string()));
        }
        if !registered.is_registered() {
            let authorization = self.authorization()?;
            let deadline = connection.config().request_timeout;
            if known {
                connection
                    .registry()
                    .ensure_registered(&registered, connection.transport(), &authorization, deadline)
                    .await;
            } else {
                connection
                    .registry()
                    .sync_schema(connection.transport(), &authorization, deadline)
                    .await;
            }
        }
        Ok(registered)
    }
}

/// Converts an error-bearing response status into [`KeystoneError::Remote`].
fn check_status(status: &ResponseStatus) -> Result<()> {
    if status.is_error() {
        return Err(KeystoneError::Remote(status.clone().into()));
    }
    Ok(())
}
