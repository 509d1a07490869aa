use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{Level, event, info_span, Instrument};

use super::EntityDefinition;
use crate::core::KeystoneError;
use crate::proto::{Authorization, Key, SchemaRequest, Transport, VendorApp, with_deadline};

struct TypeEntry {
    definition: RwLock<EntityDefinition>,
    /// Initialized once `Define` has succeeded. Concurrent callers await the
    /// same in-flight initialization; a failure leaves it empty for a retry.
    registered: OnceCell<()>,
}

impl TypeEntry {
    fn snapshot(&self) -> EntityDefinition {
        self.definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Handle on one record type's registry entry.
#[derive(Clone)]
pub struct RegisteredType {
    entry: Arc<TypeEntry>,
}

impl RegisteredType {
    pub fn definition(&self) -> EntityDefinition {
        self.entry.snapshot()
    }

    /// Kebab-cased schema key.
    pub fn type_name(&self) -> String {
        self.entry
            .definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .type_name
            .clone()
    }

    pub fn key(&self, source: &VendorApp) -> Key {
        Key::new(source.clone(), self.type_name())
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.entry
            .definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .property(name)
            .is_some()
    }

    pub fn is_registered(&self) -> bool {
        self.entry.registered.initialized()
    }

    pub fn requires_comment(&self) -> bool {
        self.entry
            .definition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requires_comment()
    }
}

impl std::fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredType")
            .field("type_name", &self.type_name())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Per-connection map from record type to its schema definition.
///
/// Entries are derived on first sight and registered with the server at most
/// once; see [`SchemaRegistry::sync_schema`].
#[derive(Default)]
pub struct SchemaRegistry {
    entries: Mutex<HashMap<TypeId, Arc<TypeEntry>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the entry for `T`, deriving it with `derive` when absent.
    /// The flag is true when the type was already known.
    pub fn register_type<T: 'static>(
        &self,
        derive: impl FnOnce() -> EntityDefinition,
    ) -> (RegisteredType, bool) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&TypeId::of::<T>()) {
            return (
                RegisteredType {
                    entry: Arc::clone(entry),
                },
                true,
            );
        }
        let entry = Arc::new(TypeEntry {
            definition: RwLock::new(derive()),
            registered: OnceCell::new(),
        });
        entries.insert(TypeId::of::<T>(), Arc::clone(&entry));
        (RegisteredType { entry }, false)
    }

    pub fn get<T: 'static>(&self) -> Option<RegisteredType> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .map(|entry| RegisteredType {
                entry: Arc::clone(entry),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers every entry not yet registered and waits for all of them.
    ///
    /// Entries already being registered by another caller are awaited rather
    /// than defined twice. Failures are logged and leave the entry
    /// unregistered so the next sync retries it.
    pub async fn sync_schema(
        &self,
        transport: &dyn Transport,
        authorization: &Authorization,
        deadline: Option<Duration>,
    ) {
        let pending: Vec<Arc<TypeEntry>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| !entry.registered.initialized())
            .cloned()
            .collect();
        if pending.is_empty() {
            return;
        }
        join_all(
            pending
                .iter()
                .map(|entry| register_entry(entry, transport, authorization, deadline)),
        )
        .await;
    }

    /// Registers one type, waiting on an in-flight registration if any.
    pub async fn ensure_registered(
        &self,
        registered: &RegisteredType,
        transport: &dyn Transport,
        authorization: &Authorization,
        deadline: Option<Duration>,
    ) {
        register_entry(&registered.entry, transport, authorization, deadline).await;
    }
}

async fn register_entry(
    entry: &TypeEntry,
    transport: &dyn Transport,
    authorization: &Authorization,
    deadline: Option<Duration>,
) {
    if entry.registered.initialized() {
        return;
    }
    let schema = entry.snapshot();
    let span = info_span!("keystone.schema.define", schema = %schema.type_name);
    let outcome = entry
        .registered
        .get_or_try_init(|| async move {
            let define = transport.define(SchemaRequest {
                authorization: authorization.clone(),
                schema,
            });
            let response = with_deadline(deadline, "define", define).await?;
            if response.status.is_error() {
                return Err(KeystoneError::Remote(response.status.into()));
            }
            entry
                .definition
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .apply_response(&response);
            event!(Level::DEBUG, id = %response.id, "schema registered");
            Ok::<(), KeystoneError>(())
        })
        .instrument(span.clone())
        .await;
    if let Err(err) = outcome {
        let _enter = span.enter();
        event!(Level::ERROR, error = %err, "schema registration failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    struct Gadget;

    #[test]
    fn derive_runs_once_per_type() {
        let registry = SchemaRegistry::new();
        let (first, known) = registry.register_type::<Widget>(|| EntityDefinition::new("Widget"));
        assert!(!known);
        assert_eq!(first.type_name(), "widget");

        let (_, known) = registry.register_type::<Widget>(|| panic!("derived twice"));
        assert!(known);

        registry.register_type::<Gadget>(|| EntityDefinition::new("Gadget"));
        assert_eq!(registry.len(), 2);
        assert!(!first.is_registered());
    }
}
