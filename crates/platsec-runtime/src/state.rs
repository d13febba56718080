//! [`ResourceStore`] – versioned, in-memory resource state.
//!
//! The store is the single place resources live.  Readers get whole
//! snapshots ([`ResourceStore::get`], [`ResourceStore::list`]); writers go
//! through [`ResourceStore::modify`], which decodes the current spec (or a
//! default one), applies a mutation function and commits the result under the
//! store's write lock.  A reader therefore never sees a half-applied change.
//!
//! Every commit that changes the store is announced on a
//! [`tokio::sync::broadcast`] channel so that controllers with declared
//! inputs can be woken up; see [`ResourceStore::subscribe`].

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use platsec_types::{Metadata, PlatError, Resource, ResourceKey, ResourceSpec};
use tokio::sync::broadcast;
use tracing::debug;

/// Number of buffered change events before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventKind {
    Created,
    Updated,
}

/// A committed change, carrying the resource as it was committed.
#[derive(Debug, Clone)]
pub struct ResourceEvent {
    pub kind: ResourceEventKind,
    pub resource: Resource,
}

/// Shared resource store.  Clone it cheaply – all clones share the same
/// underlying map and change channel.
///
/// # Example
///
/// ```
/// use platsec_runtime::state::ResourceStore;
/// use platsec_types::{SecurityStateSpec, NAMESPACE_RUNTIME, SECURITY_STATE_ID};
///
/// let store = ResourceStore::default();
/// store
///     .modify::<SecurityStateSpec, _>("doc", NAMESPACE_RUNTIME, SECURITY_STATE_ID, |s| {
///         s.secure_boot = true;
///         Ok(())
///     })
///     .unwrap();
///
/// let (meta, spec) = store
///     .get_typed::<SecurityStateSpec>(NAMESPACE_RUNTIME, SECURITY_STATE_ID)
///     .unwrap()
///     .unwrap();
/// assert_eq!(meta.version, 1);
/// assert!(spec.secure_boot);
/// ```
#[derive(Clone, Debug)]
pub struct ResourceStore {
    resources: Arc<RwLock<BTreeMap<ResourceKey, Resource>>>,
    changes: broadcast::Sender<ResourceEvent>,
}

impl ResourceStore {
    /// Create an empty store whose change channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            resources: Arc::new(RwLock::new(BTreeMap::new())),
            changes,
        }
    }

    /// Snapshot of the resource stored under `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<Resource> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Snapshot of the `T` resource `id` in `namespace`, decoded.
    ///
    /// # Errors
    ///
    /// Returns [`PlatError::Codec`] if the stored spec does not decode as `T`.
    pub fn get_typed<T: ResourceSpec>(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<Option<(Metadata, T)>, PlatError> {
        match self.get(&ResourceKey::of::<T>(namespace, id)) {
            Some(resource) => {
                let spec = resource.typed_spec::<T>()?;
                Ok(Some((resource.metadata, spec)))
            }
            None => Ok(None),
        }
    }

    /// All resources of `resource_type` in `namespace`, ordered by id.
    pub fn list(&self, namespace: &str, resource_type: &str) -> Vec<Resource> {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.metadata.namespace == namespace && r.metadata.resource_type == resource_type)
            .cloned()
            .collect()
    }

    /// Total number of stored resources.
    pub fn len(&self) -> usize {
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Modify-or-create the `T` resource `id` in `namespace`.
    ///
    /// `mutate` receives the current spec, or `T::default()` when the
    /// resource does not exist yet.  Nothing is committed if `mutate` fails.
    /// When the resulting spec equals the stored one the resource is left
    /// untouched (same version, same `updated` timestamp) and no change
    /// event is published.
    ///
    /// Returns the resource as it is stored after the call.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `mutate`, or [`PlatError::Codec`] if
    /// the stored or mutated spec cannot be (de)serialised.
    pub fn modify<T, F>(
        &self,
        owner: &str,
        namespace: &str,
        id: &str,
        mutate: F,
    ) -> Result<Resource, PlatError>
    where
        T: ResourceSpec,
        F: FnOnce(&mut T) -> Result<(), PlatError>,
    {
        let key = ResourceKey::of::<T>(namespace, id);
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);

        let current = resources.get(&key);
        let mut spec = match current {
            Some(existing) => existing.typed_spec::<T>()?,
            None => T::default(),
        };
        mutate(&mut spec)?;

        let encoded = serde_json::to_value(&spec)
            .map_err(|e| PlatError::Codec(format!("encode {key}: {e}")))?;

        let now = Utc::now();
        let (kind, committed) = match current {
            Some(existing) if existing.spec == encoded => {
                debug!(resource = %key, version = existing.metadata.version, "modify left resource unchanged");
                return Ok(existing.clone());
            }
            Some(existing) => {
                let mut metadata = existing.metadata.clone();
                metadata.version += 1;
                metadata.owner = owner.to_string();
                metadata.updated = now;
                (ResourceEventKind::Updated, Resource { metadata, spec: encoded })
            }
            None => {
                let metadata = Metadata {
                    namespace: key.namespace.clone(),
                    resource_type: key.resource_type.clone(),
                    id: key.id.clone(),
                    version: 1,
                    owner: owner.to_string(),
                    created: now,
                    updated: now,
                };
                (ResourceEventKind::Created, Resource { metadata, spec: encoded })
            }
        };

        resources.insert(key.clone(), committed.clone());
        debug!(resource = %key, version = committed.metadata.version, ?kind, %owner, "resource committed");

        // Published under the lock so subscribers see versions in order.
        // Having no subscribers is normal.
        let _ = self.changes.send(ResourceEvent {
            kind,
            resource: committed.clone(),
        });

        Ok(committed)
    }

    /// Subscribe to committed changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.changes.subscribe()
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
