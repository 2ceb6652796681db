use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use tracing::warn;

use assessly_core::OrganizationId;

/// Organization-isolated key/value store abstraction for disposable read models.
///
/// Every operation takes the caller's organization; a read model row is never
/// visible outside the organization that owns it.
pub trait OrganizationStore<K, V>: Send + Sync {
    fn get(&self, organization_id: OrganizationId, key: &K) -> Option<V>;
    fn upsert(&self, organization_id: OrganizationId, key: K, value: V);
    fn list(&self, organization_id: OrganizationId) -> Vec<V>;
    /// Clear all read-model records for an organization (rebuild support).
    fn clear_organization(&self, organization_id: OrganizationId);
}

/// Platform-admin capability: list rows across every organization.
///
/// A separate trait so that request-scoped code holding
/// `&dyn OrganizationStore` cannot reach the unscoped listing.
pub trait GlobalStore<K, V>: Send + Sync {
    fn list_all(&self) -> Vec<V>;
}

impl<K, V, S> OrganizationStore<K, V> for Arc<S>
where
    S: OrganizationStore<K, V> + ?Sized,
{
    fn get(&self, organization_id: OrganizationId, key: &K) -> Option<V> {
        (**self).get(organization_id, key)
    }

    fn upsert(&self, organization_id: OrganizationId, key: K, value: V) {
        (**self).upsert(organization_id, key, value)
    }

    fn list(&self, organization_id: OrganizationId) -> Vec<V> {
        (**self).list(organization_id)
    }

    fn clear_organization(&self, organization_id: OrganizationId) {
        (**self).clear_organization(organization_id)
    }
}

impl<K, V, S> GlobalStore<K, V> for Arc<S>
where
    S: GlobalStore<K, V> + ?Sized,
{
    fn list_all(&self) -> Vec<V> {
        (**self).list_all()
    }
}

/// In-memory organization-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryOrganizationStore<K, V> {
    inner: RwLock<HashMap<(OrganizationId, K), V>>,
}

impl<K, V> InMemoryOrganizationStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryOrganizationStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OrganizationStore<K, V> for InMemoryOrganizationStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, organization_id: OrganizationId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(organization_id, key.clone())).cloned()
    }

    fn upsert(&self, organization_id: OrganizationId, key: K, value: V) {
        match self.inner.write() {
            Ok(mut map) => {
                map.insert((organization_id, key), value);
            }
            // Dropping the write leaves a stale row; the store itself has no
            // error surface, so make the loss visible.
            Err(_) => warn!(%organization_id, "read model store poisoned, upsert dropped"),
        }
    }

    fn list(&self, organization_id: OrganizationId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((org, _k), v)| (*org == organization_id).then(|| v.clone()))
            .collect()
    }

    fn clear_organization(&self, organization_id: OrganizationId) {
        match self.inner.write() {
            Ok(mut map) => {
                map.retain(|(org, _k), _v| *org != organization_id);
            }
            Err(_) => warn!(%organization_id, "read model store poisoned, clear dropped"),
        }
    }
}

impl<K, V> GlobalStore<K, V> for InMemoryOrganizationStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn list_all(&self) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.values().cloned().collect()
    }
}
