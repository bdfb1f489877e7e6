use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use taskforge_core::TenantId;

use super::{StoreError, StoreResult};

/// In-memory tenant-isolated map, keyed by `(tenant_id, key)`.
#[derive(Debug)]
pub struct TenantCollection<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> TenantCollection<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<(TenantId, K), V>>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("collection lock poisoned".into()))
    }

    pub(crate) fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<(TenantId, K), V>>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("collection lock poisoned".into()))
    }
}

impl<K, V> Default for TenantCollection<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantCollection<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn get(&self, tenant_id: TenantId, key: &K) -> StoreResult<Option<V>> {
        Ok(self.read()?.get(&(tenant_id, key.clone())).cloned())
    }

    pub fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> StoreResult<()> {
        self.write()?.insert((tenant_id, key), value);
        Ok(())
    }

    /// Replace an existing record; writes to a missing key are dropped.
    pub fn replace(&self, tenant_id: TenantId, key: K, value: V) -> StoreResult<bool> {
        let mut map = self.write()?;
        match map.get_mut(&(tenant_id, key)) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn list(&self, tenant_id: TenantId) -> StoreResult<Vec<V>> {
        Ok(self
            .read()?
            .iter()
            .filter_map(|((t, _k), v)| (*t == tenant_id).then(|| v.clone()))
            .collect())
    }

    pub fn remove(&self, tenant_id: TenantId, key: &K) -> StoreResult<bool> {
        Ok(self.write()?.remove(&(tenant_id, key.clone())).is_some())
    }

    /// Drop every record of `tenant_id` for which `remove` returns true.
    pub fn remove_where(&self, tenant_id: TenantId, mut remove: impl FnMut(&V) -> bool) -> StoreResult<u64> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|(t, _k), v| *t != tenant_id || !remove(v));
        Ok((before - map.len()) as u64)
    }

    /// Apply `update` to every record of `tenant_id`; counts calls that returned true.
    pub fn update_where(&self, tenant_id: TenantId, mut update: impl FnMut(&mut V) -> bool) -> StoreResult<u64> {
        let mut map = self.write()?;
        let mut changed = 0;
        for ((t, _k), v) in map.iter_mut() {
            if *t == tenant_id && update(v) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
