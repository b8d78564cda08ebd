// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded per-tenant cache with single-flight initialization.
//!
//! Each tenant maps to a shared `OnceCell` slot. The LRU map is only locked
//! long enough to find or create the slot; initialization runs outside it,
//! so different tenants initialize in parallel while concurrent callers for
//! the same tenant wait on one initializer.
//!
//! A failed initialization leaves the slot empty and the next caller retries
//! on the same slot.
//!
//! Eviction only picks idle slots: initialized ones, or empty ones nobody is
//! waiting on. Evicting drops the cache's reference; values already handed
//! out stay valid.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use tokio::sync::OnceCell;

use super::kdf::TenantId;

/// Default number of tenants kept per cache.
///
/// Slots still initializing are never evicted. When every slot is busy, a new
/// tenant gets an uncached slot, and a concurrent caller for that same tenant
/// may then initialize a second handle.
pub const DEFAULT_TENANT_CAPACITY: usize = 10_000;

type Slot<V> = Arc<OnceCell<V>>;

/// In-process LRU of lazily initialized per-tenant values.
pub struct TenantCache<V> {
    slots: Mutex<LruCache<TenantId, Slot<V>>>,
}

impl<V: Clone> TenantCache<V> {
    /// Create a cache holding at most `capacity` tenants (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn slot(&self, tenant: &TenantId) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(tenant) {
            return Arc::clone(slot);
        }
        let slot: Slot<V> = Arc::new(OnceCell::new());
        if slots.len() >= slots.cap().get() {
            let idle = slots
                .iter()
                .rev()
                .find(|(_, slot)| slot.initialized() || Arc::strong_count(slot) == 1)
                .map(|(tenant, _)| tenant.clone());
            match idle {
                Some(idle) => {
                    slots.pop(&idle);
                }
                None => return slot,
            }
        }
        slots.put(tenant.clone(), Arc::clone(&slot));
        slot
    }

    /// Return the cached value, running `init` at most once per tenant at a
    /// time when it is missing.
    pub async fn get_or_try_init<F, Fut, E>(&self, tenant: &TenantId, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(tenant);
        let value = slot.get_or_try_init(init).await?;
        Ok(value.clone())
    }

    /// Cached value, if initialized.
    pub fn get(&self, tenant: &TenantId) -> Option<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(tenant).and_then(|slot| slot.get().cloned())
    }

    /// Remove the tenant's entry unconditionally.
    pub fn invalidate(&self, tenant: &TenantId) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.pop(tenant).is_some()
    }

    /// Number of tenant slots currently held.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
