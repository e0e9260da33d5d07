//! Process-wide cache of tenant code → initialized connection.
//!
//! Each tenant gets a slot holding a `OnceCell`. The slot map lock is only held
//! to look up or insert slots; initialization runs inside the cell so concurrent
//! first requests for one tenant share a single attempt while other tenants
//! proceed independently.

use super::handle::TenantConnection;
use crate::tenant::TenantCode;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<TenantConnection>>>;

/// Explicitly constructed and injected; tests build isolated instances.
/// Entries are never evicted on their own, only through `invalidate` or `drain`.
#[derive(Default)]
pub struct ConnectionCache {
    slots: Mutex<HashMap<TenantCode, Slot>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TenantCode, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialized handle for the tenant, if any.
    pub fn get(&self, code: &TenantCode) -> Option<Arc<TenantConnection>> {
        self.slots().get(code).and_then(|slot| slot.get().cloned())
    }

    /// Return the cached handle or run `init` to create it. Concurrent callers for the
    /// same code wait on the one in-flight `init`; if it fails nothing is stored and the
    /// next waiter (or a later request) runs its own `init`.
    pub async fn get_or_create<F, Fut, E>(&self, code: &TenantCode, init: F) -> Result<Arc<TenantConnection>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TenantConnection, E>>,
    {
        // Declared before `slot` so it runs after our strong reference is gone.
        let mut release = ReleaseIfEmpty {
            cache: self,
            code,
            slot: Weak::new(),
        };
        let slot = self.slots().entry(code.clone()).or_default().clone();
        release.slot = Arc::downgrade(&slot);
        let conn = slot
            .get_or_try_init(|| async move { init().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(conn))
    }

    /// Slots in the map, including ones still initializing.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots().len()
    }

    /// Drop the tenant's slot so the next access reinitializes. Requests already holding
    /// the old handle keep using it until they complete.
    pub fn invalidate(&self, code: &TenantCode) -> Option<Arc<TenantConnection>> {
        self.slots()
            .remove(code)
            .and_then(|slot| slot.get().cloned())
    }

    /// Initialized handles ordered by tenant code.
    pub fn snapshot(&self) -> Vec<Arc<TenantConnection>> {
        let mut conns: Vec<Arc<TenantConnection>> =
            self.slots().values().filter_map(|slot| slot.get().cloned()).collect();
        conns.sort_by(|a, b| a.tenant().cmp(b.tenant()));
        conns
    }

    pub fn len(&self) -> usize {
        self.slots().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry, returning the initialized handles (process shutdown).
    pub fn drain(&self) -> Vec<Arc<TenantConnection>> {
        self.slots()
            .drain()
            .filter_map(|(_, slot)| slot.get().cloned())
            .collect()
    }
}

/// Removes a slot that is still empty once the last caller holding it has left, whether
/// its `init` failed or the caller was cancelled mid-init. Keeps unknown codes and failed
/// connects from accumulating in the map.
struct ReleaseIfEmpty<'a> {
    cache: &'a ConnectionCache,
    code: &'a TenantCode,
    slot: Weak<OnceCell<Arc<TenantConnection>>>,
}

impl Drop for ReleaseIfEmpty<'_> {
    fn drop(&mut self) {
        let mut slots = self.cache.slots();
        let unused = slots.get(self.code).is_some_and(|slot| {
            std::ptr::eq(Arc::as_ptr(slot), self.slot.as_ptr())
                && Arc::strong_count(slot) == 1
                && !slot.initialized()
        });
        if unused {
            slots.remove(self.code);
        }
    }
}
