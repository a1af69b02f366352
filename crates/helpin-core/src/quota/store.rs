//! Keyed storage for rate windows.
//!
//! The limiter never holds a lock across principals: every mutation goes
//! through [`RateWindowStore::with_entry`], which must run the closure while
//! holding exclusive access to that one key only.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use helpin_types::principal::PrincipalId;
use helpin_types::quota::RateWindowEntry;

/// Storage for per-principal rate windows.
pub trait RateWindowStore: Send + Sync {
    /// Run `f` with exclusive access to the principal's slot.
    ///
    /// The slot is `None` when no entry exists. Setting it to `None` removes
    /// the entry.
    fn with_entry<R>(
        &self,
        principal: &PrincipalId,
        f: impl FnOnce(&mut Option<RateWindowEntry>) -> R,
    ) -> R;

    /// Copy of the principal's entry, if any.
    fn get(&self, principal: &PrincipalId) -> Option<RateWindowEntry>;

    /// Keep only the entries for which `keep` returns true.
    fn retain(&self, keep: impl FnMut(&PrincipalId, &RateWindowEntry) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sharded in-memory store. Principals on different shards never contend.
#[derive(Debug, Default)]
pub struct DashMapRateStore {
    entries: DashMap<PrincipalId, RateWindowEntry>,
}

impl DashMapRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateWindowStore for DashMapRateStore {
    fn with_entry<R>(
        &self,
        principal: &PrincipalId,
        f: impl FnOnce(&mut Option<RateWindowEntry>) -> R,
    ) -> R {
        match self.entries.entry(principal.clone()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(*occupied.get());
                let result = f(&mut slot);
                match slot {
                    Some(updated) => {
                        occupied.insert(updated);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(created) = slot {
                    vacant.insert(created);
                }
                result
            }
        }
    }

    fn get(&self, principal: &PrincipalId) -> Option<RateWindowEntry> {
        self.entries.get(principal).map(|e| *e)
    }

    fn retain(&self, mut keep: impl FnMut(&PrincipalId, &RateWindowEntry) -> bool) {
        self.entries.retain(|k, v| keep(k, v));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
