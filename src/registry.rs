//! Device registry: which devices are currently bridged.
//!
//! Registration takes two steps. The discovery loop [`Registry::reserve`]s an
//! identity as soon as the device appears, then the slow registration work
//! runs elsewhere and [`Registry::register`]s the finished record with the
//! ticket it was given. A disappearance in between removes the reservation,
//! so the late `register` is refused and the caller releases what it opened.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::types::DeviceId;

/// Proof of a reservation made by [`Registry::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
enum Entry<R> {
    Pending(Ticket),
    Active(Ticket, Arc<R>),
}

/// Owned map from device identity to bridge record.
///
/// All access is serialised through one mutex that is never held across an
/// `.await`.
#[derive(Debug)]
pub struct Registry<R> {
    entries: Mutex<HashMap<DeviceId, Entry<R>>>,
    next_ticket: AtomicU64,
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Registry<R> {
    pub fn new() -> Self {
        Registry {
            entries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Claim `id` for a registration in progress.
    ///
    /// Returns `None` if the device is already registered or being registered.
    pub fn reserve(&self, id: DeviceId) -> Option<Ticket> {
        let mut entries = self.entries();
        if entries.contains_key(&id) {
            debug!("A light with the ID '{}' has already been added", id);
            return None;
        }
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        entries.insert(id, Entry::Pending(ticket));
        Some(ticket)
    }

    /// Fill the reservation held by `ticket` with `record`.
    ///
    /// Hands the record back if the reservation is gone, either because the
    /// device disappeared meanwhile or because a newer reservation replaced it.
    pub fn register(&self, id: DeviceId, ticket: Ticket, record: R) -> Result<Arc<R>, R> {
        let mut entries = self.entries();
        match entries.get(&id) {
            Some(Entry::Pending(pending)) if *pending == ticket => {
                let record = Arc::new(record);
                entries.insert(id, Entry::Active(ticket, Arc::clone(&record)));
                Ok(record)
            }
            Some(Entry::Active(..)) => {
                debug!("A light with the ID '{}' has already been added", id);
                Err(record)
            }
            _ => {
                debug!("Registration of light '{}' was cancelled", id);
                Err(record)
            }
        }
    }

    /// Remove `id` only if its entry still belongs to `ticket`.
    ///
    /// Returns the record if registration had completed. Entries created by a
    /// later reservation of the same identity are left alone.
    pub fn release(&self, id: DeviceId, ticket: Ticket) -> Option<Arc<R>> {
        let mut entries = self.entries();
        let owned = match entries.get(&id) {
            Some(Entry::Pending(pending)) => *pending == ticket,
            Some(Entry::Active(active, _)) => *active == ticket,
            None => false,
        };
        if !owned {
            return None;
        }
        match entries.remove(&id) {
            Some(Entry::Active(_, record)) => Some(record),
            _ => None,
        }
    }

    /// Remove `id`, returning its record if registration had completed.
    ///
    /// A pending reservation is cancelled. Unknown identities are a no-op.
    pub fn unregister(&self, id: DeviceId) -> Option<Arc<R>> {
        match self.entries().remove(&id) {
            Some(Entry::Active(_, record)) => Some(record),
            Some(Entry::Pending(_)) => {
                debug!("Cancelled pending registration of light '{}'", id);
                None
            }
            None => {
                debug!(
                    "Cannot remove a light with the ID '{}' that has not been added before",
                    id
                );
                None
            }
        }
    }

    pub fn lookup(&self, id: DeviceId) -> Option<Arc<R>> {
        match self.entries().get(&id) {
            Some(Entry::Active(_, record)) => Some(Arc::clone(record)),
            _ => None,
        }
    }

    /// Consistent snapshot of every registered record, ordered by identity.
    pub fn all(&self) -> Vec<(DeviceId, Arc<R>)> {
        let mut records: Vec<_> = self
            .entries()
            .iter()
            .filter_map(|(id, entry)| match entry {
                Entry::Active(_, record) => Some((*id, Arc::clone(record))),
                Entry::Pending(_) => None,
            })
            .collect();
        records.sort_by_key(|(id, _)| *id);
        records
    }

    /// Remove everything, cancelling pending reservations, and return the
    /// registered records.
    pub fn drain(&self) -> Vec<(DeviceId, Arc<R>)> {
        let mut records: Vec<_> = self
            .entries()
            .drain()
            .filter_map(|(id, entry)| match entry {
                Entry::Active(_, record) => Some((id, record)),
                Entry::Pending(_) => None,
            })
            .collect();
        records.sort_by_key(|(id, _)| *id);
        records
    }

    /// Number of registered records, excluding pending reservations.
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|entry| matches!(entry, Entry::Active(..)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> usize {
        self.entries()
            .values()
            .filter(|entry| matches!(entry, Entry::Pending(_)))
            .count()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DeviceId, Entry<R>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: DeviceId = DeviceId::new(0xa);
    const B: DeviceId = DeviceId::new(0xb);

    fn registered(registry: &Registry<&'static str>, id: DeviceId, record: &'static str) {
        let ticket = registry.reserve(id).unwrap();
        registry.register(id, ticket, record).unwrap();
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registered(&registry, A, "a");
        assert_eq!(registry.lookup(A).as_deref(), Some(&"a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_duplicate_reserve_is_refused() {
        let registry = Registry::new();
        registered(&registry, A, "a");
        assert!(registry.reserve(A).is_none());

        let registry: Registry<&str> = Registry::new();
        let _ticket = registry.reserve(B).unwrap();
        assert!(registry.reserve(B).is_none());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry: Registry<&str> = Registry::new();
        registered(&registry, A, "a");
        assert!(registry.unregister(B).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_double_unregister() {
        let registry = Registry::new();
        registered(&registry, A, "a");
        assert!(registry.unregister(A).is_some());
        assert!(registry.unregister(A).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancelled_reservation_refuses_record() {
        let registry = Registry::new();
        let ticket = registry.reserve(A).unwrap();
        assert!(registry.unregister(A).is_none());
        assert_eq!(registry.register(A, ticket, "a"), Err("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_ticket_is_refused() {
        let registry = Registry::new();
        let stale = registry.reserve(A).unwrap();
        registry.unregister(A);
        let fresh = registry.reserve(A).unwrap();

        assert_eq!(registry.register(A, stale, "old"), Err("old"));
        assert!(registry.release(A, stale).is_none());
        assert_eq!(registry.pending(), 1);
        assert!(registry.register(A, fresh, "new").is_ok());
        assert!(registry.release(A, stale).is_none());
        assert_eq!(registry.lookup(A).as_deref(), Some(&"new"));
    }

    #[test]
    fn test_release_own_ticket() {
        let registry = Registry::new();
        let ticket = registry.reserve(A).unwrap();
        registry.register(A, ticket, "a").unwrap();
        assert_eq!(registry.release(A, ticket).as_deref(), Some(&"a"));
        assert!(registry.is_empty());

        let pending = registry.reserve(B).unwrap();
        assert!(registry.release(B, pending).is_none());
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn test_all_is_ordered_and_skips_pending() {
        let registry = Registry::new();
        registered(&registry, B, "b");
        registered(&registry, A, "a");
        let _pending = registry.reserve(DeviceId::new(0xc)).unwrap();

        let ids: Vec<_> = registry.all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![A, B]);
    }

    #[test]
    fn test_drain_empties_everything() {
        let registry = Registry::new();
        registered(&registry, A, "a");
        let _pending = registry.reserve(B).unwrap();

        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.pending(), 0);
    }
}
