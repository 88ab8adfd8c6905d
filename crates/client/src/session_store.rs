//! Process-wide owner of the current credential.
//!
//! [`SessionStore`] pairs the in-memory credential with its durable
//! [`CredentialStorage`] slot. Every state change happens under one lock
//! together with the matching storage write, so `save`, `clear` and
//! `expire` each leave the slot either fully present or fully absent.
//!
//! Each change bumps a generation counter. The HTTP adapter remembers the
//! generation a request was sent with and passes it back to
//! [`SessionStore::expire`] on a 401, which clears the session only if it
//! is still the same one. Concurrent 401s for one credential therefore
//! expire it exactly once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pomgmt_core::session::Credential;

use crate::storage::{CredentialStorage, StorageError};

/// The credential a request was issued with, tagged with its generation.
#[derive(Debug, Clone)]
pub struct ActiveCredential {
    credential: Arc<Credential>,
    generation: u64,
}

impl ActiveCredential {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct Slot {
    credential: Option<Arc<Credential>>,
    generation: u64,
}

impl Slot {
    fn replace(&mut self, credential: Option<Credential>) {
        self.credential = credential.map(Arc::new);
        self.generation += 1;
    }
}

pub struct SessionStore {
    storage: Box<dyn CredentialStorage>,
    slot: Mutex<Slot>,
}

impl SessionStore {
    pub fn new(storage: impl CredentialStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            slot: Mutex::new(Slot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the persisted credential and make it the active one.
    ///
    /// Malformed or unreadable data counts as "no session": it is logged,
    /// removed on a best-effort basis, and `None` is returned.
    pub fn restore(&self) -> Option<Credential> {
        let mut slot = self.lock();
        let restored = match self.storage.load() {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                if let Err(e) = self.storage.remove() {
                    tracing::warn!(error = %e, "Failed to remove unreadable session");
                }
                None
            }
        };
        slot.replace(restored.clone());
        restored
    }

    /// Persist `credential` and make it the active one, replacing any other.
    ///
    /// The in-memory slot only changes if the write succeeded.
    pub fn save(&self, credential: Credential) -> Result<(), StorageError> {
        let mut slot = self.lock();
        self.storage.store(&credential)?;
        slot.replace(Some(credential));
        Ok(())
    }

    /// Forget the active credential and remove the persisted one.
    ///
    /// Idempotent. The in-memory slot is cleared even if removing the
    /// persisted copy fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut slot = self.lock();
        slot.replace(None);
        self.storage.remove()
    }

    /// Clear the session only if it is still at `generation`.
    ///
    /// Returns `true` when this call cleared it, `false` if the session had
    /// already changed (another 401, a logout, or a fresh login).
    pub fn expire(&self, generation: u64) -> bool {
        let mut slot = self.lock();
        if slot.generation != generation || slot.credential.is_none() {
            return false;
        }
        slot.replace(None);
        if let Err(e) = self.storage.remove() {
            tracing::warn!(error = %e, "Failed to remove expired session");
        }
        true
    }

    /// Snapshot of the active credential, if any.
    pub fn current(&self) -> Option<ActiveCredential> {
        let slot = self.lock();
        slot.credential.as_ref().map(|credential| ActiveCredential {
            credential: Arc::clone(credential),
            generation: slot.generation,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use pomgmt_core::session::{Identity, UserId};

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn credential(token: &str) -> Credential {
        Credential::new(
            token,
            Identity {
                id: UserId::Numeric(3),
                email: "clerk@example.com".into(),
                display_name: "Clerk".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn restore_after_save_in_a_new_process() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::new(FileStorage::new(&path))
            .save(credential("persisted"))
            .unwrap();

        let fresh = SessionStore::new(FileStorage::new(&path));
        let restored = fresh.restore().unwrap();
        assert_eq!(restored.token(), "persisted");
        assert!(fresh.is_authenticated());
    }

    #[test]
    fn clear_then_restore_is_none() {
        let store = SessionStore::new(MemoryStorage::new());
        store.save(credential("t")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.restore().is_none());
        assert!(store.current().is_none());
    }

    #[test]
    fn malformed_persisted_data_restores_as_none_and_is_removed() {
        let store = SessionStore::new(MemoryStorage::with_raw("{\"token\":"));
        assert!(store.restore().is_none());
        assert!(!store.is_authenticated());
        // A second restore reads an empty slot, not the garbage again.
        assert!(store.restore().is_none());
    }

    #[test]
    fn save_replaces_previous_credential() {
        let store = SessionStore::new(MemoryStorage::new());
        store.save(credential("old")).unwrap();
        store.save(credential("new")).unwrap();
        assert_eq!(store.current().unwrap().credential().token(), "new");
        assert_eq!(store.restore().unwrap().token(), "new");
    }

    #[test]
    fn expire_clears_only_the_matching_generation() {
        let store = SessionStore::new(MemoryStorage::new());
        store.save(credential("t")).unwrap();
        let generation = store.current().unwrap().generation();

        assert!(store.expire(generation));
        assert!(!store.expire(generation));
        assert!(store.restore().is_none());
    }

    #[test]
    fn expire_ignores_a_newer_login() {
        let store = SessionStore::new(MemoryStorage::new());
        store.save(credential("old")).unwrap();
        let stale = store.current().unwrap().generation();

        store.save(credential("new")).unwrap();
        assert!(!store.expire(stale));
        assert_eq!(store.current().unwrap().credential().token(), "new");
    }

    #[test]
    fn concurrent_save_and_clear_leave_a_consistent_slot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = Arc::new(SessionStore::new(FileStorage::new(&path)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if i % 2 == 0 {
                            store.save(credential(&format!("t{i}"))).unwrap();
                        } else {
                            store.clear().unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let in_memory = store.current().map(|a| a.credential().token().to_string());
        let on_disk = SessionStore::new(FileStorage::new(&path))
            .restore()
            .map(|c| c.token().to_string());
        assert_eq!(in_memory, on_disk);
    }
}
