//! Administrator-maintained notification recipients.
//!
//! Each list is kept in insertion order and mirrored to a single
//! comma-joined setting after every change.

use parking_lot::RwLock;
use tracing::debug;

use reg_core::Result;

use crate::settings::{keys, Settings};

/// Which recipients a list holds. Drives normalization and the backing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Local usernames, notified by instant message.
    Im,
    /// Email addresses.
    Email,
}

impl ContactKind {
    pub fn key(self) -> &'static str {
        match self {
            ContactKind::Im => keys::IM_CONTACTS,
            ContactKind::Email => keys::EMAIL_CONTACTS,
        }
    }

    /// IM contacts are trimmed and lower-cased; email contacts only trimmed.
    pub fn normalize(self, contact: &str) -> String {
        match self {
            ContactKind::Im => contact.trim().to_lowercase(),
            ContactKind::Email => contact.trim().to_string(),
        }
    }
}

/// A deduplicated, persisted list of contacts.
pub struct ContactList {
    kind: ContactKind,
    settings: Settings,
    entries: RwLock<Vec<String>>,
}

impl ContactList {
    /// Reads the persisted list. A missing or empty value yields an empty list.
    pub fn load(kind: ContactKind, settings: Settings) -> Result<Self> {
        let mut entries: Vec<String> = Vec::new();
        if let Some(joined) = settings.get_string(kind.key())? {
            for contact in joined.split(',').map(|c| kind.normalize(c)) {
                if !contact.is_empty() && !entries.contains(&contact) {
                    entries.push(contact);
                }
            }
        }
        debug!(key = kind.key(), count = entries.len(), "loaded contact list");
        Ok(Self {
            kind,
            settings,
            entries: RwLock::new(entries),
        })
    }

    /// Adds a contact. Returns `false` when it was already present.
    pub fn add(&self, contact: &str) -> Result<bool> {
        let contact = self.kind.normalize(contact);
        if contact.is_empty() {
            return Ok(false);
        }

        let mut entries = self.entries.write();
        if entries.contains(&contact) {
            return Ok(false);
        }
        entries.push(contact);
        if let Err(err) = self.persist(&entries) {
            entries.pop();
            return Err(err);
        }
        Ok(true)
    }

    /// Removes a contact. Returns `false` when it was not present.
    pub fn remove(&self, contact: &str) -> Result<bool> {
        let contact = self.kind.normalize(contact);

        let mut entries = self.entries.write();
        let Some(index) = entries.iter().position(|c| *c == contact) else {
            return Ok(false);
        };
        let removed = entries.remove(index);
        if let Err(err) = self.persist(&entries) {
            entries.insert(index, removed);
            return Err(err);
        }
        Ok(true)
    }

    /// Contacts in lexicographic order.
    pub fn list(&self) -> Vec<String> {
        let mut sorted = self.entries.read().clone();
        sorted.sort();
        sorted
    }

    /// Contacts in the order they were added.
    pub fn entries(&self) -> Vec<String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // An empty list deletes the key rather than storing "".
    fn persist(&self, entries: &[String]) -> Result<()> {
        if entries.is_empty() {
            self.settings.delete(self.kind.key())
        } else {
            self.settings.set_string(self.kind.key(), &entries.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::eq;
    use reg_core::MockConfigStore;

    use super::*;

    fn empty_store() -> MockConfigStore {
        let mut store = MockConfigStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
    }

    #[test]
    fn load_normalizes_and_dedupes() {
        let mut store = MockConfigStore::new();
        store
            .expect_get()
            .with(eq(keys::IM_CONTACTS))
            .returning(|_| Ok(Some(" Admin ,bob,,admin".to_string())));
        let list = ContactList::load(ContactKind::Im, Settings::new(Arc::new(store))).unwrap();
        assert_eq!(list.entries(), vec!["admin", "bob"]);
    }

    #[test]
    fn add_persists_joined_list_in_insertion_order() {
        let mut store = empty_store();
        store
            .expect_set()
            .with(eq(keys::IM_CONTACTS), eq("zed"))
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_set()
            .with(eq(keys::IM_CONTACTS), eq("zed,amy"))
            .times(1)
            .returning(|_, _| Ok(()));
        let list = ContactList::load(ContactKind::Im, Settings::new(Arc::new(store))).unwrap();

        assert!(list.add("Zed").unwrap());
        assert!(list.add(" AMY ").unwrap());
        assert!(!list.add("amy").unwrap());
        assert_eq!(list.list(), vec!["amy", "zed"]);
        assert_eq!(list.entries(), vec!["zed", "amy"]);
    }

    #[test]
    fn email_contacts_keep_case() {
        let mut store = empty_store();
        store.expect_set().times(2).returning(|_, _| Ok(()));
        let list = ContactList::load(ContactKind::Email, Settings::new(Arc::new(store))).unwrap();
        assert!(list.add(" Ops@Example.org").unwrap());
        assert!(list.add("ops@example.org").unwrap());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn removing_last_contact_deletes_key() {
        let mut store = MockConfigStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some("ops@example.org".to_string())));
        store
            .expect_delete()
            .with(eq(keys::EMAIL_CONTACTS))
            .times(1)
            .returning(|_| Ok(()));
        store.expect_set().never();
        let list = ContactList::load(ContactKind::Email, Settings::new(Arc::new(store))).unwrap();

        assert!(list.remove(" ops@example.org ").unwrap());
        assert!(list.is_empty());
        assert!(!list.remove("ops@example.org").unwrap());
    }

    #[test]
    fn failed_persist_rolls_back() {
        let mut store = empty_store();
        store
            .expect_set()
            .returning(|_, _| Err(anyhow::anyhow!("read-only")));
        let list = ContactList::load(ContactKind::Im, Settings::new(Arc::new(store))).unwrap();
        assert!(list.add("admin").is_err());
        assert!(list.is_empty());
    }
}
