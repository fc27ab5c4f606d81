//! # In-Memory Contact Store
//!
//! Thread-safe in-memory implementation of [`ContactStore`] for testing,
//! dry runs and development.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::contact::{Contact, ContactAttributes, ContactStore, NewContact, StoreError};
use crate::{ContactId, ListId, TagId, Timestamp};

/// Contact records plus the ID sequence.
///
/// Shared by the in-memory and filesystem stores; the filesystem store
/// persists this structure as its document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ContactTable {
    next_id: u64,
    contacts: BTreeMap<ContactId, Contact>,
}

impl ContactTable {
    pub(crate) fn get(&self, id: ContactId) -> Option<Contact> {
        self.contacts.get(&id).cloned()
    }

    pub(crate) fn find_by_email(&self, email: &str) -> Option<Contact> {
        self.contacts
            .values()
            .find(|c| c.email.as_deref() == Some(email))
            .cloned()
    }

    pub(crate) fn find_by_phone(&self, phone: &str) -> Option<Contact> {
        self.contacts
            .values()
            .find(|c| c.phone() == Some(phone))
            .cloned()
    }

    pub(crate) fn create(&mut self, new: NewContact) -> Result<Contact, StoreError> {
        if self.find_by_email(&new.email).is_some() {
            return Err(StoreError::DuplicateEmail { email: new.email });
        }

        self.next_id = self.next_id.max(self.max_id()) + 1;
        let now = Timestamp::now();
        let contact = Contact {
            id: ContactId::new(self.next_id),
            email: Some(new.email),
            status: new.status,
            attributes: new.attributes,
            tags: Default::default(),
            lists: Default::default(),
            meta: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        self.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    pub(crate) fn update(
        &mut self,
        id: ContactId,
        attributes: ContactAttributes,
    ) -> Result<Contact, StoreError> {
        let contact = self.contact_mut(id)?;
        contact.attributes.extend(attributes);
        contact.updated_at = Timestamp::now();
        Ok(contact.clone())
    }

    pub(crate) fn attach_tags(&mut self, id: ContactId, tags: &[TagId]) -> Result<(), StoreError> {
        let contact = self.contact_mut(id)?;
        contact.tags.extend(tags.iter().copied());
        Ok(())
    }

    pub(crate) fn attach_lists(
        &mut self,
        id: ContactId,
        lists: &[ListId],
    ) -> Result<(), StoreError> {
        let contact = self.contact_mut(id)?;
        contact.lists.extend(lists.iter().copied());
        Ok(())
    }

    pub(crate) fn upsert_meta(
        &mut self,
        id: ContactId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let contact = self.contact_mut(id)?;
        contact.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub(crate) fn all(&self) -> Vec<Contact> {
        self.contacts.values().cloned().collect()
    }

    fn contact_mut(&mut self, id: ContactId) -> Result<&mut Contact, StoreError> {
        self.contacts
            .get_mut(&id)
            .ok_or(StoreError::NotFound { contact_id: id })
    }

    fn max_id(&self) -> u64 {
        self.contacts
            .keys()
            .next_back()
            .map(ContactId::as_u64)
            .unwrap_or(0)
    }
}

/// In-memory contact store.
///
/// Clones share the same underlying table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContactStore {
    table: Arc<RwLock<ContactTable>>,
}

impl InMemoryContactStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all contacts, ordered by ID
    pub async fn contacts(&self) -> Vec<Contact> {
        self.table.read().await.all()
    }

    /// Number of stored contacts
    pub async fn len(&self) -> usize {
        self.table.read().await.contacts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn get(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.read().await.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.read().await.find_by_email(email))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.read().await.find_by_phone(phone))
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        self.table.write().await.create(contact)
    }

    async fn update(
        &self,
        id: ContactId,
        attributes: ContactAttributes,
    ) -> Result<Contact, StoreError> {
        self.table.write().await.update(id, attributes)
    }

    async fn attach_tags(&self, id: ContactId, tags: &[TagId]) -> Result<(), StoreError> {
        self.table.write().await.attach_tags(id, tags)
    }

    async fn attach_lists(&self, id: ContactId, lists: &[ListId]) -> Result<(), StoreError> {
        self.table.write().await.attach_lists(id, lists)
    }

    async fn upsert_meta(&self, id: ContactId, key: &str, value: &str) -> Result<(), StoreError> {
        self.table.write().await.upsert_meta(id, key, value)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_contact_store_tests.rs"]
mod tests;
