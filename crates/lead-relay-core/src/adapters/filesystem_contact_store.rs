//! # Filesystem Contact Store
//!
//! Local filesystem implementation of [`ContactStore`]. All contacts live in
//! one JSON document that is rewritten atomically (temp file + rename) after
//! every change.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::memory_contact_store::ContactTable;
use crate::contact::{Contact, ContactAttributes, ContactStore, NewContact, StoreError};
use crate::{ContactId, ListId, TagId};

/// Name of the contact document inside the store directory
pub const CONTACTS_FILE_NAME: &str = "contacts.json";

/// Filesystem-backed contact store.
///
/// The document is loaded once when the store is opened and kept in memory;
/// writers are serialized through a mutex so the file always reflects the
/// last completed operation.
///
/// # Examples
///
/// ```no_run
/// use lead_relay_core::adapters::FilesystemContactStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FilesystemContactStore::open(PathBuf::from("./data/contacts")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FilesystemContactStore {
    base_path: PathBuf,
    table: Mutex<ContactTable>,
}

impl FilesystemContactStore {
    /// Open (or initialise) a store rooted at `base_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// document cannot be read or parsed.
    pub async fn open(base_path: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create store directory: {}", e),
            })?;

        let document = base_path.join(CONTACTS_FILE_NAME);
        let table = match fs::read_to_string(&document).await {
            Ok(json) => serde_json::from_str(&json).map_err(|e| StoreError::Serialization {
                message: format!("Failed to parse {}: {}", document.display(), e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ContactTable::default(),
            Err(e) => {
                return Err(StoreError::Unavailable {
                    message: format!("Failed to read {}: {}", document.display(), e),
                })
            }
        };

        Ok(Self {
            base_path,
            table: Mutex::new(table),
        })
    }

    /// Directory the store writes into
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Snapshot of all contacts, ordered by ID
    pub async fn contacts(&self) -> Vec<Contact> {
        self.table.lock().await.all()
    }

    fn document_path(&self) -> PathBuf {
        self.base_path.join(CONTACTS_FILE_NAME)
    }

    /// Apply `change` to a copy of the table and persist it.
    ///
    /// The in-memory table is only replaced once the write succeeded, so a
    /// failed write leaves both file and memory unchanged.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut ContactTable) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut table = self.table.lock().await;
        let mut updated = table.clone();
        let result = change(&mut updated)?;
        if updated != *table {
            self.persist(&updated).await?;
            *table = updated;
        }
        Ok(result)
    }

    #[instrument(skip(self, table))]
    async fn persist(&self, table: &ContactTable) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(table).map_err(|e| StoreError::Serialization {
            message: format!("Failed to serialize contacts: {}", e),
        })?;

        let document = self.document_path();
        let temp_path = document.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create temp file: {}", e),
            })?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to write contacts: {}", e),
            })?;
        file.flush().await.map_err(|e| StoreError::Unavailable {
            message: format!("Failed to flush file: {}", e),
        })?;

        fs::rename(&temp_path, &document)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to rename temp file: {}", e),
            })?;

        debug!(path = %document.display(), bytes = json.len(), "Persisted contact document");
        Ok(())
    }
}

#[async_trait]
impl ContactStore for FilesystemContactStore {
    async fn get(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.lock().await.get(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.lock().await.find_by_email(email))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, StoreError> {
        Ok(self.table.lock().await.find_by_phone(phone))
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        self.mutate(|table| table.create(contact)).await
    }

    async fn update(
        &self,
        id: ContactId,
        attributes: ContactAttributes,
    ) -> Result<Contact, StoreError> {
        self.mutate(|table| table.update(id, attributes)).await
    }

    async fn attach_tags(&self, id: ContactId, tags: &[TagId]) -> Result<(), StoreError> {
        self.mutate(|table| table.attach_tags(id, tags)).await
    }

    async fn attach_lists(&self, id: ContactId, lists: &[ListId]) -> Result<(), StoreError> {
        self.mutate(|table| table.attach_lists(id, lists)).await
    }

    async fn upsert_meta(&self, id: ContactId, key: &str, value: &str) -> Result<(), StoreError> {
        self.mutate(|table| table.upsert_meta(id, key, value)).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        fs::metadata(&self.base_path)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable {
                message: format!("Store directory not accessible: {}", e),
            })
    }
}

#[cfg(test)]
#[path = "filesystem_contact_store_tests.rs"]
mod tests;
