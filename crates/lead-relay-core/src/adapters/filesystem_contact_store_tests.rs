//! Tests for the filesystem contact store

use super::*;
use crate::contact::{ContactField, ContactStatus};
use tempfile::TempDir;

fn new_contact(email: &str) -> NewContact {
    let mut attributes = ContactAttributes::new();
    attributes.insert(ContactField::FirstName, "Ana".to_string());
    NewContact {
        email: email.to_string(),
        status: ContactStatus::Pending,
        attributes,
    }
}

#[tokio::test]
async fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("store");

    let store = FilesystemContactStore::open(path.clone())
        .await
        .expect("Failed to open store");

    assert!(path.is_dir());
    assert_eq!(store.base_path(), path.as_path());
    assert!(store.health_check().await.is_ok());
}

#[tokio::test]
async fn test_contacts_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();

    let id = {
        let store = FilesystemContactStore::open(path.clone()).await.unwrap();
        let contact = store.create(new_contact("a@x.com")).await.unwrap();
        store.attach_tags(contact.id, &[TagId::new(4)]).await.unwrap();
        store.upsert_meta(contact.id, "source", "fb").await.unwrap();
        contact.id
    };

    let reopened = FilesystemContactStore::open(path).await.unwrap();
    let contact = reopened.get(id).await.unwrap().expect("contact persisted");

    assert_eq!(contact.email.as_deref(), Some("a@x.com"));
    assert_eq!(contact.status, ContactStatus::Pending);
    assert_eq!(contact.attribute(ContactField::FirstName), Some("Ana"));
    assert!(contact.tags.contains(&TagId::new(4)));
    assert_eq!(contact.meta.get("source").map(String::as_str), Some("fb"));
}

#[tokio::test]
async fn test_ids_continue_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();

    {
        let store = FilesystemContactStore::open(path.clone()).await.unwrap();
        store.create(new_contact("a@x.com")).await.unwrap();
    }

    let store = FilesystemContactStore::open(path).await.unwrap();
    let second = store.create(new_contact("b@x.com")).await.unwrap();

    assert_eq!(second.id, ContactId::new(2));
}

#[tokio::test]
async fn test_no_temp_file_left_behind() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemContactStore::open(temp_dir.path().to_path_buf())
        .await
        .unwrap();

    store.create(new_contact("a@x.com")).await.unwrap();

    assert!(temp_dir.path().join(CONTACTS_FILE_NAME).exists());
    assert!(!temp_dir.path().join("contacts.tmp").exists());
}

#[tokio::test]
async fn test_corrupt_document_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join(CONTACTS_FILE_NAME), "{not json").unwrap();

    let result = FilesystemContactStore::open(temp_dir.path().to_path_buf()).await;

    assert!(matches!(result, Err(StoreError::Serialization { .. })));
}

#[tokio::test]
async fn test_failed_write_leaves_state_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemContactStore::open(temp_dir.path().to_path_buf())
        .await
        .unwrap();

    let result = store.update(ContactId::new(7), ContactAttributes::new()).await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
    assert!(store.contacts().await.is_empty());
    assert!(!temp_dir.path().join(CONTACTS_FILE_NAME).exists());
}
