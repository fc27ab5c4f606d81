//! Tests for contact resolution and upsert

use super::*;
use crate::adapters::InMemoryContactStore;
use crate::contact::{Contact, StoreError};
use crate::diagnostics::MemoryDiagnosticLog;
use crate::{ListId, TagId};
use async_trait::async_trait;

/// Store wrapper that fails selected operations.
struct FlakyStore {
    inner: InMemoryContactStore,
    fail_lookups: bool,
    fail_relations: bool,
}

impl FlakyStore {
    fn failing_lookups() -> Self {
        Self {
            inner: InMemoryContactStore::new(),
            fail_lookups: true,
            fail_relations: false,
        }
    }

    fn failing_relations(inner: InMemoryContactStore) -> Self {
        Self {
            inner,
            fail_lookups: false,
            fail_relations: true,
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl ContactStore for FlakyStore {
    async fn get(&self, id: ContactId) -> Result<Option<Contact>, StoreError> {
        self.inner.get(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        if self.fail_lookups {
            return Err(Self::unavailable());
        }
        self.inner.find_by_email(email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, StoreError> {
        if self.fail_lookups {
            return Err(Self::unavailable());
        }
        self.inner.find_by_phone(phone).await
    }

    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError> {
        self.inner.create(contact).await
    }

    async fn update(
        &self,
        id: ContactId,
        attributes: ContactAttributes,
    ) -> Result<Contact, StoreError> {
        self.inner.update(id, attributes).await
    }

    async fn attach_tags(&self, id: ContactId, tags: &[TagId]) -> Result<(), StoreError> {
        if self.fail_relations {
            return Err(Self::unavailable());
        }
        self.inner.attach_tags(id, tags).await
    }

    async fn attach_lists(&self, id: ContactId, lists: &[ListId]) -> Result<(), StoreError> {
        if self.fail_relations {
            return Err(Self::unavailable());
        }
        self.inner.attach_lists(id, lists).await
    }

    async fn upsert_meta(&self, id: ContactId, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_relations {
            return Err(Self::unavailable());
        }
        self.inner.upsert_meta(id, key, value).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn mapped(fields: &[(&str, &str)]) -> MappedContactData {
    MappedContactData {
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        custom: Default::default(),
    }
}

fn upserter(store: Arc<dyn ContactStore>) -> (ContactUpserter, MemoryDiagnosticLog) {
    let log = MemoryDiagnosticLog::new();
    (ContactUpserter::new(store, Arc::new(log.clone())), log)
}

#[tokio::test]
async fn test_creates_contact_with_normalized_email() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));
    let mut settings = LeadSettings::default();
    settings.default_status = crate::contact::ContactStatus::Pending;

    let outcome = upserter
        .upsert(
            &mapped(&[("email", " Ana@Example.com "), ("first_name", "Ana")]),
            &settings,
        )
        .await
        .unwrap();

    let LeadOutcome::Created { contact_id } = outcome else {
        panic!("expected creation, got {:?}", outcome);
    };
    let contact = store.get(contact_id).await.unwrap().unwrap();
    assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
    assert_eq!(contact.status, crate::contact::ContactStatus::Pending);
    assert_eq!(contact.attribute(ContactField::FirstName), Some("Ana"));
}

#[tokio::test]
async fn test_second_lead_updates_instead_of_duplicating() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));
    let settings = LeadSettings::default();

    let first = upserter
        .upsert(&mapped(&[("email", "ana@example.com")]), &settings)
        .await
        .unwrap();
    let second = upserter
        .upsert(
            &mapped(&[("email", "ANA@example.com"), ("city", "Porto")]),
            &settings,
        )
        .await
        .unwrap();

    assert_eq!(
        second,
        LeadOutcome::Updated {
            contact_id: first.contact_id().unwrap()
        }
    );
    assert_eq!(store.len().await, 1);
    let contact = store.contacts().await.remove(0);
    assert_eq!(contact.attribute(ContactField::City), Some("Porto"));
}

#[tokio::test]
async fn test_phone_match_keeps_existing_email() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));
    let settings = LeadSettings::default();
    upserter
        .upsert(
            &mapped(&[("email", "ana@example.com"), ("phone", "+351 900")]),
            &settings,
        )
        .await
        .unwrap();

    let outcome = upserter
        .upsert(
            &mapped(&[("email", "other@example.com"), ("phone", "+351 900")]),
            &settings,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, LeadOutcome::Updated { .. }));
    let contact = store.contacts().await.remove(0);
    assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_phone_only_without_match_is_skipped() {
    let store = InMemoryContactStore::new();
    let (upserter, log) = upserter(Arc::new(store.clone()));

    let outcome = upserter
        .upsert(&mapped(&[("phone", "+351 900")]), &LeadSettings::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LeadOutcome::Skipped {
            reason: SkipReason::UnidentifiableNewContact
        }
    );
    assert!(store.is_empty().await);
    assert!(log.contains("Lead skipped: no existing contact and no valid email"));
}

#[tokio::test]
async fn test_invalid_email_cannot_create() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));

    let outcome = upserter
        .upsert(&mapped(&[("email", "not-an-email")]), &LeadSettings::default())
        .await
        .unwrap();

    assert!(outcome.is_skipped());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_only_allow_listed_attributes_are_written() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));

    upserter
        .upsert(
            &mapped(&[
                ("email", "ana@example.com"),
                ("full_name", "Ana Silva"),
                ("favourite_colour", "blue"),
                ("company", "Acme"),
            ]),
            &LeadSettings::default(),
        )
        .await
        .unwrap();

    let contact = store.contacts().await.remove(0);
    assert_eq!(contact.attributes.len(), 1);
    assert_eq!(contact.attribute(ContactField::Company), Some("Acme"));
}

#[tokio::test]
async fn test_tags_lists_and_meta_are_attached() {
    let store = InMemoryContactStore::new();
    let (upserter, _) = upserter(Arc::new(store.clone()));
    let mut settings = LeadSettings::default();
    settings.tag_ids = vec![TagId::new(3), TagId::new(9)];
    settings.list_ids = vec![ListId::new(1)];
    let mut data = mapped(&[("email", "ana@example.com")]);
    data.custom.insert("budget".to_string(), "10k".to_string());

    upserter.upsert(&data, &settings).await.unwrap();

    let contact = store.contacts().await.remove(0);
    assert!(contact.tags.contains(&TagId::new(3)));
    assert!(contact.tags.contains(&TagId::new(9)));
    assert!(contact.lists.contains(&ListId::new(1)));
    assert_eq!(contact.meta.get("budget").map(String::as_str), Some("10k"));
}

#[tokio::test]
async fn test_relation_failures_do_not_fail_the_upsert() {
    let inner = InMemoryContactStore::new();
    let (upserter, log) = upserter(Arc::new(FlakyStore::failing_relations(inner.clone())));
    let mut settings = LeadSettings::default();
    settings.tag_ids = vec![TagId::new(3)];

    let outcome = upserter
        .upsert(&mapped(&[("email", "ana@example.com")]), &settings)
        .await
        .unwrap();

    assert!(matches!(outcome, LeadOutcome::Created { .. }));
    assert_eq!(inner.len().await, 1);
    assert!(log.contains("Contact relation sync failed"));
}

#[tokio::test]
async fn test_lookup_failure_is_persistence_failure() {
    let (upserter, _) = upserter(Arc::new(FlakyStore::failing_lookups()));

    let error = upserter
        .upsert(&mapped(&[("email", "ana@example.com")]), &LeadSettings::default())
        .await
        .unwrap_err();

    assert!(matches!(error, LeadError::PersistenceFailure(_)));
    assert!(error.is_transient());
}
