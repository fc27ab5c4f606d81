//! Contact resolution, merge and creation.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::contact::{normalize_email, ContactAttributes, ContactField, ContactStore, NewContact};
use crate::diagnostics::DiagnosticLog;
use crate::mapping::MappedContactData;
use crate::pipeline::{LeadOutcome, SkipReason};
use crate::settings::LeadSettings;
use crate::{ContactId, LeadError};

/// Resolves a lead to a contact and writes it to the [`ContactStore`].
#[derive(Clone)]
pub struct ContactUpserter {
    store: Arc<dyn ContactStore>,
    diagnostics: Arc<dyn DiagnosticLog>,
}

impl std::fmt::Debug for ContactUpserter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactUpserter").finish_non_exhaustive()
    }
}

impl ContactUpserter {
    pub fn new(store: Arc<dyn ContactStore>, diagnostics: Arc<dyn DiagnosticLog>) -> Self {
        Self { store, diagnostics }
    }

    /// Upsert the contact described by `mapped`.
    ///
    /// The contact is resolved by email, then by phone. A match is updated
    /// with non-empty allow-listed attributes and keeps its email. Without a
    /// match a contact is created, which requires a valid email address.
    /// Tags, lists and custom metadata are then attached; failures in that
    /// last step are logged and do not change the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::PersistenceFailure`] when looking up, updating or
    /// creating the contact fails.
    #[instrument(skip(self, mapped, settings))]
    pub async fn upsert(
        &self,
        mapped: &MappedContactData,
        settings: &LeadSettings,
    ) -> Result<LeadOutcome, LeadError> {
        let email = mapped.email().and_then(normalize_email);
        let phone = mapped.phone();
        let attributes = allowed_attributes(mapped);

        let mut existing = None;
        if let Some(email) = email.as_deref() {
            existing = self.store.find_by_email(email).await?;
        }
        if existing.is_none() {
            if let Some(phone) = phone {
                existing = self.store.find_by_phone(phone).await?;
            }
        }

        let outcome = match existing {
            Some(contact) => {
                if !attributes.is_empty() {
                    self.store.update(contact.id, attributes).await?;
                }
                info!(contact_id = %contact.id, "Updated existing contact from lead");
                LeadOutcome::Updated {
                    contact_id: contact.id,
                }
            }
            None => {
                let Some(email) = email else {
                    warn!(has_phone = phone.is_some(), "Lead matches no contact and has no usable email");
                    self.diagnostics
                        .log(
                            "Lead skipped: no existing contact and no valid email",
                            json!({"has_phone": phone.is_some(), "has_email": mapped.email().is_some()}),
                        )
                        .await;
                    return Ok(LeadOutcome::Skipped {
                        reason: SkipReason::UnidentifiableNewContact,
                    });
                };

                let contact = self
                    .store
                    .create(NewContact {
                        email,
                        status: settings.default_status,
                        attributes,
                    })
                    .await?;
                info!(contact_id = %contact.id, "Created contact from lead");
                LeadOutcome::Created {
                    contact_id: contact.id,
                }
            }
        };

        if let Some(contact_id) = outcome.contact_id() {
            self.attach_relations(contact_id, mapped, settings).await;
        }

        Ok(outcome)
    }

    async fn attach_relations(
        &self,
        contact_id: ContactId,
        mapped: &MappedContactData,
        settings: &LeadSettings,
    ) {
        if !settings.tag_ids.is_empty() {
            if let Err(e) = self.store.attach_tags(contact_id, &settings.tag_ids).await {
                self.report_attach_failure(contact_id, "tags", &e).await;
            }
        }

        if !settings.list_ids.is_empty() {
            if let Err(e) = self.store.attach_lists(contact_id, &settings.list_ids).await {
                self.report_attach_failure(contact_id, "lists", &e).await;
            }
        }

        for (key, value) in &mapped.custom {
            if let Err(e) = self.store.upsert_meta(contact_id, key, value).await {
                self.report_attach_failure(contact_id, "meta", &e).await;
            } else {
                debug!(contact_id = %contact_id, meta_key = %key, "Stored contact metadata");
            }
        }
    }

    async fn report_attach_failure(
        &self,
        contact_id: ContactId,
        relation: &str,
        error: &crate::contact::StoreError,
    ) {
        warn!(contact_id = %contact_id, relation, error = %error, "Failed to attach lead data to contact");
        self.diagnostics
            .log(
                "Contact relation sync failed",
                json!({
                    "contact_id": contact_id.as_u64(),
                    "relation": relation,
                    "error": error.to_string(),
                }),
            )
            .await;
    }
}

/// Collect the non-empty, writable attributes from mapped data.
fn allowed_attributes(mapped: &MappedContactData) -> ContactAttributes {
    ContactField::ALL
        .iter()
        .filter_map(|field| {
            mapped
                .get(field.as_str())
                .map(|value| (*field, value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "upsert_tests.rs"]
mod tests;
