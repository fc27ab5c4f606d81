//! End-to-end lead processing.
//!
//! [`LeadPipeline`] runs normalize -> map -> identifier check -> upsert for a
//! single lead, and drives that sequence for every lead announced in a Graph
//! webhook delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::contact::ContactStore;
use crate::diagnostics::DiagnosticLog;
use crate::mapping::{FieldMapper, MappedContactData};
use crate::normalizer::{FieldNormalizer, NormalizedFields};
use crate::payload::{parse_notifications, LeadgenNotification, RawLeadPayload};
use crate::settings::LeadSettings;
use crate::upsert::ContactUpserter;
use crate::{ContactId, LeadError, LeadId, PageId};

/// Why a well-formed lead did not produce a contact write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nothing usable was left after normalization
    MissingFieldData,
    /// Neither email nor phone was mapped
    MissingIdentifiers,
    /// No existing contact matched and there is no valid email to create one
    UnidentifiableNewContact,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingFieldData => "missing_field_data",
            Self::MissingIdentifiers => "missing_identifiers",
            Self::UnidentifiableNewContact => "unidentifiable_new_contact",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LeadOutcome {
    Created { contact_id: ContactId },
    Updated { contact_id: ContactId },
    Skipped { reason: SkipReason },
}

impl LeadOutcome {
    /// The contact written, if any
    pub fn contact_id(&self) -> Option<ContactId> {
        match self {
            Self::Created { contact_id } | Self::Updated { contact_id } => Some(*contact_id),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Retrieves full lead detail for a leadgen ID.
#[async_trait]
pub trait LeadFetcher: Send + Sync {
    /// Fetch a lead, using credentials for `page_id` from `settings`.
    ///
    /// Returns `Ok(None)` when the lead exists but carries no field data.
    async fn fetch_lead(
        &self,
        lead_id: &LeadId,
        page_id: Option<&PageId>,
        settings: &LeadSettings,
    ) -> Result<Option<RawLeadPayload>, LeadError>;
}

/// Outcome for one notification within a webhook delivery.
#[derive(Debug)]
pub struct NotificationResult {
    pub notification: LeadgenNotification,
    pub result: Result<LeadOutcome, LeadError>,
}

/// Normalized and mapped view of a lead, before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadPreview {
    pub normalized: NormalizedFields,
    pub mapped: MappedContactData,
}

/// Orchestrates the processing stages for leads.
#[derive(Clone)]
pub struct LeadPipeline {
    normalizer: FieldNormalizer,
    mapper: FieldMapper,
    upserter: ContactUpserter,
    fetcher: Arc<dyn LeadFetcher>,
    diagnostics: Arc<dyn DiagnosticLog>,
}

impl std::fmt::Debug for LeadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadPipeline").finish_non_exhaustive()
    }
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn ContactStore>,
        fetcher: Arc<dyn LeadFetcher>,
        diagnostics: Arc<dyn DiagnosticLog>,
    ) -> Self {
        Self {
            normalizer: FieldNormalizer::new(),
            mapper: FieldMapper::new(),
            upserter: ContactUpserter::new(store, diagnostics.clone()),
            fetcher,
            diagnostics,
        }
    }

    /// Normalize and map a lead without touching the store.
    pub fn preview(&self, raw: &RawLeadPayload, settings: &LeadSettings) -> LeadPreview {
        let normalized = self.normalizer.normalize(raw);
        let mapped = self.mapper.map(&normalized, &settings.mapping);
        LeadPreview { normalized, mapped }
    }

    /// Process a single lead payload into a contact write.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::PersistenceFailure`] when the contact store
    /// fails. Leads that cannot produce a contact return
    /// [`LeadOutcome::Skipped`].
    #[instrument(skip(self, raw, settings))]
    pub async fn process_lead(
        &self,
        raw: &RawLeadPayload,
        settings: &LeadSettings,
    ) -> Result<LeadOutcome, LeadError> {
        let normalized = self.normalizer.normalize(raw);
        if normalized.is_empty() {
            return Ok(self.skip(SkipReason::MissingFieldData, &normalized).await);
        }

        let mapped = self.mapper.map(&normalized, &settings.mapping);
        if !mapped.has_identifier() {
            return Ok(self.skip(SkipReason::MissingIdentifiers, &normalized).await);
        }

        self.upserter.upsert(&mapped, settings).await
    }

    /// Process every lead announced in a Graph webhook body.
    ///
    /// Each lead is fetched and processed independently; a failure for one
    /// lead does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::MalformedPayload`] when the body is not a
    /// webhook envelope. Per-lead failures are reported in the results.
    #[instrument(skip(self, body, settings), fields(body_len = body.len()))]
    pub async fn handle_notification(
        &self,
        body: &[u8],
        settings: &LeadSettings,
    ) -> Result<Vec<NotificationResult>, LeadError> {
        let notifications = parse_notifications(body)?;
        if notifications.is_empty() {
            info!("Webhook delivery carried no leadgen changes");
        }

        let mut results = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let result = self.process_notification(&notification, settings).await;
            if let Err(e) = &result {
                warn!(leadgen_id = %notification.leadgen_id, error = %e, "Lead processing failed");
                self.diagnostics
                    .log(
                        "Lead processing failed",
                        json!({
                            "leadgen_id": notification.leadgen_id.as_str(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
            }
            results.push(NotificationResult {
                notification,
                result,
            });
        }

        Ok(results)
    }

    async fn process_notification(
        &self,
        notification: &LeadgenNotification,
        settings: &LeadSettings,
    ) -> Result<LeadOutcome, LeadError> {
        let fetched = self
            .fetcher
            .fetch_lead(
                &notification.leadgen_id,
                notification.page_id.as_ref(),
                settings,
            )
            .await?;

        match fetched {
            Some(raw) => self.process_lead(&raw, settings).await,
            None => {
                self.diagnostics
                    .log(
                        "Lead fetch returned no field data",
                        json!({"leadgen_id": notification.leadgen_id.as_str()}),
                    )
                    .await;
                Ok(LeadOutcome::Skipped {
                    reason: SkipReason::MissingFieldData,
                })
            }
        }
    }

    async fn skip(&self, reason: SkipReason, normalized: &NormalizedFields) -> LeadOutcome {
        info!(reason = %reason, "Lead skipped");
        let keys: Vec<&String> = normalized.iter().map(|(key, _)| key).collect();
        self.diagnostics
            .log(
                "Lead skipped",
                json!({"reason": reason.as_str(), "fields": keys}),
            )
            .await;
        LeadOutcome::Skipped { reason }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
