//! # Graph Lead Fetcher
//!
//! [`LeadFetcher`] backed by the Graph API client.

use async_trait::async_trait;
use graph_api_client::{AccessToken, GraphClient};
use tracing::{debug, instrument};

use crate::payload::RawLeadPayload;
use crate::pipeline::LeadFetcher;
use crate::settings::LeadSettings;
use crate::{LeadError, LeadId, PageId};

/// Fetches lead detail from Graph with the page token from settings.
#[derive(Debug, Clone)]
pub struct GraphLeadFetcher {
    client: GraphClient,
}

impl GraphLeadFetcher {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LeadFetcher for GraphLeadFetcher {
    #[instrument(skip(self, settings), fields(lead_id = %lead_id))]
    async fn fetch_lead(
        &self,
        lead_id: &LeadId,
        page_id: Option<&PageId>,
        settings: &LeadSettings,
    ) -> Result<Option<RawLeadPayload>, LeadError> {
        let Some(secret) = settings.token_for_page(page_id) else {
            return Err(LeadError::Fetch {
                message: match page_id {
                    Some(page_id) => format!("no access token configured for page {}", page_id),
                    None => "no access token configured".to_string(),
                },
                transient: false,
            });
        };

        let token = AccessToken::new(secret.expose_secret());
        let lead = self.client.fetch_lead(lead_id.as_str(), &token).await?;
        debug!(found = lead.is_some(), "Fetched lead detail");

        lead.map(RawLeadPayload::from_map).transpose()
    }
}

#[cfg(test)]
#[path = "graph_lead_fetcher_tests.rs"]
mod tests;
