//! Page listing and leadgen webhook subscription management.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::{AccessToken, GraphClient};
use crate::error::ApiError;

/// Upper bound on pages requested from `/me/accounts` in one call.
const PAGE_LIST_LIMIT: &str = "50";

/// A Facebook page the user manages, with the token needed to act as it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    id: Option<String>,
    name: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

impl GraphClient {
    /// List the pages managed by the owner of `user_token`.
    ///
    /// Entries missing an ID, name or page token are dropped; they cannot be
    /// subscribed or used to fetch leads anyway.
    #[instrument(skip(self, user_token))]
    pub async fn list_pages(&self, user_token: &AccessToken) -> Result<Vec<Page>, ApiError> {
        let url = self.endpoint(
            &["me", "accounts"],
            &[
                ("fields", "id,name,access_token"),
                ("limit", PAGE_LIST_LIMIT),
                ("access_token", user_token.expose()),
            ],
        )?;

        let response: AccountsResponse = self.send_json(Method::GET, url, None).await?;
        let total = response.data.len();

        let pages: Vec<Page> = response
            .data
            .into_iter()
            .filter_map(|raw| match (raw.id, raw.name, raw.access_token) {
                (Some(id), Some(name), Some(access_token))
                    if !id.is_empty() && !name.is_empty() && !access_token.is_empty() =>
                {
                    Some(Page {
                        id,
                        name,
                        access_token,
                    })
                }
                _ => None,
            })
            .collect();

        if pages.len() < total {
            warn!(
                dropped = total - pages.len(),
                "Ignored pages without id, name or access token"
            );
        }

        Ok(pages)
    }

    /// Subscribe this app to a page's webhooks.
    ///
    /// Returns the `success` flag Graph reports.
    #[instrument(skip(self, page_token), fields(page_id = %page_id))]
    pub async fn subscribe_page(
        &self,
        page_id: &str,
        page_token: &AccessToken,
    ) -> Result<bool, ApiError> {
        let url = self.endpoint(&[page_id, "subscribed_apps"], &[])?;
        let form = [
            ("access_token", page_token.expose()),
            ("subscribed_fields", "leadgen"),
        ];
        let response: SuccessResponse = self.send_json(Method::POST, url, Some(&form)).await?;

        info!(success = response.success, "Page subscription request completed");
        Ok(response.success)
    }

    /// Remove this app's webhook subscription from a page.
    #[instrument(skip(self, page_token), fields(page_id = %page_id))]
    pub async fn unsubscribe_page(
        &self,
        page_id: &str,
        page_token: &AccessToken,
    ) -> Result<bool, ApiError> {
        let url = self.endpoint(&[page_id, "subscribed_apps"], &[])?;
        let form = [("access_token", page_token.expose())];
        let response: SuccessResponse = self.send_json(Method::DELETE, url, Some(&form)).await?;

        info!(success = response.success, "Page unsubscription request completed");
        Ok(response.success)
    }
}
