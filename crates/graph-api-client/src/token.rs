//! Long-lived token exchange.

use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use crate::client::{AccessToken, GraphClient};
use crate::error::ApiError;

/// App ID and secret of the Facebook app, needed for token exchange.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: AccessToken,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl GraphClient {
    /// Exchange a short-lived user token for a long-lived one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] when the app ID or secret is empty,
    /// and [`ApiError::UnexpectedResponse`] when Graph answers without an
    /// `access_token`.
    #[instrument(skip(self, credentials, user_token), fields(app_id = %credentials.app_id))]
    pub async fn exchange_token(
        &self,
        credentials: &AppCredentials,
        user_token: &AccessToken,
    ) -> Result<AccessToken, ApiError> {
        if credentials.app_id.is_empty() || credentials.app_secret.is_empty() {
            return Err(ApiError::Configuration {
                message: "app_id and app_secret are required for token exchange".to_string(),
            });
        }

        let url = self.endpoint(
            &["oauth", "access_token"],
            &[
                ("grant_type", "fb_exchange_token"),
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", credentials.app_secret.expose()),
                ("fb_exchange_token", user_token.expose()),
            ],
        )?;

        let response: TokenResponse = self.send_json(Method::GET, url, None).await?;

        response
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| ApiError::UnexpectedResponse {
                message: "token exchange response has no access_token".to_string(),
            })
    }
}
