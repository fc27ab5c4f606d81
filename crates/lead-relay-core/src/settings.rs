//! Lead relay settings.
//!
//! [`LeadSettings`] is the explicit, read-only configuration passed into each
//! pipeline stage. It deserializes from YAML, JSON or TOML; list and mapping
//! fields accept either structured values or the plain-text forms operators
//! paste into a settings form (`"3, 5, 8"` and `source=target` lines).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::contact::ContactStatus;
use crate::mapping::FieldMapping;
use crate::{ListId, PageId, TagId};

/// A configured secret (webhook secret, verify token, access token).
///
/// Zeroed on drop and redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the secret for immediate use
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretString(<EMPTY>)")
        } else {
            f.write_str("SecretString(<REDACTED>)")
        }
    }
}

/// Settings governing how leads are authenticated, mapped and stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeadSettings {
    /// Form field to contact attribute/metadata mapping
    pub mapping: FieldMapping,

    /// Tags attached to every contact touched by a lead
    #[serde(deserialize_with = "id_list")]
    pub tag_ids: Vec<TagId>,

    /// Lists every contact touched by a lead is subscribed to
    #[serde(deserialize_with = "id_list")]
    pub list_ids: Vec<ListId>,

    /// Status given to newly created contacts
    pub default_status: ContactStatus,

    /// Graph app secret used to verify `X-Hub-Signature(-256)`
    pub app_secret: SecretString,

    /// Graph app ID, needed for token exchange
    pub app_id: String,

    /// Token Graph must echo during the subscription handshake
    pub verify_token: SecretString,

    /// Shared secret for the direct lead push endpoint
    pub webhook_secret: SecretString,

    /// Long-lived user token, fallback for pages without a page token
    pub long_lived_token: SecretString,

    /// Page access tokens keyed by page ID
    pub page_tokens: BTreeMap<String, SecretString>,

    /// Write diagnostic records to the JSON-lines log
    pub logging_enabled: bool,
}

impl Default for LeadSettings {
    fn default() -> Self {
        Self {
            mapping: FieldMapping::default(),
            tag_ids: Vec::new(),
            list_ids: Vec::new(),
            default_status: ContactStatus::default(),
            app_secret: SecretString::default(),
            app_id: String::new(),
            verify_token: SecretString::default(),
            webhook_secret: SecretString::default(),
            long_lived_token: SecretString::default(),
            page_tokens: BTreeMap::new(),
            logging_enabled: false,
        }
    }
}

impl LeadSettings {
    /// Access token to use when fetching leads for `page_id`.
    ///
    /// Prefers the page's own token, then the long-lived user token. Returns
    /// `None` when neither is configured.
    pub fn token_for_page(&self, page_id: Option<&PageId>) -> Option<&SecretString> {
        page_id
            .and_then(|id| self.page_tokens.get(id.as_str()))
            .filter(|token| !token.is_empty())
            .or_else(|| Some(&self.long_lived_token).filter(|token| !token.is_empty()))
    }
}

/// Parse a comma separated ID list into unique positive integers.
///
/// Non-numeric and non-positive entries are dropped; first occurrence order
/// is kept.
///
/// ```
/// use lead_relay_core::settings::sanitize_ids;
///
/// assert_eq!(sanitize_ids("1, 2, x, 2, 0, -3"), vec![1, 2]);
/// ```
pub fn sanitize_ids(input: &str) -> Vec<u64> {
    unique_positive(
        input
            .split(',')
            .filter_map(|part| part.trim().parse::<u64>().ok()),
    )
}

fn unique_positive(ids: impl IntoIterator<Item = u64>) -> Vec<u64> {
    let mut unique = Vec::new();
    for id in ids.into_iter().filter(|id| *id > 0) {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdListInput {
    List(Vec<u64>),
    Text(String),
}

fn id_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<u64>,
{
    let ids = match IdListInput::deserialize(deserializer)? {
        IdListInput::List(ids) => unique_positive(ids),
        IdListInput::Text(text) => sanitize_ids(&text),
    };
    Ok(ids.into_iter().map(T::from).collect())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
