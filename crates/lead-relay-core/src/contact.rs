//! Contact model and contact store abstraction.
//!
//! A [`Contact`] is identified by email (primary) or phone (secondary). The
//! [`ContactStore`] trait is the boundary to the CRM; the pipeline never
//! touches storage directly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ContactId, ListId, ParseError, TagId, Timestamp};

/// Contact attributes a lead is allowed to write.
///
/// Email is deliberately absent: it is only ever set when a contact is
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    FirstName,
    LastName,
    Phone,
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    Country,
    Company,
    JobTitle,
}

impl ContactField {
    /// Every writable attribute, in display order
    pub const ALL: [ContactField; 11] = [
        Self::FirstName,
        Self::LastName,
        Self::Phone,
        Self::AddressLine1,
        Self::AddressLine2,
        Self::City,
        Self::State,
        Self::PostalCode,
        Self::Country,
        Self::Company,
        Self::JobTitle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Phone => "phone",
            Self::AddressLine1 => "address_line_1",
            Self::AddressLine2 => "address_line_2",
            Self::City => "city",
            Self::State => "state",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
            Self::Company => "company",
            Self::JobTitle => "job_title",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ParseError::InvalidFormat {
                expected: "contact attribute name".to_string(),
                actual: s.to_string(),
            })
    }
}

/// Subscription status of a contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Subscribed,
    Pending,
    Unsubscribed,
    Transactional,
    Bounced,
    Complained,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::Pending => "pending",
            Self::Unsubscribed => "unsubscribed",
            Self::Transactional => "transactional",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subscribed" => Ok(Self::Subscribed),
            "pending" => Ok(Self::Pending),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "transactional" => Ok(Self::Transactional),
            "bounced" => Ok(Self::Bounced),
            "complained" => Ok(Self::Complained),
            _ => Err(ParseError::InvalidFormat {
                expected: "subscribed, pending, unsubscribed, transactional, bounced or complained"
                    .to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Attribute values keyed by writable field.
pub type ContactAttributes = BTreeMap<ContactField, String>;

/// A CRM contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: Option<String>,
    pub status: ContactStatus,
    #[serde(default)]
    pub attributes: ContactAttributes,
    #[serde(default)]
    pub tags: BTreeSet<TagId>,
    #[serde(default)]
    pub lists: BTreeSet<ListId>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contact {
    pub fn attribute(&self, field: ContactField) -> Option<&str> {
        self.attributes.get(&field).map(String::as_str)
    }

    pub fn phone(&self) -> Option<&str> {
        self.attribute(ContactField::Phone)
    }
}

/// Data for creating a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    /// Normalized (trimmed, lower-cased) email address
    pub email: String,
    pub status: ContactStatus,
    pub attributes: ContactAttributes,
}

/// Contact store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Contact not found: {contact_id}")]
    NotFound { contact_id: ContactId },

    #[error("Contact with email already exists: {email}")]
    DuplicateEmail { email: String },

    #[error("Contact store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Contact data could not be serialized: {message}")]
    Serialization { message: String },
}

impl StoreError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Boundary to the CRM contact store.
///
/// Email lookups receive an already normalized address. Tag, list and
/// metadata writes must be idempotent.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Get a contact by ID
    async fn get(&self, id: ContactId) -> Result<Option<Contact>, StoreError>;

    /// Find a contact by exact email
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError>;

    /// Find a contact by exact phone number
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Contact>, StoreError>;

    /// Create a new contact
    async fn create(&self, contact: NewContact) -> Result<Contact, StoreError>;

    /// Overwrite the given attributes of an existing contact
    async fn update(
        &self,
        id: ContactId,
        attributes: ContactAttributes,
    ) -> Result<Contact, StoreError>;

    /// Attach tags, ignoring ones already attached
    async fn attach_tags(&self, id: ContactId, tags: &[TagId]) -> Result<(), StoreError>;

    /// Attach lists, ignoring ones already attached
    async fn attach_lists(&self, id: ContactId, lists: &[ListId]) -> Result<(), StoreError>;

    /// Insert or replace one metadata value
    async fn upsert_meta(&self, id: ContactId, key: &str, value: &str) -> Result<(), StoreError>;

    /// Check whether the store can serve requests
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Normalize an email address for storage and lookup.
///
/// Trims and lower-cases the address and returns `None` when the result is
/// not a plausible `local@domain.tld` address.
///
/// ```
/// use lead_relay_core::contact::normalize_email;
///
/// assert_eq!(normalize_email("  Ana@Example.COM "), Some("ana@example.com".to_string()));
/// assert_eq!(normalize_email("not-an-email"), None);
/// ```
pub fn normalize_email(input: &str) -> Option<String> {
    let email = input.trim().to_lowercase();
    if email.len() > 254 {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    let valid_local = !local.is_empty()
        && local.len() <= 64
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c))
        && !local.starts_with('.')
        && !local.ends_with('.')
        && !local.contains("..");
    let valid_domain = domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    (valid_local && valid_domain).then_some(email)
}

#[cfg(test)]
#[path = "contact_tests.rs"]
mod tests;
