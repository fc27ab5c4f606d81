//! # Lead Relay Core
//!
//! Core business logic for relaying Facebook Lead Ads submissions into a CRM
//! contact store.
//!
//! A lead travels through a fixed sequence of stages:
//!
//! 1. [`signature`] authenticates the inbound webhook delivery
//! 2. [`payload`] validates the raw body and extracts leadgen notifications
//! 3. [`normalizer`] flattens Graph `field_data` into a key/value map
//! 4. [`mapping`] translates form fields onto contact attributes
//! 5. [`upsert`] resolves, merges or creates the contact and attaches
//!    tags, lists and metadata
//!
//! [`pipeline::LeadPipeline`] wires the stages together. Infrastructure
//! (contact storage, lead retrieval, diagnostic logging) sits behind traits
//! with implementations in [`adapters`].
//!
//! ## Usage
//!
//! ```rust
//! use lead_relay_core::{ContactId, LeadId};
//!
//! let lead_id: LeadId = "1234567890".parse().unwrap();
//! assert_eq!(lead_id.as_str(), "1234567890");
//!
//! let contact_id = ContactId::new(42);
//! assert_eq!(contact_id.to_string(), "42");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use uuid::Uuid;

// ============================================================================
// Provider Identifier Types
// ============================================================================

/// Maximum length accepted for a Graph object ID.
const MAX_GRAPH_ID_LENGTH: usize = 32;

fn validate_graph_id(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_GRAPH_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_GRAPH_ID_LENGTH,
        });
    }

    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidCharacters {
            field: field.to_string(),
            invalid_chars: "non-digit".to_string(),
        });
    }

    Ok(())
}

macro_rules! graph_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier with validation
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                validate_graph_id($field, &value)?;
                Ok(Self(value))
            }

            /// Get string representation
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

graph_id!(
    /// Graph leadgen ID identifying a single form submission
    LeadId,
    "leadgen_id"
);

graph_id!(
    /// Graph ID of the Facebook page that owns a lead form
    PageId,
    "page_id"
);

graph_id!(
    /// Graph ID of a Lead Ads form
    FormId,
    "form_id"
);

// ============================================================================
// CRM Identifier Types
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create new identifier
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get numeric value
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().parse::<u64>() {
                    Ok(id) if id > 0 => Ok(Self::new(id)),
                    _ => Err(ParseError::InvalidFormat {
                        expected: "positive integer".to_string(),
                        actual: s.to_string(),
                    }),
                }
            }
        }
    };
}

numeric_id!(
    /// Contact identifier assigned by the contact store
    ContactId
);

numeric_id!(
    /// CRM tag identifier
    TagId
);

numeric_id!(
    /// CRM mailing list identifier
    ListId
);

// ============================================================================
// Time and Metadata Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from Unix seconds, as used by Graph `created_time`
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(Self)
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Identifier for tracing a delivery across system boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Security => "security",
        }
    }
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Errors raised while processing a lead.
///
/// Leads that are well-formed but cannot be turned into a contact (no
/// identifiers, or no email for a new contact) are not errors; they come
/// back as [`pipeline::LeadOutcome::Skipped`] with a
/// [`pipeline::SkipReason`].
#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Malformed lead payload: {message}")]
    MalformedPayload { message: String },

    #[error("Contact store failure: {0}")]
    PersistenceFailure(#[from] contact::StoreError),

    #[error("Lead retrieval failed: {message}")]
    Fetch { message: String, transient: bool },
}

impl LeadError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidSignature => false,
            Self::MalformedPayload { .. } => false,
            Self::PersistenceFailure(e) => e.is_transient(),
            Self::Fetch { transient, .. } => *transient,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature => ErrorCategory::Security,
            Self::MalformedPayload { .. } => ErrorCategory::Permanent,
            Self::PersistenceFailure(e) if e.is_transient() => ErrorCategory::Transient,
            Self::PersistenceFailure(_) => ErrorCategory::Permanent,
            Self::Fetch {
                transient: true, ..
            } => ErrorCategory::Transient,
            Self::Fetch { .. } => ErrorCategory::Permanent,
        }
    }
}

impl From<graph_api_client::ApiError> for LeadError {
    fn from(error: graph_api_client::ApiError) -> Self {
        Self::Fetch {
            transient: error.is_transient(),
            message: error.to_string(),
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook signature and shared-secret authentication
pub mod signature;

/// Raw payload validation and webhook envelope parsing
pub mod payload;

/// Field normalization of raw lead payloads
pub mod normalizer;

/// Field mapping from form fields onto contact attributes
pub mod mapping;

/// Lead relay settings
pub mod settings;

/// Contact model and contact store abstraction
pub mod contact;

/// Diagnostic logging collaborator
pub mod diagnostics;

/// Contact resolution, merge and creation
pub mod upsert;

/// End-to-end lead processing
pub mod pipeline;

/// Infrastructure implementations of the core traits
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{
    FilesystemContactStore, GraphLeadFetcher, InMemoryContactStore, JsonLinesDiagnosticLog,
};
pub use contact::{Contact, ContactField, ContactStatus, ContactStore, NewContact, StoreError};
pub use diagnostics::{DiagnosticLog, TracingDiagnosticLog};
pub use mapping::{FieldMapper, FieldMapping, MappedContactData};
pub use normalizer::{FieldNormalizer, NormalizedFields};
pub use payload::{LeadgenNotification, RawLeadPayload};
pub use pipeline::{LeadFetcher, LeadOutcome, LeadPipeline, NotificationResult, SkipReason};
pub use settings::{LeadSettings, SecretString};
pub use signature::{SharedSecretAuthenticator, SignatureAlgorithm, SignatureVerifier};
pub use upsert::ContactUpserter;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
