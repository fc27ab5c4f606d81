//! # Graph API Client
//!
//! Thin client for the parts of the Facebook Graph API that a Lead Ads
//! integration needs:
//!
//! - Fetching full lead detail (`field_data`) for a leadgen ID
//! - Exchanging a short-lived user token for a long-lived one
//! - Listing the pages a user manages, with their page access tokens
//! - Subscribing and unsubscribing the app from a page's leadgen webhooks
//!
//! # Examples
//!
//! ```rust,no_run
//! use graph_api_client::{AccessToken, GraphClient, GraphClientConfig};
//!
//! # async fn example() -> Result<(), graph_api_client::ApiError> {
//! let client = GraphClient::new(GraphClientConfig::default())?;
//! let token = AccessToken::new("page-token");
//!
//! if let Some(lead) = client.fetch_lead("1234567890", &token).await? {
//!     println!("lead has {} top-level keys", lead.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod leads;
pub mod pages;
pub mod token;

pub use client::{AccessToken, GraphClient, GraphClientConfig, GraphClientConfigBuilder};
pub use error::ApiError;
pub use pages::Page;
pub use token::AppCredentials;
