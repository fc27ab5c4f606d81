//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the contact store, lead fetcher and
//! diagnostic log interfaces.

pub mod filesystem_contact_store;
pub mod graph_lead_fetcher;
pub mod jsonl_diagnostic_log;
pub mod memory_contact_store;

pub use filesystem_contact_store::FilesystemContactStore;
pub use graph_lead_fetcher::GraphLeadFetcher;
pub use jsonl_diagnostic_log::JsonLinesDiagnosticLog;
pub use memory_contact_store::InMemoryContactStore;
