//! Service Module
//!
//! Business logic layer for the gateway.
//! Reads go straight to the ledger; mutations only ever become queued jobs.

pub mod auth;
pub mod job;
pub mod message;

// Re-export for convenience
pub use auth as auth_service;
pub use job as job_service;
pub use message as message_service;
