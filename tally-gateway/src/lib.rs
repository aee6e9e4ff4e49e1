//! Tally Gateway
//!
//! HTTP gateway in front of a transactional ledger. Reads are evaluated
//! synchronously; every mutation is turned into a durable job that a pool of
//! submission workers delivers to the ledger with bounded retries.
//!
//! Architecture:
//! - API: axum handlers, API key middleware, error mapping
//! - Services: request validation and job creation
//! - Queue + Repository: job persistence and the claim protocol
//! - Worker: submission pool, retry policy, housekeeping
//! - Backend: ledger adapters (HTTP bridge, in-memory contract)

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod queue;
pub mod repository;
pub mod service;
pub mod state;
pub mod worker;

pub use config::GatewayConfig;
pub use queue::JobQueue;
pub use state::AppState;
