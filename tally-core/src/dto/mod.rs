//! Data Transfer Objects for the gateway API
//!
//! Request and response bodies exchanged between the gateway and its clients.
//! Field names follow the camelCase convention of the HTTP surface.

pub mod auth;
pub mod error;
pub mod job;
pub mod message;
