//! Tally Core
//!
//! Core types shared by the Tally ledger gateway, its client and CLI.
//!
//! This crate contains:
//! - Domain types: Jobs, principals and ledger messages
//! - DTOs: Request and response bodies exchanged over the gateway API

pub mod domain;
pub mod dto;
