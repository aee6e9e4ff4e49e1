//! Core domain types
//!
//! This module contains the domain structures shared across Tally services.
//! The gateway persists and executes them, clients read them back.

pub mod job;
pub mod message;
pub mod principal;
