//! Principal domain type

use serde::{Deserialize, Serialize};

/// Resolved identity under which a ledger operation executes
///
/// The gateway never verifies credentials against the ledger itself; it trusts
/// the principal resolved at login and forwards it to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Wallet identity label (the caller's user id)
    pub user_id: String,

    /// Membership service provider the identity belongs to
    pub msp_id: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            msp_id: msp_id.into(),
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user_id, self.msp_id)
    }
}
