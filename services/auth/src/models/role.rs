//! Principal kinds carried in session tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of principal a session token was issued to.
///
/// Fixed at issuance; a token never changes role during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Marketplace customer booking courts
    User,
    /// Court owner selling bookings
    Vendor,
}

impl Role {
    /// Name of the table holding credentials for this principal kind
    pub fn credential_table(self) -> &'static str {
        match self {
            Role::User => "users",
            Role::Vendor => "vendors",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Vendor => f.write_str("vendor"),
        }
    }
}
