use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Authorization tier attached to a user.
///
/// The wire form is the upper-case name and parsing is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Guest,
    User,
    Company,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::User => "USER",
            Role::Company => "COMPANY",
            Role::Admin => "ADMIN",
        }
    }

    /// Roles a caller may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::User | Role::Company)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GUEST" => Ok(Role::Guest),
            "USER" => Ok(Role::User),
            "COMPANY" => Ok(Role::Company),
            "ADMIN" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                value: other.to_string(),
            }),
        }
    }
}
