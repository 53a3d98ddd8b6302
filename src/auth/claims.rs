/// JWT Claims structure
///
/// Both token classes carry the same payload: a snapshot of the user taken
/// at login, the token class, and the standard time claims (RFC 7519).

use serde::{Deserialize, Serialize};

use crate::domain::UserSnapshot;

/// Which of the two token classes a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Embedded user, trusted for the token's lifetime
    pub user: UserSnapshot,
    /// Token class
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    pub fn new(
        user: UserSnapshot,
        kind: TokenKind,
        now: i64,
        ttl_seconds: i64,
        issuer: &str,
    ) -> Self {
        Self {
            user,
            kind,
            exp: now + ttl_seconds,
            iat: now,
            iss: issuer.to_string(),
        }
    }

    /// A token is expired from its `exp` second onwards.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
