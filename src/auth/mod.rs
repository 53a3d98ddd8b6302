/// Authentication module
///
/// Handles access/refresh token minting and verification and password
/// hashing.

mod claims;
mod jwt;
mod password;

pub use claims::{Claims, TokenKind};
pub use jwt::{TokenError, TokenPair, TokenService};
pub use password::{hash_password, validate_password_strength, verify_password};
