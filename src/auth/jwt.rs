/// Token Service
///
/// Mints and verifies the two token classes. Access and refresh tokens are
/// signed with distinct secrets, so a token of one class never verifies as
/// the other. Everything here is a pure function of the token, the clock and
/// the configured secrets.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::domain::UserSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature or claims are invalid")]
    Invalid,
    #[error("token could not be signed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// Freshly minted access + refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp
    pub access_expires_at: i64,
    /// Unix timestamp
    pub refresh_expires_at: i64,
}

#[derive(Clone)]
struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    access: SigningKey,
    refresh: SigningKey,
    access_ttl: i64,
    refresh_ttl: i64,
    issuer: String,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl TokenService {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: SigningKey::from_secret(&config.access_secret),
            refresh: SigningKey::from_secret(&config.refresh_secret),
            access_ttl: config.access_token_expiry,
            refresh_ttl: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
        }
    }

    pub fn access_ttl(&self) -> i64 {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> i64 {
        self.refresh_ttl
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn ttl(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn mint(
        &self,
        user: UserSnapshot,
        kind: TokenKind,
        now: i64,
    ) -> Result<(String, Claims), TokenError> {
        let claims = Claims::new(user, kind, now, self.ttl(kind), &self.issuer);
        let token = encode(&Header::default(), &claims, &self.key(kind).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, claims))
    }

    /// Issue an access + refresh pair embedding `user`.
    pub fn issue(&self, user: &UserSnapshot) -> Result<TokenPair, TokenError> {
        self.issue_at(user, now())
    }

    pub fn issue_at(&self, user: &UserSnapshot, now: i64) -> Result<TokenPair, TokenError> {
        let (access_token, access) = self.mint(user.clone(), TokenKind::Access, now)?;
        let (refresh_token, refresh) = self.mint(user.clone(), TokenKind::Refresh, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access.exp,
            refresh_expires_at: refresh.exp,
        })
    }

    /// Verify `token` as a token of class `kind`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        self.verify_at(token, kind, now())
    }

    pub fn verify_at(&self, token: &str, kind: TokenKind, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock, without leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.key(kind).decoding, &validation)?.claims;

        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Mint a new access token from a valid refresh token.
    ///
    /// The embedded user is copied as-is; it is not re-read from the
    /// credential store.
    pub fn refresh(&self, refresh_token: &str) -> Result<(String, Claims), TokenError> {
        self.refresh_at(refresh_token, now())
    }

    pub fn refresh_at(
        &self,
        refresh_token: &str,
        now: i64,
    ) -> Result<(String, Claims), TokenError> {
        let refresh_claims = self.verify_at(refresh_token, TokenKind::Refresh, now)?;
        self.mint(refresh_claims.user, TokenKind::Access, now)
    }
}
