/// Access Control Gate
///
/// Guards a resource with a `RequiredRoles` policy. The access token comes
/// from the `Authorization` header (a `Bearer ` prefix is tolerated), the
/// refresh token from the `refresh_token` cookie. When the access token does
/// not verify but the refresh token does, a fresh access token is minted and
/// handed back on the response, and the request proceeds as if it had been
/// presented directly.
///
/// On success the embedded `UserSnapshot` is placed in the request
/// extensions for handlers to pick up with `web::ReqData<UserSnapshot>`.

use actix_web::{
    cookie::{Cookie, SameSite},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderValue, AUTHORIZATION, COOKIE},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::auth::{TokenKind, TokenService};
use crate::domain::{Role, UserSnapshot};
use crate::error::{AppError, AuthError};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Admission policy of one protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredRoles {
    /// No token is inspected.
    Public,
    /// Any verified identity, whatever its role.
    AnyAuthenticated,
    /// A verified identity whose role is in the set. An empty set admits nobody.
    RoleSet(BTreeSet<Role>),
}

impl RequiredRoles {
    pub fn public() -> Self {
        RequiredRoles::Public
    }

    pub fn any_authenticated() -> Self {
        RequiredRoles::AnyAuthenticated
    }

    pub fn only(role: Role) -> Self {
        RequiredRoles::RoleSet(BTreeSet::from([role]))
    }

    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        RequiredRoles::RoleSet(roles.into_iter().collect())
    }

    pub fn admits(&self, role: Role) -> bool {
        match self {
            RequiredRoles::Public | RequiredRoles::AnyAuthenticated => true,
            RequiredRoles::RoleSet(roles) => roles.contains(&role),
        }
    }
}

/// Outcome of a successful admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Anonymous,
    Verified(UserSnapshot),
    /// The access token was replaced; `access_token` must reach the caller.
    Refreshed {
        user: UserSnapshot,
        access_token: String,
    },
}

impl Admission {
    pub fn user(&self) -> Option<&UserSnapshot> {
        match self {
            Admission::Anonymous => None,
            Admission::Verified(user) | Admission::Refreshed { user, .. } => Some(user),
        }
    }
}

fn check_role(policy: &RequiredRoles, user: &UserSnapshot) -> Result<(), AuthError> {
    if policy.admits(user.role) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, role = %user.role, "Role not admitted");
        Err(AuthError::Forbidden)
    }
}

/// Decide whether a request carrying `access` / `refresh` is admitted under
/// `policy` at time `now`.
pub fn admit(
    policy: &RequiredRoles,
    access: Option<&str>,
    refresh: Option<&str>,
    tokens: &TokenService,
    now: i64,
) -> Result<Admission, AuthError> {
    if *policy == RequiredRoles::Public {
        return Ok(Admission::Anonymous);
    }

    if access.is_none() && refresh.is_none() {
        return Err(AuthError::Unauthenticated);
    }

    let access_error = match access.map(|token| tokens.verify_at(token, TokenKind::Access, now)) {
        Some(Ok(claims)) => {
            check_role(policy, &claims.user)?;
            return Ok(Admission::Verified(claims.user));
        }
        Some(Err(e)) => Some(e),
        None => None,
    };

    let refresh = refresh.ok_or(AuthError::Unauthenticated)?;
    match tokens.refresh_at(refresh, now) {
        Ok((access_token, claims)) => {
            tracing::debug!(
                user_id = %claims.user.id,
                access_error = ?access_error,
                "Access token replaced from refresh token"
            );
            check_role(policy, &claims.user)?;
            Ok(Admission::Refreshed {
                user: claims.user,
                access_token,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Refresh token rejected");
            Err(AuthError::TokenInvalid)
        }
    }
}

/// Access token from the `Authorization` header; empty counts as absent.
pub fn access_token_from(req: &impl HttpMessage) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Refresh token from the session cookie; empty counts as absent.
pub fn refresh_token_from(req: &impl HttpMessage) -> Option<String> {
    req.headers()
        .get_all(COOKIE)
        .filter_map(|h| h.to_str().ok())
        .flat_map(cookie::Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty())
}

/// The HTTP-only session cookie carrying `token`.
pub fn refresh_cookie(token: &str) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

pub struct AccessGate {
    tokens: TokenService,
    policy: Rc<RequiredRoles>,
}

impl AccessGate {
    pub fn new(tokens: TokenService, policy: RequiredRoles) -> Self {
        Self {
            tokens,
            policy: Rc::new(policy),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessGateService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
            policy: self.policy.clone(),
        }))
    }
}

pub struct AccessGateService<S> {
    service: Rc<S>,
    tokens: TokenService,
    policy: Rc<RequiredRoles>,
}

impl<S, B> Service<ServiceRequest> for AccessGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let access = access_token_from(&req);
        let refresh = refresh_token_from(&req);
        let now = chrono::Utc::now().timestamp();

        let admission = match admit(
            &self.policy,
            access.as_deref(),
            refresh.as_deref(),
            &self.tokens,
            now,
        ) {
            Ok(admission) => admission,
            Err(e) => {
                tracing::info!(path = %req.path(), error = %e, "Request refused by access gate");
                return Box::pin(async move { Err(AppError::from(e).into()) });
            }
        };

        if let Some(user) = admission.user() {
            req.extensions_mut().insert(user.clone());
        }

        let service = self.service.clone();
        Box::pin(async move {
            let mut res = service.call(req).await?;

            if let (Admission::Refreshed { access_token, .. }, Some(refresh)) = (admission, refresh)
            {
                let value = HeaderValue::from_str(&access_token)
                    .map_err(|e| AppError::Internal(format!("Invalid token header: {}", e)))?;
                res.headers_mut().insert(AUTHORIZATION, value);
                res.response_mut().add_cookie(&refresh_cookie(&refresh))?;
            }

            Ok(res)
        })
    }
}
