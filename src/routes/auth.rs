/// Credential Routes
///
/// Registration, login, token refresh, logout, the current user and the
/// admin-only user update.

use actix_web::{http::header::AUTHORIZATION, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, TokenService};
use crate::domain::{NewUser, Role, UserSnapshot, UserUpdate};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::middleware::{refresh_cookie, refresh_token_from};
use crate::store::JobBoardStore;
use crate::validators::{is_valid_email, is_valid_username};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Body of a login or refresh response. The same access token is also on
/// the `Authorization` header.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user: UserSnapshot,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn parse_role(raw: &str) -> Result<Role, ValidationError> {
    Role::from_str(raw)
}

/// POST /api/register
///
/// Self-registration is limited to `USER` and `COMPANY` (default `USER`).
///
/// # Errors
/// - 400: invalid username, email, password or role
/// - 409: username or email already taken
pub async fn register(
    form: web::Json<RegisterRequest>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let username = is_valid_username(&form.username)?;
    let email = is_valid_email(&form.email)?;
    let role = match form.role.as_deref() {
        None => Role::default(),
        Some(raw) => {
            let role = parse_role(raw)?;
            if !role.is_self_assignable() {
                return Err(ValidationError::InvalidValue {
                    field: "role".to_string(),
                    value: raw.to_string(),
                }
                .into());
            }
            role
        }
    };
    let password_hash = hash_password(&form.password)?;

    let user = store
        .insert_user(NewUser {
            username,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        role = %user.role,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(user.snapshot()))
}

/// POST /api/login
///
/// Unknown username and wrong password produce the same error.
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn JobBoardStore>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let user = store
        .find_user_by_username(form.username.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let snapshot = user.snapshot();
    let pair = tokens.issue(&snapshot)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok()
        .insert_header((AUTHORIZATION, pair.access_token.clone()))
        .cookie(refresh_cookie(&pair.refresh_token))
        .json(TokenResponse {
            user: snapshot,
            access_token: pair.access_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.access_ttl(),
        }))
}

/// POST /api/refreshToken
///
/// Mints a new access token from the `refresh_token` cookie. The refresh
/// token itself is not rotated.
///
/// # Errors
/// - 401 `UNAUTHENTICATED`: no cookie
/// - 401 `TOKEN_INVALID`: cookie present but does not verify
pub async fn refresh(
    req: HttpRequest,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let refresh_token = refresh_token_from(&req).ok_or(AuthError::Unauthenticated)?;
    let (access_token, claims) = tokens.refresh(&refresh_token).map_err(|e| {
        tracing::warn!(request_id = %context.request_id, error = %e, "Refresh token rejected");
        AppError::from(e)
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %claims.user.id,
        "Access token refreshed"
    );

    Ok(HttpResponse::Ok()
        .insert_header((AUTHORIZATION, access_token.clone()))
        .json(TokenResponse {
            user: claims.user,
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.access_ttl(),
        }))
}

/// GET /api/logout
///
/// Tokens are stateless, so logging out only clears what the client holds.
pub async fn logout() -> HttpResponse {
    let mut cookie = refresh_cookie("");
    cookie.make_removal();

    HttpResponse::Ok()
        .insert_header((AUTHORIZATION, ""))
        .cookie(cookie)
        .json(serde_json::json!({ "message": "Logged out" }))
}

/// GET /api/me
pub async fn me(user: web::ReqData<UserSnapshot>) -> HttpResponse {
    HttpResponse::Ok().json(user.into_inner())
}

/// PUT /api/users/{id}
///
/// Tokens already issued to the user keep the old snapshot until they
/// expire.
pub async fn update_user(
    path: web::Path<Uuid>,
    form: web::Json<UpdateUserRequest>,
    acting: web::ReqData<UserSnapshot>,
    store: web::Data<dyn JobBoardStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_update").with_user_id(acting.id);
    let id = path.into_inner();

    let update = UserUpdate {
        email: form.email.as_deref().map(is_valid_email).transpose()?,
        role: form.role.as_deref().map(parse_role).transpose()?,
    };

    let user = store
        .update_user(id, update)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        target_user_id = %user.id,
        role = %user.role,
        "User updated"
    );

    Ok(HttpResponse::Ok().json(user.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_is_case_sensitive() {
        assert_eq!(parse_role("COMPANY"), Ok(Role::Company));
        assert!(parse_role("company").is_err());
    }

    #[test]
    fn test_token_response_shape() {
        let body = serde_json::to_value(TokenResponse {
            user: UserSnapshot {
                id: Uuid::nil(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::User,
                image: None,
                cv: None,
            },
            access_token: "token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
        .unwrap();

        assert_eq!(body["accessToken"], "token");
        assert_eq!(body["expiresIn"], 3600);
        assert_eq!(body["user"]["role"], "USER");
        assert!(body["user"].get("password_hash").is_none());
    }
}
