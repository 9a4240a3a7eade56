//! Session-backed authentication.
//!
//! The logged-in user's id lives in the session under `SESSION_USER_KEY`.
//! Handlers pick it up through two extractors: `Viewer` for pages anyone may
//! see, and `LoginRequired` for endpoints that redirect anonymous requests to
//! the login page with a `next` parameter.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{debug, info};

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::User;

pub const SESSION_USER_KEY: &str = "_auth_user_id";
pub const LOGIN_URL: &str = "/auth/login/";

/// The current session's user, if any
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

/// The current session's user; anonymous requests are redirected to login
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.username.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| AppError::Internal(anyhow::anyhow!(message)))?;

        let Some(user_id) = session.get::<i64>(SESSION_USER_KEY).await? else {
            return Ok(Viewer(None));
        };

        // A session can outlive its user
        let user = state.store.get_user_by_id(user_id).await?;
        if user.is_none() {
            debug!("Session refers to missing user {}", user_id);
        }
        Ok(Viewer(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for LoginRequired {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let viewer = Viewer::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match viewer.0 {
            Some(user) => Ok(LoginRequired(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or_else(|| parts.uri.path());
                debug!("Anonymous request to {} redirected to login", next);
                Err(Redirect::to(&login_url(next)).into_response())
            }
        }
    }
}

/// `/auth/login/?next=<next>` with `/` left unescaped
pub fn login_url(next: &str) -> String {
    format!("{}?next={}", LOGIN_URL, encode_next(next))
}

fn encode_next(next: &str) -> String {
    urlencoding::encode(next).replace("%2F", "/")
}

/// Only local absolute paths are allowed as redirect targets
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => next,
        _ => "/",
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Binds `user` to the session. The session id is rotated first.
pub async fn login(session: &Session, user: &User) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user.id).await?;
    info!("User {} logged in", user.username);
    Ok(())
}

pub async fn logout(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}
