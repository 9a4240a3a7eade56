//! CSRF protection for the site's forms.
//!
//! Every session carries one random token. Pages embed it as a hidden
//! `csrf_token` field; state-changing POST handlers compare the submitted value
//! with the session copy before touching anything. The post create and edit
//! forms are multipart uploads and are not covered.

use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const CSRF_SESSION_KEY: &str = "_csrf_token";

pub const CSRF_FAILED: &str = "CSRF verification failed. Request aborted.";

/// Get or create the CSRF token for the current session
pub async fn csrf_token(session: &Session) -> AppResult<String> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await? {
        return Ok(token);
    }

    debug!("Generating new CSRF token");
    let token = Uuid::new_v4().simple().to_string();
    session.insert(CSRF_SESSION_KEY, &token).await?;
    Ok(token)
}

/// Checks a submitted token against the session's one
pub async fn verify_csrf_token(session: &Session, submitted: &str) -> AppResult<()> {
    match session.get::<String>(CSRF_SESSION_KEY).await? {
        Some(expected) if !submitted.is_empty() && expected == submitted => Ok(()),
        Some(_) => {
            warn!("Rejected POST with a mismatched CSRF token");
            Err(AppError::forbidden(CSRF_FAILED))
        }
        None => {
            warn!("Rejected POST from a session without a CSRF token");
            Err(AppError::forbidden(CSRF_FAILED))
        }
    }
}

/// A form body that carries nothing but the token (follow, unfollow, logout)
#[derive(Debug, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

impl CsrfForm {
    pub async fn validate(&self, session: &Session) -> AppResult<()> {
        verify_csrf_token(session, &self.csrf_token).await
    }
}

/// Form data wrapper that includes CSRF token validation
#[derive(Debug, Deserialize)]
pub struct CsrfProtectedForm<T> {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> CsrfProtectedForm<T> {
    /// Unwraps the form once its token matches the session
    pub async fn validate(self, session: &Session) -> AppResult<T> {
        verify_csrf_token(session, &self.csrf_token).await?;
        Ok(self.data)
    }
}
