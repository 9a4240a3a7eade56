// Account handlers
// Signup, login and logout pages backed by the session store

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    app::AppState,
    auth::{hash_password, safe_next, verify_password, Viewer},
    csrf::{csrf_token, CsrfForm, CsrfProtectedForm},
    error::{AppError, AppResult},
    forms::{FieldErrors, LoginForm, SignupForm},
    handlers::html,
    models::NewUser,
    templates::{LoggedOutTemplate, LoginTemplate, Nav, SignupTemplate},
};

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn signup_form_page(nav: Nav, form: &SignupForm, errors: FieldErrors, csrf_token: String) -> SignupTemplate {
    SignupTemplate {
        nav,
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        username: form.username.clone(),
        email: form.email.clone(),
        errors,
        csrf_token,
    }
}

/// GET /auth/signup/
pub async fn signup_page(viewer: Viewer, session: Session) -> AppResult<Response> {
    html(&signup_form_page(
        Nav::from(&viewer),
        &SignupForm::default(),
        FieldErrors::default(),
        csrf_token(&session).await?,
    ))
}

/// Create an account and log straight into it
/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    viewer: Viewer,
    session: Session,
    Form(form): Form<CsrfProtectedForm<SignupForm>>,
) -> AppResult<Response> {
    let form = form.validate(&session).await?;
    let token = csrf_token(&session).await?;

    let clean = match form.clean() {
        Ok(clean) => clean,
        Err(errors) => return html(&signup_form_page(Nav::from(&viewer), &form, errors, token)),
    };

    let new_user = NewUser {
        username: clean.username,
        email: clean.email,
        first_name: clean.first_name,
        last_name: clean.last_name,
        password_hash: hash_password(&clean.password)?,
    };

    let user = match state.store.create_user(new_user).await {
        Ok(user) => user,
        Err(AppError::Conflict(message)) => {
            info!("Signup rejected: {}", message);
            let mut errors = FieldErrors::default();
            errors.add("username", USERNAME_TAKEN);
            return html(&signup_form_page(Nav::from(&viewer), &form, errors, token));
        }
        Err(err) => return Err(err),
    };

    info!("Registered user {} (id {})", user.username, user.id);
    crate::auth::login(&session, &user).await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /auth/login/
pub async fn login_page(
    viewer: Viewer,
    session: Session,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    html(&LoginTemplate {
        nav: Nav::from(&viewer),
        username: String::new(),
        next: query.next.unwrap_or_default(),
        errors: FieldErrors::default(),
        csrf_token: csrf_token(&session).await?,
    })
}

/// Check credentials and continue to `next`
/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    session: Session,
    Form(form): Form<CsrfProtectedForm<LoginForm>>,
) -> AppResult<Response> {
    let form = form.validate(&session).await?;
    let token = csrf_token(&session).await?;

    let rerender = |errors: FieldErrors| {
        html(&LoginTemplate {
            nav: Nav::from(&viewer),
            username: form.username.clone(),
            next: form.next.clone().unwrap_or_default(),
            errors,
            csrf_token: token.clone(),
        })
    };

    if let Err(errors) = form.clean() {
        return rerender(errors);
    }

    let user = state
        .store
        .find_user_by_username(form.username.trim())
        .await?
        .filter(|user| verify_password(&form.password, &user.password_hash));

    let Some(user) = user else {
        warn!("Failed login attempt for {:?}", form.username);
        let mut errors = FieldErrors::default();
        errors.add(FieldErrors::NON_FIELD, INVALID_LOGIN);
        return rerender(errors);
    };

    crate::auth::login(&session, &user).await?;
    Ok(Redirect::to(safe_next(form.next.as_deref())).into_response())
}

/// POST /auth/logout/ from a page form
pub async fn logout_submit(
    viewer: Viewer,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> AppResult<Response> {
    form.validate(&session).await?;
    logout(viewer, session).await
}

/// GET /auth/logout/
pub async fn logout(viewer: Viewer, session: Session) -> AppResult<Response> {
    if let Some(username) = viewer.username() {
        info!("User {} logged out", username);
    }
    crate::auth::logout(&session).await?;

    html(&LoggedOutTemplate {
        nav: Nav::default(),
    })
}
