// Profile handlers
// Author pages, the subscription feed and follow/unfollow actions

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use tower_sessions::Session;
use tracing::{debug, info};

use crate::{
    app::AppState,
    auth::{LoginRequired, Viewer},
    csrf::{csrf_token, CsrfForm},
    error::AppResult,
    handlers::{html, load_post_page},
    pagination::PageQuery,
    store::PostScope,
    templates::{FollowIndexTemplate, Nav, ProfileTemplate},
};

pub(crate) fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// An author's posts, with a follow button for other logged-in users
/// GET /profile/:username/
pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    session: Session,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let author = state.store.get_user_by_username(&username).await?;
    let page = load_post_page(&state, PostScope::Author(author.id), query.page.as_deref()).await?;

    let (can_follow, following) = match viewer.id() {
        Some(viewer_id) if viewer_id != author.id => {
            (true, state.store.is_following(viewer_id, author.id).await?)
        }
        _ => (false, false),
    };
    let csrf_token = if can_follow {
        csrf_token(&session).await?
    } else {
        String::new()
    };

    html(&ProfileTemplate {
        nav: Nav::from(&viewer),
        author,
        page,
        can_follow,
        following,
        csrf_token,
    })
}

/// Posts from every author the session user follows
/// GET /follow/
pub async fn follow_index(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let page = load_post_page(&state, PostScope::FollowedBy(user.id), query.page.as_deref()).await?;

    html(&FollowIndexTemplate {
        nav: Nav {
            username: Some(user.username),
        },
        page,
    })
}

/// Subscribe to an author. Self-follows and repeats change nothing.
/// POST /profile/:username/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
    Path(username): Path<String>,
    Form(form): Form<CsrfForm>,
) -> AppResult<Response> {
    form.validate(&session).await?;
    let author = state.store.get_user_by_username(&username).await?;

    if author.id == user.id {
        debug!("User {} tried to follow themselves", user.username);
    } else {
        match state.store.create_follow(&user, &author).await? {
            Some(follow) => info!("New subscription: {}", follow),
            None => debug!("{} already follows {}", user.username, author.username),
        }
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}

/// Drop a subscription if there is one
/// POST /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
    Path(username): Path<String>,
    Form(form): Form<CsrfForm>,
) -> AppResult<Response> {
    form.validate(&session).await?;
    let author = state.store.get_user_by_username(&username).await?;

    if state.store.delete_follow(user.id, author.id).await? {
        info!("User {} unfollowed {}", user.username, author.username);
    } else {
        debug!("User {} did not follow {}", user.username, author.username);
    }

    Ok(Redirect::to(&profile_url(&author.username)).into_response())
}
