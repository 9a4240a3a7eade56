// Post handlers
// Listing, detail, authoring and commenting pages for posts

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::{
    app::AppState,
    auth::{LoginRequired, Viewer},
    cache::{PageCache, INDEX_PAGE_PREFIX},
    csrf::{csrf_token, CsrfProtectedForm},
    error::{AppError, AppResult},
    forms::{CommentForm, FieldErrors, PostForm},
    handlers::{html, load_post_page, profile::profile_url, render},
    media::save_post_image,
    models::{Group, NewComment, NewPost, Post, PostChanges},
    pagination::PageQuery,
    store::PostScope,
    templates::{GroupListTemplate, GroupOption, IndexTemplate, Nav, PostDetailTemplate, PostFormTemplate},
};

const ANONYMOUS_VIEWER: &str = "anonymous";

/// Path segments that are not a valid id point at nothing
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found(format!("Post {}", raw)))
}

pub(crate) fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

fn edit_url(post_id: i64) -> String {
    format!("/posts/{}/edit/", post_id)
}

/// Home page with every post, newest first
/// GET /
///
/// The rendered page is cached per viewer for `INDEX_CACHE_SECONDS`,
/// regardless of the query string.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let key = PageCache::key(INDEX_PAGE_PREFIX, viewer.username().unwrap_or(ANONYMOUS_VIEWER));
    if let Some(body) = state.page_cache.get(&key).await {
        return Ok(Html(body).into_response());
    }

    let page = load_post_page(&state, PostScope::All, query.page.as_deref()).await?;
    let body = render(&IndexTemplate {
        nav: Nav::from(&viewer),
        page,
    })?;

    state.page_cache.insert(key, body.clone()).await;
    Ok(Html(body).into_response())
}

/// Posts of one group
/// GET /group/:slug/
pub async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let group = state.store.get_group_by_slug(&slug).await?;
    let page = load_post_page(&state, PostScope::Group(group.id), query.page.as_deref()).await?;

    html(&GroupListTemplate {
        nav: Nav::from(&viewer),
        group,
        page,
    })
}

/// A single post with its comments
/// GET /posts/:post_id/
pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    session: Session,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post = state.store.get_post(parse_post_id(&post_id)?).await?;
    let author_post_count = state.store.count_posts(PostScope::Author(post.author_id)).await?;
    let comments = state.store.list_comments(post.id).await?;

    let can_comment = viewer.user().is_some();
    let csrf_token = if can_comment {
        csrf_token(&session).await?
    } else {
        String::new()
    };

    html(&PostDetailTemplate {
        nav: Nav::from(&viewer),
        can_edit: viewer.id() == Some(post.author_id),
        can_comment,
        post,
        author_post_count,
        comments,
        csrf_token,
    })
}

/// Empty post form
/// GET /create/
pub async fn post_create_page(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
) -> AppResult<Response> {
    let groups = state.store.list_groups().await?;
    html(&form_page(&user.username, None, String::new(), &groups, None, FieldErrors::default()))
}

/// Publish a new post as the session user
/// POST /create/
pub async fn post_create(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    multipart: Option<Multipart>,
) -> AppResult<Response> {
    let form = PostForm::from_multipart(multipart).await?;
    let groups = state.store.list_groups().await?;

    let selected = form.selected_group();
    let text = form.text.clone();
    let clean = match form.clean(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            debug!("Rejected post form from {}: {:?}", user.username, errors);
            return html(&form_page(&user.username, None, text, &groups, selected, errors));
        }
    };

    let image = match clean.image {
        Some(image) => Some(save_post_image(&state.site.media_root, &image).await?),
        None => None,
    };

    let post = state
        .store
        .create_post(NewPost {
            author_id: user.id,
            text: clean.text,
            group_id: clean.group_id,
            image,
        })
        .await?;

    info!("User {} published post {} ({})", user.username, post.id, post);
    Ok(Redirect::to(&profile_url(&user.username)).into_response())
}

/// Post form pre-filled for editing; only the author may see it
/// GET /posts/:post_id/edit/
pub async fn post_edit_page(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post = state.store.get_post(parse_post_id(&post_id)?).await?;
    if post.author_id != user.id {
        debug!("User {} may not edit post {}", user.username, post.id);
        return Ok(Redirect::to(&post_url(post.id)).into_response());
    }

    let groups = state.store.list_groups().await?;
    let selected = post.group_id();
    let text = post.text.clone();
    html(&form_page(&user.username, Some(&post), text, &groups, selected, FieldErrors::default()))
}

/// Save changes to a post; non-authors are sent back to the post unchanged
/// POST /posts/:post_id/edit/
pub async fn post_edit(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    Path(post_id): Path<String>,
    multipart: Option<Multipart>,
) -> AppResult<Response> {
    let post = state.store.get_post(parse_post_id(&post_id)?).await?;
    if post.author_id != user.id {
        warn!("User {} tried to edit post {} by {}", user.username, post.id, post.author);
        return Ok(Redirect::to(&post_url(post.id)).into_response());
    }

    let form = PostForm::from_multipart(multipart).await?;
    let groups = state.store.list_groups().await?;

    let selected = form.selected_group();
    let text = form.text.clone();
    let clean = match form.clean(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            return html(&form_page(&user.username, Some(&post), text, &groups, selected, errors));
        }
    };

    let image = match clean.image {
        Some(image) => Some(save_post_image(&state.site.media_root, &image).await?),
        None => None,
    };

    let updated = state
        .store
        .update_post(
            post.id,
            PostChanges {
                text: clean.text,
                group_id: clean.group_id,
                image,
            },
        )
        .await?;

    info!("User {} edited post {}", user.username, updated.id);
    Ok(Redirect::to(&post_url(updated.id)).into_response())
}

/// Attach a comment by the session user; empty comments are dropped
/// POST /posts/:post_id/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
    Path(post_id): Path<String>,
    Form(form): Form<CsrfProtectedForm<CommentForm>>,
) -> AppResult<Response> {
    let form = form.validate(&session).await?;
    let post = state.store.get_post(parse_post_id(&post_id)?).await?;

    match form.clean() {
        Ok(text) => {
            let comment = state
                .store
                .create_comment(NewComment {
                    post_id: post.id,
                    author_id: user.id,
                    text,
                })
                .await?;
            info!("User {} commented on post {} ({})", user.username, post.id, comment);
        }
        Err(errors) => {
            debug!("Dropped invalid comment on post {}: {:?}", post.id, errors);
        }
    }

    Ok(Redirect::to(&post_url(post.id)).into_response())
}

fn form_page(
    username: &str,
    editing: Option<&Post>,
    text: String,
    groups: &[Group],
    selected: Option<i64>,
    errors: FieldErrors,
) -> PostFormTemplate {
    PostFormTemplate {
        nav: Nav {
            username: Some(username.to_string()),
        },
        is_edit: editing.is_some(),
        action: editing.map_or_else(|| "/create/".to_string(), |post| edit_url(post.id)),
        text,
        groups: GroupOption::list(groups, selected),
        current_image: editing.and_then(Post::image_url),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_id() {
        assert_eq!(parse_post_id("42").unwrap(), 42);
        assert!(parse_post_id("abc").unwrap_err().is_not_found());
        assert!(parse_post_id("").unwrap_err().is_not_found());
    }

    #[test]
    fn test_post_urls() {
        assert_eq!(post_url(7), "/posts/7/");
        assert_eq!(edit_url(7), "/posts/7/edit/");
    }
}
