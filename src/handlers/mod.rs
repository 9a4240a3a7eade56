// Handlers module
// HTML page handlers for the blogging site

pub mod about;
pub mod auth;
pub mod posts;
pub mod profile;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::debug;

use crate::{
    app::AppState,
    auth::Viewer,
    error::{AppError, AppResult},
    models::Post,
    pagination::{Page, Paginator},
    store::PostScope,
};

/// Health check handler
/// Returns "OK" with 200 status once the store answers
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await?;
    Ok((StatusCode::OK, "OK"))
}

/// Fallback for unknown routes
pub async fn not_found(viewer: Viewer) -> Response {
    debug!("No route matched for {:?}", viewer.username());
    AppError::not_found("Page").into_response()
}

/// テンプレートを HTML 文字列に描画する
pub(crate) fn render<T: Template>(template: &T) -> AppResult<String> {
    Ok(template.render()?)
}

pub(crate) fn html<T: Template>(template: &T) -> AppResult<Response> {
    render(template).map(|body| Html(body).into_response())
}

/// Counts the scope, clamps the requested page and loads just that slice
pub(crate) async fn load_post_page(
    state: &AppState,
    scope: PostScope,
    requested: Option<&str>,
) -> AppResult<Page<Post>> {
    let paginator = Paginator::new(state.site.num_of_posts);
    let count = state.store.count_posts(scope).await?;
    let window = paginator.window(count, requested);

    let items = if window.limit == 0 {
        Vec::new()
    } else {
        state
            .store
            .list_posts(scope, window.limit, window.offset)
            .await?
    };

    debug!(
        "Loaded page {}/{} of {:?} ({} of {} posts)",
        window.number,
        window.num_pages,
        scope,
        items.len(),
        count
    );
    Ok(Page::new(items, window))
}
