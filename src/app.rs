use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{info, warn};

use crate::cache::PageCache;
use crate::config::SiteConfig;
use crate::handlers::{about, auth, health_check, not_found, posts, profile};
use crate::middleware::apply_middleware_stack;
use crate::store::SharedStore;

/// Request bodies above this size are rejected before reaching a handler
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const SESSION_COOKIE_NAME: &str = "yatube";

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub page_cache: Arc<PageCache>,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    pub fn new(store: SharedStore, site: SiteConfig) -> Self {
        AppState {
            store,
            page_cache: Arc::new(PageCache::new(site.index_cache_ttl)),
            site: Arc::new(site),
        }
    }
}

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: AppState) -> Router {
    if state.site.secure_cookies {
        info!("Secure cookies enabled - cookies will only be sent over HTTPS");
    } else {
        warn!("Secure cookies disabled - set SESSION_SECURE_COOKIES=true for production");
    }

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.site.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_name(SESSION_COOKIE_NAME)
        .with_http_only(true);

    let media = ServeDir::new(&state.site.media_root);
    let request_timeout = state.site.request_timeout;

    let router = Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Listings
        .route("/", get(posts::index))
        .route("/group/:slug/", get(posts::group_posts))
        .route("/profile/:username/", get(profile::profile))
        .route("/follow/", get(profile::follow_index))
        // Posts
        .route("/posts/:post_id/", get(posts::post_detail))
        .route("/create/", get(posts::post_create_page).post(posts::post_create))
        .route(
            "/posts/:post_id/edit/",
            get(posts::post_edit_page).post(posts::post_edit),
        )
        .route("/posts/:post_id/comment/", post(posts::add_comment))
        // Subscriptions
        .route("/profile/:username/follow/", post(profile::profile_follow))
        .route("/profile/:username/unfollow/", post(profile::profile_unfollow))
        // Accounts
        .route("/auth/signup/", get(auth::signup_page).post(auth::signup))
        .route("/auth/login/", get(auth::login_page).post(auth::login))
        .route("/auth/logout/", get(auth::logout).post(auth::logout_submit))
        // Static pages
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
        .nest_service("/media", media)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(session_layer);

    apply_middleware_stack(router, request_timeout)
}
