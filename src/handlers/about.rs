// Static pages

use axum::response::Response;

use crate::{
    auth::Viewer,
    error::AppResult,
    handlers::html,
    templates::{AboutAuthorTemplate, AboutTechTemplate, Nav},
};

/// GET /about/author/
pub async fn author(viewer: Viewer) -> AppResult<Response> {
    html(&AboutAuthorTemplate {
        nav: Nav::from(&viewer),
    })
}

/// GET /about/tech/
pub async fn tech(viewer: Viewer) -> AppResult<Response> {
    html(&AboutTechTemplate {
        nav: Nav::from(&viewer),
    })
}
