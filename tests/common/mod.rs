// Shared harness for the HTTP-level tests: a router over an in-memory store
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::{
    auth::hash_password,
    config::SiteConfig,
    models::{Group, NewGroup, NewPost, NewUser, Post, User},
    AppState, InMemoryStore, SharedStore,
};

pub const PASSWORD: &str = "very-secret-1";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub media_root: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        let media_root = std::env::temp_dir().join(format!("yatube-test-{}", Uuid::new_v4()));
        let site = SiteConfig {
            num_of_posts: 10,
            index_cache_ttl: Duration::from_secs(20),
            media_root: media_root.clone(),
            secure_cookies: false,
            request_timeout: Duration::from_secs(30),
        };

        let store: SharedStore = Arc::new(InMemoryStore::new());
        let state = AppState::new(store, site);
        let router = yatube::create_router(state.clone());

        TestApp {
            router,
            state,
            media_root,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.state.store
    }

    pub async fn create_user(&self, username: &str) -> User {
        self.store()
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(PASSWORD).expect("hash"),
            })
            .await
            .expect("user created")
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        self.store()
            .create_group(NewGroup {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("Описание группы {}", title),
            })
            .await
            .expect("group created")
    }

    pub async fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store()
            .create_post(NewPost {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|g| g.id),
                image: None,
            })
            .await
            .expect("post created")
    }

    /// Logs in through the login form and returns the session cookie
    pub async fn login(&self, username: &str) -> String {
        let body = format!("username={}&password={}", username, PASSWORD);
        let response = self.post_form("/auth/login/", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login for {} failed", username);
        session_cookie(&response).expect("login sets the session cookie")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).expect("request"))
            .await
    }

    /// Reads the session's CSRF token off the login form. Without a cookie the
    /// login page starts an anonymous session, whose cookie comes back too.
    pub async fn csrf(&self, cookie: Option<&str>) -> (String, String) {
        let response = self.get("/auth/login/", cookie).await;
        let cookie = match cookie {
            Some(cookie) => cookie.to_string(),
            None => session_cookie(&response).expect("login page starts a session"),
        };
        let token = csrf_field(&body_string(response).await).expect("login form has a csrf field");
        (cookie, token)
    }

    /// Submits a form the way a browser would, with the session's CSRF token
    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let (cookie, token) = self.csrf(cookie).await;
        let body = if body.is_empty() {
            format!("csrf_token={}", token)
        } else {
            format!("{}&csrf_token={}", body, token)
        };
        self.post_form_without_csrf(uri, &body, Some(&cookie)).await
    }

    pub async fn post_form_without_csrf(
        &self,
        uri: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: MultipartForm,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let (content_type, body) = form.finish();
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body)).expect("request"))
            .await
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.media_root).ok();
    }
}

/// `multipart/form-data` body builder
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        MultipartForm {
            boundary: format!("yatube-boundary-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("yatube="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Value of the hidden `csrf_token` input on a rendered page
pub fn csrf_field(html: &str) -> Option<String> {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

/// Number of post cards on a rendered page
pub fn post_cards(html: &str) -> usize {
    html.matches("<article class=\"post\">").count()
}

/// A 2x2 PNG that decodes cleanly
pub fn tiny_png() -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .expect("png encodes");
    bytes.into_inner()
}
