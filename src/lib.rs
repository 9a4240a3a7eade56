// Library root for the Yatube blogging site

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod csrf;
pub mod db;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod media;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod store;
pub mod templates;

// Re-export commonly used types
pub use app::{create_router, AppState};
pub use db::Database;
pub use error::{AppError, AppResult};
pub use memory::InMemoryStore;
pub use models::{Comment, Follow, Group, Post, User};
pub use store::{PostScope, SharedStore, Store};
