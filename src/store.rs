//! Data access seam shared by the PostgreSQL and in-memory backends.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostChanges, User,
};

pub type SharedStore = Arc<dyn Store>;

/// Which posts a listing covers. Every scope is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows
    FollowedBy(i64),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> AppResult<()>;

    async fn create_user(&self, user: NewUser) -> AppResult<User>;

    async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        self.find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {}", username)))
    }

    async fn create_group(&self, group: NewGroup) -> AppResult<Group>;

    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Group>;

    /// All groups ordered by title
    async fn list_groups(&self) -> AppResult<Vec<Group>>;

    async fn create_post(&self, post: NewPost) -> AppResult<Post>;

    async fn get_post(&self, id: i64) -> AppResult<Post>;

    async fn update_post(&self, id: i64, changes: PostChanges) -> AppResult<Post>;

    async fn count_posts(&self, scope: PostScope) -> AppResult<u64>;

    async fn list_posts(&self, scope: PostScope, limit: u64, offset: u64) -> AppResult<Vec<Post>>;

    async fn create_comment(&self, comment: NewComment) -> AppResult<Comment>;

    /// Comments on a post, newest first
    async fn list_comments(&self, post_id: i64) -> AppResult<Vec<Comment>>;

    /// Returns `None` when the edge already existed.
    /// Self-follows are rejected with `AppError::Validation`.
    async fn create_follow(&self, user: &User, author: &User) -> AppResult<Option<Follow>>;

    /// Returns whether an edge was removed
    async fn delete_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool>;

    async fn is_following(&self, user_id: i64, author_id: i64) -> AppResult<bool>;
}

/// Inserts every group whose slug is not taken yet. Returns how many were created.
pub async fn seed_groups(store: &dyn Store, groups: Vec<NewGroup>) -> AppResult<usize> {
    let mut created = 0;

    for group in groups {
        match store.get_group_by_slug(&group.slug).await {
            Ok(existing) => {
                info!("Group '{}' already exists, skipping seed", existing.slug);
            }
            Err(err) if err.is_not_found() => {
                let group = store.create_group(group).await?;
                info!("Seeded group: {} ({})", group.title, group.slug);
                created += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(created)
}

/// Reads a JSON array of groups from disk
pub async fn load_seed_file(path: &std::path::Path) -> anyhow::Result<Vec<NewGroup>> {
    use anyhow::Context;

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("seed file {} is not a JSON array of groups", path.display()))
}
