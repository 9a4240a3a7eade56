//! Process-local `Store` used for local development and tests.
//!
//! It enforces the same constraints as the PostgreSQL schema: unique
//! usernames and slugs, foreign keys, `one_following` and `user_not_author`.

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{
    Comment, Follow, Group, GroupRef, NewComment, NewGroup, NewPost, NewUser, Post, PostChanges,
    User,
};
use crate::store::{PostScope, Store};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<PostRow>,
    comments: Vec<CommentRow>,
    follows: Vec<FollowRow>,
    last_id: i64,
}

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    text: String,
    image: Option<String>,
    pub_date: DateTime<Utc>,
    author_id: i64,
    group_id: Option<i64>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct FollowRow {
    id: i64,
    user_id: i64,
    author_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    fn username(&self, id: i64) -> String {
        self.user(id)
            .map(|user| user.username.clone())
            .unwrap_or_default()
    }

    fn group(&self, id: i64) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    fn check_post_refs(&self, author_id: i64, group_id: Option<i64>) -> AppResult<()> {
        if self.user(author_id).is_none() {
            return Err(AppError::validation("Referenced resource does not exist"));
        }
        if let Some(group_id) = group_id {
            if self.group(group_id).is_none() {
                return Err(AppError::validation("Referenced resource does not exist"));
            }
        }
        Ok(())
    }

    fn post(&self, row: &PostRow) -> Post {
        Post {
            id: row.id,
            text: row.text.clone(),
            image: row.image.clone(),
            pub_date: row.pub_date,
            author_id: row.author_id,
            author: self.username(row.author_id),
            group: row.group_id.and_then(|id| self.group(id)).map(|group| GroupRef {
                id: group.id,
                title: group.title.clone(),
                slug: group.slug.clone(),
            }),
        }
    }

    fn in_scope(&self, row: &PostRow, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group_id) => row.group_id == Some(group_id),
            PostScope::Author(author_id) => row.author_id == author_id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|follow| follow.user_id == user_id && follow.author_id == row.author_id),
        }
    }

    /// Rows in scope, newest first with the id as tie-breaker
    fn scoped_posts(&self, scope: PostScope) -> Vec<&PostRow> {
        let mut rows: Vec<&PostRow> = self
            .posts
            .iter()
            .filter(|row| self.in_scope(row, scope))
            .collect();
        rows.sort_by_key(|row| Reverse((row.pub_date, row.id)));
        rows
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        user.validate().map_err(AppError::Validation)?;

        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::conflict("A user with that username already exists."));
        }

        let created = User {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            date_joined: Utc::now(),
        };
        tables.users.push(created.clone());

        info!("Created user with id: {}", created.id);
        Ok(created)
    }

    async fn get_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.user(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_group(&self, group: NewGroup) -> AppResult<Group> {
        group.validate().map_err(AppError::Validation)?;

        let mut tables = self.tables.write().await;
        if tables.groups.iter().any(|g| g.slug == group.slug) {
            return Err(AppError::conflict("A group with that slug already exists."));
        }

        let created = Group {
            id: tables.next_id(),
            title: group.title.trim().to_string(),
            slug: group.slug,
            description: group.description,
        };
        tables.groups.push(created.clone());

        Ok(created)
    }

    async fn get_group_by_slug(&self, slug: &str) -> AppResult<Group> {
        let tables = self.tables.read().await;
        tables
            .groups
            .iter()
            .find(|g| g.slug == slug)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Group {}", slug)))
    }

    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        let mut groups = self.tables.read().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_post(&self, post: NewPost) -> AppResult<Post> {
        let mut tables = self.tables.write().await;
        tables.check_post_refs(post.author_id, post.group_id)?;

        let row = PostRow {
            id: tables.next_id(),
            text: post.text,
            image: post.image,
            pub_date: Utc::now(),
            author_id: post.author_id,
            group_id: post.group_id,
        };
        tables.posts.push(row.clone());

        info!("Created post with id: {}", row.id);
        Ok(tables.post(&row))
    }

    async fn get_post(&self, id: i64) -> AppResult<Post> {
        let tables = self.tables.read().await;
        tables
            .posts
            .iter()
            .find(|row| row.id == id)
            .map(|row| tables.post(row))
            .ok_or_else(|| AppError::not_found(format!("Post with id {}", id)))
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> AppResult<Post> {
        let mut tables = self.tables.write().await;
        if let Some(group_id) = changes.group_id {
            if tables.group(group_id).is_none() {
                return Err(AppError::validation("Referenced resource does not exist"));
            }
        }

        let row = tables
            .posts
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| AppError::not_found(format!("Post with id {}", id)))?;

        row.text = changes.text;
        row.group_id = changes.group_id;
        if let Some(image) = changes.image {
            row.image = Some(image);
        }
        let row = row.clone();

        info!("Updated post with id: {}", id);
        Ok(tables.post(&row))
    }

    async fn count_posts(&self, scope: PostScope) -> AppResult<u64> {
        Ok(self.tables.read().await.scoped_posts(scope).len() as u64)
    }

    async fn list_posts(&self, scope: PostScope, limit: u64, offset: u64) -> AppResult<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .scoped_posts(scope)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|row| tables.post(row))
            .collect())
    }

    async fn create_comment(&self, comment: NewComment) -> AppResult<Comment> {
        let mut tables = self.tables.write().await;
        if tables.user(comment.author_id).is_none()
            || !tables.posts.iter().any(|row| row.id == comment.post_id)
        {
            return Err(AppError::validation("Referenced resource does not exist"));
        }

        let row = CommentRow {
            id: tables.next_id(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created: Utc::now(),
        };
        tables.comments.push(row.clone());

        Ok(Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author: tables.username(row.author_id),
            text: row.text,
            created: row.created,
        })
    }

    async fn list_comments(&self, post_id: i64) -> AppResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&CommentRow> = tables
            .comments
            .iter()
            .filter(|row| row.post_id == post_id)
            .collect();
        rows.sort_by_key(|row| Reverse((row.created, row.id)));

        Ok(rows
            .into_iter()
            .map(|row| Comment {
                id: row.id,
                post_id: row.post_id,
                author_id: row.author_id,
                author: tables.username(row.author_id),
                text: row.text.clone(),
                created: row.created,
            })
            .collect())
    }

    async fn create_follow(&self, user: &User, author: &User) -> AppResult<Option<Follow>> {
        if user.id == author.id {
            return Err(AppError::validation("Users cannot follow themselves"));
        }

        let mut tables = self.tables.write().await;
        if tables.user(user.id).is_none() || tables.user(author.id).is_none() {
            return Err(AppError::validation("Referenced resource does not exist"));
        }
        if tables
            .follows
            .iter()
            .any(|f| f.user_id == user.id && f.author_id == author.id)
        {
            return Ok(None);
        }

        let row = FollowRow {
            id: tables.next_id(),
            user_id: user.id,
            author_id: author.id,
        };
        tables.follows.push(row.clone());

        Ok(Some(Follow {
            id: row.id,
            user_id: user.id,
            user: user.username.clone(),
            author_id: author.id,
            author: author.username.clone(),
        }))
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(tables.follows.len() < before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }
}
