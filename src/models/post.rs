use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of characters a post or comment shows when displayed as a label
pub const LABEL_CHARS: usize = 15;

/// Post entity joined with its author's username and its group, ready to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub author: String,
    pub group: Option<GroupRef>,
}

/// The parts of a group a post listing needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// A validated post ready to be inserted
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Fields an author may change. `image` is only replaced when a new file was uploaded.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

impl Post {
    /// Public URL of the attached image, if any
    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|path| format!("/media/{}", path))
    }

    pub fn pub_date_display(&self) -> String {
        self.pub_date.format("%d %b %Y %H:%M").to_string()
    }

    pub fn group_id(&self) -> Option<i64> {
        self.group.as_ref().map(|group| group.id)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate_label(&self.text))
    }
}

/// First `LABEL_CHARS` characters of `text`, counted in chars rather than bytes
pub fn truncate_label(text: &str) -> String {
    text.chars().take(LABEL_CHARS).collect()
}
