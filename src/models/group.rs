use std::fmt;

use serde::{Deserialize, Serialize};

/// Named category of posts. Groups are managed by operators, not by site users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Group definition as it appears in the seed file
#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl NewGroup {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Group title cannot be empty".to_string());
        }

        if self.title.chars().count() > 200 {
            return Err("Group title cannot exceed 200 characters".to_string());
        }

        if self.slug.is_empty() {
            return Err("Group slug cannot be empty".to_string());
        }

        if self.slug.chars().count() > 50 {
            return Err("Group slug cannot exceed 50 characters".to_string());
        }

        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Group slug may contain only letters, numbers, hyphens and underscores".to_string());
        }

        Ok(())
    }
}
