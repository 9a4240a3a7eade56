use std::fmt;

use serde::{Deserialize, Serialize};

/// Directed subscription edge: `user` follows `author`.
/// Pairs are unique and a user can never follow themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub user: String,
    pub author_id: i64,
    pub author: String,
}

impl fmt::Display for Follow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "follower: {} author: {}", self.user, self.author)
    }
}
