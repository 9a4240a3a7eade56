// Models module

pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;

// Re-export commonly used types
pub use comment::{Comment, NewComment};
pub use follow::Follow;
pub use group::{Group, NewGroup};
pub use post::{GroupRef, NewPost, Post, PostChanges};
pub use user::{NewUser, User};
