//! Askama templates for the Yatube pages

use askama::Template;

use crate::auth::Viewer;
use crate::forms::FieldErrors;
use crate::models::{Comment, Group, Post, User};
use crate::pagination::Page;

/// Navigation bar state shared by every page
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub username: Option<String>,
}

impl From<&Viewer> for Nav {
    fn from(viewer: &Viewer) -> Self {
        Nav {
            username: viewer.username().map(str::to_string),
        }
    }
}

/// A `<select>` option for the group field
#[derive(Debug, Clone)]
pub struct GroupOption {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

impl GroupOption {
    pub fn list(groups: &[Group], selected: Option<i64>) -> Vec<GroupOption> {
        groups
            .iter()
            .map(|group| GroupOption {
                id: group.id,
                title: group.title.clone(),
                selected: selected == Some(group.id),
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub nav: Nav,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub nav: Nav,
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub nav: Nav,
    pub author: User,
    pub page: Page<Post>,
    /// Follow buttons only make sense for a logged-in viewer looking at someone else
    pub can_follow: bool,
    pub following: bool,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowIndexTemplate {
    pub nav: Nav,
    pub page: Page<Post>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub nav: Nav,
    pub post: Post,
    pub author_post_count: u64,
    pub comments: Vec<Comment>,
    pub can_edit: bool,
    pub can_comment: bool,
    /// Empty unless the comment form is shown
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub nav: Nav,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub current_image: Option<String>,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub nav: Nav,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub errors: FieldErrors,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: String,
    pub errors: FieldErrors,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub nav: Nav,
}

#[derive(Template)]
#[template(path = "core/error.html")]
pub struct ErrorTemplate {
    pub nav: Nav,
    pub status: u16,
    pub reason: String,
    pub message: String,
}
