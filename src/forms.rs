//! User input binding and validation.
//!
//! Each form cleans its raw input into a typed value or returns `FieldErrors`,
//! which the handlers render next to the offending fields.

use std::collections::BTreeMap;

use axum::extract::Multipart;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::user::{is_valid_email, validate_username};
use crate::models::Group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const PASSWORD_MIN_LEN: usize = 8;

/// Errors keyed by field name. Errors not tied to a field go under `NON_FIELD`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.field(field).is_empty()
    }

    pub fn non_field(&self) -> &[String] {
        self.field(Self::NON_FIELD)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Image formats accepted for post uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Sniffs the format, then decodes the whole image. Truncated or corrupted
    /// files fail here even when their header looks right.
    pub fn verify(bytes: &[u8]) -> Result<Self, String> {
        let guessed = image::guess_format(bytes).map_err(|e| e.to_string())?;
        let format = Self::from_guessed(guessed)
            .ok_or_else(|| format!("unsupported image format {:?}", guessed))?;

        image::load_from_memory_with_format(bytes, guessed).map_err(|e| e.to_string())?;
        Ok(format)
    }

    fn from_guessed(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Raw post form as submitted (`multipart/form-data`)
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<Upload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ValidImage>,
}

impl PostForm {
    /// Reads the known fields of a multipart body. A request that is not
    /// multipart at all yields an empty form, which then fails validation.
    pub async fn from_multipart(multipart: Option<Multipart>) -> AppResult<Self> {
        let mut form = PostForm::default();
        let Some(mut multipart) = multipart else {
            return Ok(form);
        };

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            warn!("Failed to read multipart field: {}", e);
            AppError::validation("Malformed form data")
        })? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "text" => {
                    form.text = field.text().await.map_err(|e| {
                        warn!("Failed to read post text: {}", e);
                        AppError::validation("Malformed form data")
                    })?;
                }
                "group" => {
                    form.group = field.text().await.map_err(|e| {
                        warn!("Failed to read post group: {}", e);
                        AppError::validation("Malformed form data")
                    })?;
                }
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| {
                        warn!("Failed to read uploaded image: {}", e);
                        AppError::validation("Malformed form data")
                    })?;
                    // Browsers send an empty part when no file was chosen
                    if !bytes.is_empty() {
                        form.image = Some(Upload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                _ => continue,
            }
        }

        Ok(form)
    }

    /// Selected group id when the raw value parses, for re-rendering the form
    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }

    pub fn clean(self, groups: &[Group]) -> Result<CleanPost, FieldErrors> {
        let mut errors = FieldErrors::default();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group = self.group.trim();
        let group_id = if group.is_empty() {
            None
        } else {
            match group.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            }
        };

        let image = match self.image {
            None => None,
            Some(upload) => match ImageFormat::verify(&upload.bytes) {
                Ok(format) => Some(ValidImage {
                    format,
                    bytes: upload.bytes,
                }),
                Err(reason) => {
                    warn!(
                        "Rejected upload {:?} ({:?}): {}",
                        upload.file_name, upload.content_type, reason
                    );
                    errors.add("image", INVALID_IMAGE);
                    None
                }
            },
        };

        errors.into_result(CleanPost {
            text,
            group_id,
            image,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn clean(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanSignup {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    /// Format checks only; whether the username is free is up to the store.
    pub fn clean(&self) -> Result<CleanSignup, FieldErrors> {
        let mut errors = FieldErrors::default();

        let username = self.username.trim().to_string();
        if let Err(message) = validate_username(&username) {
            errors.add("username", message);
        }

        let email = self.email.trim().to_lowercase();
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < PASSWORD_MIN_LEN {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    PASSWORD_MIN_LEN
                ),
            );
        }

        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result(CleanSignup {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username,
            email,
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(())
    }
}
