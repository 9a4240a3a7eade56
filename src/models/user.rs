use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a username, matching the `users.username` column.
pub const USERNAME_MAX_LEN: usize = 150;

/// 登録済みユーザーを表すドメインモデル。
/// パスワードハッシュは `#[serde(skip_serializing)]` でシリアライズ対象から外している。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

/// INSERT 前のユーザー。ID と登録日時は保存時にストア側で埋める。
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

impl User {
    /// 姓名をスペースで連結する。どちらも空なら空文字列になる。
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// 画面表示用の名前。フルネームが無ければユーザー名にフォールバックする。
    pub fn display_name(&self) -> String {
        let full_name = self.full_name();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

impl NewUser {
    /// ユーザー名の書式チェック。フォーム層のフィールドエラーと同じ文言を返す。
    pub fn validate(&self) -> Result<(), String> {
        validate_username(&self.username)?;

        if !self.email.is_empty() && !is_valid_email(&self.email) {
            return Err("Enter a valid email address.".to_string());
        }

        if self.password_hash.is_empty() {
            return Err("Password hash cannot be empty".to_string());
        }

        Ok(())
    }
}

/// ユーザー名は 1〜150 文字で、英数字と `@.+-_` のみ許可する。
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("This field is required.".to_string());
    }

    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "Ensure this value has at most {} characters.",
            USERNAME_MAX_LEN
        ));
    }

    let valid_chars = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if !username.chars().all(valid_chars) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }

    Ok(())
}

/// シンプルなメールフォーマット検証。
/// 正規表現を使わず、`split('@')` などで最小限のルールをチェックしている。
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();

    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || local.len() > 64 {
        return false;
    }

    if domain.is_empty() || domain.len() > 253 || !domain.contains('.') {
        return false;
    }

    let valid_chars = |c: char| c.is_alphanumeric() || ".-_+".contains(c);

    local.chars().all(valid_chars)
        && domain.chars().all(|c| c.is_alphanumeric() || ".-".contains(c))
}
