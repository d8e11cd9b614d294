//! Users, blogs and comments.

use awesome_core::Principal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Placeholder returned instead of a stored credential
pub const MASKED_PASSWORD: &str = "******";

/// Avatar used for new accounts
pub const DEFAULT_IMAGE: &str = "/static/img/user.png";

/// A persisted record
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Primary key column
    const PRIMARY_KEY: &'static str = "id";
    /// Every other column, in insert order
    const FIELDS: &'static [&'static str];

    /// Primary key value
    fn primary_key(&self) -> &str;
}

/// Registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Primary key
    pub id: String,
    /// Login email, unique
    pub email: String,
    /// Stored credential: `sha1("{id}:{client_hash}")`
    pub passwd: String,
    /// Administrator flag
    #[serde(deserialize_with = "flag")]
    pub admin: bool,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub image: String,
    /// Unix timestamp
    pub created_at: f64,
}

impl User {
    /// Copy safe to send to clients
    #[must_use]
    pub fn masked(&self) -> Self {
        Self {
            passwd: MASKED_PASSWORD.to_string(),
            ..self.clone()
        }
    }

    /// Identity attached to requests of this user
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
            admin: self.admin,
        }
    }
}

impl Model for User {
    const TABLE: &'static str = "users";
    const FIELDS: &'static [&'static str] = &["email", "passwd", "admin", "name", "image", "created_at"];

    fn primary_key(&self) -> &str {
        &self.id
    }
}

/// Blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    /// Primary key
    pub id: String,
    /// Author id
    pub user_id: String,
    /// Author name at time of writing
    pub user_name: String,
    /// Author avatar at time of writing
    pub user_image: String,
    /// Title
    pub name: String,
    /// Short summary
    pub summary: String,
    /// Body text
    pub content: String,
    /// Unix timestamp
    pub created_at: f64,
}

impl Model for Blog {
    const TABLE: &'static str = "blogs";
    const FIELDS: &'static [&'static str] = &[
        "user_id",
        "user_name",
        "user_image",
        "name",
        "summary",
        "content",
        "created_at",
    ];

    fn primary_key(&self) -> &str {
        &self.id
    }
}

/// Comment on a blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Primary key
    pub id: String,
    /// Commented blog
    pub blog_id: String,
    /// Author id
    pub user_id: String,
    /// Author name at time of writing
    pub user_name: String,
    /// Author avatar at time of writing
    pub user_image: String,
    /// Body text
    pub content: String,
    /// Unix timestamp
    pub created_at: f64,
}

impl Model for Comment {
    const TABLE: &'static str = "comments";
    const FIELDS: &'static [&'static str] =
        &["blog_id", "user_id", "user_name", "user_image", "content", "created_at"];

    fn primary_key(&self) -> &str {
        &self.id
    }
}

/// Time-ordered 50-character id
///
/// 15-digit millisecond timestamp, 32 hex digits of a v4 uuid, then `000`.
#[must_use]
pub fn next_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis:015}{}000", uuid::Uuid::new_v4().simple())
}

/// Current time as fractional unix seconds
#[must_use]
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// SQLite stores booleans as integers
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
