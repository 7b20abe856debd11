use serde::Serialize;
use time::OffsetDateTime;

use super::repo_types::User;

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub full_name: String,
    pub age: i32,
    pub street: String,
    pub neighborhood: String,
    pub state: String,
    pub biography: Option<String>,
    pub profile_photo_path: Option<String>,
    pub photo_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserResponse {
    /// `photo_url` is the resolved URL for `user.profile_photo_path`, or `None` if the file is gone.
    pub fn new(user: User, photo_url: Option<String>) -> Self {
        let profile_photo_path = photo_url.as_ref().and(user.profile_photo_path);
        Self {
            id: user.id,
            full_name: user.full_name,
            age: user.age,
            street: user.street,
            neighborhood: user.neighborhood,
            state: user.state,
            biography: user.biography,
            profile_photo_path,
            photo_url,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedResponse {
    pub message: &'static str,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
