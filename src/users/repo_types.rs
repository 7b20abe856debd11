use sqlx::FromRow;
use time::OffsetDateTime;

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub age: i32,
    pub street: String,
    pub neighborhood: String,
    pub state: String,
    pub biography: Option<String>,
    pub profile_photo_path: Option<String>,
    pub password_hash: String, // argon2 PHC string, never serialised
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Values for a fresh insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub age: i32,
    pub street: String,
    pub neighborhood: String,
    pub state: String,
    pub biography: Option<String>,
    pub profile_photo_path: Option<String>,
    pub password_hash: String,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub state: Option<String>,
    pub biography: Option<String>,
    pub profile_photo_path: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == UserPatch::default()
    }
}

/// Photo paths before and after an update committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedPhoto {
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// What is left of a deleted row that still needs cleaning up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedUser {
    pub profile_photo_path: Option<String>,
}
