use std::path::Path;

use async_trait::async_trait;
use axum::{
    extract::{multipart::Field, FromRequest, Multipart, Request},
    http::header,
    Json,
};
use bytes::{Bytes, BytesMut};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::UserPatch;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field carrying the profile photo.
pub const PHOTO_FIELD: &str = "foto_perfil_file";

lazy_static! {
    static ref IMAGE_MIME_RE: Regex = Regex::new(r"^image/(jpeg|jpg|png|gif)$").unwrap();
    static ref IMAGE_EXT_RE: Regex = Regex::new(r"^(jpeg|jpg|png|gif)$").unwrap();
}

/// A validated image held in memory until it is written to storage.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub body: Bytes,
    pub extension: String,
}

impl PhotoUpload {
    /// Unique storage name, e.g. `foto_perfil_file-1700000000000-<uuid>.png`.
    pub fn file_name(&self) -> String {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!(
            "{}-{}-{}.{}",
            PHOTO_FIELD,
            millis,
            Uuid::new_v4().simple(),
            self.extension
        )
    }
}

/// Checks declared MIME type and file extension; both must name an accepted image type.
pub fn validate_photo(file_name: &str, content_type: &str) -> AppResult<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = content_type.trim().to_ascii_lowercase();

    if IMAGE_MIME_RE.is_match(&mime) && IMAGE_EXT_RE.is_match(&extension) {
        Ok(extension)
    } else {
        Err(AppError::validation(
            "Only images (jpeg, jpg, png, gif) are allowed.",
        ))
    }
}

/// Validated input of the create operation.
pub struct CreateUser {
    pub full_name: String,
    pub age: i32,
    pub street: String,
    pub neighborhood: String,
    pub state: String,
    pub biography: Option<String>,
    pub password: String,
}

/// Raw text fields and photo of a `/usuarios` form. Legacy field names are accepted.
#[derive(Debug, Default)]
pub struct UserForm {
    pub full_name: Option<String>,
    pub age: Option<String>,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub state: Option<String>,
    pub biography: Option<String>,
    pub password: Option<String>,
    pub photo: Option<PhotoUpload>,
}

/// JSON variant of the `/usuarios` form. Carries no photo.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJson {
    #[serde(default, alias = "nome_completo")]
    pub full_name: Option<String>,
    /// Number or numeric string.
    #[serde(default, alias = "idade")]
    pub age: Option<Value>,
    #[serde(default, alias = "rua")]
    pub street: Option<String>,
    #[serde(default, alias = "bairro")]
    pub neighborhood: Option<String>,
    #[serde(default, alias = "estado")]
    pub state: Option<String>,
    #[serde(default, alias = "biografia")]
    pub biography: Option<String>,
    #[serde(default, alias = "senha")]
    pub password: Option<String>,
}

impl From<UserJson> for UserForm {
    fn from(body: UserJson) -> Self {
        let age = body.age.and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        UserForm {
            full_name: body.full_name,
            age,
            street: body.street,
            neighborhood: body.neighborhood,
            state: body.state,
            biography: body.biography,
            password: body.password,
            photo: None,
        }
    }
}

/// Reads `application/json` bodies as [`UserJson`], anything else as multipart.
#[async_trait]
impl FromRequest<AppState> for UserForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<UserJson>::from_request(req, state)
                .await
                .map_err(|e| AppError::validation(format!("Invalid JSON body: {}", e.body_text())))?;
            return Ok(body.into());
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(format!("Invalid form data: {}", e.body_text())))?;
        UserForm::from_multipart(&mut mp, state.config.max_photo_bytes).await
    }
}

impl UserForm {
    pub async fn from_multipart(mp: &mut Multipart, max_photo_bytes: usize) -> AppResult<Self> {
        let mut form = UserForm::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Invalid form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == PHOTO_FIELD {
                form.photo = read_photo(field, max_photo_bytes).await?;
                continue;
            }
            let value = field
                .text()
                .await
                .map_err(|e| AppError::validation(format!("Invalid form field {}: {}", name, e)))?;
            form.set(&name, value);
        }
        Ok(form)
    }

    /// Stores a text field; unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "fullName" | "nome_completo" => &mut self.full_name,
            "age" | "idade" => &mut self.age,
            "street" | "rua" => &mut self.street,
            "neighborhood" | "bairro" => &mut self.neighborhood,
            "state" | "estado" => &mut self.state,
            "biography" | "biografia" => &mut self.biography,
            "password" | "senha" => &mut self.password,
            _ => return,
        };
        *slot = Some(value);
    }

    pub fn into_create(self) -> AppResult<(CreateUser, Option<PhotoUpload>)> {
        let input = CreateUser {
            full_name: required(self.full_name, "fullName")?,
            age: parse_age(&required(self.age, "age")?)?,
            street: required(self.street, "street")?,
            neighborhood: required(self.neighborhood, "neighborhood")?,
            state: required(self.state, "state")?,
            biography: self.biography,
            password: required(self.password, "password")?,
        };
        Ok((input, self.photo))
    }

    /// Present fields overwrite; the photo path is filled in once the upload is stored.
    pub fn into_patch(self) -> AppResult<(UserPatch, Option<PhotoUpload>)> {
        let patch = UserPatch {
            full_name: self.full_name.map(|v| non_empty(v, "fullName")).transpose()?,
            age: self.age.as_deref().map(parse_age).transpose()?,
            street: self.street.map(|v| non_empty(v, "street")).transpose()?,
            neighborhood: self
                .neighborhood
                .map(|v| non_empty(v, "neighborhood"))
                .transpose()?,
            state: self.state.map(|v| non_empty(v, "state")).transpose()?,
            biography: self.biography,
            profile_photo_path: None,
        };
        Ok((patch, self.photo))
    }
}

async fn read_photo(mut field: Field<'_>, max_bytes: usize) -> AppResult<Option<PhotoUpload>> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();

    let mut body = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::validation(format!("Invalid photo upload: {}", e)))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(AppError::validation(format!(
                "Profile photo exceeds the {} byte limit.",
                max_bytes
            )));
        }
        body.extend_from_slice(&chunk);
    }

    // Browsers submit an empty file part when nothing was picked.
    if file_name.is_empty() && body.is_empty() {
        return Ok(None);
    }

    let extension = validate_photo(&file_name, &content_type)?;
    Ok(Some(PhotoUpload {
        body: body.freeze(),
        extension,
    }))
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::validation(format!(
            "All required fields must be filled in (missing {}).",
            field
        ))),
    }
}

fn non_empty(value: String, field: &str) -> AppResult<String> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} must not be empty.", field)));
    }
    Ok(value)
}

fn parse_age(value: &str) -> AppResult<i32> {
    match value.trim().parse::<i32>() {
        Ok(age) if age >= 0 => Ok(age),
        _ => Err(AppError::validation("age must be a non-negative integer.")),
    }
}
