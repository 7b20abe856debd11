use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Only origin allowed by CORS.
    pub frontend_url: String,
    /// Prefix joined with a stored photo path to build `photoUrl`.
    pub public_base_url: String,
    pub upload_dir: String,
    pub host: String,
    pub port: u16,
    pub max_photo_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => database_url_from_parts()?,
        };
        let port = std::env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("APP_PORT must be a port number")?;

        Ok(Self {
            database_url,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5500".into()),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            max_photo_bytes: std::env::var("MAX_PHOTO_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_PHOTO_BYTES),
        })
    }

    /// Absolute URL for a stored photo path such as `/uploads/x.png`.
    pub fn photo_url(&self, path: &str) -> String {
        format!("{}{}", self.public_base_url, path)
    }
}

fn database_url_from_parts() -> anyhow::Result<String> {
    let host = std::env::var("DB_HOST").context("DATABASE_URL or DB_HOST must be set")?;
    let port = std::env::var("DB_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("DB_USER").context("DB_USER must be set")?;
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();
    let name = std::env::var("DB_NAME").context("DB_NAME must be set")?;
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_url_joins_base_and_path() {
        let cfg = AppConfig {
            database_url: "postgres://localhost/test".into(),
            frontend_url: "http://localhost:5500".into(),
            public_base_url: "http://api.local".into(),
            upload_dir: "uploads".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
        };
        assert_eq!(
            cfg.photo_url("/uploads/foto.png"),
            "http://api.local/uploads/foto.png"
        );
    }
}
