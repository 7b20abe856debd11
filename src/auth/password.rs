use anyhow::Context;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::{debug, error};

lazy_static! {
    /// Verified against when a login names no user, so that path costs one argon2 run too.
    static ref DUMMY_HASH: Option<String> = hash_password("no-such-user").ok();
}

/// Computes the dummy hash up front so the first unknown-user login is not slower.
pub fn warm_up() {
    lazy_static::initialize(&DUMMY_HASH);
    debug!(ready = DUMMY_HASH.is_some(), "login timing hash prepared");
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow::anyhow!("hash password: {e}")
        })
}

/// `Ok(false)` on a mismatch; `Err` only when `stored` is unusable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is not a PHC string: {e}"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            error!(error = %e, "password verification failed");
            Err(anyhow::anyhow!("verify password: {e}"))
        }
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task failed")?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("verify task failed")?
}

/// Burns one verification for a login that matched no user. The outcome is discarded.
pub async fn verify_against_dummy(plain: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password(&plain, hash);
        }
    })
    .await;
}
