use tracing::{info, warn};

use super::password::{verify_against_dummy, verify_password_async};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::User,
};

/// Resolves a login to a user id.
///
/// Duplicate full names are allowed; the lowest id wins. Both failure paths run one
/// argon2 verification.
pub async fn authenticate(st: &AppState, full_name: &str, password: &str) -> AppResult<i64> {
    let user = st
        .users
        .find_first_by_full_name(full_name)
        .await
        .map_err(AppError::Persistence)?;

    let Some(User {
        id, password_hash, ..
    }) = user
    else {
        verify_against_dummy(password.to_string()).await;
        warn!("login for unknown user");
        return Err(AppError::UnknownUser);
    };

    let ok = verify_password_async(password.to_string(), password_hash)
        .await
        .map_err(AppError::Hash)?;
    if !ok {
        warn!(user_id = id, "login invalid password");
        return Err(AppError::WrongPassword);
    }

    info!(user_id = id, "user logged in");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{form::CreateUser, services::create_user};

    fn input(name: &str, password: &str) -> CreateUser {
        CreateUser {
            full_name: name.into(),
            age: 20,
            street: "Rua A".into(),
            neighborhood: "Centro".into(),
            state: "SP".into(),
            biography: None,
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn correct_credentials_return_id() {
        let (st, _, _) = AppState::fake();
        let id = create_user(&st, input("Ana", "pw-ana"), None).await.unwrap();
        assert_eq!(authenticate(&st, "Ana", "pw-ana").await.unwrap(), id);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (st, _, _) = AppState::fake();
        create_user(&st, input("Ana", "pw-ana"), None).await.unwrap();
        let err = authenticate(&st, "Ana", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::WrongPassword));
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let (st, _, _) = AppState::fake();
        let err = authenticate(&st, "Nobody", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::UnknownUser));
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_names_match_the_first_record() {
        let (st, _, _) = AppState::fake();
        let first = create_user(&st, input("Ana", "one"), None).await.unwrap();
        let second = create_user(&st, input("Ana", "two"), None).await.unwrap();
        assert!(first < second);
        assert_eq!(authenticate(&st, "Ana", "one").await.unwrap(), first);
        assert!(matches!(
            authenticate(&st, "Ana", "two").await,
            Err(AppError::WrongPassword)
        ));
    }
}
