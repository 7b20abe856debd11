use tracing::{error, info, warn};

use super::{
    dto::UserResponse,
    form::{CreateUser, PhotoUpload},
    repo_types::{NewUser, UserPatch},
};
use crate::{
    auth::password::hash_password_async,
    error::{AppError, AppResult},
    state::AppState,
    storage::{name_from_path, public_path},
};

/// Hashes the password, stores the photo, inserts the record. Returns the new id.
pub async fn create_user(
    st: &AppState,
    input: CreateUser,
    photo: Option<PhotoUpload>,
) -> AppResult<i64> {
    let password_hash = hash_password_async(input.password)
        .await
        .map_err(AppError::Hash)?;

    let photo_name = match photo {
        Some(p) => Some(store_photo(st, p).await?),
        None => None,
    };

    let new_user = NewUser {
        full_name: input.full_name,
        age: input.age,
        street: input.street,
        neighborhood: input.neighborhood,
        state: input.state,
        biography: input.biography,
        profile_photo_path: photo_name.as_deref().map(public_path),
        password_hash,
    };

    match st.users.insert(&new_user).await {
        Ok(id) => {
            info!(user_id = id, has_photo = photo_name.is_some(), "user created");
            Ok(id)
        }
        Err(e) => {
            error!(error = %e, "insert user failed");
            if let Some(name) = &photo_name {
                discard_photo(st, name).await;
            }
            Err(AppError::Persistence(e))
        }
    }
}

pub async fn get_user(st: &AppState, id: i64) -> AppResult<UserResponse> {
    let user = st
        .users
        .find_by_id(id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::NotFound)?;

    let photo_url = match user.profile_photo_path.as_deref() {
        Some(path) if photo_exists(st, path).await => Some(st.config.photo_url(path)),
        Some(path) => {
            warn!(user_id = id, path, "profile photo missing from storage");
            None
        }
        None => None,
    };

    Ok(UserResponse::new(user, photo_url))
}

/// Applies `patch` and, when given, swaps in a new photo. Returns the current photo URL.
pub async fn update_user(
    st: &AppState,
    id: i64,
    mut patch: UserPatch,
    photo: Option<PhotoUpload>,
) -> AppResult<Option<String>> {
    let fields_changed = !patch.is_empty();

    // Written ahead of the row update; removed again if the update does not land.
    let new_name = match photo {
        Some(p) => Some(store_photo(st, p).await?),
        None => None,
    };
    patch.profile_photo_path = new_name.as_deref().map(public_path);

    let outcome = match st.users.update(id, &patch).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            if let Some(name) = &new_name {
                discard_photo(st, name).await;
            }
            return Err(AppError::NotFound);
        }
        Err(e) => {
            error!(error = %e, user_id = id, "update user failed");
            if let Some(name) = &new_name {
                discard_photo(st, name).await;
            }
            return Err(AppError::Persistence(e));
        }
    };

    if new_name.is_some() {
        if let Some(previous) = outcome.previous.as_deref() {
            if outcome.current.as_deref() != Some(previous) {
                remove_stored_photo(st, previous).await;
            }
        }
    }

    info!(
        user_id = id,
        fields_changed,
        photo_replaced = new_name.is_some(),
        "user updated"
    );
    Ok(outcome.current.map(|path| st.config.photo_url(&path)))
}

/// Deletes the record, then its photo. Photo removal failures are only logged.
pub async fn delete_user(st: &AppState, id: i64) -> AppResult<()> {
    let deleted = st
        .users
        .delete(id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::NotFound)?;

    if let Some(path) = deleted.profile_photo_path.as_deref() {
        remove_stored_photo(st, path).await;
    }
    info!(user_id = id, "user deleted");
    Ok(())
}

async fn store_photo(st: &AppState, photo: PhotoUpload) -> AppResult<String> {
    let name = photo.file_name();
    st.storage
        .put(&name, photo.body)
        .await
        .map_err(|e| {
            error!(error = %e, file = %name, "store photo failed");
            AppError::Storage(e)
        })?;
    Ok(name)
}

async fn discard_photo(st: &AppState, name: &str) {
    if let Err(e) = st.storage.delete(name).await {
        warn!(error = %e, file = %name, "failed to discard uploaded photo");
    }
}

async fn remove_stored_photo(st: &AppState, path: &str) {
    match name_from_path(path) {
        Some(name) => discard_photo(st, name).await,
        None => warn!(path, "stored photo path is outside the upload dir; not removed"),
    }
}

async fn photo_exists(st: &AppState, path: &str) -> bool {
    let Some(name) = name_from_path(path) else {
        return false;
    };
    match st.storage.exists(name).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(error = %e, path, "photo existence check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::{
        auth::{password::verify_password, services::authenticate},
        storage::PhotoStorage,
    };

    fn input() -> CreateUser {
        CreateUser {
            full_name: "Maria Silva".into(),
            age: 31,
            street: "Rua A, 10".into(),
            neighborhood: "Centro".into(),
            state: "SP".into(),
            biography: Some("hello".into()),
            password: "s3nha-forte".into(),
        }
    }

    fn png() -> PhotoUpload {
        PhotoUpload {
            body: Bytes::from_static(b"\x89PNG"),
            extension: "png".into(),
        }
    }

    fn name_of(url_or_path: &str) -> String {
        url_or_path.rsplit('/').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_without_photo_hashes_password() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), None).await.unwrap();
        assert!(id > 0);

        let row = users.get(id).unwrap();
        assert_ne!(row.password_hash, "s3nha-forte");
        assert!(verify_password("s3nha-forte", &row.password_hash).unwrap());
        assert_eq!(row.profile_photo_path, None);
        assert!(storage.names().is_empty());
        assert_eq!(authenticate(&st, "Maria Silva", "s3nha-forte").await.unwrap(), id);
    }

    #[tokio::test]
    async fn create_with_photo_stores_file_and_path() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();

        let path = users.get(id).unwrap().profile_photo_path.unwrap();
        assert!(path.starts_with("/uploads/foto_perfil_file-"));
        assert_eq!(storage.names(), vec![name_of(&path)]);
    }

    #[tokio::test]
    async fn failed_insert_discards_uploaded_photo() {
        let (st, users, storage) = AppState::fake();
        users.fail_writes(true);
        let err = create_user(&st, input(), Some(png())).await.unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(users.len(), 0);
        assert!(storage.names().is_empty());
    }

    #[tokio::test]
    async fn get_returns_public_fields() {
        let (st, _, _) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let user = get_user(&st, id).await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.full_name, "Maria Silva");
        assert_eq!(user.biography.as_deref(), Some("hello"));
        let url = user.photo_url.unwrap();
        assert!(url.starts_with("http://localhost:3000/uploads/"));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let (st, _, _) = AppState::fake();
        assert!(matches!(get_user(&st, 42).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn get_hides_dangling_photo() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let path = users.get(id).unwrap().profile_photo_path.unwrap();
        storage.delete(&name_of(&path)).await.unwrap();

        let user = get_user(&st, id).await.unwrap();
        assert_eq!(user.photo_url, None);
        assert_eq!(user.profile_photo_path, None);
    }

    #[tokio::test]
    async fn update_biography_only_leaves_rest_untouched() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let before = users.get(id).unwrap();

        let patch = UserPatch {
            biography: Some("updated".into()),
            ..Default::default()
        };
        let url = update_user(&st, id, patch, None).await.unwrap();

        let after = users.get(id).unwrap();
        assert_eq!(after.biography.as_deref(), Some("updated"));
        assert_eq!(after.full_name, before.full_name);
        assert_eq!(after.age, before.age);
        assert_eq!(after.street, before.street);
        assert_eq!(after.neighborhood, before.neighborhood);
        assert_eq!(after.state, before.state);
        assert_eq!(after.profile_photo_path, before.profile_photo_path);
        assert_eq!(after.password_hash, before.password_hash);
        let path = before.profile_photo_path.unwrap();
        assert_eq!(url, Some(st.config.photo_url(&path)));
        assert_eq!(storage.names().len(), 1);
    }

    #[tokio::test]
    async fn update_with_new_photo_replaces_old_file() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let old = name_of(&users.get(id).unwrap().profile_photo_path.unwrap());

        let url = update_user(&st, id, UserPatch::default(), Some(png()))
            .await
            .unwrap()
            .unwrap();

        let new = name_of(&url);
        assert_ne!(new, old);
        assert!(!storage.contains(&old));
        assert!(storage.contains(&new));
        assert_eq!(
            users.get(id).unwrap().profile_photo_path.as_deref(),
            Some(format!("/uploads/{new}").as_str())
        );
    }

    #[tokio::test]
    async fn update_unknown_discards_new_upload() {
        let (st, _, storage) = AppState::fake();
        let err = update_user(&st, 99, UserPatch::default(), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert!(storage.names().is_empty());
    }

    #[tokio::test]
    async fn failed_update_discards_new_photo_and_keeps_old() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let original = storage.names();
        let before = users.get(id).unwrap();

        users.fail_writes(true);
        let err = update_user(&st, id, UserPatch::default(), Some(png()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(storage.names(), original);
        assert_eq!(
            users.get(id).unwrap().profile_photo_path,
            before.profile_photo_path
        );
    }

    #[tokio::test]
    async fn update_without_any_photo_reports_none() {
        let (st, _, _) = AppState::fake();
        let id = create_user(&st, input(), None).await.unwrap();
        let url = update_user(&st, id, UserPatch::default(), None).await.unwrap();
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn delete_removes_record_and_photo() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();

        delete_user(&st, id).await.unwrap();
        assert!(users.get(id).is_none());
        assert!(storage.names().is_empty());
        assert!(matches!(get_user(&st, id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn delete_unknown_touches_no_files() {
        let (st, _, storage) = AppState::fake();
        create_user(&st, input(), Some(png())).await.unwrap();
        let before = storage.names();

        assert!(matches!(delete_user(&st, 1234).await, Err(AppError::NotFound)));
        assert_eq!(storage.names(), before);
    }

    #[tokio::test]
    async fn delete_succeeds_when_photo_removal_fails() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        storage.fail_deletes(true);

        delete_user(&st, id).await.unwrap();
        assert!(users.get(id).is_none());
        assert_eq!(storage.names().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_update_and_delete_settle() {
        let (st, users, storage) = AppState::fake();
        let id = create_user(&st, input(), Some(png())).await.unwrap();
        let st = Arc::new(st);

        let (a, b) = (st.clone(), st.clone());
        let update = tokio::spawn(async move {
            let patch = UserPatch {
                state: Some("RJ".into()),
                ..Default::default()
            };
            update_user(&a, id, patch, Some(png())).await
        });
        let delete = tokio::spawn(async move { delete_user(&b, id).await });

        let update = update.await.expect("update task panicked");
        let delete = delete.await.expect("delete task panicked");

        // The delete always lands, either before or after the update.
        assert!(delete.is_ok());
        assert!(matches!(update, Ok(_) | Err(AppError::NotFound)));
        assert!(users.get(id).is_none());
        assert!(storage.names().is_empty());
    }
}
