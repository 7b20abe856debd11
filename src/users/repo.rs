use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::repo_types::{DeletedUser, NewUser, UpdatedPhoto, User, UserPatch};

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a record and return its assigned id.
    async fn insert(&self, user: &NewUser) -> anyhow::Result<i64>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;

    /// First record (lowest id) carrying `full_name`.
    async fn find_first_by_full_name(&self, full_name: &str) -> anyhow::Result<Option<User>>;

    /// Apply `patch` to record `id`. `None` when no record has that id.
    async fn update(&self, id: i64, patch: &UserPatch) -> anyhow::Result<Option<UpdatedPhoto>>;

    /// Remove record `id`. `None` when no record has that id.
    async fn delete(&self, id: i64) -> anyhow::Result<Option<DeletedUser>>;

    /// Release underlying connections.
    async fn close(&self) {}
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self { db })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &NewUser) -> anyhow::Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (full_name, age, street, neighborhood, state,
                               biography, profile_photo_path, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&user.full_name)
        .bind(user.age)
        .bind(&user.street)
        .bind(&user.neighborhood)
        .bind(&user.state)
        .bind(user.biography.as_deref())
        .bind(user.profile_photo_path.as_deref())
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, age, street, neighborhood, state, biography,
                   profile_photo_path, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_first_by_full_name(&self, full_name: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, age, street, neighborhood, state, biography,
                   profile_photo_path, password_hash, created_at, updated_at
            FROM users
            WHERE full_name = $1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(full_name)
        .fetch_optional(&self.db)
        .await
        .context("find user by full name")?;
        Ok(user)
    }

    async fn update(&self, id: i64, patch: &UserPatch) -> anyhow::Result<Option<UpdatedPhoto>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // Lock the row so the previous photo we report is the one we overwrite.
        let previous: Option<(Option<String>,)> = sqlx::query_as(
            r#"SELECT profile_photo_path FROM users WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("lock user for update")?;

        let Some((previous,)) = previous else {
            return Ok(None);
        };

        let (current,): (Option<String>,) = sqlx::query_as(
            r#"
            UPDATE users
               SET full_name          = COALESCE($2, full_name),
                   age                = COALESCE($3, age),
                   street             = COALESCE($4, street),
                   neighborhood       = COALESCE($5, neighborhood),
                   state              = COALESCE($6, state),
                   biography          = COALESCE($7, biography),
                   profile_photo_path = COALESCE($8, profile_photo_path),
                   updated_at         = now()
             WHERE id = $1
            RETURNING profile_photo_path
            "#,
        )
        .bind(id)
        .bind(patch.full_name.as_deref())
        .bind(patch.age)
        .bind(patch.street.as_deref())
        .bind(patch.neighborhood.as_deref())
        .bind(patch.state.as_deref())
        .bind(patch.biography.as_deref())
        .bind(patch.profile_photo_path.as_deref())
        .fetch_one(&mut *tx)
        .await
        .context("update user")?;

        tx.commit().await.context("commit tx")?;
        Ok(Some(UpdatedPhoto { previous, current }))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<Option<DeletedUser>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            r#"DELETE FROM users WHERE id = $1 RETURNING profile_photo_path"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete user")?;
        Ok(row.map(|(profile_photo_path,)| DeletedUser { profile_photo_path }))
    }

    async fn close(&self) {
        self.db.close().await;
        info!("database pool closed");
    }
}
