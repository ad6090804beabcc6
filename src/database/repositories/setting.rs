//! Runtime settings repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::{Setting, CreateSettingRequest, UpdateSettingRequest};
use crate::utils::errors::SchedulerError;

#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: PgPool,
}

impl SettingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Setting>, SchedulerError> {
        let setting = sqlx::query_as::<_, Setting>(
            "SELECT key, value, description, created_at, updated_at FROM settings WHERE key = $1"
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    pub async fn list(&self) -> Result<Vec<Setting>, SchedulerError> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, description, created_at, updated_at FROM settings ORDER BY key ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Insert a setting, returning `None` when the key already exists
    pub async fn insert_if_missing(&self, request: CreateSettingRequest) -> Result<Option<Setting>, SchedulerError> {
        let now = Utc::now();
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (key) DO NOTHING
            RETURNING key, value, description, created_at, updated_at
            "#
        )
        .bind(request.key)
        .bind(request.value)
        .bind(request.description)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    pub async fn upsert(&self, request: CreateSettingRequest) -> Result<Setting, SchedulerError> {
        let now = Utc::now();
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                description = COALESCE(EXCLUDED.description, settings.description),
                updated_at = EXCLUDED.updated_at
            RETURNING key, value, description, created_at, updated_at
            "#
        )
        .bind(request.key)
        .bind(request.value)
        .bind(request.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(setting)
    }

    /// Update an existing setting, `None` when the key is unknown
    pub async fn update(&self, key: &str, request: UpdateSettingRequest) -> Result<Option<Setting>, SchedulerError> {
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            UPDATE settings
            SET value = $2, description = COALESCE($3, description), updated_at = $4
            WHERE key = $1
            RETURNING key, value, description, created_at, updated_at
            "#
        )
        .bind(key)
        .bind(request.value)
        .bind(request.description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    /// Delete a setting, returning whether a row was removed
    pub async fn delete(&self, key: &str) -> Result<bool, SchedulerError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
