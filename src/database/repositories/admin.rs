//! Admin user repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::{AdminUser, AdminRole};
use crate::utils::errors::SchedulerError;

#[derive(Debug, Clone)]
pub struct AdminUserRepository {
    pool: PgPool,
}

impl AdminUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>, SchedulerError> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "SELECT id, email, role, is_active, created_at, updated_at, last_login FROM admin_users WHERE email = $1"
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn list(&self) -> Result<Vec<AdminUser>, SchedulerError> {
        let admins = sqlx::query_as::<_, AdminUser>(
            "SELECT id, email, role, is_active, created_at, updated_at, last_login FROM admin_users ORDER BY email ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(admins)
    }

    /// Insert an admin; `None` when the email already exists
    pub async fn create(&self, email: &str, role: AdminRole) -> Result<Option<AdminUser>, SchedulerError> {
        let now = Utc::now();
        let admin = sqlx::query_as::<_, AdminUser>(
            r#"
            INSERT INTO admin_users (email, role, is_active, created_at, updated_at)
            VALUES ($1, $2, TRUE, $3, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, role, is_active, created_at, updated_at, last_login
            "#
        )
        .bind(email.trim().to_lowercase())
        .bind(role.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn update_role(&self, email: &str, role: AdminRole) -> Result<Option<AdminUser>, SchedulerError> {
        let admin = sqlx::query_as::<_, AdminUser>(
            r#"
            UPDATE admin_users SET role = $2, updated_at = $3
            WHERE email = $1
            RETURNING id, email, role, is_active, created_at, updated_at, last_login
            "#
        )
        .bind(email.trim().to_lowercase())
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    pub async fn deactivate(&self, email: &str) -> Result<bool, SchedulerError> {
        let result = sqlx::query("UPDATE admin_users SET is_active = FALSE, updated_at = $2 WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_login(&self, email: &str) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE admin_users SET last_login = $2 WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
