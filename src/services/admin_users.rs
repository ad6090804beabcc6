//! Admin user management
//!
//! Any admin may list admin users; adding, removing and changing roles is
//! reserved for super admins. Emails from the configured admin list act as
//! super admins so a fresh installation can bootstrap its first rows.

use tracing::info;
use crate::database::DatabaseService;
use crate::models::{AdminRole, AdminUser};
use crate::services::auth::{AuthService, AuthUser};
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::{is_valid_email, normalize_email};
use crate::utils::logging::log_admin_action;

#[derive(Clone)]
pub struct AdminUserService {
    db: DatabaseService,
    auth: AuthService,
}

impl AdminUserService {
    pub fn new(db: DatabaseService, auth: AuthService) -> Self {
        Self { db, auth }
    }

    async fn is_super_admin(&self, requester: &AuthUser) -> Result<bool> {
        let email = normalize_email(&requester.email);
        if self.auth.config().admin_emails.iter().any(|e| normalize_email(e) == email) {
            return Ok(true);
        }
        Ok(self
            .db
            .admins
            .find_by_email(&email)
            .await?
            .map(|admin| admin.is_active && admin.is_super_admin())
            .unwrap_or(false))
    }

    async fn require_super_admin(&self, requester: &AuthUser, action: &str) -> Result<()> {
        if self.is_super_admin(requester).await? {
            Ok(())
        } else {
            Err(SchedulerError::PermissionDenied(format!("Only super admins can {}", action)))
        }
    }

    pub async fn list(&self, requester: &AuthUser) -> Result<Vec<AdminUser>> {
        if !self.auth.is_admin(requester).await? {
            return Err(SchedulerError::PermissionDenied("Only admins can view admin users".to_string()));
        }
        self.db.admins.list().await
    }

    pub async fn add(&self, requester: &AuthUser, email: &str, role: AdminRole) -> Result<AdminUser> {
        self.require_super_admin(requester, "add admin users").await?;

        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(SchedulerError::InvalidInput(format!("Invalid email address: {}", email)));
        }

        let admin = self
            .db
            .admins
            .create(&email, role)
            .await?
            .ok_or_else(|| SchedulerError::Conflict(format!("Admin user {} already exists", email)))?;

        self.auth.invalidate_admin(&email).await;
        log_admin_action(&requester.email, "add_admin_user", Some(&email), Some(role.as_str()));
        Ok(admin)
    }

    /// Deactivate an admin user
    pub async fn remove(&self, requester: &AuthUser, email: &str) -> Result<()> {
        self.require_super_admin(requester, "remove admin users").await?;

        let email = normalize_email(email);
        if !self.db.admins.deactivate(&email).await? {
            return Err(SchedulerError::NotFound(format!("Admin user {}", email)));
        }

        self.auth.invalidate_admin(&email).await;
        log_admin_action(&requester.email, "remove_admin_user", Some(&email), None);
        info!(email = %email, "Admin user deactivated");
        Ok(())
    }

    pub async fn update_role(&self, requester: &AuthUser, email: &str, role: AdminRole) -> Result<AdminUser> {
        self.require_super_admin(requester, "update admin roles").await?;

        let email = normalize_email(email);
        let admin = self
            .db
            .admins
            .update_role(&email, role)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("Admin user {}", email)))?;

        log_admin_action(&requester.email, "update_admin_role", Some(&email), Some(role.as_str()));
        Ok(admin)
    }
}
