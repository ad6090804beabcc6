//! Database service layer
//!
//! This module provides a high-level interface to database operations

use serde::Serialize;
use crate::database::{
    DatabasePool, VolunteerRepository, EmailCommunicationRepository, SettingRepository,
    AdminUserRepository, ConversationRepository,
};
use crate::utils::errors::SchedulerError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub volunteers: VolunteerRepository,
    pub emails: EmailCommunicationRepository,
    pub settings: SettingRepository,
    pub admins: AdminUserRepository,
    pub conversations: ConversationRepository,
}

/// Row counts reported by the health endpoint and the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_volunteers: i64,
    pub active_volunteers: i64,
    pub total_emails: i64,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            volunteers: VolunteerRepository::new(pool.clone()),
            emails: EmailCommunicationRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            admins: AdminUserRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Get system statistics
    pub async fn stats(&self) -> Result<DatabaseStats, SchedulerError> {
        let (total_volunteers, active_volunteers) = self.volunteers.counts().await?;
        let total_emails = self.emails.count().await?;

        Ok(DatabaseStats {
            total_volunteers,
            active_volunteers,
            total_emails,
        })
    }

    pub async fn health_check(&self) -> Result<(), SchedulerError> {
        super::connection::health_check(&self.pool).await
    }
}
