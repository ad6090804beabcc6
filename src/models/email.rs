//! Email communication log model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const EMAIL_TYPE_CONFIRMATION: &str = "volunteer_confirmation";
pub const EMAIL_TYPE_WEEKLY_REMINDER: &str = "weekly_reminder";
pub const EMAIL_TYPE_CUSTOM: &str = "custom";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailCommunication {
    pub id: i64,
    pub volunteer_id: Option<i64>,
    pub recipient_email: String,
    pub email_type: String,
    pub subject: String,
    pub template_name: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
    Bounced,
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
            EmailStatus::Delivered => "delivered",
            EmailStatus::Bounced => "bounced",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmailCommunicationRequest {
    pub volunteer_id: Option<i64>,
    pub recipient_email: String,
    pub email_type: String,
    pub subject: String,
    pub template_name: Option<String>,
    pub status: EmailStatus,
    pub error_message: Option<String>,
}

/// `preference_update_<kind>` email type used to audit preference changes
pub fn preference_update_type(kind: &str) -> String {
    format!("preference_update_{}", kind)
}
