//! Volunteer model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Volunteer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub positions: Json<Vec<String>>,
    pub teaching_experience: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub availability: Json<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub commitment_duration: Option<String>,
    pub experience_details: Option<String>,
    pub teaching_certificate: Option<String>,
    pub vietnamese_proficiency: Option<String>,
    pub additional_support: Json<Vec<String>>,
    pub additional_info: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub email_unsubscribe_token: Option<String>,
    pub weekly_reminders_subscribed: bool,
    pub all_emails_subscribed: bool,
    pub last_email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Volunteer {
    /// Human readable description of the volunteer's email preferences
    pub fn subscription_status(&self) -> &'static str {
        if !self.all_emails_subscribed {
            "Unsubscribed from all emails (Account deactivated)"
        } else if !self.weekly_reminders_subscribed {
            "Subscribed to announcements only (No weekly reminders)"
        } else {
            "Subscribed to all emails including weekly reminders"
        }
    }

    /// Whether the weekly reminder job should include this volunteer
    pub fn receives_weekly_reminders(&self) -> bool {
        self.is_active && self.weekly_reminders_subscribed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolunteerRequest {
    pub name: String,
    pub email: String,
    pub positions: Vec<String>,
    pub teaching_experience: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub availability: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub commitment_duration: Option<String>,
    pub experience_details: Option<String>,
    pub teaching_certificate: Option<String>,
    pub vietnamese_proficiency: Option<String>,
    pub additional_support: Vec<String>,
    pub additional_info: Option<String>,
}

/// Volunteer row as listed on the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VolunteerSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub weekly_reminders_subscribed: bool,
    pub all_emails_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub last_email_sent_at: Option<DateTime<Utc>>,
    pub confirmation_sent: bool,
}

/// Which email streams a preference change touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceChange {
    WeeklyReminders,
    AllEmails,
    Resubscribe,
}

impl PreferenceChange {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weekly_reminders" => Some(Self::WeeklyReminders),
            "all_emails" => Some(Self::AllEmails),
            "resubscribe" => Some(Self::Resubscribe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeeklyReminders => "weekly_reminders",
            Self::AllEmails => "all_emails",
            Self::Resubscribe => "resubscribe",
        }
    }

    /// Resulting (weekly_reminders_subscribed, all_emails_subscribed, is_active).
    /// `None` for `is_active` leaves the flag untouched.
    pub fn flags(&self) -> (bool, bool, Option<bool>) {
        match self {
            Self::WeeklyReminders => (false, true, None),
            Self::AllEmails => (false, false, Some(false)),
            Self::Resubscribe => (true, true, Some(true)),
        }
    }

    pub fn confirmation_message(&self) -> &'static str {
        match self {
            Self::WeeklyReminders => "You have been unsubscribed from weekly reminders. You will still receive important announcements.",
            Self::AllEmails => "You have been unsubscribed from all emails and your volunteer account has been deactivated.",
            Self::Resubscribe => "Welcome back! You are subscribed to all emails again, including weekly reminders.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_change_parse() {
        assert_eq!(PreferenceChange::parse("all_emails"), Some(PreferenceChange::AllEmails));
        assert_eq!(PreferenceChange::parse("everything"), None);
        assert_eq!(PreferenceChange::WeeklyReminders.flags(), (false, true, None));
        assert_eq!(PreferenceChange::AllEmails.flags(), (false, false, Some(false)));
        assert_eq!(PreferenceChange::Resubscribe.flags(), (true, true, Some(true)));
    }
}
