//! Server-rendered HTML pages

use std::collections::HashMap;
use crate::models::{EmailCommunication, PreferenceChange, Volunteer, VolunteerSummary};
use crate::utils::helpers::{escape_html, format_timestamp};
use crate::utils::template::render;

const PREFERENCES_PAGE: &str = include_str!("../../templates/pages/preferences.html");
const ERROR_PAGE: &str = include_str!("../../templates/pages/error.html");
const DASHBOARD_PAGE: &str = include_str!("../../templates/pages/dashboard.html");

pub const INVALID_TOKEN_MESSAGE: &str =
    "Invalid or expired unsubscribe link. Please contact us if you need assistance.";
pub const LOAD_ERROR_MESSAGE: &str =
    "An error occurred while loading your preferences. Please try again or contact us for assistance.";
pub const UPDATE_ERROR_MESSAGE: &str =
    "An error occurred while updating your preferences. Please try again or contact us for assistance.";
pub const INVALID_SELECTION_MESSAGE: &str = "Invalid preference selection. Please try again.";

/// Preference currently in effect, used to pre-select the form
pub fn current_preference(volunteer: &Volunteer) -> PreferenceChange {
    if !volunteer.all_emails_subscribed {
        PreferenceChange::AllEmails
    } else if !volunteer.weekly_reminders_subscribed {
        PreferenceChange::WeeklyReminders
    } else {
        PreferenceChange::Resubscribe
    }
}

pub enum Notice<'a> {
    None,
    Success(&'a str),
    Error(&'a str),
}

pub fn preferences_page(volunteer: &Volunteer, token: &str, notice: Notice<'_>) -> String {
    let selected = current_preference(volunteer);
    let checked = |change: PreferenceChange| {
        if change == selected { "checked".to_string() } else { String::new() }
    };
    let notice = match notice {
        Notice::None => String::new(),
        Notice::Success(message) => format!("<div class=\"success\">{}</div>", escape_html(message)),
        Notice::Error(message) => format!("<div class=\"error\">{}</div>", escape_html(message)),
    };

    let vars = HashMap::from([
        ("volunteer_name", escape_html(&volunteer.name)),
        ("volunteer_email", escape_html(&volunteer.email)),
        ("subscribed_status", volunteer.subscription_status().to_string()),
        ("token", urlencoding::encode(token).into_owned()),
        ("notice", notice),
        ("checked_weekly_reminders", checked(PreferenceChange::WeeklyReminders)),
        ("checked_all_emails", checked(PreferenceChange::AllEmails)),
        ("checked_resubscribe", checked(PreferenceChange::Resubscribe)),
    ]);
    render(PREFERENCES_PAGE, &vars)
}

pub fn error_page(message: &str) -> String {
    render(ERROR_PAGE, &HashMap::from([("error_message", escape_html(message))]))
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn volunteer_row(v: &VolunteerSummary) -> String {
    format!(
        "      <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        v.id,
        escape_html(&v.name),
        escape_html(&v.email),
        yes_no(v.is_active),
        yes_no(v.weekly_reminders_subscribed),
        yes_no(v.all_emails_subscribed),
        if v.confirmation_sent { "Sent" } else { "Pending" },
        format_timestamp(v.created_at),
    )
}

fn email_row(e: &EmailCommunication) -> String {
    format!(
        "      <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(&e.recipient_email),
        escape_html(&e.email_type),
        escape_html(&e.subject),
        escape_html(&e.status),
        e.sent_at.map(format_timestamp).unwrap_or_else(|| "-".to_string()),
    )
}

pub struct DashboardData<'a> {
    pub admin_email: &'a str,
    pub volunteers: &'a [VolunteerSummary],
    pub emails: &'a [EmailCommunication],
    pub total_emails: i64,
    pub dry_run: bool,
    pub generated_at: String,
}

pub fn dashboard_page(data: &DashboardData<'_>) -> String {
    let active = data.volunteers.iter().filter(|v| v.is_active).count();
    let confirmed = data.volunteers.iter().filter(|v| v.confirmation_sent).count();
    let vars = HashMap::from([
        ("admin_email", escape_html(data.admin_email)),
        ("generated_at", data.generated_at.clone()),
        ("total_volunteers", data.volunteers.len().to_string()),
        ("active_volunteers", active.to_string()),
        ("confirmations_sent", confirmed.to_string()),
        ("total_emails", data.total_emails.to_string()),
        ("dry_run", if data.dry_run { "On" } else { "Off" }.to_string()),
        ("volunteer_rows", data.volunteers.iter().map(volunteer_row).collect::<Vec<_>>().join("\n")),
        ("email_rows", data.emails.iter().map(email_row).collect::<Vec<_>>().join("\n")),
    ]);
    render(DASHBOARD_PAGE, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn volunteer(weekly: bool, all: bool) -> Volunteer {
        Volunteer {
            id: 7,
            name: "Lan <Nguyen>".to_string(),
            email: "lan@example.com".to_string(),
            positions: Json(vec![]),
            teaching_experience: None,
            phone: None,
            location: None,
            availability: Json(vec![]),
            start_date: None,
            commitment_duration: None,
            experience_details: None,
            teaching_certificate: None,
            vietnamese_proficiency: None,
            additional_support: Json(vec![]),
            additional_info: None,
            is_active: all,
            email_unsubscribe_token: Some("tok".to_string()),
            weekly_reminders_subscribed: weekly,
            all_emails_subscribed: all,
            last_email_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_current_preference() {
        assert_eq!(current_preference(&volunteer(true, true)), PreferenceChange::Resubscribe);
        assert_eq!(current_preference(&volunteer(false, true)), PreferenceChange::WeeklyReminders);
        assert_eq!(current_preference(&volunteer(false, false)), PreferenceChange::AllEmails);
    }

    #[test]
    fn test_preferences_page_escapes_and_selects() {
        let html = preferences_page(&volunteer(false, true), "a b", Notice::Success("Saved"));
        assert!(html.contains("Lan &lt;Nguyen&gt;"));
        assert!(html.contains("/unsubscribe?token=a%20b"));
        assert!(html.contains("value=\"weekly_reminders\" checked"));
        assert!(html.contains("Subscribed to announcements only"));
        assert!(html.contains("<div class=\"success\">Saved</div>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_error_page() {
        let html = error_page(INVALID_TOKEN_MESSAGE);
        assert!(html.contains("Invalid or expired unsubscribe link"));
    }
}
