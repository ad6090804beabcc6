//! Email templates embedded at compile time

use std::collections::HashMap;
use chrono::NaiveDate;
use crate::services::settings::CommunityLinks;
use crate::utils::helpers::format_mmdd;
use crate::utils::template::render;

pub const CONFIRMATION_TEMPLATE_NAME: &str = "confirmation-email.html";
pub const WEEKLY_REMINDER_TEMPLATE_NAME: &str = "weekly-reminder-email.html";

pub const CONFIRMATION_SUBJECT: &str = "Welcome to Vietnam Hearts! ❤️🇻🇳";

const CONFIRMATION_TEMPLATE: &str = include_str!("../../../templates/email/confirmation-email.html");
const WEEKLY_REMINDER_TEMPLATE: &str = include_str!("../../../templates/email/weekly-reminder-email.html");

/// Subject line of the weekly reminder for the given week
pub fn reminder_subject(monday: NaiveDate, friday: NaiveDate) -> String {
    format!(
        "🗓️ Weekly Volunteer Reminder – Schedule Update ({} to {})",
        format_mmdd(monday),
        format_mmdd(friday)
    )
}

#[derive(Debug, Clone)]
pub struct EmailTemplates {
    confirmation: String,
    weekly_reminder: String,
}

impl Default for EmailTemplates {
    fn default() -> Self {
        Self {
            confirmation: CONFIRMATION_TEMPLATE.to_string(),
            weekly_reminder: WEEKLY_REMINDER_TEMPLATE.to_string(),
        }
    }
}

fn link_vars<'a>(
    links: &CommunityLinks,
    schedule_signup_link: &str,
    preferences_link: &str,
) -> HashMap<&'a str, String> {
    HashMap::from([
        ("SCHEDULE_SIGNUP_LINK", schedule_signup_link.to_string()),
        ("EMAIL_PREFERENCES_LINK", preferences_link.to_string()),
        ("FACEBOOK_MESSENGER_LINK", links.facebook_messenger.clone()),
        ("DISCORD_INVITE_LINK", links.discord.clone()),
        ("ONBOARDING_GUIDE_LINK", links.onboarding_guide.clone()),
        ("INSTAGRAM_LINK", links.instagram.clone()),
        ("FACEBOOK_PAGE_LINK", links.facebook_page.clone()),
    ])
}

impl EmailTemplates {
    pub fn new(confirmation: impl Into<String>, weekly_reminder: impl Into<String>) -> Self {
        Self {
            confirmation: confirmation.into(),
            weekly_reminder: weekly_reminder.into(),
        }
    }

    pub fn render_confirmation(
        &self,
        full_name: &str,
        links: &CommunityLinks,
        schedule_signup_link: &str,
        preferences_link: &str,
    ) -> String {
        let mut vars = link_vars(links, schedule_signup_link, preferences_link);
        vars.insert("UserFullName", full_name.to_string());
        render(&self.confirmation, &vars)
    }

    pub fn render_weekly_reminder(
        &self,
        first_name: &str,
        class_tables: &[String],
        links: &CommunityLinks,
        schedule_signup_link: &str,
        preferences_link: &str,
    ) -> String {
        let mut vars = link_vars(links, schedule_signup_link, preferences_link);
        vars.insert("first_name", first_name.to_string());
        vars.insert("class_tables", class_tables.join("\n"));
        render(&self.weekly_reminder, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_subject() {
        let monday = NaiveDate::from_ymd_opt(2024, 7, 8).unwrap();
        let friday = NaiveDate::from_ymd_opt(2024, 7, 12).unwrap();
        assert_eq!(
            reminder_subject(monday, friday),
            "🗓️ Weekly Volunteer Reminder – Schedule Update (07/08 to 07/12)"
        );
    }

    #[test]
    fn test_render_confirmation_fills_links() {
        let links = CommunityLinks {
            discord: "https://discord.gg/hearts".to_string(),
            ..CommunityLinks::default()
        };
        let html = EmailTemplates::default().render_confirmation(
            "Jane Doe",
            &links,
            "https://signup.example",
            "https://x.example/unsubscribe?token=abc",
        );
        assert!(html.contains("Jane Doe"));
        assert!(html.contains("https://discord.gg/hearts"));
        assert!(html.contains("https://x.example/unsubscribe?token=abc"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_weekly_reminder_includes_tables() {
        let html = EmailTemplates::default().render_weekly_reminder(
            "Jane",
            &["<table id=\"g1\"></table>".to_string(), "<table id=\"g4\"></table>".to_string()],
            &CommunityLinks::default(),
            "",
            "https://x.example/unsubscribe?token=t",
        );
        assert!(html.contains("Hi Jane!"));
        assert!(html.contains("id=\"g1\""));
        assert!(html.contains("id=\"g4\""));
    }
}
