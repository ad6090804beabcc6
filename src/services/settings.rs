//! Runtime settings service
//!
//! Key/value settings stored in the database that admins can change without
//! a redeploy: dry-run mode, reminder toggle, community links and the Google
//! Sheets retry parameters.

use std::collections::BTreeMap;
use serde::Serialize;
use tracing::{info, warn};
use crate::config::settings::Settings;
use crate::database::SettingRepository;
use crate::models::{Setting, CreateSettingRequest, UpdateSettingRequest};
use crate::utils::errors::{SchedulerError, Result};
use crate::utils::retry::RetryPolicy;
use crate::utils::sheets_url::extract_sheet_id;

pub const DRY_RUN: &str = "DRY_RUN";
pub const DRY_RUN_EMAIL_RECIPIENT: &str = "DRY_RUN_EMAIL_RECIPIENT";
pub const WEEKLY_REMINDERS_ENABLED: &str = "WEEKLY_REMINDERS_ENABLED";
pub const INVITE_LINK_FACEBOOK_MESSENGER: &str = "INVITE_LINK_FACEBOOK_MESSENGER";
pub const INVITE_LINK_DISCORD: &str = "INVITE_LINK_DISCORD";
pub const ONBOARDING_GUIDE_LINK: &str = "ONBOARDING_GUIDE_LINK";
pub const INSTAGRAM_LINK: &str = "INSTAGRAM_LINK";
pub const FACEBOOK_PAGE_LINK: &str = "FACEBOOK_PAGE_LINK";
pub const SCHEDULE_SHEETS_LINK: &str = "SCHEDULE_SHEETS_LINK";
pub const NEW_SIGNUPS_RESPONSES_LINK: &str = "NEW_SIGNUPS_RESPONSES_LINK";
pub const SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT: &str = "SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT";
pub const GOOGLE_SHEETS_MAX_RETRIES: &str = "GOOGLE_SHEETS_MAX_RETRIES";
pub const GOOGLE_SHEETS_BASE_WAIT: &str = "GOOGLE_SHEETS_BASE_WAIT";
pub const GOOGLE_SHEETS_MAX_WAIT: &str = "GOOGLE_SHEETS_MAX_WAIT";

pub const DEFAULT_DISPLAY_WEEKS: u32 = 4;
pub const MAX_DISPLAY_WEEKS: u32 = 52;

/// (key, default value, description)
pub const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    (DRY_RUN, "false", "When true, emails are only delivered to the dry-run recipient"),
    (DRY_RUN_EMAIL_RECIPIENT, "", "Only recipient that receives emails while dry run is enabled"),
    (WEEKLY_REMINDERS_ENABLED, "true", "Enable the weekly reminder job"),
    (INVITE_LINK_FACEBOOK_MESSENGER, "", "Facebook Messenger group invite link"),
    (INVITE_LINK_DISCORD, "", "Discord server invite link"),
    (ONBOARDING_GUIDE_LINK, "", "Volunteer onboarding guide"),
    (INSTAGRAM_LINK, "", "Instagram profile link"),
    (FACEBOOK_PAGE_LINK, "", "Facebook page link"),
    (SCHEDULE_SHEETS_LINK, "", "Google Sheets link of the weekly schedule"),
    (NEW_SIGNUPS_RESPONSES_LINK, "", "Google Sheets link of the signup form responses"),
    (SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT, "4", "Number of upcoming weeks visible in the schedule"),
    (GOOGLE_SHEETS_MAX_RETRIES, "3", "Attempts per Google Sheets call"),
    (GOOGLE_SHEETS_BASE_WAIT, "2.0", "Initial retry delay in seconds"),
    (GOOGLE_SHEETS_MAX_WAIT, "15.0", "Maximum retry delay in seconds"),
];

/// Community links substituted into email templates
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommunityLinks {
    pub facebook_messenger: String,
    pub discord: String,
    pub onboarding_guide: String,
    pub instagram: String,
    pub facebook_page: String,
}

#[derive(Clone)]
pub struct RuntimeSettingsService {
    repository: SettingRepository,
    settings: Settings,
}

fn default_value(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, value, _)| *value)
}

/// Parse the truthy spellings admins use in the settings form
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

impl RuntimeSettingsService {
    pub fn new(repository: SettingRepository, settings: Settings) -> Self {
        Self { repository, settings }
    }

    /// Insert every default that is not stored yet; existing values are left alone
    pub async fn initialize_defaults(&self) -> Result<usize> {
        let mut inserted = 0;
        for (key, value, description) in DEFAULT_SETTINGS {
            let created = self
                .repository
                .insert_if_missing(CreateSettingRequest {
                    key: key.to_string(),
                    value: value.to_string(),
                    description: Some(description.to_string()),
                })
                .await?;
            if created.is_some() {
                inserted += 1;
            }
        }

        info!(inserted = inserted, "Runtime settings defaults initialized");
        Ok(inserted)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.repository.get(key).await?.map(|s| s.value))
    }

    /// Full setting row; `NotFound` when the key is unknown
    pub async fn find(&self, key: &str) -> Result<Setting> {
        self.repository
            .get(key)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("Setting '{}'", key)))
    }

    /// Stored value, then built-in default, then empty string
    pub async fn get_or_default(&self, key: &str) -> String {
        match self.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => default_value(key).unwrap_or_default().to_string(),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read setting, using default");
                default_value(key).unwrap_or_default().to_string()
            }
        }
    }

    pub async fn get_bool(&self, key: &str) -> bool {
        parse_bool(&self.get_or_default(key).await)
    }

    pub async fn get_u32(&self, key: &str) -> Option<u32> {
        let value = self.get_or_default(key).await;
        value.trim().parse().ok().or_else(|| default_value(key).and_then(|d| d.parse().ok()))
    }

    pub async fn get_f64(&self, key: &str) -> Option<f64> {
        let value = self.get_or_default(key).await;
        value.trim().parse().ok().or_else(|| default_value(key).and_then(|d| d.parse().ok()))
    }

    pub async fn set(&self, key: &str, value: &str, description: Option<String>) -> Result<Setting> {
        self.repository
            .upsert(CreateSettingRequest {
                key: key.to_string(),
                value: value.to_string(),
                description,
            })
            .await
    }

    /// Create a new setting; fails with `Conflict` when the key exists
    pub async fn create(&self, request: CreateSettingRequest) -> Result<Setting> {
        if request.key.trim().is_empty() {
            return Err(SchedulerError::InvalidInput("Setting key must not be empty".to_string()));
        }
        validate_value(&request.key, &request.value)?;
        let key = request.key.clone();
        self.repository
            .insert_if_missing(request)
            .await?
            .ok_or_else(|| SchedulerError::Conflict(format!("Setting '{}' already exists", key)))
    }

    pub async fn update(&self, key: &str, request: UpdateSettingRequest) -> Result<Setting> {
        validate_value(key, &request.value)?;
        self.repository
            .update(key, request)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(format!("Setting '{}'", key)))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        if self.repository.delete(key).await? {
            Ok(())
        } else {
            Err(SchedulerError::NotFound(format!("Setting '{}'", key)))
        }
    }

    pub async fn list(&self) -> Result<Vec<Setting>> {
        self.repository.list().await
    }

    pub async fn as_map(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .repository
            .list()
            .await?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect())
    }

    pub async fn dry_run(&self) -> bool {
        self.get_bool(DRY_RUN).await
    }

    pub async fn dry_run_recipient(&self) -> String {
        self.get_or_default(DRY_RUN_EMAIL_RECIPIENT).await.trim().to_lowercase()
    }

    pub async fn weekly_reminders_enabled(&self) -> bool {
        self.get_bool(WEEKLY_REMINDERS_ENABLED).await
    }

    /// Stored week count; out of range values fall back to the default
    pub async fn display_weeks_count(&self) -> u32 {
        let stored = self.get_u32(SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT).await.unwrap_or(DEFAULT_DISPLAY_WEEKS);
        match validate_display_weeks(stored) {
            Ok(weeks) => weeks,
            Err(e) => {
                warn!(error = %e, "Ignoring stored display weeks count");
                DEFAULT_DISPLAY_WEEKS
            }
        }
    }

    pub async fn links(&self) -> CommunityLinks {
        CommunityLinks {
            facebook_messenger: self.get_or_default(INVITE_LINK_FACEBOOK_MESSENGER).await,
            discord: self.get_or_default(INVITE_LINK_DISCORD).await,
            onboarding_guide: self.get_or_default(ONBOARDING_GUIDE_LINK).await,
            instagram: self.get_or_default(INSTAGRAM_LINK).await,
            facebook_page: self.get_or_default(FACEBOOK_PAGE_LINK).await,
        }
    }

    async fn sheet_id_from(&self, key: &str, fallback: &str) -> Option<String> {
        let link = self.get_or_default(key).await;
        if let Some(id) = extract_sheet_id(&link) {
            return Some(id);
        }
        let fallback = fallback.trim();
        (!fallback.is_empty()).then(|| fallback.to_string())
    }

    pub async fn schedule_sheet_id(&self) -> Option<String> {
        self.sheet_id_from(SCHEDULE_SHEETS_LINK, &self.settings.google.schedule_sheet_id).await
    }

    pub async fn signup_sheet_id(&self) -> Option<String> {
        self.sheet_id_from(NEW_SIGNUPS_RESPONSES_LINK, &self.settings.google.signup_sheet_id).await
    }

    pub async fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy::new(
            self.get_u32(GOOGLE_SHEETS_MAX_RETRIES).await.unwrap_or(defaults.max_attempts),
            self.get_f64(GOOGLE_SHEETS_BASE_WAIT).await.unwrap_or(2.0),
            self.get_f64(GOOGLE_SHEETS_MAX_WAIT).await.unwrap_or(15.0),
        )
    }
}

/// Number of visible week tabs must be within `1..=MAX_DISPLAY_WEEKS`
pub fn validate_display_weeks(weeks: u32) -> Result<u32> {
    if (1..=MAX_DISPLAY_WEEKS).contains(&weeks) {
        Ok(weeks)
    } else {
        Err(SchedulerError::InvalidInput(format!(
            "display_weeks must be between 1 and {}, got {}",
            MAX_DISPLAY_WEEKS, weeks
        )))
    }
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    if key == SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT {
        let weeks = value.trim().parse::<u32>().map_err(|_| {
            SchedulerError::InvalidInput(format!("{} must be a whole number", SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT))
        })?;
        validate_display_weeks(weeks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" TRUE "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_defaults_table() {
        assert_eq!(default_value(DRY_RUN), Some("false"));
        assert_eq!(default_value(SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT), Some("4"));
        assert_eq!(default_value(GOOGLE_SHEETS_MAX_WAIT), Some("15.0"));
        assert_eq!(default_value("UNKNOWN"), None);
        assert_eq!(DEFAULT_SETTINGS.len(), 14);
    }

    #[test]
    fn test_display_weeks_bounds() {
        assert_eq!(validate_display_weeks(1).unwrap(), 1);
        assert_eq!(validate_display_weeks(MAX_DISPLAY_WEEKS).unwrap(), MAX_DISPLAY_WEEKS);
        assert!(matches!(validate_display_weeks(0), Err(SchedulerError::InvalidInput(_))));
        assert!(matches!(validate_display_weeks(20_000_000), Err(SchedulerError::InvalidInput(_))));

        assert!(validate_value(SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT, " 6 ").is_ok());
        assert!(validate_value(SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT, "53").is_err());
        assert!(validate_value(SCHEDULE_SHEETS_DISPLAY_WEEKS_COUNT, "four").is_err());
        assert!(validate_value(DRY_RUN, "anything").is_ok());
    }
}
