//! Volunteer repository implementation

use sqlx::PgPool;
use sqlx::types::Json;
use chrono::Utc;
use crate::models::{Volunteer, CreateVolunteerRequest, VolunteerSummary};
use crate::models::email::EMAIL_TYPE_CONFIRMATION;
use crate::utils::errors::SchedulerError;

const VOLUNTEER_COLUMNS: &str = "id, name, email, positions, teaching_experience, phone, location, \
    availability, start_date, commitment_duration, experience_details, teaching_certificate, \
    vietnamese_proficiency, additional_support, additional_info, is_active, email_unsubscribe_token, \
    weekly_reminders_subscribed, all_emails_subscribed, last_email_sent_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct VolunteerRepository {
    pool: PgPool,
}

impl VolunteerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new volunteer. The email is stored lower-cased.
    pub async fn create(&self, request: CreateVolunteerRequest, unsubscribe_token: Option<String>) -> Result<Volunteer, SchedulerError> {
        let now = Utc::now();
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            r#"
            INSERT INTO volunteers (name, email, positions, teaching_experience, phone, location,
                availability, start_date, commitment_duration, experience_details, teaching_certificate,
                vietnamese_proficiency, additional_support, additional_info, email_unsubscribe_token,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            RETURNING {VOLUNTEER_COLUMNS}
            "#
        ))
        .bind(request.name.trim())
        .bind(request.email.trim().to_lowercase())
        .bind(Json(request.positions))
        .bind(request.teaching_experience)
        .bind(request.phone)
        .bind(request.location)
        .bind(Json(request.availability))
        .bind(request.start_date)
        .bind(request.commitment_duration)
        .bind(request.experience_details)
        .bind(request.teaching_certificate)
        .bind(request.vietnamese_proficiency)
        .bind(Json(request.additional_support))
        .bind(request.additional_info)
        .bind(unsubscribe_token)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(volunteer)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Volunteer>, SchedulerError> {
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            "SELECT {VOLUNTEER_COLUMNS} FROM volunteers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(volunteer)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Volunteer>, SchedulerError> {
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            "SELECT {VOLUNTEER_COLUMNS} FROM volunteers WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(volunteer)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Volunteer>, SchedulerError> {
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            "SELECT {VOLUNTEER_COLUMNS} FROM volunteers WHERE email_unsubscribe_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(volunteer)
    }

    /// All volunteers, newest first
    pub async fn list_all(&self) -> Result<Vec<Volunteer>, SchedulerError> {
        let volunteers = sqlx::query_as::<_, Volunteer>(&format!(
            "SELECT {VOLUNTEER_COLUMNS} FROM volunteers ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(volunteers)
    }

    pub async fn list_active(&self) -> Result<Vec<Volunteer>, SchedulerError> {
        let volunteers = sqlx::query_as::<_, Volunteer>(&format!(
            "SELECT {VOLUNTEER_COLUMNS} FROM volunteers WHERE is_active = TRUE ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(volunteers)
    }

    /// Active volunteers still subscribed to weekly reminders
    pub async fn list_weekly_recipients(&self) -> Result<Vec<Volunteer>, SchedulerError> {
        let volunteers = sqlx::query_as::<_, Volunteer>(&format!(
            r#"
            SELECT {VOLUNTEER_COLUMNS} FROM volunteers
            WHERE is_active = TRUE AND weekly_reminders_subscribed = TRUE
            ORDER BY name ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(volunteers)
    }

    /// Active volunteers still subscribed to announcements
    pub async fn list_announcement_recipients(&self) -> Result<Vec<Volunteer>, SchedulerError> {
        let volunteers = sqlx::query_as::<_, Volunteer>(&format!(
            r#"
            SELECT {VOLUNTEER_COLUMNS} FROM volunteers
            WHERE is_active = TRUE AND all_emails_subscribed = TRUE
            ORDER BY name ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(volunteers)
    }

    /// Active volunteers that never had a confirmation email recorded
    pub async fn list_without_confirmation(&self) -> Result<Vec<Volunteer>, SchedulerError> {
        let volunteers = sqlx::query_as::<_, Volunteer>(&format!(
            r#"
            SELECT {VOLUNTEER_COLUMNS} FROM volunteers v
            WHERE v.is_active = TRUE
              AND NOT EXISTS (
                SELECT 1 FROM email_communications ec
                WHERE ec.volunteer_id = v.id AND ec.email_type = $1
              )
            ORDER BY v.created_at ASC
            "#
        ))
        .bind(EMAIL_TYPE_CONFIRMATION)
        .fetch_all(&self.pool)
        .await?;

        Ok(volunteers)
    }

    pub async fn summaries(&self) -> Result<Vec<VolunteerSummary>, SchedulerError> {
        let summaries = sqlx::query_as::<_, VolunteerSummary>(
            r#"
            SELECT v.id, v.name, v.email, v.is_active, v.weekly_reminders_subscribed,
                   v.all_emails_subscribed, v.created_at, v.last_email_sent_at,
                   EXISTS (
                     SELECT 1 FROM email_communications ec
                     WHERE ec.volunteer_id = v.id AND ec.email_type = $1
                   ) AS confirmation_sent
            FROM volunteers v
            ORDER BY v.created_at DESC
            "#
        )
        .bind(EMAIL_TYPE_CONFIRMATION)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    /// Lower-cased emails of every stored volunteer
    pub async fn all_emails(&self) -> Result<Vec<String>, SchedulerError> {
        let emails: Vec<(String,)> = sqlx::query_as("SELECT email FROM volunteers")
            .fetch_all(&self.pool)
            .await?;

        Ok(emails.into_iter().map(|(email,)| email.to_lowercase()).collect())
    }

    pub async fn set_unsubscribe_token(&self, id: i64, token: &str) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE volunteers SET email_unsubscribe_token = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Update subscription flags; `is_active = None` keeps the current value
    pub async fn update_preferences(
        &self,
        id: i64,
        weekly_reminders: bool,
        all_emails: bool,
        is_active: Option<bool>,
    ) -> Result<Volunteer, SchedulerError> {
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            r#"
            UPDATE volunteers
            SET weekly_reminders_subscribed = $2,
                all_emails_subscribed = $3,
                is_active = COALESCE($4, is_active),
                updated_at = $5
            WHERE id = $1
            RETURNING {VOLUNTEER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(weekly_reminders)
        .bind(all_emails)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        volunteer.ok_or(SchedulerError::VolunteerNotFound { volunteer_id: id })
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<Volunteer, SchedulerError> {
        let volunteer = sqlx::query_as::<_, Volunteer>(&format!(
            "UPDATE volunteers SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING {VOLUNTEER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        volunteer.ok_or(SchedulerError::VolunteerNotFound { volunteer_id: id })
    }

    pub async fn touch_last_email_sent(&self, id: i64) -> Result<(), SchedulerError> {
        let now = Utc::now();
        sqlx::query("UPDATE volunteers SET last_email_sent_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Returns (total, active)
    pub async fn counts(&self) -> Result<(i64, i64), SchedulerError> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM volunteers"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
