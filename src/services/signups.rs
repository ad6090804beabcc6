//! Signup form response parsing
//!
//! Rows of the form-response spreadsheet are mapped by position onto
//! [`SignupSubmission`] and converted into volunteer create requests.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};
use crate::models::CreateVolunteerRequest;
use crate::utils::helpers::split_list;

/// Column order of the signup form responses sheet (range `A2:X`)
pub const SIGNUP_COLUMNS: [&str; 24] = [
    "applicant_status",
    "timestamp",
    "email_address",
    "score",
    "first_name",
    "last_name",
    "passport_id_number",
    "passport_expiry_date",
    "date_of_birth",
    "passport_upload",
    "headshot_upload",
    "social_media_link",
    "location",
    "phone_number",
    "position_interest",
    "availability",
    "start_date",
    "commitment_duration",
    "teaching_experience",
    "experience_details",
    "teaching_certificate",
    "vietnamese_speaking",
    "other_support",
    "referral_source",
];

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// One row of the signup form
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignupSubmission {
    pub applicant_status: String,
    pub timestamp: Option<NaiveDateTime>,
    pub raw_timestamp: String,
    pub email_address: String,
    pub score: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub passport_id_number: String,
    #[serde(skip_serializing)]
    pub passport_expiry_date: String,
    #[serde(skip_serializing)]
    pub date_of_birth: String,
    #[serde(skip_serializing)]
    pub passport_upload: String,
    #[serde(skip_serializing)]
    pub headshot_upload: String,
    pub social_media_link: String,
    pub location: String,
    pub phone_number: String,
    pub position_interest: String,
    pub availability: String,
    pub start_date: String,
    pub commitment_duration: String,
    pub teaching_experience: String,
    pub experience_details: String,
    pub teaching_certificate: String,
    pub vietnamese_speaking: String,
    pub other_support: String,
    pub referral_source: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SignupSubmission {
    /// Map a sheet row onto the form columns; short rows are padded with empty cells
    pub fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let raw_timestamp = cell(1);
        let timestamp = if raw_timestamp.is_empty() {
            None
        } else {
            match NaiveDateTime::parse_from_str(&raw_timestamp, TIMESTAMP_FORMAT) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(timestamp = %raw_timestamp, "Invalid signup timestamp format");
                    None
                }
            }
        };

        Self {
            applicant_status: cell(0),
            timestamp,
            raw_timestamp,
            email_address: cell(2),
            score: cell(3),
            first_name: cell(4),
            last_name: cell(5),
            passport_id_number: cell(6),
            passport_expiry_date: cell(7),
            date_of_birth: cell(8),
            passport_upload: cell(9),
            headshot_upload: cell(10),
            social_media_link: cell(11),
            location: cell(12),
            phone_number: cell(13),
            position_interest: cell(14),
            availability: cell(15),
            start_date: cell(16),
            commitment_duration: cell(17),
            teaching_experience: cell(18),
            experience_details: cell(19),
            teaching_certificate: cell(20),
            vietnamese_speaking: cell(21),
            other_support: cell(22),
            referral_source: cell(23),
        }
    }

    /// Whether the row carries enough data to be considered
    pub fn is_meaningful(&self) -> bool {
        if self.email_address.is_empty() {
            return false;
        }
        [
            &self.first_name,
            &self.last_name,
            &self.phone_number,
            &self.position_interest,
            &self.availability,
        ]
        .iter()
        .any(|v| !v.is_empty())
    }

    pub fn is_accepted(&self) -> bool {
        self.applicant_status.trim().to_uppercase() == "ACCEPTED"
    }

    pub fn normalized_email(&self) -> String {
        self.email_address.trim().to_lowercase()
    }

    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            "Unknown Volunteer".to_string()
        } else {
            name.to_string()
        }
    }

    pub fn positions(&self) -> Vec<String> {
        split_list(&self.position_interest)
    }

    pub fn availability(&self) -> Vec<String> {
        split_list(&self.availability)
    }

    pub fn additional_support(&self) -> Vec<String> {
        split_list(&self.other_support)
    }

    /// "ASAP" or empty means today; unparseable values also fall back to today
    pub fn parse_start_date(&self, today: NaiveDate) -> NaiveDate {
        let value = self.start_date.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("ASAP") {
            return today;
        }
        NaiveDate::parse_from_str(value, "%m/%d/%Y").unwrap_or_else(|_| {
            warn!(start_date = value, "Invalid start date format, using today");
            today
        })
    }

    pub fn to_create_request(&self, today: NaiveDate) -> CreateVolunteerRequest {
        let or_na = |v: &str| if v.trim().is_empty() { "N/A".to_string() } else { v.trim().to_string() };

        CreateVolunteerRequest {
            name: self.full_name(),
            email: self.normalized_email(),
            positions: self.positions(),
            teaching_experience: non_empty(&self.teaching_experience),
            phone: non_empty(&self.phone_number),
            location: non_empty(&self.location),
            availability: self.availability(),
            start_date: Some(self.parse_start_date(today)),
            commitment_duration: non_empty(&self.commitment_duration),
            experience_details: non_empty(&self.experience_details),
            teaching_certificate: non_empty(&self.teaching_certificate),
            vietnamese_proficiency: non_empty(&self.vietnamese_speaking),
            additional_support: self.additional_support(),
            additional_info: Some(format!(
                "Social Media: {}\nReferral Source: {}",
                or_na(&self.social_media_link),
                or_na(&self.referral_source)
            )),
        }
    }
}

/// Parse sheet rows, dropping rows without an email or without any meaningful field
pub fn parse_submissions(rows: &[Vec<String>]) -> Vec<SignupSubmission> {
    let submissions: Vec<SignupSubmission> = rows
        .iter()
        .map(|row| SignupSubmission::from_row(row))
        .filter(SignupSubmission::is_meaningful)
        .collect();

    debug!(
        total_rows = rows.len(),
        valid = submissions.len(),
        skipped = rows.len() - submissions.len(),
        "Parsed signup submissions"
    );
    submissions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(usize, &str)]) -> Vec<String> {
        let mut row = vec![String::new(); 24];
        for (i, v) in cells {
            row[*i] = v.to_string();
        }
        row
    }

    #[test]
    fn test_short_rows_are_padded() {
        let submission = SignupSubmission::from_row(&["ACCEPTED".to_string(), "".to_string(), "a@b.co".to_string()]);
        assert_eq!(submission.email_address, "a@b.co");
        assert_eq!(submission.referral_source, "");
        assert!(submission.is_accepted());
        assert!(!submission.is_meaningful());
    }

    #[test]
    fn test_parse_skips_empty_rows() {
        let rows = vec![
            row(&[(0, "ACCEPTED"), (2, "one@example.com"), (4, "Ann")]),
            row(&[(0, "ACCEPTED"), (4, "NoEmail")]),
            row(&[(0, "PENDING"), (2, "two@example.com")]),
            row(&[(0, "pending"), (2, "three@example.com"), (15, "Monday")]),
        ];
        let parsed = parse_submissions(&rows);
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].is_accepted());
        assert!(!parsed[1].is_accepted());
    }

    #[test]
    fn test_timestamp_and_start_date() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut s = SignupSubmission::from_row(&row(&[(1, "03/01/2024 10:15:00"), (16, "ASAP")]));
        assert_eq!(s.timestamp.map(|t| t.date()), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(s.parse_start_date(today), today);

        s.start_date = "04/15/2024".to_string();
        assert_eq!(s.parse_start_date(today), NaiveDate::from_ymd_opt(2024, 4, 15).unwrap());

        s.start_date = "next month".to_string();
        assert_eq!(s.parse_start_date(today), today);
    }

    #[test]
    fn test_to_create_request() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let s = SignupSubmission::from_row(&row(&[
            (0, "Accepted"),
            (2, " Jane@Example.COM "),
            (4, "Jane"),
            (5, "Doe"),
            (14, "Teacher, Teaching Assistant"),
            (15, "Monday,Wednesday, "),
            (22, "Photography"),
        ]));
        let req = s.to_create_request(today);
        assert_eq!(req.name, "Jane Doe");
        assert_eq!(req.email, "jane@example.com");
        assert_eq!(req.positions, vec!["Teacher", "Teaching Assistant"]);
        assert_eq!(req.availability, vec!["Monday", "Wednesday"]);
        assert_eq!(req.additional_support, vec!["Photography"]);
        assert_eq!(req.phone, None);
        assert_eq!(req.additional_info.as_deref(), Some("Social Media: N/A\nReferral Source: N/A"));
    }

    #[test]
    fn test_full_name_fallback() {
        let s = SignupSubmission::from_row(&row(&[(2, "x@y.z"), (13, "0123")]));
        assert_eq!(s.full_name(), "Unknown Volunteer");
    }
}
