//! Volunteer fixtures

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use serde_json::{json, Value};
use HeartsScheduler::database::DatabaseService;
use HeartsScheduler::models::{CreateVolunteerRequest, Volunteer};

pub fn fake_volunteer() -> CreateVolunteerRequest {
    CreateVolunteerRequest {
        name: Name().fake(),
        email: SafeEmail().fake::<String>().to_lowercase(),
        positions: vec!["Teaching Assistant".to_string()],
        teaching_experience: Some("Some experience".to_string()),
        phone: Some(PhoneNumber().fake()),
        location: Some("Ho Chi Minh City".to_string()),
        availability: vec!["Monday".to_string(), "Wednesday".to_string()],
        start_date: None,
        commitment_duration: Some("3 months".to_string()),
        experience_details: None,
        teaching_certificate: None,
        vietnamese_proficiency: Some("Basic".to_string()),
        additional_support: vec![],
        additional_info: None,
    }
}

/// Active volunteer with the given preferences token
pub async fn insert_volunteer(db: &DatabaseService, token: &str) -> Volunteer {
    db.volunteers
        .create(fake_volunteer(), Some(token.to_string()))
        .await
        .expect("volunteer should insert")
}

/// One row of the signup form sheet, columns `A..X`
pub fn signup_row(status: &str, email: &str, first_name: &str) -> Vec<String> {
    let mut row = vec![String::new(); 24];
    row[0] = status.to_string();
    row[1] = "01/15/2025 10:30:00".to_string();
    row[2] = email.to_string();
    row[4] = first_name.to_string();
    row[5] = "Nguyen".to_string();
    row[13] = "+84 90 000 0000".to_string();
    row[14] = "Teaching Assistant".to_string();
    row[15] = "Monday, Friday".to_string();
    row
}

/// Sheets `values.get` response body
pub fn value_range(range: &str, rows: &[Vec<String>]) -> Value {
    json!({
        "range": range,
        "majorDimension": "ROWS",
        "values": rows,
    })
}
