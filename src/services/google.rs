//! Google Sheets service implementation
//!
//! This service talks to the Sheets REST API with a service-account token.
//! It reads form responses and schedule ranges, writes header cells and
//! rearranges the weekly schedule tabs.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use crate::config::settings::Settings;
use crate::utils::errors::{SchedulerError, GoogleError, Result};
use crate::utils::retry::{retry, RetryPolicy};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Fields we need from a service account key file
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// OAuth2 bearer tokens for a Google service account
#[derive(Debug)]
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| GoogleError::AuthenticationFailed(format!("invalid service account key: {}", e)))?;

        Ok(Self {
            credentials,
            client: reqwest::Client::new(),
            cached_token: RwLock::new(None),
        })
    }

    /// Build from settings; `None` when no key is configured
    pub async fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        if let Some(json) = settings.google.service_account_json.as_deref().filter(|s| !s.trim().is_empty()) {
            return Self::from_json(json).map(Some);
        }
        if let Some(path) = settings.google.service_account_path.as_deref().filter(|s| !s.trim().is_empty()) {
            return Self::from_file(path).await.map(Some);
        }
        Ok(None)
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Valid access token, refreshed 60 seconds before expiry
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (token, expires_in) = self.fetch_new_token().await?;
        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(expires_in),
        });

        Ok(token)
    }

    async fn fetch_new_token(&self) -> Result<(String, u64)> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GoogleError::AuthenticationFailed(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(GoogleError::AuthenticationFailed(format!("token exchange failed ({}): {}", status, text)).into());
        }

        let token: TokenResponse = response.json().await?;
        debug!(client_email = %self.credentials.client_email, "Fetched Google access token");
        Ok((token.access_token, token.expires_in))
    }
}

#[derive(Debug, Clone)]
enum SheetsAuth {
    ServiceAccount(Arc<ServiceAccountAuth>),
    Static(String),
    Disabled,
}

/// Properties of one tab in a spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    pub index: i64,
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: RawSheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: i64,
    #[serde(default)]
    hidden: bool,
}

/// Google Sheets REST client
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http_client: reqwest::Client,
    base_url: String,
    auth: SheetsAuth,
    retry_policy: RetryPolicy,
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetsClient {
    fn build_http_client(settings: &Settings) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.google.timeout_seconds))
            .user_agent("HeartsScheduler/1.0")
            .build()
            .map_err(SchedulerError::Http)
    }

    /// Client authenticated with a service account, or disabled when `auth` is `None`
    pub fn new(settings: &Settings, auth: Option<Arc<ServiceAccountAuth>>) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_http_client(settings)?,
            base_url: settings.google.sheets_api_url.trim_end_matches('/').to_string(),
            auth: auth.map(SheetsAuth::ServiceAccount).unwrap_or(SheetsAuth::Disabled),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Client using a fixed bearer token
    pub fn with_static_token(settings: &Settings, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http_client: Self::build_http_client(settings)?,
            base_url: settings.google.sheets_api_url.trim_end_matches('/').to_string(),
            auth: SheetsAuth::Static(token.into()),
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Copy of this client using a different retry policy
    pub fn with_retry_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            retry_policy: policy,
            ..self.clone()
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.auth, SheetsAuth::Disabled)
    }

    async fn bearer_token(&self) -> Result<String> {
        match &self.auth {
            SheetsAuth::ServiceAccount(auth) => auth.access_token().await,
            SheetsAuth::Static(token) => Ok(token.clone()),
            SheetsAuth::Disabled => Err(GoogleError::NotConfigured.into()),
        }
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.base_url, spreadsheet_id)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(spreadsheet_id), urlencoding::encode(range))
    }

    async fn check_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Value>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(GoogleError::Api { status: status.as_u16(), message }.into())
    }

    async fn get_values_once(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .get(self.values_url(spreadsheet_id, range))
            .bearer_auth(token)
            .send()
            .await?;

        let body = Self::check_response(response).await?;
        let parsed: ValueRangeResponse = serde_json::from_value(body)?;
        Ok(parsed
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    /// Read a range as rows of display strings; missing trailing cells are omitted by the API
    pub async fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let rows = retry(&self.retry_policy, "sheets.get_values", move || {
            self.get_values_once(spreadsheet_id, range)
        })
        .await?;

        debug!(spreadsheet_id = spreadsheet_id, range = range, rows = rows.len(), "Fetched sheet range");
        Ok(rows)
    }

    async fn update_values_once(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .put(self.values_url(spreadsheet_id, range))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token)
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": rows,
            }))
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    pub async fn update_values(&self, spreadsheet_id: &str, range: &str, rows: &[Vec<String>]) -> Result<()> {
        retry(&self.retry_policy, "sheets.update_values", move || {
            self.update_values_once(spreadsheet_id, range, rows)
        })
        .await?;

        debug!(spreadsheet_id = spreadsheet_id, range = range, "Updated sheet range");
        Ok(())
    }

    async fn get_metadata_once(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .get(self.spreadsheet_url(spreadsheet_id))
            .query(&[("fields", "sheets.properties")])
            .bearer_auth(token)
            .send()
            .await?;

        let body = Self::check_response(response).await?;
        let parsed: SpreadsheetResponse = serde_json::from_value(body)?;
        Ok(parsed
            .sheets
            .into_iter()
            .map(|s| SheetProperties {
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
                index: s.properties.index,
                hidden: s.properties.hidden,
            })
            .collect())
    }

    /// All tabs of a spreadsheet in API order
    pub async fn get_metadata(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        retry(&self.retry_policy, "sheets.get_metadata", move || {
            self.get_metadata_once(spreadsheet_id)
        })
        .await
    }

    async fn batch_update_once(&self, spreadsheet_id: &str, requests: &[Value]) -> Result<Value> {
        let token = self.bearer_token().await?;
        let response = self
            .http_client
            .post(format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id)))
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        Self::check_response(response).await
    }

    pub async fn batch_update(&self, spreadsheet_id: &str, requests: &[Value]) -> Result<Value> {
        retry(&self.retry_policy, "sheets.batch_update", move || {
            self.batch_update_once(spreadsheet_id, requests)
        })
        .await
    }

    /// Duplicate a tab, returning the new tab's id
    pub async fn duplicate_sheet(
        &self,
        spreadsheet_id: &str,
        source_sheet_id: i64,
        insert_index: i64,
        new_title: &str,
    ) -> Result<i64> {
        let reply = self
            .batch_update(
                spreadsheet_id,
                &[json!({
                    "duplicateSheet": {
                        "sourceSheetId": source_sheet_id,
                        "insertSheetIndex": insert_index,
                        "newSheetName": new_title,
                    }
                })],
            )
            .await?;

        let new_id = reply
            .pointer("/replies/0/duplicateSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| GoogleError::InvalidData("duplicateSheet reply without sheetId".to_string()))?;

        info!(title = new_title, sheet_id = new_id, index = insert_index, "Duplicated schedule sheet");
        Ok(new_id)
    }

    pub async fn set_sheet_hidden(&self, spreadsheet_id: &str, sheet_id: i64, hidden: bool) -> Result<()> {
        self.batch_update(
            spreadsheet_id,
            &[json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "hidden": hidden },
                    "fields": "hidden",
                }
            })],
        )
        .await?;

        debug!(sheet_id = sheet_id, hidden = hidden, "Changed sheet visibility");
        Ok(())
    }

    pub async fn move_sheet(&self, spreadsheet_id: &str, sheet_id: i64, new_index: i64) -> Result<()> {
        self.batch_update(
            spreadsheet_id,
            &[json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "index": new_index },
                    "fields": "index",
                }
            })],
        )
        .await?;

        debug!(sheet_id = sheet_id, index = new_index, "Moved sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_credentials() {
        let client = SheetsClient::new(&Settings::default(), None).unwrap();
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_values_url_encodes_range() {
        let client = SheetsClient::with_static_token(&Settings::default(), "t").unwrap();
        let url = client.values_url("abc", "Schedule Config!A2:F");
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Schedule%20Config%21A2%3AF"
        );
    }

    #[test]
    fn test_invalid_key_json() {
        let err = ServiceAccountAuth::from_json("{\"client_email\": 1}").unwrap_err();
        assert!(matches!(err, SchedulerError::Google(GoogleError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_disabled_client_reports_not_configured() {
        let client = SheetsClient::new(&Settings::default(), None).unwrap();
        let err = client.get_values("abc", "A1:B2").await.unwrap_err();
        assert!(matches!(err, SchedulerError::Google(GoogleError::NotConfigured)));
    }
}
