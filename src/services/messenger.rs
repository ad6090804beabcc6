//! Facebook Messenger / Instagram messaging
//!
//! Outgoing messages go through the Graph API send endpoint. Incoming
//! webhook deliveries are parsed into [`InboundEvent`]s for the agent.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use crate::config::settings::Settings;
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::clip_chars;

pub const MAX_TEXT_LENGTH: usize = 2000;
pub const MAX_QUICK_REPLY_TITLE: usize = 20;
pub const MAX_QUICK_REPLIES: usize = 13;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub title: String,
    pub payload: String,
}

impl QuickReply {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { title: title.into(), payload: payload.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessengerButton {
    Postback { title: String, payload: String },
    WebUrl { title: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericElement {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<MessengerButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

pub fn text_payload(recipient: &str, text: &str) -> Value {
    json!({
        "recipient": { "id": recipient },
        "message": { "text": clip_chars(text, MAX_TEXT_LENGTH) }
    })
}

pub fn quick_replies_payload(recipient: &str, text: &str, replies: &[QuickReply]) -> Value {
    let quick_replies: Vec<Value> = replies
        .iter()
        .take(MAX_QUICK_REPLIES)
        .map(|r| {
            json!({
                "content_type": "text",
                "title": clip_chars(&r.title, MAX_QUICK_REPLY_TITLE),
                "payload": r.payload,
            })
        })
        .collect();

    json!({
        "recipient": { "id": recipient },
        "message": {
            "text": clip_chars(text, MAX_TEXT_LENGTH),
            "quick_replies": quick_replies,
        }
    })
}

pub fn button_template_payload(recipient: &str, text: &str, buttons: &[MessengerButton]) -> Value {
    json!({
        "recipient": { "id": recipient },
        "message": {
            "attachment": {
                "type": "template",
                "payload": {
                    "template_type": "button",
                    "text": clip_chars(text, MAX_TEXT_LENGTH),
                    "buttons": buttons,
                }
            }
        }
    })
}

pub fn generic_template_payload(recipient: &str, elements: &[GenericElement]) -> Value {
    json!({
        "recipient": { "id": recipient },
        "message": {
            "attachment": {
                "type": "template",
                "payload": {
                    "template_type": "generic",
                    "elements": elements,
                }
            }
        }
    })
}

/// Outgoing side of the Messenger platform
#[async_trait]
pub trait MessengerSender: Send + Sync {
    /// Post a complete send-API payload, returning the platform message id
    async fn send_payload(&self, payload: Value) -> Result<String>;

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    fn name(&self) -> &'static str;

    async fn send_text(&self, recipient: &str, text: &str) -> Result<String> {
        self.send_payload(text_payload(recipient, text)).await
    }

    async fn send_quick_replies(&self, recipient: &str, text: &str, replies: &[QuickReply]) -> Result<String> {
        if replies.is_empty() {
            return self.send_text(recipient, text).await;
        }
        self.send_payload(quick_replies_payload(recipient, text, replies)).await
    }

    async fn send_button_template(&self, recipient: &str, text: &str, buttons: &[MessengerButton]) -> Result<String> {
        self.send_payload(button_template_payload(recipient, text, buttons)).await
    }

    async fn send_generic_template(&self, recipient: &str, elements: &[GenericElement]) -> Result<String> {
        self.send_payload(generic_template_payload(recipient, elements)).await
    }
}

/// Graph API sender
pub struct GraphMessenger {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GraphMessenger {
    pub fn new(graph_api_url: &str, api_version: &str, access_token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{}/{}", graph_api_url.trim_end_matches('/'), api_version),
            access_token: access_token.to_string(),
        })
    }
}

#[async_trait]
impl MessengerSender for GraphMessenger {
    async fn send_payload(&self, payload: Value) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/me/messages", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(SchedulerError::Messenger(format!("Send API returned {}: {}", status.as_u16(), message)));
        }

        match body.get("message_id").and_then(Value::as_str) {
            Some(id) => {
                debug!(message_id = id, "Messenger message sent");
                Ok(id.to_string())
            }
            None => Err(SchedulerError::Messenger(format!("Unexpected send API response: {}", body))),
        }
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, user_id))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("fields", "first_name,last_name,profile_pic"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(user_id = user_id, status = response.status().as_u16(), "Failed to get user profile");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    fn name(&self) -> &'static str {
        "graph"
    }
}

/// Records payloads instead of sending them
#[derive(Clone, Default)]
pub struct MockMessenger {
    sent: Arc<Mutex<Vec<Value>>>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|p| p.pointer("/recipient/id").and_then(Value::as_str) == Some(recipient))
            .collect()
    }
}

#[async_trait]
impl MessengerSender for MockMessenger {
    async fn send_payload(&self, payload: Value) -> Result<String> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| SchedulerError::Messenger("mock sender poisoned".to_string()))?;
        sent.push(payload);
        let id = format!("mock-mid-{}", sent.len());
        info!(message_id = %id, "[MOCK] Messenger message recorded");
        Ok(id)
    }

    async fn get_user_profile(&self, _user_id: &str) -> Result<Option<UserProfile>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Graph sender when a page token is configured and mocking is off, otherwise the mock
pub fn messenger_from_settings(settings: &Settings) -> Result<Arc<dyn MessengerSender>> {
    let token = settings.messenger.page_access_token.as_deref().filter(|t| !t.is_empty());
    match token {
        Some(token) if !settings.messenger.use_mock => Ok(Arc::new(GraphMessenger::new(
            &settings.messenger.graph_api_url,
            &settings.messenger.api_version,
            token,
        )?)),
        _ => {
            info!("Using mock Messenger sender");
            Ok(Arc::new(MockMessenger::new()))
        }
    }
}

/// Echo `challenge` when the subscription request carries our verify token
pub fn verify_webhook(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>, expected: Option<&str>) -> Option<String> {
    let expected = match expected.filter(|t| !t.is_empty()) {
        Some(expected) => expected,
        None => {
            warn!("Messenger verify token is not configured");
            return None;
        }
    };

    if mode == Some("subscribe") && token == Some(expected) {
        info!("Webhook verified successfully");
        Some(challenge.unwrap_or("OK").to_string())
    } else {
        warn!(mode = ?mode, token_match = token == Some(expected), "Webhook verification failed");
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadHolder {
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quick_reply: Option<PayloadHolder>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<Participant>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub postback: Option<PayloadHolder>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Text { sender: String, text: String, message_id: Option<String> },
    QuickReply { sender: String, payload: String },
    Postback { sender: String, payload: String },
}

impl InboundEvent {
    pub fn sender(&self) -> &str {
        match self {
            InboundEvent::Text { sender, .. }
            | InboundEvent::QuickReply { sender, .. }
            | InboundEvent::Postback { sender, .. } => sender,
        }
    }
}

impl WebhookPayload {
    pub fn is_supported(&self) -> bool {
        matches!(self.object.as_str(), "page" | "instagram")
    }

    pub fn platform(&self) -> &'static str {
        if self.object == "instagram" {
            "instagram"
        } else {
            "messenger"
        }
    }

    /// Actionable events; echoes and events without a sender are skipped
    pub fn events(&self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        for event in self.entry.iter().flat_map(|e| e.messaging.iter()) {
            let Some(sender) = event.sender.as_ref().map(|s| s.id.clone()) else {
                warn!("No sender ID in messaging event");
                continue;
            };

            if let Some(message) = &event.message {
                if message.is_echo {
                    continue;
                }
                if let Some(quick_reply) = message.quick_reply.as_ref().filter(|q| !q.payload.is_empty()) {
                    events.push(InboundEvent::QuickReply { sender, payload: quick_reply.payload.clone() });
                } else if let Some(text) = message.text.as_ref().filter(|t| !t.trim().is_empty()) {
                    events.push(InboundEvent::Text {
                        sender,
                        text: text.clone(),
                        message_id: message.mid.clone(),
                    });
                } else {
                    debug!(sender = %sender, "Ignoring non-text message");
                }
            } else if let Some(postback) = event.postback.as_ref().filter(|p| !p.payload.is_empty()) {
                events.push(InboundEvent::Postback { sender, payload: postback.payload.clone() });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_webhook() {
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("secret"), Some("12345"), Some("secret")),
            Some("12345".to_string())
        );
        assert_eq!(verify_webhook(Some("subscribe"), Some("wrong"), Some("1"), Some("secret")), None);
        assert_eq!(verify_webhook(Some("unsubscribe"), Some("secret"), Some("1"), Some("secret")), None);
        assert_eq!(verify_webhook(Some("subscribe"), Some("secret"), Some("1"), None), None);
    }

    #[test]
    fn test_quick_reply_limits() {
        let replies: Vec<QuickReply> = (0..15)
            .map(|i| QuickReply::new(format!("A very long quick reply title {}", i), format!("P{}", i)))
            .collect();
        let payload = quick_replies_payload("u1", "hi", &replies);
        let sent = payload.pointer("/message/quick_replies").and_then(Value::as_array).unwrap();
        assert_eq!(sent.len(), MAX_QUICK_REPLIES);
        assert_eq!(sent[0]["title"].as_str().unwrap().chars().count(), MAX_QUICK_REPLY_TITLE);
        assert_eq!(sent[0]["content_type"], "text");
    }

    #[test]
    fn test_text_is_truncated() {
        let payload = text_payload("u1", &"x".repeat(2500));
        assert_eq!(payload["message"]["text"].as_str().unwrap().len(), MAX_TEXT_LENGTH);
    }

    #[test]
    fn test_button_serialization() {
        let value = serde_json::to_value(MessengerButton::WebUrl {
            title: "Sign up".to_string(),
            url: "https://example.org".to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "web_url");
    }

    #[test]
    fn test_webhook_events() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [{
                "messaging": [
                    { "sender": { "id": "1" }, "message": { "mid": "m1", "text": "hello" } },
                    { "sender": { "id": "2" }, "message": { "text": "Sign Up", "quick_reply": { "payload": "SIGNUP" } } },
                    { "sender": { "id": "3" }, "postback": { "payload": "FAQ" } },
                    { "sender": { "id": "page" }, "message": { "text": "echo", "is_echo": true } },
                    { "message": { "text": "no sender" } }
                ]
            }]
        }))
        .unwrap();

        assert!(payload.is_supported());
        assert_eq!(
            payload.events(),
            vec![
                InboundEvent::Text { sender: "1".into(), text: "hello".into(), message_id: Some("m1".into()) },
                InboundEvent::QuickReply { sender: "2".into(), payload: "SIGNUP".into() },
                InboundEvent::Postback { sender: "3".into(), payload: "FAQ".into() },
            ]
        );
    }

    #[test]
    fn test_unsupported_object() {
        let payload: WebhookPayload = serde_json::from_value(json!({ "object": "user" })).unwrap();
        assert!(!payload.is_supported());
        assert!(payload.events().is_empty());
    }

    #[tokio::test]
    async fn test_mock_messenger_records() {
        let mock = MockMessenger::new();
        let id = mock.send_quick_replies("u1", "hi", &[QuickReply::new("Yes", "YES")]).await.unwrap();
        assert_eq!(id, "mock-mid-1");
        assert_eq!(mock.sent_to("u1").len(), 1);
        assert!(mock.sent_to("u2").is_empty());
    }
}
