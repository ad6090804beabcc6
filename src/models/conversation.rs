//! Chatbot conversation models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: i64,
    pub user_id: String,
    pub platform: String,
    pub user_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub is_active: bool,
    pub current_intent: Option<String>,
    pub conversation_context: Option<Json<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub message_text: String,
    pub message_type: String,
    pub detected_intent: Option<String>,
    pub intent_confidence: Option<f64>,
    pub ai_response: Option<String>,
    pub platform_message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub processing_error: Option<String>,
    pub is_escalated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Incoming,
    Outgoing,
    QuickReply,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Incoming => "incoming",
            MessageType::Outgoing => "outgoing",
            MessageType::QuickReply => "quick_reply",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub conversation_id: i64,
    pub message_text: String,
    pub message_type: MessageType,
    pub detected_intent: Option<String>,
    pub intent_confidence: Option<f64>,
    pub ai_response: Option<String>,
    pub platform_message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IntentLog {
    pub id: i64,
    pub message_id: i64,
    pub detected_intent: String,
    pub confidence_score: f64,
    pub detection_method: String,
    pub ai_analysis: Option<Json<serde_json::Value>>,
    pub keywords_found: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EscalationLog {
    pub id: i64,
    pub message_id: i64,
    pub conversation_id: i64,
    pub reason: String,
    pub escalation_method: String,
    pub notified_at: DateTime<Utc>,
    pub notification_sent: bool,
    pub notification_error: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
}
