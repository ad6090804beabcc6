//! Messenger/Instagram volunteer assistant
//!
//! Classifies incoming messages (keywords plus Gemini), answers from the
//! knowledge base or Gemini, and records every exchange in the
//! conversation tables. Messages it cannot handle are flagged for the team.

pub mod config;
pub mod escalation;
pub mod gemini;
pub mod intent;
pub mod knowledge_base;
pub mod responses;

use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use crate::config::settings::AgentConfig;
use crate::database::ConversationRepository;
use crate::middleware::rate_limit::{SlidingWindowLimiter, WindowLimit};
use crate::models::{ChatMessage, Conversation, MessageType, NewChatMessage};
use crate::utils::errors::Result;
use crate::utils::helpers::clip_chars;
use crate::utils::logging::log_chat_message;

pub use escalation::{escalation_reason, should_escalate, EscalationReason};
pub use gemini::GeminiClient;
pub use intent::{combine_hybrid, detect_intent_keywords, Intent, IntentResult};
pub use knowledge_base::{KbMatch, KbTopic, KnowledgeBase};
pub use responses::{AgentResponse, ResponseGenerator};

fn default_platform() -> String {
    "messenger".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageRequest {
    pub user_id: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub message_text: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub platform_message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuickReplyRequest {
    pub user_id: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub payload: String,
}

/// "Recent conversation" block handed to Gemini
pub fn build_context(messages: &[ChatMessage], truncate: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut context = String::from("Recent conversation:\n");
    for message in messages {
        context.push_str(&format!(
            "- {}: {}...\n",
            message.message_type,
            clip_chars(&message.message_text, truncate)
        ));
    }
    context
}

/// Merge the latest intent into the stored conversation context
pub fn merged_context(conversation: &Conversation, intent: Intent, response: &AgentResponse) -> Value {
    let mut context = conversation
        .conversation_context
        .as_ref()
        .map(|c| c.0.clone())
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));

    if let Some(map) = context.as_object_mut() {
        map.insert("last_intent".to_string(), json!(intent));
        map.insert("last_response_type".to_string(), json!(response.intent));
        map.insert("last_updated".to_string(), json!(Utc::now().to_rfc3339()));
    }
    context
}

#[derive(Clone)]
pub struct VolunteerAgent {
    conversations: ConversationRepository,
    gemini: GeminiClient,
    responses: ResponseGenerator,
    limiter: SlidingWindowLimiter,
    config: AgentConfig,
}

impl VolunteerAgent {
    pub fn new(conversations: ConversationRepository, kb: Arc<KnowledgeBase>, config: AgentConfig) -> Result<Self> {
        let gemini = GeminiClient::new(&config)?;
        let responses = ResponseGenerator::new(kb, gemini.clone(), config.clone());
        let limiter = SlidingWindowLimiter::new(vec![
            WindowLimit::per_minute(config.max_messages_per_minute),
            WindowLimit::per_hour(config.max_messages_per_hour),
        ]);
        info!(name = config::AGENT_NAME, ai_available = gemini.is_available(), "Initialized volunteer agent");
        Ok(Self { conversations, gemini, responses, limiter, config })
    }

    pub fn check_rate_limit(&self, sender: &str) -> Result<()> {
        self.limiter.check(sender)
    }

    /// Forget senders with no message inside the longest limit window
    pub fn cleanup_rate_limits(&self) {
        self.limiter.cleanup_old_entries();
    }

    pub async fn detect_intent(&self, message: &str) -> IntentResult {
        let keyword = detect_intent_keywords(message);
        let ai = self.gemini.detect_intent(message).await;
        combine_hybrid(&keyword, &ai)
    }

    pub async fn process_message(&self, request: &MessageRequest) -> AgentResponse {
        let started = Instant::now();
        let text = clip_chars(&request.message_text, self.config.max_message_length);

        let (conversation, incoming) = match self.record_incoming(request, &text).await {
            Ok(recorded) => recorded,
            Err(e) => {
                error!(user_id = %request.user_id, error = %e, "Failed to record incoming message");
                return AgentResponse::error(None);
            }
        };

        match self.respond(request, &text, &conversation, &incoming).await {
            Ok(response) => {
                info!(
                    user_id = %request.user_id,
                    intent = %response.intent,
                    confidence = response.confidence,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Message processed"
                );
                response
            }
            Err(e) => {
                error!(user_id = %request.user_id, error = %e, "Error processing message");
                if let Err(log_err) = self.conversations.set_message_error(incoming.id, &e.to_string()).await {
                    warn!(error = %log_err, "Failed to record processing error");
                }
                AgentResponse::error(None)
            }
        }
    }

    async fn record_incoming(&self, request: &MessageRequest, text: &str) -> Result<(Conversation, ChatMessage)> {
        let conversation = self
            .conversations
            .get_or_create_active(&request.user_id, &request.platform, request.user_name.as_deref())
            .await?;
        let incoming = self
            .conversations
            .insert_message(NewChatMessage {
                conversation_id: conversation.id,
                message_text: text.to_string(),
                message_type: MessageType::Incoming,
                detected_intent: None,
                intent_confidence: None,
                ai_response: None,
                platform_message_id: request.platform_message_id.clone(),
            })
            .await?;
        Ok((conversation, incoming))
    }

    async fn respond(
        &self,
        request: &MessageRequest,
        text: &str,
        conversation: &Conversation,
        incoming: &ChatMessage,
    ) -> Result<AgentResponse> {
        let detected = self.detect_intent(text).await;
        self.conversations
            .set_message_intent(incoming.id, detected.intent.as_str(), detected.confidence)
            .await?;
        self.conversations
            .insert_intent_log(
                incoming.id,
                detected.intent.as_str(),
                detected.confidence,
                &detected.method,
                Some(detected.details.clone()),
                detected.keywords_found.clone(),
            )
            .await?;

        let reason = escalation_reason(text, detected.intent, detected.confidence, self.config.intent_confidence_threshold);

        let recent = self
            .conversations
            .recent_messages(conversation.id, self.config.recent_messages_limit)
            .await?;
        let context = build_context(&recent, self.config.message_truncate_length);

        let mut response = self.responses.generate(text, detected.intent, &context, reason.is_some()).await;
        response.should_escalate = reason.is_some();

        self.record_outgoing(conversation.id, &response).await?;
        self.conversations
            .update_conversation(
                conversation.id,
                detected.intent.as_str(),
                merged_context(conversation, detected.intent, &response),
            )
            .await?;

        if let Some(reason) = reason {
            info!(conversation_id = conversation.id, user_id = %request.user_id, reason = reason.as_str(), "Escalating conversation");
            self.conversations.mark_escalated(incoming.id).await?;
            self.conversations
                .insert_escalation_log(incoming.id, conversation.id, reason.as_str(), "logged")
                .await?;
        }

        log_chat_message(
            &request.platform,
            &request.user_id,
            detected.intent.as_str(),
            detected.confidence,
            response.should_escalate,
        );
        Ok(response)
    }

    async fn record_outgoing(&self, conversation_id: i64, response: &AgentResponse) -> Result<()> {
        self.conversations
            .insert_message(NewChatMessage {
                conversation_id,
                message_text: response.response_text.clone(),
                message_type: MessageType::Outgoing,
                detected_intent: Some(response.intent.as_str().to_string()),
                intent_confidence: Some(response.confidence),
                ai_response: Some(response.response_text.clone()),
                platform_message_id: None,
            })
            .await?;
        Ok(())
    }

    pub async fn process_quick_reply(&self, request: &QuickReplyRequest) -> AgentResponse {
        let response = self.responses.quick_reply_response(&request.payload);
        match self.record_quick_reply(request, &response).await {
            Ok(()) => {
                log_chat_message(
                    &request.platform,
                    &request.user_id,
                    response.intent.as_str(),
                    response.confidence,
                    response.should_escalate,
                );
                response
            }
            Err(e) => {
                error!(user_id = %request.user_id, payload = %request.payload, error = %e, "Error processing quick reply");
                AgentResponse::error(Some("there was an error processing your selection"))
            }
        }
    }

    async fn record_quick_reply(&self, request: &QuickReplyRequest, response: &AgentResponse) -> Result<()> {
        let conversation = self
            .conversations
            .get_or_create_active(&request.user_id, &request.platform, None)
            .await?;
        self.conversations
            .insert_message(NewChatMessage {
                conversation_id: conversation.id,
                message_text: format!("[Quick Reply: {}]", request.payload),
                message_type: MessageType::QuickReply,
                detected_intent: None,
                intent_confidence: None,
                ai_response: None,
                platform_message_id: None,
            })
            .await?;
        self.record_outgoing(conversation.id, response).await?;
        self.conversations
            .update_conversation(
                conversation.id,
                response.intent.as_str(),
                merged_context(&conversation, response.intent, response),
            )
            .await
    }

    pub async fn health(&self) -> Value {
        let conversations = match self.conversations.counts().await {
            Ok((conversations, messages, escalations)) => json!({
                "conversations": conversations,
                "messages": messages,
                "escalations": escalations,
            }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        json!({
            "status": "healthy",
            "agent": config::AGENT_NAME,
            "gemini": self.gemini.status(),
            "conversations": conversations,
            "rate_limits": self.limiter.statistics(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn message(kind: &str, text: &str) -> ChatMessage {
        ChatMessage {
            id: 1,
            conversation_id: 1,
            message_text: text.to_string(),
            message_type: kind.to_string(),
            detected_intent: None,
            intent_confidence: None,
            ai_response: None,
            platform_message_id: None,
            timestamp: Utc::now(),
            processing_error: None,
            is_escalated: false,
        }
    }

    #[test]
    fn test_build_context_truncates() {
        assert_eq!(build_context(&[], 100), "");
        let context = build_context(&[message("incoming", "hello there"), message("outgoing", &"x".repeat(300))], 10);
        assert!(context.starts_with("Recent conversation:\n- incoming: hello ther...\n"));
        assert!(context.contains(&format!("- outgoing: {}...", "x".repeat(10))));
    }

    #[test]
    fn test_merged_context_keeps_existing_keys() {
        let conversation = Conversation {
            id: 1,
            user_id: "u".to_string(),
            platform: "messenger".to_string(),
            user_name: None,
            started_at: Utc::now(),
            last_message_at: Utc::now(),
            is_active: true,
            current_intent: None,
            conversation_context: Some(Json(json!({ "language": "en" }))),
        };
        let response = AgentResponse::error(None);
        let merged = merged_context(&conversation, Intent::Faq, &response);
        assert_eq!(merged["language"], "en");
        assert_eq!(merged["last_intent"], "faq");
        assert_eq!(merged["last_response_type"], "error");
    }

    #[test]
    fn test_message_request_defaults_platform() {
        let request: MessageRequest =
            serde_json::from_value(json!({ "user_id": "1", "message_text": "hi" })).unwrap();
        assert_eq!(request.platform, "messenger");
    }
}
