//! Chatbot conversation repository implementation

use sqlx::PgPool;
use sqlx::types::Json;
use chrono::Utc;
use crate::models::{Conversation, ChatMessage, NewChatMessage, IntentLog, EscalationLog};
use crate::utils::errors::SchedulerError;

const CONVERSATION_COLUMNS: &str = "id, user_id, platform, user_name, started_at, last_message_at, \
    is_active, current_intent, conversation_context";

const MESSAGE_COLUMNS: &str = "id, conversation_id, message_text, message_type, detected_intent, \
    intent_confidence, ai_response, platform_message_id, timestamp, processing_error, is_escalated";

#[derive(Debug, Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return the active conversation for a sender or start a new one.
    /// A known display name is saved on the conversation.
    pub async fn get_or_create_active(
        &self,
        user_id: &str,
        platform: &str,
        user_name: Option<&str>,
    ) -> Result<Conversation, SchedulerError> {
        let user_name = user_name.map(str::trim).filter(|n| !n.is_empty());
        let existing = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM conversations
            WHERE user_id = $1 AND platform = $2 AND is_active = TRUE
            ORDER BY last_message_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(conversation) = existing {
            return match user_name {
                Some(name) if conversation.user_name.as_deref() != Some(name) => {
                    let renamed = sqlx::query_as::<_, Conversation>(&format!(
                        "UPDATE conversations SET user_name = $2 WHERE id = $1 RETURNING {CONVERSATION_COLUMNS}"
                    ))
                    .bind(conversation.id)
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;
                    Ok(renamed)
                }
                _ => Ok(conversation),
            };
        }

        let now = Utc::now();
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            INSERT INTO conversations (user_id, platform, user_name, started_at, last_message_at, is_active)
            VALUES ($1, $2, $3, $4, $4, TRUE)
            RETURNING {CONVERSATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(platform)
        .bind(user_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    pub async fn insert_message(&self, message: NewChatMessage) -> Result<ChatMessage, SchedulerError> {
        let stored = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            INSERT INTO messages (conversation_id, message_text, message_type, detected_intent,
                intent_confidence, ai_response, platform_message_id, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.conversation_id)
        .bind(message.message_text)
        .bind(message.message_type.as_str())
        .bind(message.detected_intent)
        .bind(message.intent_confidence)
        .bind(message.ai_response)
        .bind(message.platform_message_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    pub async fn set_message_intent(&self, message_id: i64, intent: &str, confidence: f64) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE messages SET detected_intent = $2, intent_confidence = $3 WHERE id = $1")
            .bind(message_id)
            .bind(intent)
            .bind(confidence)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_message_error(&self, message_id: i64, error: &str) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE messages SET processing_error = $2 WHERE id = $1")
            .bind(message_id)
            .bind(error)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn mark_escalated(&self, message_id: i64) -> Result<(), SchedulerError> {
        sqlx::query("UPDATE messages SET is_escalated = TRUE WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Latest messages of a conversation in chronological order
    pub async fn recent_messages(&self, conversation_id: i64, limit: i64) -> Result<Vec<ChatMessage>, SchedulerError> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn update_conversation(
        &self,
        conversation_id: i64,
        current_intent: &str,
        context: serde_json::Value,
    ) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET current_intent = $2, conversation_context = $3, last_message_at = $4
            WHERE id = $1
            "#
        )
        .bind(conversation_id)
        .bind(current_intent)
        .bind(Json(context))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_intent_log(
        &self,
        message_id: i64,
        intent: &str,
        confidence: f64,
        method: &str,
        ai_analysis: Option<serde_json::Value>,
        keywords: Vec<String>,
    ) -> Result<IntentLog, SchedulerError> {
        let log = sqlx::query_as::<_, IntentLog>(
            r#"
            INSERT INTO intent_logs (message_id, detected_intent, confidence_score, detection_method,
                ai_analysis, keywords_found, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, message_id, detected_intent, confidence_score, detection_method,
                ai_analysis, keywords_found, created_at
            "#
        )
        .bind(message_id)
        .bind(intent)
        .bind(confidence)
        .bind(method)
        .bind(ai_analysis.map(Json))
        .bind(Json(keywords))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    pub async fn insert_escalation_log(
        &self,
        message_id: i64,
        conversation_id: i64,
        reason: &str,
        method: &str,
    ) -> Result<EscalationLog, SchedulerError> {
        let log = sqlx::query_as::<_, EscalationLog>(
            r#"
            INSERT INTO escalation_logs (message_id, conversation_id, reason, escalation_method,
                notified_at, notification_sent)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id, message_id, conversation_id, reason, escalation_method, notified_at,
                notification_sent, notification_error, resolved_at, resolved_by, resolution_notes
            "#
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(reason)
        .bind(method)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Returns (conversations, messages, escalations)
    pub async fn counts(&self) -> Result<(i64, i64, i64), SchedulerError> {
        let counts: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM conversations),
                   (SELECT COUNT(*) FROM messages),
                   (SELECT COUNT(*) FROM escalation_logs)
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
