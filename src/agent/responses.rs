//! Reply construction per intent and quick-reply payload

use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use crate::agent::config::*;
use crate::agent::gemini::GeminiClient;
use crate::agent::intent::Intent;
use crate::agent::knowledge_base::KnowledgeBase;
use crate::config::settings::AgentConfig;
use crate::services::messenger::QuickReply;
use crate::utils::template::render;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    pub response_text: String,
    pub intent: Intent,
    pub confidence: f64,
    pub quick_replies: Vec<QuickReply>,
    pub should_escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

impl AgentResponse {
    fn new(text: impl Into<String>, intent: Intent, confidence: f64, quick_replies: Vec<QuickReply>) -> Self {
        Self {
            response_text: text.into(),
            intent,
            confidence,
            quick_replies,
            should_escalate: false,
            source_type: None,
        }
    }

    pub fn error(reason: Option<&str>) -> Self {
        let text = match reason {
            Some(reason) => format!("I'm sorry, {}. Please try again or contact our team directly.", reason),
            None => ERROR_MESSAGE.to_string(),
        };
        Self {
            should_escalate: true,
            ..Self::new(text, Intent::Error, 0.0, error_quick_replies())
        }
    }
}

#[derive(Clone)]
pub struct ResponseGenerator {
    kb: Arc<KnowledgeBase>,
    gemini: GeminiClient,
    config: AgentConfig,
}

impl ResponseGenerator {
    pub fn new(kb: Arc<KnowledgeBase>, gemini: GeminiClient, config: AgentConfig) -> Self {
        Self { kb, gemini, config }
    }

    fn facebook_link(&self) -> &str {
        self.config.facebook_messenger_link.as_deref().unwrap_or(DEFAULT_FACEBOOK_LINK)
    }

    fn instagram_link(&self) -> &str {
        self.config.instagram_link.as_deref().unwrap_or(DEFAULT_INSTAGRAM_LINK)
    }

    pub fn volunteer_response(&self, message: &str) -> AgentResponse {
        let vars = HashMap::from([("signup_link", self.config.new_user_signup_link.clone())]);
        let mut text = render(VOLUNTEER_TEMPLATE, &vars);
        if message.to_lowercase().contains("teach") {
            text.push_str("\n\n");
            text.push_str(TEACHING_NOTE);
        }
        text.push_str("\n\n");
        text.push_str(&self.kb.volunteer_info());

        AgentResponse::new(text, Intent::Volunteer, 1.0, volunteer_quick_replies())
    }

    /// Knowledge-base answer when confident enough, otherwise Gemini with KB context
    pub async fn faq_response(&self, message: &str, context: &str) -> AgentResponse {
        let kb_threshold = self.config.kb_confidence_threshold;
        let (mut text, confidence, source_type) = match self.kb.search(message, kb_threshold) {
            Some(found) if found.confidence >= kb_threshold => (
                format!("{}\n\n*Source: {}*", found.content, found.source),
                found.confidence,
                "knowledge_base",
            ),
            _ => {
                let context = format!("{}\n\nVietnam Hearts Information:\n{}", context, self.kb.ai_context());
                (
                    self.gemini.generate_faq_response(message, &context).await,
                    self.config.ai_confidence_threshold,
                    "ai_with_context",
                )
            }
        };

        text.push_str("\n\n");
        text.push_str(FAQ_FOLLOW_UP);
        AgentResponse {
            source_type: Some(source_type.to_string()),
            ..AgentResponse::new(text, Intent::Faq, confidence, faq_quick_replies())
        }
    }

    pub fn fallback_response(&self) -> AgentResponse {
        let vars = HashMap::from([
            ("signup_link", self.config.new_user_signup_link.clone()),
            ("faq_link", self.facebook_link().to_string()),
            ("contact_link", self.facebook_link().to_string()),
        ]);
        AgentResponse {
            should_escalate: true,
            ..AgentResponse::new(render(FALLBACK_TEMPLATE, &vars), Intent::Unknown, 0.0, fallback_quick_replies())
        }
    }

    pub fn escalation_response(&self) -> AgentResponse {
        AgentResponse {
            should_escalate: true,
            ..AgentResponse::new(ESCALATION_MESSAGE, Intent::Escalation, 1.0, escalation_quick_replies())
        }
    }

    pub async fn generate(&self, message: &str, intent: Intent, context: &str, escalate: bool) -> AgentResponse {
        if escalate {
            return self.escalation_response();
        }
        match intent {
            Intent::Volunteer => self.volunteer_response(message),
            Intent::Faq => self.faq_response(message, context).await,
            _ => self.fallback_response(),
        }
    }

    pub fn quick_reply_response(&self, payload: &str) -> AgentResponse {
        match payload {
            "SIGNUP" => AgentResponse::new(
                format!(
                    "Great! You can sign up to volunteer here: {}\n\nYou will get an email with more information about the next steps.",
                    self.config.new_user_signup_link
                ),
                Intent::Volunteer,
                1.0,
                vec![QuickReply::new("Learn More", "LEARN_MORE"), QuickReply::new("Contact Us", "CONTACT")],
            ),
            "LEARN_MORE" => AgentResponse::new(
                self.kb.organization_info(),
                Intent::Faq,
                0.9,
                vec![QuickReply::new("Sign Up Now", "SIGNUP"), QuickReply::new("Contact Us", "CONTACT")],
            ),
            "CONTACT" => AgentResponse::new(
                format!(
                    "You can contact our team through:\n\n• Facebook Messenger: {}\n• Instagram: {}\n\nWe'll get back to you within 24 hours!",
                    self.facebook_link(),
                    self.instagram_link()
                ),
                Intent::Faq,
                0.9,
                vec![QuickReply::new("Sign Up to Volunteer", "SIGNUP"), QuickReply::new("Learn More", "LEARN_MORE")],
            ),
            "VOLUNTEER" => self.volunteer_response(""),
            "FAQ" => AgentResponse::new(
                "I'm here to help! What would you like to know about Vietnam Hearts? You can ask about:\n\n\
                 • Our mission and programs\n• Volunteer opportunities\n• Locations and schedules\n• How to get involved",
                Intent::Faq,
                0.8,
                vec![QuickReply::new("Volunteer", "SIGNUP"), QuickReply::new("Contact Team", "CONTACT")],
            ),
            _ => self.fallback_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;

    fn generator() -> ResponseGenerator {
        let mut config = Settings::default().agent;
        config.new_user_signup_link = "https://example.org/signup".to_string();
        let gemini = GeminiClient::new(&config).unwrap();
        ResponseGenerator::new(Arc::new(KnowledgeBase::bundled().unwrap()), gemini, config)
    }

    #[test]
    fn test_volunteer_response_mentions_signup_and_teaching() {
        let response = generator().volunteer_response("Can I teach English?");
        assert!(response.response_text.contains("https://example.org/signup"));
        assert!(response.response_text.contains(TEACHING_NOTE));
        assert_eq!(response.quick_replies[0].payload, "SIGNUP");
        assert!(!response.should_escalate);
    }

    #[tokio::test]
    async fn test_faq_from_knowledge_base() {
        let response = generator().faq_response("Where are you?", "").await;
        assert_eq!(response.source_type.as_deref(), Some("knowledge_base"));
        assert!(response.response_text.contains("*Source: Vietnam Hearts Knowledge Base - Location Information*"));
        assert!(response.response_text.ends_with(FAQ_FOLLOW_UP));
        assert_eq!(response.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_faq_without_kb_match_uses_ai_path() {
        let response = generator().faq_response("hello", "").await;
        assert_eq!(response.source_type.as_deref(), Some("ai_with_context"));
        assert!(response.response_text.starts_with(AI_UNAVAILABLE_MESSAGE));
        assert_eq!(response.confidence, 0.8);
    }

    #[test]
    fn test_fallback_escalates_with_links() {
        let response = generator().fallback_response();
        assert!(response.should_escalate);
        assert!(response.response_text.contains(DEFAULT_FACEBOOK_LINK));
        assert!(!response.response_text.contains("{{"));
    }

    #[tokio::test]
    async fn test_escalation_overrides_intent() {
        let response = generator().generate("I want to volunteer", Intent::Volunteer, "", true).await;
        assert_eq!(response.intent, Intent::Escalation);
        assert_eq!(response.response_text, ESCALATION_MESSAGE);
    }

    #[test]
    fn test_quick_reply_payloads() {
        let generator = generator();
        assert_eq!(generator.quick_reply_response("SIGNUP").intent, Intent::Volunteer);
        assert_eq!(generator.quick_reply_response("CONTACT").confidence, 0.9);
        assert_eq!(generator.quick_reply_response("FAQ").confidence, 0.8);
        assert_eq!(generator.quick_reply_response("VOLUNTEER").intent, Intent::Volunteer);
        let other = generator.quick_reply_response("SOMETHING_ELSE");
        assert_eq!(other.intent, Intent::Unknown);
        assert!(other.should_escalate);
    }
}
