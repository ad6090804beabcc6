//! Hand-off rules for conversations the assistant should not answer alone

use crate::agent::config::SENSITIVE_KEYWORDS;
use crate::agent::intent::Intent;

pub const LONG_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    SensitiveTopic,
    LongMessage,
    UnclearIntent,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::SensitiveTopic => "sensitive_topic",
            EscalationReason::LongMessage => "long_message",
            EscalationReason::UnclearIntent => "low_confidence_unknown",
        }
    }
}

/// Why a message needs a human, if it does
pub fn escalation_reason(message: &str, intent: Intent, confidence: f64, intent_threshold: f64) -> Option<EscalationReason> {
    if matches!(intent, Intent::Volunteer | Intent::Faq) && confidence >= intent_threshold {
        return None;
    }

    let lower = message.to_lowercase();
    if SENSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Some(EscalationReason::SensitiveTopic);
    }
    if message.chars().count() > LONG_MESSAGE_CHARS {
        return Some(EscalationReason::LongMessage);
    }
    if intent == Intent::Unknown && confidence < 0.3 {
        return Some(EscalationReason::UnclearIntent);
    }
    None
}

pub fn should_escalate(message: &str, intent: Intent, confidence: f64) -> bool {
    escalation_reason(message, intent, confidence, 0.5).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confident_known_intent_never_escalates() {
        assert!(!should_escalate("I have a complaint about volunteering", Intent::Volunteer, 0.8));
        assert!(!should_escalate(&"x".repeat(600), Intent::Faq, 0.5));
    }

    #[test]
    fn test_sensitive_keywords_escalate() {
        assert_eq!(
            escalation_reason("I need a REFUND", Intent::Faq, 0.4, 0.5),
            Some(EscalationReason::SensitiveTopic)
        );
    }

    #[test]
    fn test_long_messages_escalate() {
        assert_eq!(
            escalation_reason(&"a".repeat(501), Intent::Volunteer, 0.2, 0.5),
            Some(EscalationReason::LongMessage)
        );
        assert!(!should_escalate(&"a".repeat(500), Intent::Volunteer, 0.2));
    }

    #[test]
    fn test_unknown_low_confidence_escalates() {
        assert!(should_escalate("asdf", Intent::Unknown, 0.0));
        assert!(!should_escalate("asdf", Intent::Unknown, 0.4));
        assert!(!should_escalate("hello", Intent::Faq, 0.2));
    }
}
