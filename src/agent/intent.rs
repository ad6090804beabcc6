//! Intent detection
//!
//! Keyword matching runs locally; the hybrid detector combines it with the
//! Gemini classification.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::agent::config::{FAQ_KEYWORDS, VOLUNTEER_KEYWORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Volunteer,
    Faq,
    Unknown,
    Escalation,
    Error,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Volunteer => "volunteer",
            Intent::Faq => "faq",
            Intent::Unknown => "unknown",
            Intent::Escalation => "escalation",
            Intent::Error => "error",
        }
    }

    /// Labels returned by the classifier; anything unrecognised is unknown
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "volunteer" => Intent::Volunteer,
            "faq" => Intent::Faq,
            _ => Intent::Unknown,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub confidence: f64,
    pub method: String,
    pub keywords_found: Vec<String>,
    pub details: Value,
}

impl IntentResult {
    pub fn unknown(method: &str, reasoning: impl Into<String>) -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            method: method.to_string(),
            keywords_found: Vec::new(),
            details: json!({ "reasoning": reasoning.into() }),
        }
    }
}

fn matching(keywords: &[&str], message: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|kw| message.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}

/// Keyword-count classification
///
/// Confidence is matches per word, doubled and capped at 0.9. The side with
/// more matches wins only when its raw ratio exceeds 0.1.
pub fn detect_intent_keywords(message: &str) -> IntentResult {
    let lower = message.to_lowercase();
    let volunteer = matching(VOLUNTEER_KEYWORDS, &lower);
    let faq = matching(FAQ_KEYWORDS, &lower);

    let words = message.split_whitespace().count().max(1) as f64;
    let volunteer_confidence = volunteer.len() as f64 / words;
    let faq_confidence = faq.len() as f64 / words;

    let (intent, ratio, keywords_found) = if volunteer.len() > faq.len() && volunteer_confidence > 0.1 {
        (Intent::Volunteer, volunteer_confidence, volunteer)
    } else if faq.len() > volunteer.len() && faq_confidence > 0.1 {
        (Intent::Faq, faq_confidence, faq)
    } else {
        return IntentResult {
            keywords_found: Vec::new(),
            ..IntentResult::unknown("keyword", "no dominant keyword group")
        };
    };

    IntentResult {
        intent,
        confidence: (ratio * 2.0).min(0.9),
        method: "keyword".to_string(),
        details: json!({ "keywords_found": keywords_found }),
        keywords_found,
    }
}

/// Merge keyword and AI classifications
pub fn combine_hybrid(keyword: &IntentResult, ai: &IntentResult) -> IntentResult {
    let (intent, confidence, method, keywords_found) = if keyword.confidence > 0.7 && ai.confidence > 0.7 {
        if keyword.intent == ai.intent {
            (ai.intent, (ai.confidence * 1.1).min(1.0), "hybrid_agreement", ai.keywords_found.clone())
        } else {
            (ai.intent, ai.confidence * 0.8, "hybrid_disagreement", ai.keywords_found.clone())
        }
    } else if ai.confidence > keyword.confidence {
        (ai.intent, ai.confidence, "ai_preferred", ai.keywords_found.clone())
    } else {
        (keyword.intent, keyword.confidence, "keyword_preferred", keyword.keywords_found.clone())
    };

    IntentResult {
        intent,
        confidence,
        method: method.to_string(),
        keywords_found,
        details: json!({
            "method": method,
            "keyword_intent": keyword.intent,
            "keyword_confidence": keyword.confidence,
            "ai_intent": ai.intent,
            "ai_confidence": ai.confidence,
            "ai_analysis": ai.details,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ai(intent: Intent, confidence: f64) -> IntentResult {
        IntentResult {
            intent,
            confidence,
            method: "ai".to_string(),
            keywords_found: vec![],
            details: Value::Null,
        }
    }

    #[test]
    fn test_volunteer_keywords() {
        let result = detect_intent_keywords("I want to volunteer");
        assert_eq!(result.intent, Intent::Volunteer);
        assert!((result.confidence - 0.5).abs() < 1e-9);
        assert_eq!(result.keywords_found, vec!["volunteer"]);
    }

    #[test]
    fn test_faq_keywords() {
        let result = detect_intent_keywords("Where is the class location?");
        assert_eq!(result.intent, Intent::Faq);
        assert!(result.confidence > 0.0 && result.confidence <= 0.9);
    }

    #[test]
    fn test_tie_is_unknown() {
        let result = detect_intent_keywords("hello there");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert!(detect_intent_keywords("").keywords_found.is_empty());
    }

    #[test]
    fn test_hybrid_agreement_and_disagreement() {
        let kw = IntentResult { confidence: 0.9, ..detect_intent_keywords("volunteer teach") };
        let agreed = combine_hybrid(&kw, &ai(Intent::Volunteer, 0.95));
        assert_eq!(agreed.method, "hybrid_agreement");
        assert_eq!(agreed.confidence, 1.0);

        let disagreed = combine_hybrid(&kw, &ai(Intent::Faq, 0.8));
        assert_eq!(disagreed.method, "hybrid_disagreement");
        assert_eq!(disagreed.intent, Intent::Faq);
        assert!((disagreed.confidence - 0.64).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_prefers_higher() {
        let kw = detect_intent_keywords("I want to volunteer");
        let unavailable = IntentResult::unknown("ai", "unavailable");
        let result = combine_hybrid(&kw, &unavailable);
        assert_eq!(result.method, "keyword_preferred");
        assert_eq!(result.intent, Intent::Volunteer);

        let result = combine_hybrid(&kw, &ai(Intent::Faq, 0.6));
        assert_eq!(result.method, "ai_preferred");
        assert_eq!(result.intent, Intent::Faq);
    }

    #[test]
    fn test_intent_labels() {
        assert_eq!(Intent::from_label(" FAQ "), Intent::Faq);
        assert_eq!(Intent::from_label("question"), Intent::Unknown);
    }

    proptest! {
        #[test]
        fn keyword_confidence_is_bounded(message in ".{0,200}") {
            let result = detect_intent_keywords(&message);
            prop_assert!(result.confidence >= 0.0 && result.confidence <= 0.9);
            if result.intent == Intent::Unknown {
                prop_assert_eq!(result.confidence, 0.0);
            }
        }
    }
}
