//! Gemini `generateContent` client
//!
//! The API key travels as the `key` query parameter. Intent classification
//! asks for a JSON verdict; FAQ answers are free text grounded on the
//! knowledge-base context.

use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use crate::agent::config::AI_UNAVAILABLE_MESSAGE;
use crate::agent::intent::{Intent, IntentResult};
use crate::config::settings::AgentConfig;
use crate::utils::errors::{Result, SchedulerError};
use crate::utils::helpers::clip_chars;

const SYSTEM_PROMPT: &str = "You are Vietnam Hearts Assistant, a helpful AI agent for Vietnam Hearts, \
a volunteering organization that helps children in Vietnam.

Your role is to:
1. Help people learn about Vietnam Hearts and our mission
2. Guide people interested in volunteering to sign up
3. Answer general questions about our organization
4. Provide helpful, friendly, and professional responses

Key information about Vietnam Hearts:
- We are a volunteering organization helping children in Vietnam
- We offer teaching and non-teaching volunteer opportunities
- We have locations in Vietnam where volunteers can help
- We provide training and support for volunteers

Always be friendly, welcoming and honest about what you know and don't know.
If you're unsure about something, suggest contacting the team directly.";

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IntentVerdict {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    keywords_found: Vec<String>,
}

/// Remove a surrounding markdown code fence such as ```` ```json ... ``` ````
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    match inner.find('\n') {
        Some(newline) if !inner[..newline].trim_start().starts_with('{') => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}

/// Interpret the classifier's reply; non-JSON replies fall back to word spotting
pub fn parse_intent_response(text: &str) -> IntentResult {
    match serde_json::from_str::<IntentVerdict>(strip_code_fences(text)) {
        Ok(verdict) => IntentResult {
            intent: Intent::from_label(&verdict.intent),
            confidence: verdict.confidence.clamp(0.0, 1.0),
            method: "ai".to_string(),
            details: json!({
                "reasoning": verdict.reasoning,
                "keywords_found": verdict.keywords_found,
                "ai_response": text,
            }),
            keywords_found: verdict.keywords_found,
        },
        Err(_) => {
            let lower = text.to_lowercase();
            let (intent, confidence) = if lower.contains("volunteer") {
                (Intent::Volunteer, 0.6)
            } else if lower.contains("faq") || lower.contains("question") {
                (Intent::Faq, 0.6)
            } else {
                (Intent::Unknown, 0.0)
            };
            IntentResult {
                intent,
                confidence,
                method: "ai".to_string(),
                keywords_found: Vec::new(),
                details: json!({
                    "reasoning": format!("Failed to parse JSON, extracted from text: {}", clip_chars(text, 100)),
                    "ai_response": text,
                }),
            }
        }
    }
}

fn intent_prompt(message: &str) -> String {
    format!(
        r#"Analyze this message and determine the user's intent:

Message: "{message}"

Please classify the intent as one of:
1. "volunteer" - User is interested in volunteering, helping, teaching, or getting involved
2. "faq" - User is asking general questions about Vietnam Hearts, locations, schedules, etc.
3. "unknown" - Intent is unclear or doesn't fit the above categories

Respond in this exact JSON format:
{{
    "intent": "volunteer|faq|unknown",
    "confidence": 0.0-1.0,
    "reasoning": "Brief explanation of why this intent was chosen",
    "keywords_found": ["list", "of", "relevant", "keywords"]
}}"#
    )
}

fn faq_prompt(question: &str, context: &str) -> String {
    format!(
        r#"{SYSTEM_PROMPT}

Document Context (Vietnam Hearts Information):
{context}

User Question: "{question}"

Please provide a helpful, informative response about Vietnam Hearts using the document context provided above.

Guidelines:
- Use specific information from the provided context when available
- Be encouraging and welcoming
- If you don't have specific information about something, suggest contacting the team directly
- Keep your response friendly, professional, and under 200 words

At the end of your response, add a brief citation like: "Source: Vietnam Hearts Documentation" if you used specific information from the context."#
    )
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let api_key = config.gemini_api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("Gemini API key not configured; AI features are disabled");
        }
        Ok(Self {
            http: reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_url: config.gemini_api_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key,
        })
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn completion returning the first candidate's text
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SchedulerError::Gemini("API key not configured".to_string()))?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt.to_string()) }],
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Gemini request");
        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.api_url, self.model))
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SchedulerError::Gemini(format!("API error ({}): {}", status, message)));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .first()
            .map(|c| c.content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SchedulerError::Gemini("No content in Gemini response".to_string()));
        }
        Ok(text)
    }

    /// AI classification; unavailable or failing calls yield unknown at 0.0
    pub async fn detect_intent(&self, message: &str) -> IntentResult {
        if !self.is_available() {
            return IntentResult::unknown("ai", "AI model not available");
        }

        let started = Instant::now();
        match self.generate(&intent_prompt(message)).await {
            Ok(text) => {
                let result = parse_intent_response(&text);
                info!(
                    intent = %result.intent,
                    confidence = result.confidence,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "AI intent detection completed"
                );
                result
            }
            Err(e) => {
                error!(error = %e, "AI intent detection failed");
                IntentResult::unknown("ai", format!("Error occurred: {}", e))
            }
        }
    }

    pub async fn generate_faq_response(&self, question: &str, context: &str) -> String {
        if !self.is_available() {
            return AI_UNAVAILABLE_MESSAGE.to_string();
        }
        match self.generate(&faq_prompt(question, context)).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!(error = %e, "FAQ generation failed");
                AI_UNAVAILABLE_MESSAGE.to_string()
            }
        }
    }

    pub fn status(&self) -> Value {
        json!({ "available": self.is_available(), "model": self.model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str, key: Option<&str>) -> AgentConfig {
        let mut config = Settings::default().agent;
        config.gemini_api_url = url.to_string();
        config.gemini_api_key = key.map(str::to_string);
        config
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_verdict() {
        let result = parse_intent_response(
            "```json\n{\"intent\":\"faq\",\"confidence\":0.85,\"reasoning\":\"asks where\",\"keywords_found\":[\"where\"]}\n```",
        );
        assert_eq!(result.intent, Intent::Faq);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.keywords_found, vec!["where"]);
    }

    #[test]
    fn test_parse_non_json_fallbacks() {
        assert_eq!(parse_intent_response("They want to Volunteer").intent, Intent::Volunteer);
        let faq = parse_intent_response("looks like a question");
        assert_eq!((faq.intent, faq.confidence), (Intent::Faq, 0.6));
        let unknown = parse_intent_response("no idea");
        assert_eq!((unknown.intent, unknown.confidence), (Intent::Unknown, 0.0));
    }

    #[tokio::test]
    async fn test_detect_intent_without_key() {
        let client = GeminiClient::new(&config("http://localhost:1", None)).unwrap();
        let result = client.detect_intent("hello").await;
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(client.generate_faq_response("q", "").await, AI_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_detect_intent_via_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"intent\":\"volunteer\",\"confidence\":0.9}" }] }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri(), Some("test-key"))).unwrap();
        let result = client.detect_intent("I want to help").await;
        assert_eq!(result.intent, Intent::Volunteer);
        assert_eq!(result.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_api_error_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": { "message": "boom" } })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri(), Some("k"))).unwrap();
        assert_eq!(client.detect_intent("hi").await.intent, Intent::Unknown);
        assert_eq!(client.generate_faq_response("q", "ctx").await, AI_UNAVAILABLE_MESSAGE);
    }
}
