//! Static knowledge base consulted before Gemini
//!
//! Loaded from `resources/knowledge_base.toml` (bundled into the binary)
//! or from the file named by `agent.knowledge_base_path`.

use std::fmt::Write as _;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::agent::config::{DONATION_KEYWORDS, FAQ_KEYWORDS, LOCATION_KEYWORDS, SCHEDULE_KEYWORDS, VOLUNTEER_KEYWORDS};
use crate::utils::errors::{Result, SchedulerError};

const BUNDLED: &str = include_str!("../../resources/knowledge_base.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub name: String,
    pub description: String,
    pub mission: String,
    #[serde(default)]
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub primary: String,
    pub details: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Requirements {
    pub teaching: String,
    pub language: String,
    pub commitment: String,
    pub experience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolunteerInfo {
    pub teachers: String,
    pub teaching_assistants: String,
    pub non_teaching: String,
    pub accommodations: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub requirements: Requirements,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Donations {
    pub supplies: String,
    pub cash: String,
    pub international_link: String,
    pub buymeacoffee_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassTime {
    pub grade: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KbTopic {
    Location,
    Schedule,
    Donation,
    Volunteer,
    Organization,
}

impl KbTopic {
    pub fn source(&self) -> &'static str {
        match self {
            KbTopic::Location => "Vietnam Hearts Knowledge Base - Location Information",
            KbTopic::Schedule => "Vietnam Hearts Knowledge Base - Class Schedule & Hours",
            KbTopic::Donation => "Vietnam Hearts Knowledge Base - Donation Information",
            KbTopic::Volunteer => "Vietnam Hearts Knowledge Base - Volunteer Opportunities",
            KbTopic::Organization => "Vietnam Hearts Knowledge Base - Organization Information",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KbMatch {
    pub topic: KbTopic,
    pub content: String,
    pub source: &'static str,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeBase {
    pub organization: Organization,
    pub location: Location,
    pub volunteer: VolunteerInfo,
    pub donations: Donations,
    #[serde(default)]
    pub classes: Vec<ClassTime>,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

impl KnowledgeBase {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SchedulerError::Config(format!("Invalid knowledge base: {}", e)))
    }

    pub fn bundled() -> Result<Self> {
        Self::from_toml(BUNDLED)
    }

    pub async fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                let kb = Self::from_toml(&content)?;
                info!(path = path, "Loaded knowledge base");
                Ok(kb)
            }
            None => Self::bundled(),
        }
    }

    /// Topic lookup: location, schedule, donation, volunteer keywords, then general FAQ keywords
    pub fn search(&self, query: &str, confidence: f64) -> Option<KbMatch> {
        let query = query.to_lowercase();
        let topic = if contains_any(&query, LOCATION_KEYWORDS) {
            KbTopic::Location
        } else if contains_any(&query, SCHEDULE_KEYWORDS) {
            KbTopic::Schedule
        } else if contains_any(&query, DONATION_KEYWORDS) {
            KbTopic::Donation
        } else if contains_any(&query, VOLUNTEER_KEYWORDS) {
            KbTopic::Volunteer
        } else if contains_any(&query, FAQ_KEYWORDS) {
            KbTopic::Organization
        } else {
            return None;
        };

        Some(KbMatch {
            topic,
            content: self.topic_info(topic),
            source: topic.source(),
            confidence,
        })
    }

    pub fn topic_info(&self, topic: KbTopic) -> String {
        match topic {
            KbTopic::Location => self.location_info(),
            KbTopic::Schedule => self.hours_info(),
            KbTopic::Donation => self.donation_info(),
            KbTopic::Volunteer => self.volunteer_info(),
            KbTopic::Organization => self.organization_info(),
        }
    }

    pub fn class_schedule(&self) -> String {
        if self.classes.is_empty() {
            return "Class schedules are being updated. Please contact our team for current information.".to_string();
        }
        let mut text = String::from("📚 **Primary Class Schedule:**\n\n");
        for class in &self.classes {
            let _ = writeln!(text, "• **{}**: {}", class.grade, class.time);
        }
        text.push_str(
            "\n*Schedules can be flexible depending on the needs of the community. \
             Sign up to stay updated about different class availabilities.*",
        );
        text
    }

    pub fn location_info(&self) -> String {
        format!(
            "📍 **Where We Work:**\n\n• **Primary Location**: {}\n• **Details**: {}\n\n\
             We partner with schools and communities across Vietnam to provide educational support.",
            self.location.primary, self.location.details
        )
    }

    pub fn hours_info(&self) -> String {
        let mut text = String::from("🕐 **Main Volunteer Hours & Scheduling:**\n\n");
        if !self.classes.is_empty() {
            text.push_str("**Current Class Times:**\n");
            for class in &self.classes {
                let _ = writeln!(text, "• {}: {}", class.grade, class.time);
            }
            text.push('\n');
        }
        text.push_str("**Flexible Scheduling:**\n");
        let _ = writeln!(
            text,
            "• We primarily teach in person at our location in {}, but we also do other volunteering events when we can.",
            self.location.primary
        );
        text.push_str("• You can choose your preferred time slots\n");
        let _ = writeln!(text, "• {}", self.volunteer.requirements.commitment);
        text
    }

    pub fn volunteer_info(&self) -> String {
        let v = &self.volunteer;
        let r = &v.requirements;
        let mut text = String::from("🙋‍♀️ **Volunteer Opportunities:**\n\n**Available Roles:**\n");
        let _ = writeln!(text, "• **Teachers**: {}", v.teachers);
        let _ = writeln!(text, "• **Teaching Assistants**: {}", v.teaching_assistants);
        let _ = writeln!(text, "• **Non-Teaching Roles**: {}\n", v.non_teaching);
        text.push_str("**Requirements:**\n");
        let _ = writeln!(text, "• **Teaching**: {}", r.teaching);
        let _ = writeln!(text, "• **Language**: {}", r.language);
        let _ = writeln!(text, "• **Commitment**: {}", r.commitment);
        let _ = writeln!(text, "• **Experience**: {}\n", r.experience);
        let _ = writeln!(text, "**Accommodations:**\n• {}\n", v.accommodations);
        if !v.benefits.is_empty() {
            text.push_str("**Benefits:**\n");
            for benefit in &v.benefits {
                let _ = writeln!(text, "• {}", benefit);
            }
        }
        text
    }

    pub fn organization_info(&self) -> String {
        let org = &self.organization;
        let mut text = format!(
            "💙 **About {}:**\n\n**Description**: {}\n\n**Mission**: {}\n\n",
            org.name, org.description, org.mission
        );
        if !org.activities.is_empty() {
            text.push_str("**What We Do:**\n");
            for activity in &org.activities {
                let _ = writeln!(text, "• {}", activity);
            }
            text.push('\n');
        }
        text.push_str(
            "We believe every child deserves access to education, and we are committed to \
             providing a safe and supportive environment for children.",
        );
        text
    }

    pub fn donation_info(&self) -> String {
        let d = &self.donations;
        format!(
            "💝 **Support Vietnam Hearts:**\n\n**How Donations Help:**\n\
             • **Supplies & Food**: {}\n\n• **Financial Support**: {}\n\n\
             **Donation Links:**\n\
             • **International Donations (GoFundMe)**: {}\n\
             • **Support Teachers & Volunteers (Buy Me a Coffee)**: {}\n\n\
             *Note: For VND donations (cash or bank transfer), a team member will get back to you shortly.*",
            d.supplies, d.cash, d.international_link, d.buymeacoffee_link
        )
    }

    /// Context block handed to Gemini for FAQ answers
    pub fn ai_context(&self) -> String {
        [
            format!("Organization: {}", self.organization_info()),
            format!("Location: {}", self.location_info()),
            format!("Volunteer Opportunities: {}", self.volunteer_info()),
            format!("Class Schedule: {}", self.class_schedule()),
        ]
        .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(query: &str) -> Option<KbTopic> {
        KnowledgeBase::bundled().unwrap().search(query, 0.9).map(|m| m.topic)
    }

    #[test]
    fn test_bundled_parses() {
        let kb = KnowledgeBase::bundled().unwrap();
        assert_eq!(kb.organization.name, "Vietnam Hearts");
        assert_eq!(kb.classes.len(), 2);
        assert!(kb.class_schedule().contains("Grade 1"));
    }

    #[test]
    fn test_search_order() {
        // location wins over schedule and donation
        assert_eq!(topic("Where and when can I donate?"), Some(KbTopic::Location));
        assert_eq!(topic("What time do classes start?"), Some(KbTopic::Schedule));
        assert_eq!(topic("Can I give some money?"), Some(KbTopic::Donation));
        assert_eq!(topic("I'd like to teach"), Some(KbTopic::Volunteer));
        assert_eq!(topic("Is it free?"), Some(KbTopic::Organization));
        assert_eq!(topic("hello"), None);
    }

    #[test]
    fn test_match_carries_source_and_confidence() {
        let kb = KnowledgeBase::bundled().unwrap();
        let found = kb.search("where are you located", 0.9).unwrap();
        assert_eq!(found.confidence, 0.9);
        assert_eq!(found.source, KbTopic::Location.source());
        assert!(found.content.contains("Binh Thanh"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(KnowledgeBase::from_toml("organization = 1"), Err(SchedulerError::Config(_))));
    }

    #[test]
    fn test_ai_context_includes_sections() {
        let context = KnowledgeBase::bundled().unwrap().ai_context();
        assert!(context.starts_with("Organization:"));
        assert!(context.contains("Class Schedule:"));
    }
}
