//! Keyword lists and response templates for the chatbot

use crate::services::messenger::QuickReply;

pub const AGENT_NAME: &str = "Vietnam Hearts Assistant";

pub const VOLUNTEER_KEYWORDS: &[&str] = &[
    "volunteer", "volunteering", "help", "teach", "teaching", "assist", "join",
    "sign up", "signup", "participate", "contribute", "get involved",
];

pub const FAQ_KEYWORDS: &[&str] = &[
    "location", "where", "when", "time", "schedule", "hours", "address", "contact",
    "phone", "email", "website", "info", "information", "what", "how", "why",
    "cost", "price", "free", "donation",
];

pub const LOCATION_KEYWORDS: &[&str] = &["location", "where", "address"];

pub const SCHEDULE_KEYWORDS: &[&str] = &["when", "time", "schedule", "hours"];

pub const DONATION_KEYWORDS: &[&str] = &[
    "donate", "donation", "money", "support", "fund", "funding", "give", "contribute", "financial",
];

pub const SENSITIVE_KEYWORDS: &[&str] = &[
    "complaint", "problem", "issue", "urgent", "emergency", "safety", "money",
    "payment", "refund", "legal", "lawyer", "sue", "suing",
];

pub const DEFAULT_FACEBOOK_LINK: &str = "https://facebook.com/vietnamhearts";
pub const DEFAULT_INSTAGRAM_LINK: &str = "https://instagram.com/vietnamhearts";

pub const VOLUNTEER_TEMPLATE: &str = "Thank you for your interest in volunteering with Vietnam Hearts! \
We are always looking for volunteer teachers and assistants 🙌\n\n\
You can sign up here: {{signup_link}}\n\n\
We'd love to have you join our community of volunteers making a difference in Vietnam!";

pub const TEACHING_NOTE: &str = "We have both teaching and non-teaching opportunities available!";

pub const FAQ_FOLLOW_UP: &str = "Is there anything else I can help you with?";

pub const FALLBACK_TEMPLATE: &str = "I'm not sure how to help with that just yet, but someone from our \
team will get back to you soon! In the meantime, you can:\n\n\
• Sign up to volunteer: {{signup_link}}\n\
• Check our FAQ: {{faq_link}}\n\
• Contact us directly: {{contact_link}}";

pub const ESCALATION_MESSAGE: &str = "I've forwarded your message to our team. They'll get back to you \
within 24 hours. Thank you for your patience! 🙏";

pub const ERROR_MESSAGE: &str = "I'm sorry, I'm having trouble processing your message right now. \
Please try again or contact our team directly.";

pub const RATE_LIMITED_MESSAGE: &str = "You're sending messages a little too quickly. \
Please wait a moment and try again.";

pub const AI_UNAVAILABLE_MESSAGE: &str = "I'm sorry, I'm having trouble processing your question right now. \
Please contact our team directly and they'll be happy to help!";

pub fn volunteer_quick_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Sign Up Now", "SIGNUP"),
        QuickReply::new("Learn More", "LEARN_MORE"),
        QuickReply::new("Contact Us", "CONTACT"),
    ]
}

pub fn faq_quick_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Volunteer", "VOLUNTEER"),
        QuickReply::new("More Questions", "FAQ"),
        QuickReply::new("Contact Team", "CONTACT"),
    ]
}

pub fn fallback_quick_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Volunteer", "VOLUNTEER"),
        QuickReply::new("FAQ", "FAQ"),
        QuickReply::new("Contact Team", "CONTACT"),
    ]
}

pub fn escalation_quick_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Sign Up to Volunteer", "SIGNUP"),
        QuickReply::new("Check FAQ", "FAQ"),
    ]
}

pub fn error_quick_replies() -> Vec<QuickReply> {
    vec![
        QuickReply::new("Contact Team", "CONTACT"),
        QuickReply::new("Try Again", "RETRY"),
    ]
}
