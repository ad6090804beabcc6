//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod volunteer;
pub mod email;
pub mod setting;
pub mod admin;
pub mod conversation;

// Re-export commonly used models
pub use volunteer::{Volunteer, CreateVolunteerRequest, VolunteerSummary, PreferenceChange};
pub use email::{EmailCommunication, EmailStatus, CreateEmailCommunicationRequest};
pub use setting::{Setting, CreateSettingRequest, UpdateSettingRequest};
pub use admin::{AdminUser, AdminRole, CreateAdminUserRequest, UpdateAdminRoleRequest};
pub use conversation::{Conversation, ChatMessage, MessageType, NewChatMessage, IntentLog, EscalationLog};
