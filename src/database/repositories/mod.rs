//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod volunteer;
pub mod email;
pub mod setting;
pub mod admin;
pub mod conversation;

// Re-export repositories
pub use volunteer::VolunteerRepository;
pub use email::EmailCommunicationRepository;
pub use setting::SettingRepository;
pub use admin::AdminUserRepository;
pub use conversation::ConversationRepository;
