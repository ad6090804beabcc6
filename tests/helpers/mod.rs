//! Test helpers
//!
//! Database setup, an in-process application with recording doubles for
//! mail and Messenger, and volunteer fixtures.

#![allow(dead_code)]

pub mod app;
pub mod data;
pub mod database;

pub use app::*;
pub use data::*;
pub use database::*;
