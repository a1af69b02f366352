//! Shared domain types for the HelpIN tutor gateway.
//!
//! Principals, chat messages, saved conversations, quota windows, model
//! requests, configuration, and the error taxonomy shared by every crate.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod principal;
pub mod quota;
