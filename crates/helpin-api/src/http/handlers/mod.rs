//! REST API handler modules.

pub mod chat;
pub mod conversation;
pub mod status;
