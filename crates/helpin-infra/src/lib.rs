//! Infrastructure implementations for the HelpIN gateway.
//!
//! Provides the SQLite conversation repository, the OpenAI-compatible model
//! invoker, JWT verification, configuration loading and secret resolution.
//! Implements the port traits defined in `helpin-core`.

pub mod auth;
pub mod config;
pub mod filesystem;
pub mod llm;
pub mod secret;
pub mod sqlite;
