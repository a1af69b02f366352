//! Chat gateway logic and port trait definitions for HelpIN.
//!
//! This crate defines the "ports" (`ConversationRepository`, `ModelInvoker`,
//! `RateWindowStore`, `FragmentSink`) that the infrastructure and HTTP
//! layers implement. It depends only on `helpin-types` -- never on
//! `helpin-infra` or any database/IO crate.

pub mod clock;
pub mod conversation;
pub mod gateway;
pub mod llm;
pub mod quota;
pub mod relay;
