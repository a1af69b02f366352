//! Capped per-principal store of saved exchanges.

pub mod repository;
pub mod service;
pub mod title;

pub use repository::ConversationRepository;
pub use service::ConversationStore;
pub use title::derive_title;
