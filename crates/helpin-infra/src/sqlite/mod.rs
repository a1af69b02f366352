//! SQLite persistence.

pub mod conversation;
pub mod pool;
