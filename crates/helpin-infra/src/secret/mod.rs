//! Secrets. Read from the process environment only, never from config.toml.

pub mod env;

pub use env::EnvSecrets;
