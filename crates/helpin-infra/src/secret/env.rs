//! Environment variable secrets.
//!
//! Key resolution:
//! - Model key: `AI_GATEWAY_API_KEY`, then `OPENAI_API_KEY`
//! - Token secret: `JWT_SECRET`
//!
//! Empty or non-Unicode values count as absent.

use secrecy::SecretString;

pub const AI_GATEWAY_API_KEY: &str = "AI_GATEWAY_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const JWT_SECRET: &str = "JWT_SECRET";

/// Secrets needed by the gateway.
pub struct EnvSecrets {
    /// Absent means chat is disabled (503) but the server still runs.
    pub model_api_key: Option<SecretString>,
    pub jwt_secret: Option<SecretString>,
}

impl EnvSecrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve through an arbitrary lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            model_api_key: get(AI_GATEWAY_API_KEY)
                .or_else(|| get(OPENAI_API_KEY))
                .map(SecretString::from),
            jwt_secret: get(JWT_SECRET).map(SecretString::from),
        }
    }
}
