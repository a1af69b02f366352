//! Gateway configuration types.
//!
//! `GatewayConfig` represents `config.toml` in the data directory. Every
//! field has a default, so an empty or missing file yields a working gateway.
//! Secrets (model key, JWT secret) are never read from this file.

use serde::{Deserialize, Serialize};

use crate::conversation::MAX_CONVERSATIONS_PER_OWNER;
use crate::quota::{DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW_MINUTES};

/// Fixed instruction prepended to every model request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "אתה \"מורה בכיס\", עוזר לימודי חכם, חברותי ומעודד, שעוזר לתלמידי תיכון בישראל להצליח בלימודים ובבגרויות.

כללים חשובים:
• ענה תמיד בעברית, בשפה ברורה ומותאמת לגיל תיכון.
• פרק בעיות מורכבות לשלבים קטנים וממוספרים.
• השתמש בדוגמאות קונקרטיות מהחיים הישראליים כשרלוונטי.
• כשמדובר בחומר בגרות, ציין את הנושא הרלוונטי (מתמטיקה, אנגלית, היסטוריה, פיזיקה וכד').
• עודד ותמוך. תלמידים לפעמים לחוצים ומוצפים.
• אם שאלה חורגת לגמרי מתחום לימודים (משהו לא הולם, פוליטי, עצות רפואיות וכד'), סרב בנימוס והציע לחזור ללימודים.
• אל תכתוב תשובות ארוכות מדי. הישאר ממוקד וקצר.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub conversations: ConversationConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Rolling quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,

    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// How often expired windows are swept from memory.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u32,
}

fn default_max_per_window() -> u32 {
    DEFAULT_MAX_PER_WINDOW
}

fn default_window_minutes() -> u32 {
    DEFAULT_WINDOW_MINUTES
}

fn default_sweep_interval_minutes() -> u32 {
    10
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_per_window: default_max_per_window(),
            window_minutes: default_window_minutes(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

/// Saved conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_max_per_owner")]
    pub max_per_owner: u32,
}

fn default_max_per_owner() -> u32 {
    MAX_CONVERSATIONS_PER_OWNER
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_per_owner: default_max_per_owner(),
        }
    }
}

/// Model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible endpoint. `None` uses the provider default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_output_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}
