//! Gateway configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.helpin/` in production)
//! and deserializes it into [`GatewayConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::Path;

use helpin_types::config::GatewayConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GatewayConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_gateway_config(data_dir: &Path) -> GatewayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GatewayConfig::default();
        }
    };

    match toml::from_str::<GatewayConfig>(&content) {
        Ok(config) => sanitize(config),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GatewayConfig::default()
        }
    }
}

/// Replace zero values that would disable the gateway with defaults.
fn sanitize(mut config: GatewayConfig) -> GatewayConfig {
    let defaults = GatewayConfig::default();
    if config.quota.window_minutes == 0 {
        tracing::warn!("quota.window_minutes must be positive, using default");
        config.quota.window_minutes = defaults.quota.window_minutes;
    }
    if config.quota.sweep_interval_minutes == 0 {
        tracing::warn!("quota.sweep_interval_minutes must be positive, using default");
        config.quota.sweep_interval_minutes = defaults.quota.sweep_interval_minutes;
    }
    if config.conversations.max_per_owner == 0 {
        tracing::warn!("conversations.max_per_owner must be positive, using default");
        config.conversations.max_per_owner = defaults.conversations.max_per_owner;
    }
    config
}
