//! Effective quota settings.
//!
//! Rate windows live in the server's memory, so the CLI can only report the
//! limits a running server would apply, not anyone's current usage.

use std::path::Path;

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use helpin_infra::config::load_gateway_config;
use helpin_infra::filesystem::resolve_data_dir;
use helpin_types::config::GatewayConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaSettings {
    max_per_window: u32,
    window_minutes: u32,
    sweep_interval_minutes: u32,
    max_conversations_per_owner: u32,
}

impl From<&GatewayConfig> for QuotaSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_per_window: config.quota.max_per_window,
            window_minutes: config.quota.window_minutes,
            sweep_interval_minutes: config.quota.sweep_interval_minutes,
            max_conversations_per_owner: config.conversations.max_per_owner,
        }
    }
}

pub async fn quota(json: bool) -> Result<()> {
    let data_dir = resolve_data_dir();
    let settings = QuotaSettings::from(&load_gateway_config(&data_dir).await);

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} HelpIN v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    print_config_source(&data_dir);
    println!();
    println!("{}", render_table(&settings));
    println!();
    Ok(())
}

fn print_config_source(data_dir: &Path) {
    let file = data_dir.join("config.toml");
    if file.exists() {
        println!("  Config: {}", style(file.display()).dim());
    } else {
        println!("  Config: {}", style("built-in defaults").dim());
    }
}

fn render_table(settings: &QuotaSettings) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![
        "Messages per window".to_string(),
        settings.max_per_window.to_string(),
    ]);
    table.add_row(vec![
        "Window".to_string(),
        format!("{}m", settings.window_minutes),
    ]);
    table.add_row(vec![
        "Sweep interval".to_string(),
        format!("{}m", settings.sweep_interval_minutes),
    ]);
    table.add_row(vec![
        "Saved conversations per user".to_string(),
        settings.max_conversations_per_owner.to_string(),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let mut config = GatewayConfig::default();
        config.quota.max_per_window = 5;
        config.conversations.max_per_owner = 3;

        let settings = QuotaSettings::from(&config);
        assert_eq!(settings.max_per_window, 5);
        assert_eq!(settings.max_conversations_per_owner, 3);

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["maxPerWindow"], 5);
        assert_eq!(json["windowMinutes"], config.quota.window_minutes);
    }

    #[test]
    fn test_render_table_contains_values() {
        let settings = QuotaSettings::from(&GatewayConfig::default());
        let rendered = render_table(&settings).to_string();
        assert!(rendered.contains("Messages per window"));
        assert!(rendered.contains("20"));
        assert!(rendered.contains("60m"));
    }
}
