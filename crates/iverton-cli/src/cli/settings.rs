//! Settings subcommands.

use anyhow::{Result, bail};
use clap::{Subcommand, ValueEnum};
use console::style;

use iverton_types::settings::{Settings, Theme};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show current settings.
    Show,

    /// Switch theme (light, dark, system).
    Theme { theme: Theme },

    /// Flip desktop notifications on or off.
    Notifications,

    /// Set a single setting.
    Set { key: SettingKey, value: String },

    /// Restore defaults.
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SettingKey {
    Language,
    Notifications,
    AutoRefresh,
    RefreshInterval,
    CompactMode,
}

pub fn handle_settings_command(cmd: SettingsCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        SettingsCommand::Show => {}
        SettingsCommand::Theme { theme } => state.settings.set_theme(theme),
        SettingsCommand::Notifications => {
            state.settings.toggle_notifications();
        }
        SettingsCommand::Set { key, value } => {
            let apply = parse_change(key, &value)?;
            state.settings.update(apply);
        }
        SettingsCommand::Reset => state.settings.reset(),
    }
    print_settings(&state.settings.settings(), json)
}

/// Validate `value` for `key` and return the change to apply.
fn parse_change(key: SettingKey, value: &str) -> Result<Box<dyn FnOnce(&mut Settings)>> {
    let change: Box<dyn FnOnce(&mut Settings)> = match key {
        SettingKey::Language => {
            let language = value.trim().to_string();
            if language.is_empty() {
                bail!("Language must not be empty");
            }
            Box::new(move |s: &mut Settings| s.language = language)
        }
        SettingKey::Notifications => {
            let on = parse_bool(value)?;
            Box::new(move |s: &mut Settings| s.notifications_enabled = on)
        }
        SettingKey::AutoRefresh => {
            let on = parse_bool(value)?;
            Box::new(move |s: &mut Settings| s.auto_refresh = on)
        }
        SettingKey::CompactMode => {
            let on = parse_bool(value)?;
            Box::new(move |s: &mut Settings| s.compact_mode = on)
        }
        SettingKey::RefreshInterval => {
            let minutes: u32 = value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Refresh interval must be a whole number of minutes"))?;
            Box::new(move |s: &mut Settings| s.default_refresh_interval = minutes)
        }
    };
    Ok(change)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => bail!("Expected on/off, got '{other}'"),
    }
}

fn print_settings(settings: &Settings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let flag = |on: bool| {
        if on {
            style("on").green().to_string()
        } else {
            style("off").dim().to_string()
        }
    };

    println!();
    println!("  {}", style("── Settings ──").dim());
    println!("  Theme:            {}", style(settings.theme).cyan());
    println!("  Language:         {}", settings.language);
    println!("  Notifications:    {}", flag(settings.notifications_enabled));
    println!("  Auto refresh:     {}", flag(settings.auto_refresh));
    println!("  Refresh interval: {} min", settings.default_refresh_interval);
    println!("  Compact mode:     {}", flag(settings.compact_mode));
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_change_applies_values() {
        let mut settings = Settings::default();
        parse_change(SettingKey::CompactMode, "on").unwrap()(&mut settings);
        parse_change(SettingKey::RefreshInterval, "15").unwrap()(&mut settings);
        parse_change(SettingKey::Language, " fr ").unwrap()(&mut settings);
        assert!(settings.compact_mode);
        assert_eq!(settings.default_refresh_interval, 15);
        assert_eq!(settings.language, "fr");
    }

    #[test]
    fn parse_change_rejects_bad_input() {
        assert!(parse_change(SettingKey::AutoRefresh, "sometimes").is_err());
        assert!(parse_change(SettingKey::RefreshInterval, "-3").is_err());
        assert!(parse_change(SettingKey::Language, "  ").is_err());
    }
}
