//! CLI command definitions and dispatch for the `ivt` binary.
//!
//! Uses clap derive macros for argument parsing. Commands follow a noun-verb
//! pattern (e.g., `ivt widget add`, `ivt notes search`), one module per store.

pub mod auth;
pub mod automation;
pub mod crm;
pub mod notes;
pub mod settings;
pub mod status;
pub mod widget;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Drive the Iverton marketing dashboard from the terminal.
#[derive(Parser)]
#[command(name = "ivt", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "IVERTON_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage dashboard widgets (add, list, resize, toggle, remove, load).
    Widget {
        #[command(subcommand)]
        action: widget::WidgetCommand,
    },

    /// Inspect and refresh cached automation results.
    #[command(alias = "auto")]
    Automation {
        #[command(subcommand)]
        action: automation::AutomationCommand,
    },

    /// Manage notes (add, list, search, pin, delete).
    Notes {
        #[command(subcommand)]
        action: notes::NotesCommand,
    },

    /// Show or change user settings.
    Settings {
        #[command(subcommand)]
        action: settings::SettingsCommand,
    },

    /// Sign in, sign up, sign out.
    Auth {
        #[command(subcommand)]
        action: auth::AuthCommand,
    },

    /// Manage CRM contacts and the sales pipeline.
    Crm {
        #[command(subcommand)]
        action: crm::CrmCommand,
    },

    /// System status dashboard.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Render a timestamp relative to now ("3m ago", "2d ago").
pub(crate) fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Spinner shown while a webhook call is in flight.
pub(crate) fn spinner(message: impl Into<String>) -> anyhow::Result<indicatif::ProgressBar> {
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_style(
        indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?,
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ivt", "status", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn relative_time_buckets() {
        let now = chrono::Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - chrono::Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - chrono::Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - chrono::Duration::days(2))), "2d ago");
    }
}
