//! Iverton command line entry point.
//!
//! Binary name: `ivt`
//!
//! Parses CLI arguments, opens the stores, dispatches to the command handler,
//! then flushes pending persistence writes before exit.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = iverton_observe::tracing_setup::filter_for_verbosity(cli.verbose, cli.quiet);
    iverton_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "ivt", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let result = dispatch(&state, cli.command, cli.json).await;

    state.flush_all().await;
    iverton_observe::tracing_setup::shutdown_tracing();

    result
}

async fn dispatch(state: &AppState, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Widget { action } => cli::widget::handle_widget_command(action, state, json).await,
        Commands::Automation { action } => {
            cli::automation::handle_automation_command(action, state, json).await
        }
        Commands::Notes { action } => cli::notes::handle_notes_command(action, state, json).await,
        Commands::Settings { action } => cli::settings::handle_settings_command(action, state, json),
        Commands::Auth { action } => cli::auth::handle_auth_command(action, state, json).await,
        Commands::Crm { action } => cli::crm::handle_crm_command(action, state, json),
        Commands::Status => cli::status::status(state, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}
