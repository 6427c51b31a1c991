//! Automation hub subcommands.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use iverton_core::automation::RefreshOutcome;
use iverton_types::automation::{AutomationResult, AutomationStatus};

use super::widget::ParamsArgs;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum AutomationCommand {
    /// List every automation with its freshness.
    #[command(alias = "ls")]
    List,

    /// Show one automation including its cached data.
    Show { id: String },

    /// Refresh one automation, or every stale one when no id is given.
    Refresh { id: Option<String> },

    /// List automations whose data needs refreshing.
    Stale,

    /// Force an automation stale so the next refresh fetches it.
    #[command(name = "mark-stale")]
    MarkStale { id: String },

    /// Set the refresh interval of an automation, in minutes.
    Interval { id: String, minutes: u32 },

    /// Set the parameters sent with every refresh.
    Params {
        #[command(flatten)]
        params: ParamsArgs,
    },
}

pub async fn handle_automation_command(
    cmd: AutomationCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        AutomationCommand::List => print_results(state, &state.hub.results(), json),
        AutomationCommand::Show { id } => show(state, &id, json),
        AutomationCommand::Refresh { id: Some(id) } => refresh_one(state, &id, json).await,
        AutomationCommand::Refresh { id: None } => refresh_stale(state, json).await,
        AutomationCommand::Stale => print_results(state, &state.hub.get_stale_automations(), json),
        AutomationCommand::MarkStale { id } => {
            if !state.hub.mark_as_stale(&id) {
                bail!("Automation '{id}' not found");
            }
            done(json, serde_json::json!({"id": id, "status": "stale"}), format!("'{id}' marked stale"))
        }
        AutomationCommand::Interval { id, minutes } => {
            if !state.hub.set_refresh_interval(&id, minutes) {
                bail!("Automation '{id}' not found");
            }
            let minutes = state.hub.get(&id).map_or(minutes, |r| r.refresh_interval);
            done(
                json,
                serde_json::json!({"id": id, "refresh_interval": minutes}),
                format!("'{id}' refreshes every {minutes} min"),
            )
        }
        AutomationCommand::Params { params } => {
            let params = params.into_params();
            state.hub.set_params(params.clone());
            done(json, serde_json::to_value(&params)?, "Refresh parameters saved".to_string())
        }
    }
}

fn show(state: &AppState, id: &str, json: bool) -> Result<()> {
    let Some(result) = state.hub.get(id) else {
        bail!("Automation '{id}' not found");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("  {}  {}", style("ID:").bold(), style(&result.id).cyan());
    println!("  {}  {}", style("Kind:").bold(), result.kind);
    println!("  {}  {}", style("Status:").bold(), status_label(state, &result));
    println!("  {}  every {} min", style("Refresh:").bold(), result.refresh_interval);
    if let Some(error) = &result.error {
        println!("  {}  {}", style("Error:").bold(), style(error).red());
    }
    if let Some(data) = &result.data {
        println!();
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    println!();
    Ok(())
}

async fn refresh_one(state: &AppState, id: &str, json: bool) -> Result<()> {
    let spinner = (!json).then(|| super::spinner(format!("Refreshing {id}..."))).transpose()?;
    let outcome = state.hub.refresh(id).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(id, &outcome))?);
        return Ok(());
    }
    if outcome == RefreshOutcome::UnknownId {
        bail!("Automation '{id}' not found");
    }
    print_outcome(id, &outcome);
    Ok(())
}

async fn refresh_stale(state: &AppState, json: bool) -> Result<()> {
    let spinner = (!json).then(|| super::spinner("Refreshing stale automations...")).transpose()?;
    let outcomes = state.hub.refresh_all_stale().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if json {
        let list: Vec<serde_json::Value> = outcomes.iter().map(|(id, o)| outcome_json(id, o)).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if outcomes.is_empty() {
        println!("  {} Everything is fresh.", style("✓").green().bold());
        return Ok(());
    }
    for (id, outcome) in &outcomes {
        print_outcome(id, outcome);
    }
    Ok(())
}

fn print_results(state: &AppState, results: &[AutomationResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!();
        println!("  {} Nothing to show.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Interval").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for result in results {
        let status_cell = match (result.status, state.hub.is_stale(&result.id)) {
            (AutomationStatus::Fresh, Some(false)) => Cell::new("● fresh").fg(Color::Green),
            (AutomationStatus::Loading, _) => Cell::new("◐ loading").fg(Color::Cyan),
            (AutomationStatus::Error, _) => Cell::new("✗ error").fg(Color::Red),
            _ => Cell::new("○ stale").fg(Color::Yellow),
        };
        let updated = result
            .timestamp
            .as_ref()
            .map_or_else(|| "never".to_string(), super::format_relative_time);
        table.add_row(vec![
            Cell::new(&result.id),
            status_cell,
            Cell::new(updated),
            Cell::new(format!("{} min", result.refresh_interval)),
            Cell::new(result.error.as_deref().unwrap_or("")).fg(Color::Red),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn status_label(state: &AppState, result: &AutomationResult) -> String {
    match (result.status, state.hub.is_stale(&result.id)) {
        (AutomationStatus::Fresh, Some(true)) => format!("{} (interval elapsed)", style("stale").yellow()),
        (AutomationStatus::Fresh, _) => style("fresh").green().to_string(),
        (AutomationStatus::Error, _) => style("error").red().to_string(),
        (status, _) => status.to_string(),
    }
}

fn print_outcome(id: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Fresh => println!("  {} {} refreshed", style("✓").green().bold(), style(id).cyan()),
        RefreshOutcome::Failed(error) => {
            println!("  {} {} failed: {}", style("✗").red().bold(), style(id).cyan(), error)
        }
        RefreshOutcome::InFlight => println!("  {} {} already refreshing", style("i").blue().bold(), id),
        RefreshOutcome::Removed => println!("  {} {} was removed", style("i").blue().bold(), id),
        RefreshOutcome::UnknownId => println!("  {} {} not found", style("✗").red().bold(), id),
    }
}

fn outcome_json(id: &str, outcome: &RefreshOutcome) -> serde_json::Value {
    let (status, error) = match outcome {
        RefreshOutcome::Fresh => ("fresh", None),
        RefreshOutcome::Failed(e) => ("error", Some(e.clone())),
        RefreshOutcome::InFlight => ("in_flight", None),
        RefreshOutcome::Removed => ("removed", None),
        RefreshOutcome::UnknownId => ("unknown", None),
    };
    serde_json::json!({"id": id, "outcome": status, "error": error})
}

fn done(json: bool, value: serde_json::Value, message: String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("  {} {}", style("✓").green().bold(), message);
    }
    Ok(())
}
