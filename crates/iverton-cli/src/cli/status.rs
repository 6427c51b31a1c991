//! System status dashboard command.

use anyhow::Result;
use console::style;

use iverton_types::automation::AutomationStatus;

use crate::state::AppState;

/// Display system status: widgets, automations, records, session, webhook config.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let widgets = state.grid.widgets();
    let visible = widgets.iter().filter(|w| w.is_visible).count();

    let results = state.hub.results();
    let stale = state.hub.get_stale_automations().len();
    let errored = results
        .iter()
        .filter(|r| r.status == AutomationStatus::Error)
        .count();

    let notes = state.notes.notes().len();
    let contacts = state.crm.contacts().len();
    let user = state.auth.restore_session().await;
    let keys = state.durable_keys().await;
    let webhook = &state.config.webhook;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "widgets": { "total": widgets.len(), "visible": visible },
            "automations": { "total": results.len(), "stale": stale, "error": errored },
            "notes": notes,
            "contacts": contacts,
            "signed_in": user.as_ref().map(|u| u.email.clone()),
            "webhooks": {
                "enabled": webhook.enabled,
                "base_url": webhook.base_url,
                "timeout_ms": webhook.timeout_ms,
            },
            "usage_pending": state.usage.pending_len(),
            "stored_keys": keys,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} Iverton v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Dashboard ──").dim());
    println!("  Widgets:     {} ({} visible)", style(widgets.len()).bold(), visible);
    println!(
        "  Automations: {} ({} stale{})",
        style(results.len()).bold(),
        style(stale).yellow(),
        if errored > 0 {
            format!(", {} failing", style(errored).red())
        } else {
            String::new()
        }
    );
    println!("  Notes:       {}", notes);
    println!("  Contacts:    {}", contacts);
    println!();

    println!("  {}", style("── Session ──").dim());
    match &user {
        Some(user) => println!("  Signed in as {} ({})", style(&user.email).cyan(), user.role),
        None => println!("  {}", style("Not signed in").dim()),
    }
    println!();

    println!("  {}", style("── Webhooks ──").dim());
    if webhook.enabled {
        println!("  Status:  {}", style("enabled").green());
        println!("  Base:    {}", style(&webhook.base_url).dim());
        println!("  Timeout: {} ms ({:?})", webhook.timeout_ms, webhook.timeout_policy);
    } else {
        println!("  Status:  {} (generated data)", style("disabled").yellow());
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!("  Stores:   {}", style(keys.join(", ")).dim());
    println!();

    Ok(())
}
