//! Widget grid subcommands.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use iverton_types::payload::{DataCategory, FetchParams, WidgetContent};
use iverton_types::widget::{Widget, WidgetId, WidgetKind, WidgetSize};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum WidgetCommand {
    /// Add a widget to the grid.
    Add {
        /// Widget kind: a data category (seo-ranking, backlinks, ...), notes,
        /// crm, or a component name such as SEORankingWidget.
        kind: String,

        /// Title shown on the widget (defaults to the kind's name).
        #[arg(long)]
        title: Option<String>,
    },

    /// List widgets in grid order.
    #[command(alias = "ls")]
    List {
        /// Include hidden widgets.
        #[arg(long)]
        all: bool,
    },

    /// Resize a widget (standard or expanded).
    Resize { id: WidgetId, size: WidgetSize },

    /// Show or hide a widget.
    Toggle { id: WidgetId },

    /// Move a widget to a new grid position (0-based).
    Move { id: WidgetId, index: usize },

    /// Remove a widget from the grid.
    #[command(alias = "rm")]
    Remove { id: WidgetId },

    /// Fetch fresh data for a widget.
    Load {
        id: WidgetId,

        #[command(flatten)]
        params: ParamsArgs,
    },

    /// Remove every widget.
    Reset,
}

/// Parameters sent to the data webhooks.
#[derive(clap::Args, Debug, Default)]
pub struct ParamsArgs {
    /// Website to analyse.
    #[arg(long)]
    pub url: Option<String>,

    /// Time window label, e.g. "last 7 days".
    #[arg(long)]
    pub duration: Option<String>,

    /// Keyword to track (repeatable).
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,
}

impl ParamsArgs {
    pub fn into_params(self) -> FetchParams {
        FetchParams {
            website_url: self.url,
            time_duration: self.duration,
            keywords: self.keywords,
        }
    }
}

pub async fn handle_widget_command(cmd: WidgetCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        WidgetCommand::Add { kind, title } => add(state, &kind, title, json),
        WidgetCommand::List { all } => list(state, all, json),
        WidgetCommand::Resize { id, size } => {
            if !state.grid.resize_widget(id, size) {
                bail!("Widget '{id}' not found");
            }
            report(json, serde_json::json!({"id": id, "size": size}), format!("Widget resized to {size}"))
        }
        WidgetCommand::Toggle { id } => {
            let Some(visible) = state.grid.toggle_visibility(id) else {
                bail!("Widget '{id}' not found");
            };
            let label = if visible { "shown" } else { "hidden" };
            report(json, serde_json::json!({"id": id, "visible": visible}), format!("Widget {label}"))
        }
        WidgetCommand::Move { id, index } => {
            if !state.grid.move_widget(id, index) {
                bail!("Widget '{id}' not found");
            }
            report(json, serde_json::json!({"id": id, "index": index}), format!("Widget moved to position {index}"))
        }
        WidgetCommand::Remove { id } => {
            let removed = state.grid.remove_widget(id);
            let message = if removed { "Widget removed" } else { "Widget was already gone" };
            report(json, serde_json::json!({"id": id, "removed": removed}), message.to_string())
        }
        WidgetCommand::Load { id, params } => load(state, id, params.into_params(), json).await,
        WidgetCommand::Reset => {
            state.grid.reset_layout();
            report(json, serde_json::json!({"reset": true}), "Layout reset".to_string())
        }
    }
}

/// Accept category slugs and short names as well as component names.
fn parse_kind(raw: &str) -> WidgetKind {
    if let Ok(category) = raw.parse::<DataCategory>() {
        return match category {
            DataCategory::SeoRanking => WidgetKind::SeoRanking,
            DataCategory::Backlinks => WidgetKind::Backlinks,
            DataCategory::Hashtags => WidgetKind::Hashtags,
            DataCategory::CompetitorIntel => WidgetKind::CompetitorIntel,
            DataCategory::TrafficOverview => WidgetKind::TrafficOverview,
        };
    }
    match raw.to_lowercase().as_str() {
        "notes" => WidgetKind::Notes,
        "crm" => WidgetKind::Crm,
        _ => WidgetKind::from(raw.to_string()),
    }
}

fn add(state: &AppState, raw_kind: &str, title: Option<String>, json: bool) -> Result<()> {
    let kind = parse_kind(raw_kind);
    let id = state.grid.add_widget(kind, title);
    let Some(widget) = state.grid.get(id) else {
        bail!("Widget '{id}' vanished after creation");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&widget)?);
        return Ok(());
    }

    println!();
    println!("  {} Widget added", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Title:").bold(), style(&widget.title).cyan());
    println!("  {}   {}", style("Kind:").bold(), widget.kind);
    println!("  {}     {}", style("ID:").bold(), style(widget.id).dim());
    println!();
    Ok(())
}

fn list(state: &AppState, all: bool, json: bool) -> Result<()> {
    let widgets = if all {
        state.grid.widgets()
    } else {
        state.grid.visible_widgets()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&widgets)?);
        return Ok(());
    }

    if widgets.is_empty() {
        println!();
        println!(
            "  {} No widgets yet. Add one with {}",
            style("i").blue().bold(),
            style("ivt widget add seo-ranking").cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Size").fg(Color::White),
        Cell::new("Visible").fg(Color::White),
        Cell::new("Data").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for (index, widget) in widgets.iter().enumerate() {
        let size_cell = match widget.size {
            WidgetSize::Expanded => Cell::new("expanded").fg(Color::Cyan),
            WidgetSize::Standard => Cell::new("standard"),
        };
        let visible_cell = if widget.is_visible {
            Cell::new("● yes").fg(Color::Green)
        } else {
            Cell::new("○ no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(index),
            Cell::new(&widget.title),
            Cell::new(widget.kind.component_name()),
            size_cell,
            visible_cell,
            Cell::new(content_summary(widget)),
            Cell::new(widget.id).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn load(state: &AppState, id: WidgetId, params: FetchParams, json: bool) -> Result<()> {
    let Some(widget) = state.grid.get(id) else {
        bail!("Widget '{id}' not found");
    };
    if widget.kind.category().is_none() {
        bail!("Widget '{}' ({}) has no data to load", widget.title, widget.kind);
    }

    let spinner = (!json).then(|| super::spinner(format!("Loading {}...", widget.title))).transpose()?;
    let loaded = state.data_service.load_widget(&state.grid, id, &params).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let Some(widget) = state.grid.get(id).filter(|_| loaded) else {
        bail!("Widget '{id}' was removed before its data arrived");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&widget)?);
        return Ok(());
    }

    let source = if state.gateway.is_enabled() { "webhook" } else { "generated" };
    println!();
    println!(
        "  {} {} loaded ({})",
        style("✓").green().bold(),
        style(&widget.title).cyan(),
        style(source).dim()
    );
    println!("  {}", content_summary(&widget));
    println!();
    Ok(())
}

fn content_summary(widget: &Widget) -> String {
    match &widget.content {
        None => "-".to_string(),
        Some(WidgetContent::SeoRanking(d)) => {
            format!("{} keywords, visibility {:.1}", d.keywords.len(), d.visibility_score)
        }
        Some(WidgetContent::Backlinks(d)) => {
            format!("{} backlinks from {} domains", d.total_backlinks, d.referring_domains)
        }
        Some(WidgetContent::Hashtags(d)) => format!("{} hashtags", d.hashtags.len()),
        Some(WidgetContent::CompetitorIntel(d)) => format!("{} competitors", d.competitors.len()),
        Some(WidgetContent::TrafficOverview(d)) => {
            format!("{} sessions, {:.1}% bounce", d.sessions, d.bounce_rate * 100.0)
        }
        Some(WidgetContent::Unknown(_)) => "unrecognised payload".to_string(),
    }
}

fn report(json: bool, value: serde_json::Value, message: String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("  {} {}", style("✓").green().bold(), message);
    }
    Ok(())
}
