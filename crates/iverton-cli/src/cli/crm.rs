//! CRM subcommands.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use iverton_types::crm::{Contact, ContactDraft, PipelineStage};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum CrmCommand {
    /// Add a contact as a new lead.
    Add {
        name: String,
        email: String,

        #[arg(long)]
        company: Option<String>,

        /// Expected deal value.
        #[arg(long, default_value_t = 0.0)]
        value: f64,
    },

    /// List contacts.
    #[command(alias = "ls")]
    List {
        /// Only contacts in this stage.
        #[arg(long)]
        stage: Option<PipelineStage>,
    },

    /// Move a contact to another pipeline stage.
    Stage { id: Uuid, stage: PipelineStage },

    /// Record that a contact was reached today.
    Touch { id: Uuid },

    /// Remove a contact.
    #[command(alias = "rm")]
    Remove {
        id: Uuid,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Contact count and deal value per stage.
    Pipeline,
}

pub fn handle_crm_command(cmd: CrmCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        CrmCommand::Add { name, email, company, value } => {
            let contact = state.crm.add_contact(ContactDraft {
                name,
                email,
                company,
                deal_value: value,
            })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&contact)?);
            } else {
                println!(
                    "  {} Contact '{}' added as {}",
                    style("✓").green().bold(),
                    style(&contact.name).cyan(),
                    contact.stage
                );
            }
            Ok(())
        }
        CrmCommand::List { stage } => {
            let contacts: Vec<Contact> = state
                .crm
                .contacts()
                .into_iter()
                .filter(|c| stage.is_none_or(|s| c.stage == s))
                .collect();
            print_contacts(&contacts, json)
        }
        CrmCommand::Stage { id, stage } => {
            if !state.crm.update_stage(id, stage) {
                bail!("Contact '{id}' not found");
            }
            if json {
                println!("{}", serde_json::json!({"id": id, "stage": stage}));
            } else {
                println!("  {} Contact moved to {}", style("✓").green().bold(), style(stage).cyan());
            }
            Ok(())
        }
        CrmCommand::Touch { id } => {
            if !state.crm.log_interaction(id) {
                bail!("Contact '{id}' not found");
            }
            if json {
                println!("{}", serde_json::json!({"id": id, "contacted": true}));
            } else {
                println!("  {} Interaction logged", style("✓").green().bold());
            }
            Ok(())
        }
        CrmCommand::Remove { id, force } => remove(state, id, force, json),
        CrmCommand::Pipeline => pipeline(state, json),
    }
}

fn remove(state: &AppState, id: Uuid, force: bool, json: bool) -> Result<()> {
    let Some(contact) = state.crm.contacts().into_iter().find(|c| c.id == id) else {
        bail!("Contact '{id}' not found");
    };

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove contact '{}'?", style(&contact.name).red().bold()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = state.crm.remove_contact(id);
    if json {
        println!("{}", serde_json::json!({"removed": removed, "id": id}));
    } else {
        println!("  {} Contact '{}' removed.", style("✓").red().bold(), contact.name);
    }
    Ok(())
}

fn pipeline(state: &AppState, json: bool) -> Result<()> {
    let summary = state.crm.pipeline_summary();

    if json {
        let stages: serde_json::Map<String, serde_json::Value> = summary
            .iter()
            .map(|(stage, totals)| Ok((stage.to_string(), serde_json::to_value(totals)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        println!("{}", serde_json::to_string_pretty(&stages)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Stage").fg(Color::White),
        Cell::new("Contacts").fg(Color::White),
        Cell::new("Deal value").fg(Color::White),
    ]);

    let mut total_value = 0.0;
    for (stage, totals) in &summary {
        total_value += totals.deal_value;
        table.add_row(vec![
            stage_cell(*stage),
            Cell::new(totals.contacts).set_alignment(CellAlignment::Right),
            Cell::new(format_money(totals.deal_value)).set_alignment(CellAlignment::Right),
        ]);
    }

    println!();
    println!("{table}");
    println!("  Total pipeline: {}", style(format_money(total_value)).bold());
    println!();
    Ok(())
}

fn print_contacts(contacts: &[Contact], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(contacts)?);
        return Ok(());
    }

    if contacts.is_empty() {
        println!();
        println!("  {} No contacts found.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Company").fg(Color::White),
        Cell::new("Stage").fg(Color::White),
        Cell::new("Deal").fg(Color::White),
        Cell::new("Last contact").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for contact in contacts {
        let last = contact
            .last_contacted
            .as_ref()
            .map_or_else(|| "never".to_string(), super::format_relative_time);
        table.add_row(vec![
            Cell::new(format!("{}\n{}", contact.name, contact.email)),
            Cell::new(contact.company.as_deref().unwrap_or("-")),
            stage_cell(contact.stage),
            Cell::new(format_money(contact.deal_value)).set_alignment(CellAlignment::Right),
            Cell::new(last),
            Cell::new(contact.id).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn stage_cell(stage: PipelineStage) -> Cell {
    let color = match stage {
        PipelineStage::Won => Color::Green,
        PipelineStage::Lost => Color::DarkGrey,
        PipelineStage::Negotiation | PipelineStage::Proposal => Color::Cyan,
        PipelineStage::Lead | PipelineStage::Qualified => Color::White,
    };
    Cell::new(stage).fg(color)
}

fn format_money(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${value:.0}")
    }
}
