//! Notes subcommands.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use iverton_types::note::{Note, NoteDraft, NoteUpdate};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum NotesCommand {
    /// Add a note.
    Add {
        title: String,

        /// Note body.
        #[arg(long, default_value = "")]
        content: String,

        /// Tag (repeatable, a leading # is optional).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List notes, pinned first.
    #[command(alias = "ls")]
    List {
        /// Only notes carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },

    /// Search titles, bodies and tags.
    Search { query: String },

    /// Edit a note's title, body or tags.
    Edit {
        id: Uuid,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replace the tags (repeatable).
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },

    /// Pin or unpin a note.
    Pin { id: Uuid },

    /// Delete a note.
    #[command(alias = "rm")]
    Delete {
        id: Uuid,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_notes_command(cmd: NotesCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        NotesCommand::Add { title, content, tags } => {
            let note = state.notes.add_note(NoteDraft { title, content, tags })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                println!(
                    "  {} Note '{}' added ({})",
                    style("✓").green().bold(),
                    style(&note.title).cyan(),
                    style(note.id).dim()
                );
            }
            Ok(())
        }
        NotesCommand::List { tag: Some(tag) } => print_notes(&state.notes.notes_with_tag(&tag), json),
        NotesCommand::List { tag: None } => print_notes(&state.notes.search(""), json),
        NotesCommand::Search { query } => print_notes(&state.notes.search(&query), json),
        NotesCommand::Edit { id, title, content, tags } => {
            let update = NoteUpdate { title, content, tags };
            let Some(note) = state.notes.update_note(id, update)? else {
                bail!("Note '{id}' not found");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                println!("  {} Note '{}' updated", style("✓").green().bold(), style(&note.title).cyan());
            }
            Ok(())
        }
        NotesCommand::Pin { id } => {
            let Some(pinned) = state.notes.toggle_pin(id) else {
                bail!("Note '{id}' not found");
            };
            if json {
                println!("{}", serde_json::json!({"id": id, "pinned": pinned}));
            } else {
                let label = if pinned { "pinned" } else { "unpinned" };
                println!("  {} Note {label}", style("✓").green().bold());
            }
            Ok(())
        }
        NotesCommand::Delete { id, force } => delete(state, id, force, json),
    }
}

fn delete(state: &AppState, id: Uuid, force: bool, json: bool) -> Result<()> {
    let Some(note) = state.notes.get(id) else {
        bail!("Note '{id}' not found");
    };

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete note '{}'?", style(&note.title).red().bold()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let deleted = state.notes.delete_note(id);
    if json {
        println!("{}", serde_json::json!({"deleted": deleted, "id": id}));
    } else {
        println!("  {} Note '{}' deleted.", style("✓").red().bold(), note.title);
    }
    Ok(())
}

fn print_notes(notes: &[Note], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!();
        println!("  {} No notes found.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Tags").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for note in notes {
        let pin = if note.is_pinned {
            Cell::new("★").fg(Color::Yellow)
        } else {
            Cell::new("")
        };
        let tags: Vec<String> = note.tags.iter().map(|t| format!("#{t}")).collect();
        table.add_row(vec![
            pin,
            Cell::new(&note.title),
            Cell::new(tags.join(" ")).fg(Color::Cyan),
            Cell::new(super::format_relative_time(&note.updated_at)),
            Cell::new(note.id).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
