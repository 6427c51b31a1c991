//! Notes store.

use std::sync::Arc;

use iverton_types::error::ValidationErrors;
use iverton_types::note::{Note, NoteDraft, NoteUpdate};
use iverton_types::storage::NOTES_STORAGE;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotesState {
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl PersistedState for NotesState {}

pub struct NotesStore {
    inner: PersistedStore<NotesState>,
    clock: Arc<dyn Clock>,
}

impl NotesStore {
    pub async fn open<B: KvBacking + 'static>(backing: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        let inner = PersistedStore::open(
            backing,
            PersistOptions::new(NOTES_STORAGE),
            NotesState::default(),
        )
        .await;
        Self { inner, clock }
    }

    pub fn notes(&self) -> Vec<Note> {
        self.inner.get_state().notes.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Note> {
        self.inner.get_state().notes.iter().find(|n| n.id == id).cloned()
    }

    pub fn add_note(&self, draft: NoteDraft) -> Result<Note, ValidationErrors> {
        validate_title(&draft.title)?;
        let now = self.clock.now();
        let note = Note {
            id: Uuid::now_v7(),
            title: draft.title.trim().to_string(),
            content: draft.content,
            tags: normalize_tags(draft.tags),
            is_pinned: false,
            created_at: now,
            updated_at: now,
        };
        let stored = note.clone();
        self.inner.set_state(|s| s.notes.push(stored));
        tracing::debug!(note_id = %note.id, "note added");
        Ok(note)
    }

    /// Apply `update` to a note. `Ok(None)` if the note no longer exists.
    pub fn update_note(&self, id: Uuid, update: NoteUpdate) -> Result<Option<Note>, ValidationErrors> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let now = self.clock.now();
        Ok(self.inner.update(|s| {
            let note = s.notes.iter_mut().find(|n| n.id == id)?;
            if let Some(title) = update.title {
                note.title = title.trim().to_string();
            }
            if let Some(content) = update.content {
                note.content = content;
            }
            if let Some(tags) = update.tags {
                note.tags = normalize_tags(tags);
            }
            note.updated_at = now;
            Some(note.clone())
        }))
    }

    pub fn delete_note(&self, id: Uuid) -> bool {
        self.inner
            .update(|s| {
                let index = s.notes.iter().position(|n| n.id == id)?;
                s.notes.remove(index);
                Some(())
            })
            .is_some()
    }

    /// Flip the pin. Returns the new value, `None` if the note is gone.
    pub fn toggle_pin(&self, id: Uuid) -> Option<bool> {
        self.inner.update(|s| {
            let note = s.notes.iter_mut().find(|n| n.id == id)?;
            note.is_pinned = !note.is_pinned;
            Some(note.is_pinned)
        })
    }

    /// Case-insensitive search over title, content and tags.
    ///
    /// Pinned notes come first, then most recently updated. An empty query
    /// matches every note.
    pub fn search(&self, query: &str) -> Vec<Note> {
        let needle = query.trim().to_lowercase();
        let mut found: Vec<Note> = self
            .inner
            .get_state()
            .notes
            .iter()
            .filter(|n| {
                needle.is_empty()
                    || n.title.to_lowercase().contains(&needle)
                    || n.content.to_lowercase().contains(&needle)
                    || n.tags.iter().any(|t| t.contains(&needle))
            })
            .cloned()
            .collect();
        sort_for_display(&mut found);
        found
    }

    pub fn notes_with_tag(&self, tag: &str) -> Vec<Note> {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        let mut found: Vec<Note> = self
            .inner
            .get_state()
            .notes
            .iter()
            .filter(|n| n.tags.iter().any(|t| *t == tag))
            .cloned()
            .collect();
        sort_for_display(&mut found);
        found
    }

    pub fn store(&self) -> &PersistedStore<NotesState> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}

fn validate_title(title: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let title = title.trim();
    if title.is_empty() {
        errors.add("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.add("title", format!("Title must be at most {MAX_TITLE_LEN} characters"));
    }
    errors.into_result()
}

/// Trim, lowercase, strip a leading '#', drop blanks and duplicates.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn sort_for_display(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
}
