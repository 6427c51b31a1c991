//! Widget grid store.
//!
//! Holds the ordered dashboard layout. At most one widget is expanded at a
//! time: expanding a widget collapses whichever widget was expanded before.
//! Actions on ids that are no longer in the grid are no-ops.

use std::sync::Arc;

use iverton_types::payload::WidgetContent;
use iverton_types::storage::GRID_WIDGET_STORAGE;
use iverton_types::widget::{Widget, WidgetId, WidgetKind, WidgetSize};
use serde::{Deserialize, Serialize};

use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl PersistedState for GridState {}

pub struct WidgetGridStore {
    inner: PersistedStore<GridState>,
}

impl WidgetGridStore {
    pub async fn open<B: KvBacking + 'static>(backing: Arc<B>) -> Self {
        let inner = PersistedStore::open(
            backing,
            PersistOptions::new(GRID_WIDGET_STORAGE),
            GridState::default(),
        )
        .await;

        // Snapshots written elsewhere may hold several expanded widgets.
        inner.update(|s| {
            let mut seen = false;
            let mut collapsed = false;
            for widget in &mut s.widgets {
                if widget.size != WidgetSize::Expanded {
                    continue;
                }
                if seen {
                    widget.size = WidgetSize::Standard;
                    collapsed = true;
                }
                seen = true;
            }
            collapsed.then_some(())
        });

        Self { inner }
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.inner.get_state().widgets.clone()
    }

    pub fn get(&self, id: WidgetId) -> Option<Widget> {
        self.inner
            .get_state()
            .widgets
            .iter()
            .find(|w| w.id == id)
            .cloned()
    }

    /// Append a new standard-size, visible widget.
    pub fn add_widget(&self, kind: WidgetKind, title: Option<String>) -> WidgetId {
        let widget = Widget::new(kind, title);
        let id = widget.id;
        tracing::debug!(widget_id = %id, kind = %widget.kind, "adding widget");
        self.inner.set_state(|s| s.widgets.push(widget));
        id
    }

    /// Remove a widget. Returns `false` (and publishes nothing) if it is not
    /// in the grid.
    pub fn remove_widget(&self, id: WidgetId) -> bool {
        self.inner
            .update(|s| {
                let index = s.widgets.iter().position(|w| w.id == id)?;
                s.widgets.remove(index);
                Some(())
            })
            .is_some()
    }

    pub fn resize_widget(&self, id: WidgetId, size: WidgetSize) -> bool {
        self.inner
            .update(|s| {
                if !s.widgets.iter().any(|w| w.id == id) {
                    return None;
                }
                for widget in &mut s.widgets {
                    if widget.id == id {
                        widget.size = size;
                    } else if size == WidgetSize::Expanded {
                        widget.size = WidgetSize::Standard;
                    }
                }
                Some(())
            })
            .is_some()
    }

    /// Flip visibility. Returns the new visibility, or `None` if the widget is gone.
    pub fn toggle_visibility(&self, id: WidgetId) -> Option<bool> {
        self.inner.update(|s| {
            let widget = s.widgets.iter_mut().find(|w| w.id == id)?;
            widget.is_visible = !widget.is_visible;
            Some(widget.is_visible)
        })
    }

    pub fn set_content(&self, id: WidgetId, content: WidgetContent) -> bool {
        self.inner
            .update(|s| {
                let widget = s.widgets.iter_mut().find(|w| w.id == id)?;
                widget.content = Some(content);
                Some(())
            })
            .is_some()
    }

    /// Move a widget to `index`, clamped to the end of the grid.
    pub fn move_widget(&self, id: WidgetId, index: usize) -> bool {
        self.inner
            .update(|s| {
                let from = s.widgets.iter().position(|w| w.id == id)?;
                let widget = s.widgets.remove(from);
                let to = index.min(s.widgets.len());
                s.widgets.insert(to, widget);
                Some(())
            })
            .is_some()
    }

    pub fn reset_layout(&self) {
        tracing::info!("resetting widget layout");
        self.inner.replace_state(GridState::default());
    }

    pub fn visible_widgets(&self) -> Vec<Widget> {
        self.inner
            .get_state()
            .widgets
            .iter()
            .filter(|w| w.is_visible)
            .cloned()
            .collect()
    }

    pub fn expanded_widget(&self) -> Option<Widget> {
        self.inner
            .get_state()
            .widgets
            .iter()
            .find(|w| w.size == WidgetSize::Expanded)
            .cloned()
    }

    pub fn store(&self) -> &PersistedStore<GridState> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}
