//! CRM store: contacts moving through a sales pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use iverton_types::crm::{Contact, ContactDraft, PipelineStage, StageTotals};
use iverton_types::error::ValidationErrors;
use iverton_types::storage::CRM_STORAGE;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::validation::is_valid_email;
use crate::clock::Clock;
use crate::storage::KvBacking;
use crate::store::{PersistOptions, PersistedState, PersistedStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmState {
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl PersistedState for CrmState {}

pub struct CrmStore {
    inner: PersistedStore<CrmState>,
    clock: Arc<dyn Clock>,
}

impl CrmStore {
    pub async fn open<B: KvBacking + 'static>(backing: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        let inner =
            PersistedStore::open(backing, PersistOptions::new(CRM_STORAGE), CrmState::default())
                .await;
        Self { inner, clock }
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.inner.get_state().contacts.clone()
    }

    pub fn add_contact(&self, draft: ContactDraft) -> Result<Contact, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = draft.name.trim();
        let email = draft.email.trim().to_lowercase();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        if email.is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&email) {
            errors.add("email", "Please enter a valid email address");
        } else if self.inner.get_state().contacts.iter().any(|c| c.email == email) {
            errors.add("email", "A contact with this email already exists");
        }
        if !draft.deal_value.is_finite() || draft.deal_value < 0.0 {
            errors.add("dealValue", "Deal value must be a positive amount");
        }
        errors.into_result()?;

        let contact = Contact {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email,
            company: draft
                .company
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            stage: PipelineStage::Lead,
            deal_value: draft.deal_value,
            created_at: self.clock.now(),
            last_contacted: None,
        };
        let stored = contact.clone();
        self.inner.set_state(|s| s.contacts.push(stored));
        tracing::debug!(contact_id = %contact.id, "contact added");
        Ok(contact)
    }

    pub fn update_stage(&self, id: Uuid, stage: PipelineStage) -> bool {
        self.inner
            .update(|s| {
                let contact = s.contacts.iter_mut().find(|c| c.id == id)?;
                contact.stage = stage;
                Some(())
            })
            .is_some()
    }

    /// Record that the contact was reached now.
    pub fn log_interaction(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        self.inner
            .update(|s| {
                let contact = s.contacts.iter_mut().find(|c| c.id == id)?;
                contact.last_contacted = Some(now);
                Some(())
            })
            .is_some()
    }

    pub fn remove_contact(&self, id: Uuid) -> bool {
        self.inner
            .update(|s| {
                let index = s.contacts.iter().position(|c| c.id == id)?;
                s.contacts.remove(index);
                Some(())
            })
            .is_some()
    }

    /// Contact count and deal value per stage. Empty stages are omitted.
    pub fn pipeline_summary(&self) -> BTreeMap<PipelineStage, StageTotals> {
        let mut summary: BTreeMap<PipelineStage, StageTotals> = BTreeMap::new();
        for contact in &self.inner.get_state().contacts {
            let totals = summary.entry(contact.stage).or_default();
            totals.contacts += 1;
            totals.deal_value += contact.deal_value;
        }
        summary
    }

    pub fn store(&self) -> &PersistedStore<CrmState> {
        &self.inner
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}
