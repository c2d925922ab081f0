//! Batch writer: one bulk contact insert plus optional list linking

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::services::import_store::ImportStore;
use crate::types::NewContact;

/// What one flushed batch produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows handed to the writer
    pub written: u64,
    /// Rows actually persisted
    pub inserted: u64,
    /// New list memberships
    pub linked: u64,
}

#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn ImportStore>,
    user_id: Uuid,
    list_id: Option<Uuid>,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn ImportStore>, user_id: Uuid, list_id: Option<Uuid>) -> Self {
        Self { store, user_id, list_id }
    }

    /// Persist `rows` in one call, then link the new ids to the target list.
    /// Any storage error is returned to the caller unretried.
    pub async fn write(&self, rows: &[NewContact]) -> Result<BatchOutcome> {
        if rows.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let result = self
            .store
            .create_contacts_batch(rows)
            .await
            .context("Failed to save contacts")?;

        let linked = match self.list_id {
            Some(list_id) if !result.ids.is_empty() => self
                .store
                .add_contacts_to_list(list_id, &result.ids, self.user_id)
                .await
                .context("Failed to add contacts to list")?,
            _ => 0,
        };

        Ok(BatchOutcome {
            written: rows.len() as u64,
            inserted: result.count,
            linked,
        })
    }
}
