//! Contact types touched by the import pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// One valid data line of an import file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ParsedRow {
    pub fn into_contact(self, user_id: Uuid) -> NewContact {
        NewContact {
            user_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

/// Row-level problem; the row is counted as failed but the job continues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Row {row}: {message}")]
pub struct RowError {
    /// 1-based data row number (header and blank lines not counted)
    pub row: u64,
    pub message: String,
}

impl RowError {
    pub fn missing_email(row: u64) -> Self {
        Self {
            row,
            message: "missing email address".to_string(),
        }
    }

    /// PostgreSQL text cannot hold NUL bytes
    pub fn nul_byte(row: u64) -> Self {
        Self {
            row,
            message: "contains a NUL byte".to_string(),
        }
    }
}

/// Contact ready for a batch insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Result of one bulk contact insert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBatchResult {
    /// Rows actually persisted
    pub count: u64,
    /// Ids of the persisted rows, in input order
    pub ids: Vec<Uuid>,
}

/// Contact list (import target)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
