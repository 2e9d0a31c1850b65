//! Audit log domain models.
//!
//! State-changing operations emit an explicit field-level diff at the end of
//! the mutation, rather than relying on implicit change tracking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use green_grocer_core::UserId;

/// One recorded audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entity kind (e.g. "order", "user").
    pub entity_type: String,
    /// Entity primary key.
    pub entity_id: i64,
    /// Operation name (e.g. "confirm_payment").
    pub action: String,
    /// Field-level diff.
    pub changes: AuditDiff,
    /// User who performed the operation; `None` for scheduled jobs.
    pub actor_user_id: Option<UserId>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

/// Change to a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the operation.
    pub from: Value,
    /// Value after the operation.
    pub to: Value,
}

/// An ordered map of field name to [`FieldChange`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditDiff(BTreeMap<String, FieldChange>);

impl AuditDiff {
    /// Create an empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field change. Values that did not change are skipped so the
    /// stored diff only carries actual mutations.
    #[must_use]
    pub fn record(
        mut self,
        field: &str,
        from: impl Serialize,
        to: impl Serialize,
    ) -> Self {
        let from = serde_json::to_value(from).unwrap_or(Value::Null);
        let to = serde_json::to_value(to).unwrap_or(Value::Null);
        if from != to {
            self.0.insert(field.to_string(), FieldChange { from, to });
        }
        self
    }

    /// Returns `true` if no field changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up the change for one field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }
}
