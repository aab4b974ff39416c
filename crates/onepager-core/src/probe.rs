//! Liveness probes for the inputs of a generation run.
//!
//! Each input field validates independently. A probe is identified by a
//! token drawn from a per-field counter; only the result carrying the most
//! recent token is applied, so a slow probe for an old value can never
//! overwrite the status of a newer one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::records::preview_record_set;
use crate::templates::scan_templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeField {
    StandardRecords,
    PreviousYearRecords,
    Templates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    #[default]
    Idle,
    Checking,
    Valid,
    Invalid,
}

/// Ticket handed out when a probe starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeToken {
    pub field: ProbeField,
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct FieldState {
    latest: u64,
    status: ProbeStatus,
}

/// Per-field probe lifecycle: `Idle -> Checking -> {Valid, Invalid}`.
#[derive(Debug, Default)]
pub struct ProbeTracker {
    fields: Mutex<HashMap<ProbeField, FieldState>>,
}

impl ProbeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a probe for `field`, superseding any probe still in flight.
    pub fn begin(&self, field: ProbeField) -> ProbeToken {
        self.with_field(field, |state| {
            state.latest += 1;
            state.status = ProbeStatus::Checking;
            ProbeToken {
                field,
                sequence: state.latest,
            }
        })
    }

    /// Return `field` to idle (the input was cleared). In-flight probes
    /// become stale.
    pub fn reset(&self, field: ProbeField) {
        self.with_field(field, |state| {
            state.latest += 1;
            state.status = ProbeStatus::Idle;
        });
    }

    /// Apply a probe result. Returns false when the token is stale and the
    /// result was discarded.
    pub fn complete(&self, token: ProbeToken, valid: bool) -> bool {
        self.with_field(token.field, |state| {
            if state.latest != token.sequence {
                tracing::debug!(
                    field = ?token.field,
                    sequence = token.sequence,
                    latest = state.latest,
                    "stale probe result discarded"
                );
                return false;
            }
            state.status = if valid {
                ProbeStatus::Valid
            } else {
                ProbeStatus::Invalid
            };
            true
        })
    }

    pub fn status(&self, field: ProbeField) -> ProbeStatus {
        self.with_field(field, |state| state.status)
    }

    fn with_field<T>(&self, field: ProbeField, f: impl FnOnce(&mut FieldState) -> T) -> T {
        let mut fields = self
            .fields
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(fields.entry(field).or_default())
    }
}

/// A record source is valid when at least its first row loads.
pub fn probe_record_source(path: &Path) -> bool {
    match preview_record_set(path, 1) {
        Ok(_) => true,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "record source probe failed");
            false
        }
    }
}

/// A templates root is valid when it holds at least one language folder
/// with a template.
pub fn probe_templates(root: &Path, extension: &str) -> ProbeStatus {
    if scan_templates(root, extension).is_empty() {
        ProbeStatus::Invalid
    } else {
        ProbeStatus::Valid
    }
}
