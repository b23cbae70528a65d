//! State metadata: the handful of fields the migration needs from a state file.
//!
//! Parsing is deliberately two-step. `try_parse_metadata` never fails: a blob
//! that is not a JSON state document yields all-default metadata. The
//! following `validate_metadata` then rejects it because `lineage` and
//! `terraform_version` are empty.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata extracted from a Terraform state document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMeta {
    pub lineage: String,
    pub serial: i64,
    pub terraform_version: String,
}

impl fmt::Display for StateMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lineage={:?} serial={} terraform_version={:?}",
            self.lineage, self.serial, self.terraform_version
        )
    }
}

/// Parse metadata, falling back to defaults when the bytes are not a state
/// document.
pub fn try_parse_metadata(bytes: &[u8]) -> StateMeta {
    match serde_json::from_slice::<StateMeta>(bytes) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::debug!(error = %e, "state is not a JSON document, using empty metadata");
            StateMeta::default()
        }
    }
}

/// Returned by [`validate_metadata`] when a required field is empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to retrieve required fields from the state file: {meta}")]
pub struct IncompleteMetadata {
    pub meta: StateMeta,
}

pub fn validate_metadata(meta: &StateMeta) -> Result<(), IncompleteMetadata> {
    if meta.lineage.is_empty() || meta.terraform_version.is_empty() {
        return Err(IncompleteMetadata { meta: meta.clone() });
    }
    Ok(())
}
