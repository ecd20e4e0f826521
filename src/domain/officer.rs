//! Loan officer reference record.

use crate::domain::primitives::OfficerId;
use crate::domain::ValidationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub officer_id: OfficerId,
    pub name: String,
    pub branch: Option<String>,
    pub region: Option<String>,
}

/// Inbound officer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerInput {
    pub officer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl OfficerInput {
    /// # Errors
    /// Returns a validation error when the officer id is blank.
    pub fn into_officer(self) -> Result<Officer, ValidationError> {
        let officer_id = self.officer_id.trim().to_string();
        if officer_id.is_empty() {
            return Err(ValidationError::MissingField("officer_id"));
        }
        Ok(Officer {
            officer_id: OfficerId::new(officer_id),
            name: self.name.trim().to_string(),
            branch: self.branch.filter(|s| !s.trim().is_empty()),
            region: self.region.filter(|s| !s.trim().is_empty()),
        })
    }
}
