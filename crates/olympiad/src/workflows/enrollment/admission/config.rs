use serde::{Deserialize, Serialize};

use crate::config::EditionConfig;

/// Who may take a seat regardless of the quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedalistExemption {
    /// Students awarded in the immediately preceding edition are exempt and
    /// never count against the quota.
    #[default]
    PriorEditionAwardees,
    /// Plain counting cap.
    Disabled,
}

/// Seat rules applied to every (school, edition, level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    pub quota_per_level: u32,
    pub medalists: MedalistExemption,
}

impl AdmissionPolicy {
    pub fn new(quota_per_level: u32) -> Self {
        Self {
            quota_per_level,
            medalists: MedalistExemption::default(),
        }
    }

    pub fn from_config(config: &EditionConfig) -> Self {
        Self::new(config.quota_per_level)
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::from_config(&EditionConfig::default())
    }
}
