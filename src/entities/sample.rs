// 🧪 Sample Entity - physical specimen registered in the lab
//
// Lifecycle: created at registration, type may be amended, never deleted.
// Retirement is an `Archived` status flag.

use super::{timestamp_format, Entity, EntityKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// SAMPLE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleStatus {
    #[default]
    Active,
    Processed,
    Archived,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Active => "ACTIVE",
            SampleStatus::Processed => "PROCESSED",
            SampleStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(tag: &str) -> Option<SampleStatus> {
        match tag.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(SampleStatus::Active),
            "PROCESSED" => Some(SampleStatus::Processed),
            "ARCHIVED" => Some(SampleStatus::Archived),
            _ => None,
        }
    }
}

// ============================================================================
// SAMPLE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,

    pub name: String,

    /// Category / type of specimen
    #[serde(rename = "type")]
    pub sample_type: String,

    #[serde(with = "timestamp_format")]
    pub collected_at: NaiveDateTime,

    /// Responsible operator, free text (not a foreign key)
    pub responsible_operator: String,

    #[serde(default)]
    pub status: SampleStatus,
}

impl Sample {
    pub fn new(
        id: &str,
        name: &str,
        sample_type: &str,
        collected_at: NaiveDateTime,
        responsible_operator: &str,
    ) -> Self {
        Sample {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            sample_type: sample_type.trim().to_string(),
            collected_at,
            responsible_operator: responsible_operator.trim().to_string(),
            status: SampleStatus::Active,
        }
    }

    /// Amend the sample type. Blank types are refused.
    pub fn amend_type(&mut self, new_type: &str) -> bool {
        let trimmed = new_type.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.sample_type = trimmed.to_string();
        true
    }

    pub fn is_archived(&self) -> bool {
        self.status == SampleStatus::Archived
    }
}

impl Entity for Sample {
    const KIND: EntityKind = EntityKind::Sample;

    fn id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// TESTS
// ============================================================================
