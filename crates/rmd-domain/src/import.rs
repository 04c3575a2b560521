//! Import (provenance) records
//!
//! An import ties a publication to the external source record it was built
//! from. Merging moves imports onto the surviving publication so the
//! provenance of discarded records is kept.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImportId, PublicationId, ValidationError};

/// External system a publication record was imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportSource {
    #[serde(rename = "Activity Insight")]
    ActivityInsight,
    #[serde(rename = "Pure")]
    Pure,
    #[serde(rename = "Manual")]
    Manual,
}

impl ImportSource {
    pub fn name(&self) -> &'static str {
        match self {
            ImportSource::ActivityInsight => "Activity Insight",
            ImportSource::Pure => "Pure",
            ImportSource::Manual => "Manual",
        }
    }

    pub fn all() -> &'static [ImportSource] {
        &[
            ImportSource::ActivityInsight,
            ImportSource::Pure,
            ImportSource::Manual,
        ]
    }
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImportSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImportSource::all()
            .iter()
            .copied()
            .find(|source| source.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue(format!("unknown import source: {}", s)))
    }
}

/// A stored import row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub id: ImportId,
    pub publication_id: PublicationId,
    pub source: ImportSource,
    pub source_identifier: String,
    /// Set when the import arrived on its publication through an automatic merge
    pub auto_merged: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for a new import row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewImport {
    pub source: ImportSource,
    pub source_identifier: String,
}

impl NewImport {
    pub fn new(source: ImportSource, source_identifier: impl Into<String>) -> Self {
        Self {
            source,
            source_identifier: source_identifier.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_identifier.trim().is_empty() {
            return Err(ValidationError::MissingField(
                "source_identifier".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_name() {
        for source in ImportSource::all() {
            assert_eq!(source.name().parse::<ImportSource>().unwrap(), *source);
        }
        assert_eq!(
            "activity insight".parse::<ImportSource>().unwrap(),
            ImportSource::ActivityInsight
        );
        assert!("Scopus".parse::<ImportSource>().is_err());
    }

    #[test]
    fn test_source_serde_uses_display_name() {
        let json = serde_json::to_string(&ImportSource::ActivityInsight).unwrap();
        assert_eq!(json, "\"Activity Insight\"");
    }
}
