//! Publication domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DuplicateGroupId, NewAuthorship, NewImport, PublicationId};

/// A bibliographic record (article, book chapter, conference paper, etc.)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: PublicationId,
    pub title: String,
    pub secondary_title: Option<String>,
    pub publication_type: String,
    pub journal_title: Option<String>,
    pub doi: Option<String>,
    pub year: Option<i32>,

    /// The duplicate group this record currently sits in, if any
    pub duplicate_group_id: Option<DuplicateGroupId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    /// Title and subtitle joined the way they are displayed
    pub fn full_title(&self) -> String {
        match &self.secondary_title {
            Some(sub) if !sub.trim().is_empty() => format!("{}: {}", self.title, sub),
            _ => self.title.clone(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.duplicate_group_id.is_some()
    }
}

/// Input for creating a publication, optionally with its provenance and
/// authorships in one go.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewPublication {
    pub title: String,
    #[serde(default)]
    pub secondary_title: Option<String>,
    #[serde(default = "default_publication_type")]
    pub publication_type: String,
    #[serde(default)]
    pub journal_title: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub imports: Vec<NewImport>,
    #[serde(default)]
    pub authorships: Vec<NewAuthorship>,
}

fn default_publication_type() -> String {
    "Academic Journal Article".to_string()
}

impl NewPublication {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            publication_type: default_publication_type(),
            ..Default::default()
        }
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_journal(mut self, journal: impl Into<String>) -> Self {
        self.journal_title = Some(journal.into());
        self
    }

    pub fn with_import(mut self, import: NewImport) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_authorship(mut self, authorship: NewAuthorship) -> Self {
        self.authorships.push(authorship);
        self
    }

    /// Check the record before it is written
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title".to_string()));
        }
        if self.publication_type.trim().is_empty() {
            return Err(ValidationError::MissingField("publication_type".to_string()));
        }
        if let Some(year) = self.year {
            if !(1000..=9999).contains(&year) {
                return Err(ValidationError::InvalidValue(format!(
                    "year {} is not a four-digit year",
                    year
                )));
            }
        }
        if let Some(doi) = &self.doi {
            if doi.trim().is_empty() {
                return Err(ValidationError::InvalidValue("doi is blank".to_string()));
            }
        }
        for import in &self.imports {
            import.validate()?;
        }
        Ok(())
    }
}

/// Rejected input for a new record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImportSource;

    #[test]
    fn test_new_publication_defaults() {
        let p = NewPublication::new("A Study of Things");
        assert_eq!(p.publication_type, "Academic Journal Article");
        assert!(p.imports.is_empty());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_blank_title_rejected() {
        let p = NewPublication::new("   ");
        assert_eq!(
            p.validate(),
            Err(ValidationError::MissingField("title".to_string()))
        );
    }

    #[test]
    fn test_bad_year_rejected() {
        let p = NewPublication::new("Title").with_year(95);
        assert!(matches!(p.validate(), Err(ValidationError::InvalidValue(_))));
    }

    #[test]
    fn test_import_validated_with_publication() {
        let p = NewPublication::new("Title").with_import(NewImport::new(ImportSource::Pure, ""));
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let p: NewPublication = serde_json::from_str(r#"{"title": "Minimal"}"#).unwrap();
        assert_eq!(p.title, "Minimal");
        assert_eq!(p.publication_type, "Academic Journal Article");
        assert!(p.doi.is_none());
    }

    #[test]
    fn test_full_title() {
        let now = Utc::now();
        let p = Publication {
            id: PublicationId(1),
            title: "Main".to_string(),
            secondary_title: Some("Subtitle".to_string()),
            publication_type: "Book".to_string(),
            journal_title: None,
            doi: None,
            year: None,
            duplicate_group_id: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(p.full_title(), "Main: Subtitle");
        assert!(!p.is_grouped());
    }
}
