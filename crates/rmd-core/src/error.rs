//! Error types for rmd-core

use rmd_domain::{DuplicateGroupId, PublicationId, ValidationError};
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for rmd operations
pub type Result<T> = std::result::Result<T, RmdError>;

/// Main error type for rmd operations
#[derive(Error, Debug)]
pub enum RmdError {
    /// Duplicate-group errors
    #[error("Duplicate group error: {0}")]
    Group(#[from] GroupError),

    /// Merge errors
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Persistence-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Rejected input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RmdError {
    pub(crate) fn publication_not_found(id: PublicationId) -> Self {
        RmdError::NotFound(format!("publication {}", id))
    }

    /// Whether the error comes from a recorded non-duplicate decision
    pub fn is_known_non_duplicate(&self) -> bool {
        matches!(
            self,
            RmdError::Group(GroupError::KnownNonDuplicate { .. })
                | RmdError::Merge(MergeError::KnownNonDuplicate { .. })
        )
    }
}

/// Duplicate-group errors
#[derive(Error, Debug)]
pub enum GroupError {
    /// Group not found
    #[error("Duplicate group not found: {0}")]
    NotFound(DuplicateGroupId),

    /// A group needs at least two distinct publications
    #[error("A duplicate group needs at least two publications, got {0}")]
    TooFewPublications(usize),

    /// Publication is not in the group
    #[error("Publication {publication} is not a member of duplicate group {group}")]
    NotAMember {
        group: DuplicateGroupId,
        publication: PublicationId,
    },

    /// Grouping would contradict a recorded non-duplicate decision
    #[error("Publications were previously marked as not duplicates: {}", format_pairs(.pairs))]
    KnownNonDuplicate {
        pairs: Vec<(PublicationId, PublicationId)>,
    },
}

/// Merge errors
#[derive(Error, Debug)]
pub enum MergeError {
    /// No publication other than the survivor was selected
    #[error("Select at least one publication other than {0} to merge")]
    NothingToMerge(PublicationId),

    /// Participant is outside the group the merge was issued for
    #[error("Publication {publication} is not a member of duplicate group {group}")]
    NotInGroup {
        group: DuplicateGroupId,
        publication: PublicationId,
    },

    /// Merge would contradict a recorded non-duplicate decision
    #[error("Publications were previously marked as not duplicates: {}", format_pairs(.pairs))]
    KnownNonDuplicate {
        pairs: Vec<(PublicationId, PublicationId)>,
    },
}

/// Persistence-specific errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),
}

fn format_pairs(pairs: &[(PublicationId, PublicationId)]) -> String {
    pairs
        .iter()
        .map(|(a, b)| format!("{} and {}", a, b))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                PersistenceError::Conflict(err.to_string())
            }
            _ => PersistenceError::Database(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for RmdError {
    fn from(err: rusqlite::Error) -> Self {
        RmdError::Persistence(PersistenceError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_non_duplicate_message_lists_pairs() {
        let err = RmdError::from(MergeError::KnownNonDuplicate {
            pairs: vec![
                (PublicationId(1), PublicationId(2)),
                (PublicationId(2), PublicationId(5)),
            ],
        });
        assert!(err.is_known_non_duplicate());
        assert_eq!(
            err.to_string(),
            "Merge error: Publications were previously marked as not duplicates: 1 and 2, 2 and 5"
        );
    }

    #[test]
    fn test_not_found_is_not_a_conflict() {
        let err = RmdError::publication_not_found(PublicationId(9));
        assert!(!err.is_known_non_duplicate());
        assert_eq!(err.to_string(), "Not found: publication 9");
    }
}
