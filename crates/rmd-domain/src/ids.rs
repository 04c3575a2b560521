//! Typed record identifiers
//!
//! Rows are keyed by SQLite integer primary keys; the newtypes keep a
//! publication id from being passed where a group id is expected.

use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// The raw row id.
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a publication row.
    PublicationId
);
record_id!(
    /// Identifier of an import (provenance) row.
    ImportId
);
record_id!(
    /// Identifier of an authorship row.
    AuthorshipId
);
record_id!(
    /// Identifier of a duplicate publication group.
    DuplicateGroupId
);
record_id!(
    /// Identifier of a non-duplicate publication group.
    NonDuplicateGroupId
);
