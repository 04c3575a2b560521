//! Duplicate and non-duplicate publication groups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DuplicateGroupId, NonDuplicateGroupId, PublicationId};

/// A working set of publications believed to be the same work.
///
/// Only exists while at least two members remain; membership is the
/// `duplicate_group_id` column on each publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePublicationGroup {
    pub id: DuplicateGroupId,
    pub created_at: DateTime<Utc>,
    pub publication_ids: Vec<PublicationId>,
}

impl DuplicatePublicationGroup {
    pub fn contains(&self, id: PublicationId) -> bool {
        self.publication_ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.publication_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publication_ids.is_empty()
    }
}

/// A recorded decision that its members are not duplicates of each other
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NonDuplicatePublicationGroup {
    pub id: NonDuplicateGroupId,
    pub created_at: DateTime<Utc>,
    pub publication_ids: Vec<PublicationId>,
}
