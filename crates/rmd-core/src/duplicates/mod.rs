//! Duplicate publication workflow
//!
//! Grouping suspected duplicates, dismissing groups as non-duplicates, and
//! merging grouped publications into a surviving record. Every operation runs
//! inside a single SQLite transaction.

mod auto_merge;
mod grouping;
mod ignore;
mod merge;

pub use auto_merge::{auto_merge, AutoMergeReason, AutoMergeReport, AutoMergedGroup, SkippedGroup};
pub use grouping::{
    group_all_duplicates, group_duplicates_of, group_publications, remove_from_group,
    DetectionReport,
};
pub use ignore::{ignore_group, record_non_duplicates};
pub use merge::{merge, MergeOutcome, MergeRequest};

use std::collections::BTreeSet;

use rmd_domain::{Publication, PublicationId};
use rusqlite::Connection;

use crate::error::{Result, RmdError};
use crate::persistence::queries;

/// Drop repeated ids, keeping first-seen order
fn distinct_ids(ids: &[PublicationId]) -> Vec<PublicationId> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Load every publication in `ids`, failing on the first missing one
fn load_publications(conn: &Connection, ids: &[PublicationId]) -> Result<Vec<Publication>> {
    ids.iter()
        .map(|id| {
            queries::get_publication(conn, *id)?.ok_or_else(|| RmdError::publication_not_found(*id))
        })
        .collect()
}
