//! Non-duplicate decisions

use std::collections::BTreeSet;

use chrono::Utc;

use rmd_domain::{DuplicateGroupId, NonDuplicatePublicationGroup, PublicationId};

use super::{distinct_ids, load_publications};
use crate::error::{GroupError, Result};
use crate::persistence::{queries, Repository};

/// Dismiss a duplicate group.
///
/// Records that its members are not duplicates of each other and deletes the
/// group, clearing every member's group reference.
pub fn ignore_group(
    repo: &mut Repository,
    group_id: DuplicateGroupId,
) -> Result<NonDuplicatePublicationGroup> {
    let decision = repo.with_transaction(|tx| {
        let group =
            queries::get_duplicate_group(tx, group_id)?.ok_or(GroupError::NotFound(group_id))?;
        let members: BTreeSet<PublicationId> = group.publication_ids.iter().copied().collect();
        if members.len() < 2 {
            return Err(GroupError::TooFewPublications(members.len()).into());
        }

        let now = Utc::now();
        let decision = queries::insert_non_duplicate_group(tx, &members, now)?;
        queries::delete_duplicate_group(tx, group_id, now)?;
        Ok(decision)
    })?;

    tracing::info!(
        group = %group_id,
        non_duplicate_group = %decision.id,
        members = decision.publication_ids.len(),
        "Ignored duplicate group"
    );
    Ok(decision)
}

/// Record that the given publications are not duplicates of each other.
///
/// Existing duplicate groups are left alone.
pub fn record_non_duplicates(
    repo: &mut Repository,
    ids: &[PublicationId],
) -> Result<NonDuplicatePublicationGroup> {
    let ids = distinct_ids(ids);
    if ids.len() < 2 {
        return Err(GroupError::TooFewPublications(ids.len()).into());
    }

    let decision = repo.with_transaction(|tx| {
        load_publications(tx, &ids)?;
        let members: BTreeSet<PublicationId> = ids.iter().copied().collect();
        queries::insert_non_duplicate_group(tx, &members, Utc::now())
    })?;

    tracing::info!(
        non_duplicate_group = %decision.id,
        members = decision.publication_ids.len(),
        "Recorded non-duplicate decision"
    );
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::group_publications;
    use crate::error::RmdError;
    use rmd_domain::NewPublication;

    fn seed(repo: &mut Repository, count: usize) -> Vec<PublicationId> {
        (0..count)
            .map(|i| {
                repo.create_publication(&NewPublication::new(format!("Paper {}", i)))
                    .unwrap()
                    .id
            })
            .collect()
    }

    #[test]
    fn test_ignore_group_records_decision() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, 3);
        let group = group_publications(&mut repo, &ids, false).unwrap();

        let decision = ignore_group(&mut repo, group.id).unwrap();
        assert_eq!(decision.publication_ids, ids);
        assert!(repo.get_duplicate_group(group.id).unwrap().is_none());
        for id in &ids {
            assert!(repo.get_publication(*id).unwrap().unwrap().duplicate_group_id.is_none());
        }

        let err = group_publications(&mut repo, &ids[..2], false).unwrap_err();
        assert!(err.is_known_non_duplicate());
    }

    #[test]
    fn test_ignore_missing_group() {
        let mut repo = Repository::in_memory().unwrap();
        let err = ignore_group(&mut repo, DuplicateGroupId(7)).unwrap_err();
        assert!(matches!(err, RmdError::Group(GroupError::NotFound(_))));
    }

    #[test]
    fn test_record_non_duplicates_validates_ids() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, 1);

        let err = record_non_duplicates(&mut repo, &[ids[0], ids[0]]).unwrap_err();
        assert!(matches!(
            err,
            RmdError::Group(GroupError::TooFewPublications(1))
        ));

        let err = record_non_duplicates(&mut repo, &[ids[0], PublicationId(99)]).unwrap_err();
        assert!(matches!(err, RmdError::NotFound(_)));
        assert!(repo.list_non_duplicate_groups().unwrap().is_empty());
    }

    #[test]
    fn test_record_leaves_groups_untouched() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, 2);
        let group = group_publications(&mut repo, &ids, false).unwrap();

        record_non_duplicates(&mut repo, &ids).unwrap();
        assert_eq!(repo.get_duplicate_group(group.id).unwrap().unwrap().len(), 2);
        assert_eq!(repo.non_duplicate_groups_for(ids[0]).unwrap().len(), 1);
    }
}
