//! Grouping suspected duplicates

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use rmd_domain::{DuplicateGroupId, DuplicatePublicationGroup, PublicationId};

use super::{distinct_ids, load_publications};
use crate::config::DeduplicationConfig;
use crate::deduplication::find_candidates;
use crate::error::{GroupError, Result, RmdError};
use crate::persistence::{queries, Repository};

/// Outcome of a full detection pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionReport {
    /// Publications examined
    pub publications_scanned: usize,
    /// Groups this pass created or changed that still exist
    pub groups: Vec<DuplicatePublicationGroup>,
    /// Members of those groups
    pub publications_grouped: usize,
    /// Candidate sets left ungrouped because of a non-duplicate decision
    pub conflicts_skipped: usize,
}

/// Put publications into one duplicate group.
///
/// Ungrouped publications get a new group. If some are already grouped, the
/// lowest-numbered existing group absorbs the requested publications and the
/// members of every other group involved; those other groups are deleted.
/// A resulting group that would newly bring together publications recorded
/// as non-duplicates is refused unless `allow_known_non_duplicates` is set.
pub fn group_publications(
    repo: &mut Repository,
    ids: &[PublicationId],
    allow_known_non_duplicates: bool,
) -> Result<DuplicatePublicationGroup> {
    let (group, _) =
        repo.with_transaction(|tx| group_in_tx(tx, ids, allow_known_non_duplicates))?;
    tracing::info!(
        group = %group.id,
        members = group.len(),
        "Grouped publications as suspected duplicates"
    );
    Ok(group)
}

/// Returns the group and whether any membership changed.
fn group_in_tx(
    conn: &Connection,
    ids: &[PublicationId],
    allow_known_non_duplicates: bool,
) -> Result<(DuplicatePublicationGroup, bool)> {
    let ids = distinct_ids(ids);
    if ids.len() < 2 {
        return Err(GroupError::TooFewPublications(ids.len()).into());
    }
    let publications = load_publications(conn, &ids)?;

    let existing: BTreeSet<DuplicateGroupId> = publications
        .iter()
        .filter_map(|p| p.duplicate_group_id)
        .collect();

    // Everyone who ends up in the group, with the group they sit in today
    let mut membership: BTreeMap<PublicationId, Option<DuplicateGroupId>> = publications
        .iter()
        .map(|p| (p.id, p.duplicate_group_id))
        .collect();
    for group_id in &existing {
        for member in queries::group_members(conn, *group_id)? {
            membership.insert(member, Some(*group_id));
        }
    }

    // Pairs already sharing a group were accepted when that group was formed
    let members: Vec<PublicationId> = membership.keys().copied().collect();
    let pairs: Vec<_> = queries::known_non_duplicate_pairs(conn, &members)?
        .into_iter()
        .filter(|(a, b)| {
            let group_of = |id: &PublicationId| membership.get(id).copied().flatten();
            group_of(a).is_none() || group_of(a) != group_of(b)
        })
        .collect();
    if !pairs.is_empty() {
        if !allow_known_non_duplicates {
            return Err(GroupError::KnownNonDuplicate { pairs }.into());
        }
        tracing::warn!(?pairs, "Grouping publications despite recorded non-duplicate decisions");
    }

    let now = Utc::now();
    let mut changed = false;
    let target = match existing.iter().next() {
        Some(id) => *id,
        None => {
            changed = true;
            queries::insert_duplicate_group(conn, now)?
        }
    };

    for absorbed in existing.iter().filter(|id| **id != target) {
        for member in queries::group_members(conn, *absorbed)? {
            queries::set_duplicate_group(conn, member, Some(target), now)?;
        }
        queries::delete_duplicate_group(conn, *absorbed, now)?;
        changed = true;
        tracing::debug!(group = %target, absorbed = %absorbed, "Absorbed duplicate group");
    }

    for publication in &publications {
        if publication.duplicate_group_id != Some(target) {
            queries::set_duplicate_group(conn, publication.id, Some(target), now)?;
            changed = true;
        }
    }

    let group = queries::get_duplicate_group(conn, target)?
        .ok_or_else(|| RmdError::from(GroupError::NotFound(target)))?;
    Ok((group, changed))
}

/// Find candidate duplicates of one publication and group them with it.
///
/// Publications it was recorded as not duplicating are never candidates.
/// Returns `None` when nothing looks like a duplicate.
pub fn group_duplicates_of(
    repo: &mut Repository,
    id: PublicationId,
    config: &DeduplicationConfig,
) -> Result<Option<DuplicatePublicationGroup>> {
    let group = repo
        .with_transaction(|tx| duplicates_of_in_tx(tx, id, config))?
        .map(|(group, _)| group);
    if let Some(group) = &group {
        tracing::info!(publication = %id, group = %group.id, members = group.len(), "Grouped detected duplicates");
    }
    Ok(group)
}

fn duplicates_of_in_tx(
    conn: &Connection,
    id: PublicationId,
    config: &DeduplicationConfig,
) -> Result<Option<(DuplicatePublicationGroup, bool)>> {
    let target =
        queries::get_publication(conn, id)?.ok_or_else(|| RmdError::publication_not_found(id))?;
    let pool = queries::all_publications(conn)?;
    let excluded = queries::non_duplicate_partners(conn, id)?;

    let candidates = find_candidates(&target, &pool, config, &excluded);
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut ids = vec![target.id];
    ids.extend(candidates.iter().map(|p| p.id));
    tracing::debug!(publication = %id, candidates = candidates.len(), "Found duplicate candidates");

    group_in_tx(conn, &ids, false).map(Some)
}

/// Run detection for every publication.
///
/// Each publication is handled in its own transaction; a candidate set that
/// contradicts a non-duplicate decision is skipped and counted.
pub fn group_all_duplicates(
    repo: &mut Repository,
    config: &DeduplicationConfig,
) -> Result<DetectionReport> {
    let ids: Vec<PublicationId> = repo.list_publications()?.iter().map(|p| p.id).collect();
    let mut report = DetectionReport {
        publications_scanned: ids.len(),
        ..Default::default()
    };
    let mut touched = BTreeSet::new();

    for id in ids {
        match repo.with_transaction(|tx| duplicates_of_in_tx(tx, id, config)) {
            Ok(Some((group, true))) => {
                touched.insert(group.id);
            }
            Ok(_) => {}
            Err(e) if e.is_known_non_duplicate() => {
                tracing::warn!(publication = %id, error = %e, "Skipped duplicate candidates");
                report.conflicts_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for group_id in touched {
        if let Some(group) = repo.get_duplicate_group(group_id)? {
            report.publications_grouped += group.len();
            report.groups.push(group);
        }
    }

    tracing::info!(
        scanned = report.publications_scanned,
        groups = report.groups.len(),
        skipped = report.conflicts_skipped,
        "Duplicate detection finished"
    );
    Ok(report)
}

/// Take one publication out of a group.
///
/// Returns the remaining group, or `None` if it dropped below two members
/// and was deleted.
pub fn remove_from_group(
    repo: &mut Repository,
    group_id: DuplicateGroupId,
    publication_id: PublicationId,
) -> Result<Option<DuplicatePublicationGroup>> {
    let remaining = repo.with_transaction(|tx| {
        let group =
            queries::get_duplicate_group(tx, group_id)?.ok_or(GroupError::NotFound(group_id))?;
        if !group.contains(publication_id) {
            return Err(GroupError::NotAMember {
                group: group_id,
                publication: publication_id,
            }
            .into());
        }

        let now = Utc::now();
        queries::set_duplicate_group(tx, publication_id, None, now)?;
        if queries::prune_duplicate_group(tx, group_id, now)? {
            Ok(None)
        } else {
            queries::get_duplicate_group(tx, group_id)
        }
    })?;

    tracing::info!(
        group = %group_id,
        publication = %publication_id,
        group_deleted = remaining.is_none(),
        "Removed publication from duplicate group"
    );
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmd_domain::NewPublication;

    fn seed(repo: &mut Repository, titles: &[&str]) -> Vec<PublicationId> {
        titles
            .iter()
            .map(|t| {
                repo.create_publication(&NewPublication::new(*t).with_year(2021))
                    .unwrap()
                    .id
            })
            .collect()
    }

    #[test]
    fn test_group_requires_two_publications() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, &["Only One"]);
        let err = group_publications(&mut repo, &[ids[0], ids[0]], false).unwrap_err();
        assert!(matches!(
            err,
            RmdError::Group(GroupError::TooFewPublications(1))
        ));
    }

    #[test]
    fn test_group_missing_publication() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, &["Present"]);
        let err = group_publications(&mut repo, &[ids[0], PublicationId(404)], false).unwrap_err();
        assert!(matches!(err, RmdError::NotFound(_)));
        assert!(repo.list_duplicate_groups().unwrap().is_empty());
    }

    #[test]
    fn test_remove_last_pair_member_deletes_group() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, &["A", "B"]);
        let group = group_publications(&mut repo, &ids, false).unwrap();

        let remaining = remove_from_group(&mut repo, group.id, ids[0]).unwrap();
        assert!(remaining.is_none());
        assert!(repo.get_duplicate_group(group.id).unwrap().is_none());
        for id in ids {
            let p = repo.get_publication(id).unwrap().unwrap();
            assert!(p.duplicate_group_id.is_none());
        }
    }

    #[test]
    fn test_remove_non_member() {
        let mut repo = Repository::in_memory().unwrap();
        let ids = seed(&mut repo, &["A", "B", "C"]);
        let group = group_publications(&mut repo, &ids[..2], false).unwrap();

        let err = remove_from_group(&mut repo, group.id, ids[2]).unwrap_err();
        assert!(matches!(err, RmdError::Group(GroupError::NotAMember { .. })));
    }
}
