//! Merging duplicate publications into a survivor

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use rmd_domain::{DuplicateGroupId, Publication, PublicationId};

use super::{distinct_ids, load_publications};
use crate::error::{GroupError, MergeError, Result, RmdError};
use crate::persistence::{queries, Repository};

/// Which publications to fold into which survivor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub survivor_id: PublicationId,
    /// Publications to discard; the survivor is ignored if listed
    pub merged_ids: Vec<PublicationId>,
    /// Restrict the merge to members of this duplicate group
    #[serde(default)]
    pub group_id: Option<DuplicateGroupId>,
    /// Merge even if some participants were recorded as non-duplicates
    #[serde(default)]
    pub allow_known_non_duplicates: bool,
}

impl MergeRequest {
    pub fn new(survivor_id: PublicationId, merged_ids: Vec<PublicationId>) -> Self {
        Self {
            survivor_id,
            merged_ids,
            group_id: None,
            allow_known_non_duplicates: false,
        }
    }

    pub fn in_group(mut self, group_id: DuplicateGroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn allowing_known_non_duplicates(mut self) -> Self {
        self.allow_known_non_duplicates = true;
        self
    }
}

/// What a merge changed
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// The survivor as stored after the merge
    pub survivor: Publication,
    /// Publications deleted by the merge
    pub merged_ids: Vec<PublicationId>,
    pub imports_moved: usize,
    pub authorships_moved: usize,
    /// Survivor fields taken from merged publications
    pub fields_filled: Vec<String>,
    /// Duplicate groups deleted because one or no members remained
    pub groups_deleted: Vec<DuplicateGroupId>,
}

/// Merge publications into a survivor.
///
/// Imports and authorships move to the survivor, the other publications are
/// deleted, and any duplicate group left with fewer than two members is
/// removed. Nothing changes if any step fails.
pub fn merge(repo: &mut Repository, request: &MergeRequest) -> Result<MergeOutcome> {
    let outcome = repo.with_transaction(|tx| merge_in_tx(tx, request, false))?;
    tracing::info!(
        survivor = %outcome.survivor.id,
        merged = outcome.merged_ids.len(),
        imports = outcome.imports_moved,
        authorships = outcome.authorships_moved,
        "Merged duplicate publications"
    );
    Ok(outcome)
}

pub(crate) fn merge_in_tx(
    conn: &Connection,
    request: &MergeRequest,
    auto_merged: bool,
) -> Result<MergeOutcome> {
    let survivor_id = request.survivor_id;
    let mut survivor = queries::get_publication(conn, survivor_id)?
        .ok_or_else(|| RmdError::publication_not_found(survivor_id))?;

    let merged_ids: Vec<PublicationId> = distinct_ids(&request.merged_ids)
        .into_iter()
        .filter(|id| *id != survivor_id)
        .collect();
    if merged_ids.is_empty() {
        return Err(MergeError::NothingToMerge(survivor_id).into());
    }
    let merged = load_publications(conn, &merged_ids)?;

    if let Some(group_id) = request.group_id {
        if queries::get_duplicate_group(conn, group_id)?.is_none() {
            return Err(GroupError::NotFound(group_id).into());
        }
        if let Some(outsider) = std::iter::once(&survivor)
            .chain(merged.iter())
            .find(|p| p.duplicate_group_id != Some(group_id))
        {
            return Err(MergeError::NotInGroup {
                group: group_id,
                publication: outsider.id,
            }
            .into());
        }
    }

    let mut participants = vec![survivor_id];
    participants.extend(merged_ids.iter().copied());
    let pairs = queries::known_non_duplicate_pairs(conn, &participants)?;
    if !pairs.is_empty() {
        if !request.allow_known_non_duplicates {
            return Err(MergeError::KnownNonDuplicate { pairs }.into());
        }
        tracing::warn!(?pairs, "Merging publications despite recorded non-duplicate decisions");
    }

    let now = Utc::now();
    let touched_groups: BTreeSet<DuplicateGroupId> = std::iter::once(&survivor)
        .chain(merged.iter())
        .filter_map(|p| p.duplicate_group_id)
        .collect();
    let fields_filled = fill_missing_fields(&mut survivor, &merged);

    let mut imports_moved = 0;
    let mut authorships_moved = 0;
    for publication in &merged {
        imports_moved += queries::reassign_imports(conn, publication.id, survivor_id, auto_merged)?;
        authorships_moved += move_authorships(conn, publication.id, survivor_id)?;
        queries::repoint_non_duplicate_memberships(conn, publication.id, survivor_id)?;
        queries::delete_publication_row(conn, publication.id)?;
    }
    queries::update_publication_fields(conn, &survivor, now)?;

    let mut groups_deleted = Vec::new();
    for group_id in touched_groups {
        if queries::prune_duplicate_group(conn, group_id, now)? {
            groups_deleted.push(group_id);
        }
    }

    let survivor = queries::get_publication(conn, survivor_id)?
        .ok_or_else(|| RmdError::publication_not_found(survivor_id))?;

    Ok(MergeOutcome {
        survivor,
        merged_ids,
        imports_moved,
        authorships_moved,
        fields_filled,
        groups_deleted,
    })
}

/// Move authorships of `from` onto `to`.
///
/// Where `to` already credits the same user, that authorship is kept
/// (confirmed if either was) and the other is dropped. Returns the number
/// moved.
fn move_authorships(conn: &Connection, from: PublicationId, to: PublicationId) -> Result<usize> {
    let mut moved = 0;
    for authorship in queries::authorships_for(conn, from)? {
        match queries::authorship_for_user(conn, to, authorship.user_id)? {
            Some(existing) => {
                if authorship.confirmed && !existing.confirmed {
                    queries::confirm_authorship(conn, existing.id)?;
                }
                queries::delete_authorship(conn, authorship.id)?;
            }
            None => {
                queries::move_authorship(conn, authorship.id, to)?;
                moved += 1;
            }
        }
    }
    Ok(moved)
}

/// Copy `doi`, `journal_title` and `year` onto the survivor where it has none
fn fill_missing_fields(survivor: &mut Publication, merged: &[Publication]) -> Vec<String> {
    let mut filled = Vec::new();

    if is_blank(&survivor.doi) {
        if let Some(doi) = merged.iter().find(|p| !is_blank(&p.doi)).and_then(|p| p.doi.clone()) {
            survivor.doi = Some(doi);
            filled.push("doi".to_string());
        }
    }
    if is_blank(&survivor.journal_title) {
        if let Some(journal) = merged
            .iter()
            .find(|p| !is_blank(&p.journal_title))
            .and_then(|p| p.journal_title.clone())
        {
            survivor.journal_title = Some(journal);
            filled.push("journal_title".to_string());
        }
    }
    if survivor.year.is_none() {
        if let Some(year) = merged.iter().find_map(|p| p.year) {
            survivor.year = Some(year);
            filled.push("year".to_string());
        }
    }

    filled
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication(id: i64) -> Publication {
        Publication {
            id: PublicationId(id),
            title: format!("Paper {}", id),
            secondary_title: None,
            publication_type: "Academic Journal Article".to_string(),
            journal_title: None,
            doi: None,
            year: None,
            duplicate_group_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fill_missing_fields_first_non_empty_wins() {
        let mut survivor = publication(1);
        survivor.doi = Some("  ".to_string());

        let mut a = publication(2);
        a.journal_title = Some("Journal A".to_string());
        let mut b = publication(3);
        b.doi = Some("10.1/b".to_string());
        b.journal_title = Some("Journal B".to_string());
        b.year = Some(2019);

        let filled = fill_missing_fields(&mut survivor, &[a, b]);
        assert_eq!(filled, vec!["doi", "journal_title", "year"]);
        assert_eq!(survivor.doi.as_deref(), Some("10.1/b"));
        assert_eq!(survivor.journal_title.as_deref(), Some("Journal A"));
        assert_eq!(survivor.year, Some(2019));
    }

    #[test]
    fn test_fill_missing_fields_keeps_survivor_values() {
        let mut survivor = publication(1);
        survivor.year = Some(2020);
        let mut other = publication(2);
        other.year = Some(2018);

        assert!(fill_missing_fields(&mut survivor, &[other]).is_empty());
        assert_eq!(survivor.year, Some(2020));
    }

    #[test]
    fn test_merge_request_builder() {
        let request = MergeRequest::new(PublicationId(1), vec![PublicationId(2)])
            .in_group(DuplicateGroupId(4))
            .allowing_known_non_duplicates();
        assert_eq!(request.group_id, Some(DuplicateGroupId(4)));
        assert!(request.allow_known_non_duplicates);
    }
}
