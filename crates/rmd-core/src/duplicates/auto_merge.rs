//! Automatic merging of unambiguous duplicate groups

use rusqlite::Connection;
use serde::Serialize;

use rmd_domain::{DuplicateGroupId, Import, ImportSource, Publication};

use super::load_publications;
use super::merge::{merge_in_tx, MergeOutcome, MergeRequest};
use crate::config::AutoMergeConfig;
use crate::deduplication::normalize_doi;
use crate::error::Result;
use crate::persistence::{queries, Repository};

/// Why a group qualified for automatic merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoMergeReason {
    /// Every member carries the same DOI
    SharedDoi,
    /// One Pure record paired with one Activity Insight record
    PureActivityInsightPair,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoMergedGroup {
    pub group_id: DuplicateGroupId,
    pub reason: AutoMergeReason,
    pub outcome: MergeOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedGroup {
    pub group_id: DuplicateGroupId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoMergeReport {
    pub merged: Vec<AutoMergedGroup>,
    pub skipped: Vec<SkippedGroup>,
}

/// Merge every duplicate group whose members are unambiguously the same work.
///
/// Each group is merged in its own transaction and never overrides a
/// non-duplicate decision; groups that hit one are reported as skipped.
/// Ineligible groups are left alone.
pub fn auto_merge(repo: &mut Repository, config: &AutoMergeConfig) -> Result<AutoMergeReport> {
    let group_ids: Vec<DuplicateGroupId> =
        repo.list_duplicate_groups()?.iter().map(|g| g.id).collect();
    let mut report = AutoMergeReport::default();

    for group_id in group_ids {
        let result = repo.with_transaction(|tx| {
            let Some((request, reason)) = plan_group(tx, group_id, config)? else {
                return Ok(None);
            };
            merge_in_tx(tx, &request, true).map(|outcome| Some((reason, outcome)))
        });

        match result {
            Ok(Some((reason, outcome))) => {
                tracing::info!(
                    group = %group_id,
                    survivor = %outcome.survivor.id,
                    ?reason,
                    "Auto-merged duplicate group"
                );
                report.merged.push(AutoMergedGroup {
                    group_id,
                    reason,
                    outcome,
                });
            }
            Ok(None) => {
                tracing::debug!(group = %group_id, "Group not eligible for auto-merge");
            }
            Err(e) if e.is_known_non_duplicate() => {
                tracing::warn!(group = %group_id, error = %e, "Skipped auto-merge");
                report.skipped.push(SkippedGroup {
                    group_id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        merged = report.merged.len(),
        skipped = report.skipped.len(),
        "Auto-merge finished"
    );
    Ok(report)
}

/// Decide whether a group is eligible and which member survives
fn plan_group(
    conn: &Connection,
    group_id: DuplicateGroupId,
    config: &AutoMergeConfig,
) -> Result<Option<(MergeRequest, AutoMergeReason)>> {
    let Some(group) = queries::get_duplicate_group(conn, group_id)? else {
        return Ok(None);
    };
    let publications = load_publications(conn, &group.publication_ids)?;
    if publications.len() < 2 {
        return Ok(None);
    }
    let imports = publications
        .iter()
        .map(|p| queries::imports_for(conn, p.id))
        .collect::<Result<Vec<_>>>()?;

    let reason = if config.merge_on_doi && shares_doi(&publications) {
        AutoMergeReason::SharedDoi
    } else if config.merge_pure_activity_insight_pairs && is_pure_activity_insight_pair(&imports) {
        AutoMergeReason::PureActivityInsightPair
    } else {
        return Ok(None);
    };

    let survivor = publications
        .iter()
        .zip(&imports)
        .min_by_key(|(p, imports)| (best_rank(imports, config), p.id))
        .map(|(p, _)| p.id);
    let Some(survivor_id) = survivor else {
        return Ok(None);
    };
    let merged_ids = publications
        .iter()
        .map(|p| p.id)
        .filter(|id| *id != survivor_id)
        .collect();

    Ok(Some((
        MergeRequest::new(survivor_id, merged_ids).in_group(group_id),
        reason,
    )))
}

fn shares_doi(publications: &[Publication]) -> bool {
    let mut dois = publications
        .iter()
        .map(|p| p.doi.as_deref().map(normalize_doi).unwrap_or_default());
    match dois.next() {
        Some(first) if !first.is_empty() => dois.all(|doi| doi == first),
        _ => false,
    }
}

fn is_pure_activity_insight_pair(imports: &[Vec<Import>]) -> bool {
    let [a, b] = imports else {
        return false;
    };
    (has_pure(a) && only_activity_insight(b)) || (has_pure(b) && only_activity_insight(a))
}

fn has_pure(imports: &[Import]) -> bool {
    imports.iter().any(|i| i.source == ImportSource::Pure)
}

fn only_activity_insight(imports: &[Import]) -> bool {
    !imports.is_empty()
        && imports
            .iter()
            .all(|i| i.source == ImportSource::ActivityInsight)
}

/// Rank of the most trusted source among `imports`; lower is better
fn best_rank(imports: &[Import], config: &AutoMergeConfig) -> usize {
    imports
        .iter()
        .map(|i| config.rank(i.source))
        .min()
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{group_publications, record_non_duplicates};
    use rmd_domain::{NewImport, NewPublication, PublicationId};

    fn create(repo: &mut Repository, new: NewPublication) -> PublicationId {
        repo.create_publication(&new).unwrap().id
    }

    #[test]
    fn test_shared_doi_group_merges_into_best_source() {
        let mut repo = Repository::in_memory().unwrap();
        let ai = create(
            &mut repo,
            NewPublication::new("Soil Carbon")
                .with_doi("10.1000/soil")
                .with_import(NewImport::new(ImportSource::ActivityInsight, "ai-1")),
        );
        let pure = create(
            &mut repo,
            NewPublication::new("Soil carbon")
                .with_doi("https://doi.org/10.1000/SOIL")
                .with_import(NewImport::new(ImportSource::Pure, "pure-1")),
        );
        let group = group_publications(&mut repo, &[ai, pure], false).unwrap();

        let report = auto_merge(&mut repo, &AutoMergeConfig::default()).unwrap();
        assert_eq!(report.merged.len(), 1);
        assert!(report.skipped.is_empty());

        let merged = &report.merged[0];
        assert_eq!(merged.group_id, group.id);
        assert_eq!(merged.reason, AutoMergeReason::SharedDoi);
        assert_eq!(merged.outcome.survivor.id, pure);
        assert_eq!(merged.outcome.merged_ids, vec![ai]);

        assert!(repo.get_publication(ai).unwrap().is_none());
        let imports = repo.imports_for(pure).unwrap();
        assert_eq!(imports.len(), 2);
        let moved = imports.iter().find(|i| i.source_identifier == "ai-1").unwrap();
        assert!(moved.auto_merged);
        let own = imports.iter().find(|i| i.source_identifier == "pure-1").unwrap();
        assert!(!own.auto_merged);
        assert!(repo.get_duplicate_group(group.id).unwrap().is_none());
    }

    #[test]
    fn test_pure_activity_insight_pair() {
        let mut repo = Repository::in_memory().unwrap();
        let ai = create(
            &mut repo,
            NewPublication::new("Forest Dynamics")
                .with_import(NewImport::new(ImportSource::ActivityInsight, "ai-7")),
        );
        let pure = create(
            &mut repo,
            NewPublication::new("Forest dynamics")
                .with_import(NewImport::new(ImportSource::Pure, "pure-7")),
        );
        group_publications(&mut repo, &[ai, pure], false).unwrap();

        let report = auto_merge(&mut repo, &AutoMergeConfig::default()).unwrap();
        assert_eq!(report.merged.len(), 1);
        assert_eq!(
            report.merged[0].reason,
            AutoMergeReason::PureActivityInsightPair
        );
        assert_eq!(report.merged[0].outcome.survivor.id, pure);
    }

    #[test]
    fn test_ineligible_group_left_alone() {
        let mut repo = Repository::in_memory().unwrap();
        let a = create(
            &mut repo,
            NewPublication::new("Ocean Heat").with_import(NewImport::new(ImportSource::Manual, "m-1")),
        );
        let b = create(
            &mut repo,
            NewPublication::new("Ocean heat").with_import(NewImport::new(ImportSource::Manual, "m-2")),
        );
        let group = group_publications(&mut repo, &[a, b], false).unwrap();

        let report = auto_merge(&mut repo, &AutoMergeConfig::default()).unwrap();
        assert!(report.merged.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(repo.get_duplicate_group(group.id).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_known_non_duplicates_are_skipped() {
        let mut repo = Repository::in_memory().unwrap();
        let a = create(&mut repo, NewPublication::new("Same").with_doi("10.5/x"));
        let b = create(&mut repo, NewPublication::new("Same").with_doi("10.5/x"));
        record_non_duplicates(&mut repo, &[a, b]).unwrap();
        let group = group_publications(&mut repo, &[a, b], true).unwrap();

        let report = auto_merge(&mut repo, &AutoMergeConfig::default()).unwrap();
        assert!(report.merged.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].group_id, group.id);
        assert!(repo.get_publication(a).unwrap().is_some());
        assert!(repo.get_publication(b).unwrap().is_some());
    }

    #[test]
    fn test_disabled_rules() {
        let config = AutoMergeConfig {
            merge_on_doi: false,
            merge_pure_activity_insight_pairs: false,
            ..Default::default()
        };
        let mut repo = Repository::in_memory().unwrap();
        let a = create(&mut repo, NewPublication::new("Same").with_doi("10.5/y"));
        let b = create(&mut repo, NewPublication::new("Same").with_doi("10.5/y"));
        group_publications(&mut repo, &[a, b], false).unwrap();

        let report = auto_merge(&mut repo, &config).unwrap();
        assert!(report.merged.is_empty());
    }
}
