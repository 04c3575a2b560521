//! Similarity scoring for duplicate detection

use std::collections::BTreeSet;

use rmd_domain::{Publication, PublicationId};
use serde::Serialize;
use strsim::{jaro_winkler, normalized_levenshtein};

use super::normalization::{normalize_doi, normalize_title};
use crate::config::DeduplicationConfig;

/// Result of comparing two publications
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    /// Overall similarity score (0.0 to 1.0)
    pub score: f64,
    /// Whether the pair clears the configured thresholds
    pub is_duplicate: bool,
    /// Human-readable explanation
    pub reason: String,
}

/// Calculate title similarity using multiple metrics
pub fn title_similarity(title1: &str, title2: &str) -> f64 {
    let norm1 = normalize_title(title1);
    let norm2 = normalize_title(title2);

    if norm1.is_empty() || norm2.is_empty() {
        return 0.0;
    }

    // Jaro-Winkler for overall similarity, Levenshtein for exact characters
    let jw = jaro_winkler(&norm1, &norm2);
    let lev = normalized_levenshtein(&norm1, &norm2);

    jw * 0.6 + lev * 0.4
}

/// Years match when either is unknown or they differ by at most `tolerance`
pub fn years_compatible(a: Option<i32>, b: Option<i32>, tolerance: u32) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.abs_diff(b) <= tolerance,
        _ => true,
    }
}

/// Compare two publications
pub fn compare(a: &Publication, b: &Publication, config: &DeduplicationConfig) -> DuplicateMatch {
    if config.match_on_doi {
        if let (Some(doi_a), Some(doi_b)) = (&a.doi, &b.doi) {
            let doi_a = normalize_doi(doi_a);
            if !doi_a.is_empty() && doi_a == normalize_doi(doi_b) {
                return DuplicateMatch {
                    score: 1.0,
                    is_duplicate: true,
                    reason: "Matching DOI".to_string(),
                };
            }
        }
    }

    let score = title_similarity(&a.full_title(), &b.full_title());
    let title_matches = score >= config.title_threshold;
    let years_match = years_compatible(a.year, b.year, config.year_tolerance);

    let reason = match (title_matches, years_match) {
        (true, true) => format!("Title match ({:.0}%)", score * 100.0),
        (true, false) => format!(
            "Title match ({:.0}%) but years differ ({:?} vs {:?})",
            score * 100.0,
            a.year,
            b.year
        ),
        (false, _) => format!("Titles differ ({:.0}%)", score * 100.0),
    };

    DuplicateMatch {
        score,
        is_duplicate: title_matches && years_match,
        reason,
    }
}

/// Publications in `pool` that look like duplicates of `target`.
///
/// `target` itself and anything in `excluded` are never returned. Results
/// keep the order of `pool`.
pub fn find_candidates<'a>(
    target: &Publication,
    pool: &'a [Publication],
    config: &DeduplicationConfig,
    excluded: &BTreeSet<PublicationId>,
) -> Vec<&'a Publication> {
    pool.iter()
        .filter(|p| p.id != target.id && !excluded.contains(&p.id))
        .filter(|p| compare(target, p, config).is_duplicate)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn publication(id: i64, title: &str, year: Option<i32>, doi: Option<&str>) -> Publication {
        let now = Utc::now();
        Publication {
            id: PublicationId(id),
            title: title.to_string(),
            secondary_title: None,
            publication_type: "Academic Journal Article".to_string(),
            journal_title: None,
            doi: doi.map(str::to_string),
            year,
            duplicate_group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case("Soil Carbon Dynamics", "soil carbon dynamics")]
    #[case("The Soil Carbon Dynamics", "Soil carbon dynamics.")]
    #[case("Études du sol", "Etudes du Sol")]
    fn test_equivalent_titles_score_one(#[case] a: &str, #[case] b: &str) {
        assert!((title_similarity(a, b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_titles_score_low() {
        let score = title_similarity(
            "Soil carbon dynamics in temperate forests",
            "Deep learning for protein structure prediction",
        );
        assert!(score < 0.9, "score was {}", score);
    }

    #[test]
    fn test_empty_title_scores_zero() {
        assert_eq!(title_similarity("", "Anything"), 0.0);
        assert_eq!(title_similarity("!!!", "Anything"), 0.0);
    }

    #[rstest]
    #[case(Some(2020), Some(2020), 0, true)]
    #[case(Some(2020), Some(2021), 0, false)]
    #[case(Some(2020), Some(2021), 1, true)]
    #[case(None, Some(2021), 0, true)]
    #[case(None, None, 0, true)]
    fn test_years_compatible(
        #[case] a: Option<i32>,
        #[case] b: Option<i32>,
        #[case] tolerance: u32,
        #[case] expected: bool,
    ) {
        assert_eq!(years_compatible(a, b, tolerance), expected);
    }

    #[test]
    fn test_doi_match_beats_title() {
        let a = publication(1, "Paper A", Some(2019), Some("10.1000/xyz"));
        let b = publication(2, "Completely different", Some(2021), Some("https://doi.org/10.1000/XYZ"));
        let result = compare(&a, &b, &DeduplicationConfig::default());
        assert!(result.is_duplicate);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.reason, "Matching DOI");
    }

    #[test]
    fn test_doi_match_disabled() {
        let a = publication(1, "Paper A", Some(2019), Some("10.1000/xyz"));
        let b = publication(2, "Completely different", Some(2019), Some("10.1000/xyz"));
        let config = DeduplicationConfig {
            match_on_doi: false,
            ..Default::default()
        };
        assert!(!compare(&a, &b, &config).is_duplicate);
    }

    #[test]
    fn test_title_match_requires_compatible_year() {
        let a = publication(1, "Soil Carbon Dynamics", Some(2019), None);
        let b = publication(2, "Soil carbon dynamics", Some(2021), None);
        let result = compare(&a, &b, &DeduplicationConfig::default());
        assert!(!result.is_duplicate);
        assert!(result.reason.contains("years differ"));
    }

    #[test]
    fn test_find_candidates_skips_self_and_excluded() {
        let target = publication(1, "Soil Carbon Dynamics", Some(2020), None);
        let pool = vec![
            target.clone(),
            publication(2, "Soil carbon dynamics", Some(2020), None),
            publication(3, "Soil Carbon Dynamics!", None, None),
            publication(4, "Something else entirely", Some(2020), None),
        ];
        let excluded: BTreeSet<PublicationId> = [PublicationId(3)].into_iter().collect();

        let found = find_candidates(&target, &pool, &DeduplicationConfig::default(), &excluded);
        let ids: Vec<_> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PublicationId(2)]);
    }
}
