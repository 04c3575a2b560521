//! Duplicate detection for publications
//!
//! This module provides the normalization and similarity scoring used to
//! decide which publications are candidate duplicates of each other.

mod normalization;
mod similarity;

pub use normalization::{normalize_doi, normalize_title};
pub use similarity::{compare, find_candidates, title_similarity, years_compatible, DuplicateMatch};
