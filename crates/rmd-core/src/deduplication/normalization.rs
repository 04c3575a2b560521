//! Text normalization for duplicate comparison

use unicode_normalization::UnicodeNormalization;

/// Normalize a title for comparison
///
/// - Removes diacritics
/// - Removes punctuation
/// - Converts to lowercase
/// - Collapses whitespace
/// - Removes a leading article
pub fn normalize_title(title: &str) -> String {
    let mut result: String = title
        // Unicode normalize (NFKD separates combining characters)
        .nfkd()
        // Punctuation becomes a word break so "carbon-cycle" matches "carbon cycle"
        .map(|c| if c == '-' || c == '/' || c == ':' { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
        .collect();

    result = result.to_lowercase();
    result = collapse_whitespace(&result);

    for prefix in ["a ", "an ", "the "] {
        if let Some(rest) = result.strip_prefix(prefix) {
            result = rest.to_string();
            break;
        }
    }

    result.trim().to_string()
}

/// Normalize a DOI to its bare lowercase `10.x/...` form
pub fn normalize_doi(doi: &str) -> String {
    let lowered = doi.trim().to_lowercase();
    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ];
    let bare = prefixes
        .iter()
        .find_map(|prefix| lowered.strip_prefix(*prefix))
        .unwrap_or(lowered.as_str());
    bare.trim().to_string()
}

/// Collapse runs of whitespace into a single space
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
