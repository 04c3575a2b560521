//! SQLite schema for publication metadata storage

/// Schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// Get the complete schema SQL
    pub fn create_tables() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Working sets of suspected duplicates
CREATE TABLE IF NOT EXISTS duplicate_publication_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL
);

-- Publications (membership in a duplicate group is a nullable FK)
CREATE TABLE IF NOT EXISTS publications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    secondary_title TEXT,
    publication_type TEXT NOT NULL,
    journal_title TEXT,
    doi TEXT,
    year INTEGER,
    duplicate_publication_group_id INTEGER
        REFERENCES duplicate_publication_groups(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_publications_group ON publications(duplicate_publication_group_id);
CREATE INDEX IF NOT EXISTS idx_publications_doi ON publications(doi);
CREATE INDEX IF NOT EXISTS idx_publications_year ON publications(year);

-- Provenance: which external record a publication came from
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id INTEGER NOT NULL REFERENCES publications(id) ON DELETE CASCADE,
    source TEXT NOT NULL,
    source_identifier TEXT NOT NULL,
    auto_merged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (source, source_identifier)
);

CREATE INDEX IF NOT EXISTS idx_imports_publication ON imports(publication_id);

-- Authorships
CREATE TABLE IF NOT EXISTS authorships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    publication_id INTEGER NOT NULL REFERENCES publications(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL,
    author_number INTEGER NOT NULL,
    confirmed INTEGER NOT NULL DEFAULT 0,
    UNIQUE (publication_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_authorships_user ON authorships(user_id);

-- Recorded "these are not duplicates" decisions
CREATE TABLE IF NOT EXISTS non_duplicate_publication_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS non_duplicate_publication_group_memberships (
    non_duplicate_group_id INTEGER NOT NULL
        REFERENCES non_duplicate_publication_groups(id) ON DELETE CASCADE,
    publication_id INTEGER NOT NULL REFERENCES publications(id) ON DELETE CASCADE,
    PRIMARY KEY (non_duplicate_group_id, publication_id)
);

CREATE INDEX IF NOT EXISTS idx_nd_memberships_publication
    ON non_duplicate_publication_group_memberships(publication_id);
"#
    }

    /// Get migration SQL from one version to another
    pub fn migration(from: u32, to: u32) -> Option<&'static str> {
        match (from, to) {
            // Future migrations go here
            _ => None,
        }
    }
}
