//! Repository for CRUD operations on publication metadata

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::Serialize;

use rmd_domain::{
    Authorship, DuplicateGroupId, DuplicatePublicationGroup, Import, NewAuthorship, NewImport,
    NewPublication, NonDuplicatePublicationGroup, Publication, PublicationId,
};

use super::queries;
use super::schema::{Schema, SCHEMA_VERSION};
use crate::error::{PersistenceError, Result, RmdError};

/// Row counts reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub publications: u64,
    pub imports: u64,
    pub duplicate_groups: u64,
    pub non_duplicate_groups: u64,
}

/// Repository for persisting publication metadata
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Create a new repository with the given database path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Create an in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let current_version = self.get_schema_version().unwrap_or(0);

        if current_version == 0 {
            // Fresh database, create all tables
            self.conn.execute_batch(Schema::create_tables())?;
            self.set_schema_version(SCHEMA_VERSION)?;
        } else if current_version < SCHEMA_VERSION {
            for version in current_version..SCHEMA_VERSION {
                match Schema::migration(version, version + 1) {
                    Some(migration) => self.conn.execute_batch(migration)?,
                    None => {
                        return Err(PersistenceError::Migration(format!(
                            "no migration from schema version {} to {}",
                            version,
                            version + 1
                        ))
                        .into())
                    }
                }
            }
            self.set_schema_version(SCHEMA_VERSION)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(PersistenceError::Migration(format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ))
            .into());
        }

        Ok(())
    }

    fn get_schema_version(&self) -> Option<u32> {
        self.conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY applied_at DESC, version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok()
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        Ok(())
    }

    /// Current schema version recorded in the database
    pub fn schema_version(&self) -> u32 {
        self.get_schema_version().unwrap_or(0)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`; the transaction is rolled back when it
    /// returns `Err` (or panics), leaving the database untouched.
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ==================== Publication Operations ====================

    /// Create a publication together with its imports and authorships
    pub fn create_publication(&mut self, new: &NewPublication) -> Result<Publication> {
        new.validate()?;

        let now = Utc::now();
        let id = self.with_transaction(|tx| {
            let id = queries::insert_publication(tx, new, now)?;
            for import in &new.imports {
                queries::insert_import(tx, id, import, now)?;
            }
            for authorship in &new.authorships {
                queries::insert_authorship(tx, id, authorship)?;
            }
            Ok(id)
        })?;

        tracing::debug!(publication = %id, title = %new.title, "Created publication");
        self.get_publication(id)?
            .ok_or_else(|| RmdError::publication_not_found(id))
    }

    /// Get a publication by ID
    pub fn get_publication(&self, id: PublicationId) -> Result<Option<Publication>> {
        queries::get_publication(&self.conn, id)
    }

    /// Get all publications, oldest first
    pub fn list_publications(&self) -> Result<Vec<Publication>> {
        queries::all_publications(&self.conn)
    }

    /// Delete a publication, its imports and authorships.
    ///
    /// A duplicate group left with fewer than two members is deleted too.
    pub fn delete_publication(&mut self, id: PublicationId) -> Result<()> {
        self.with_transaction(|tx| {
            let publication = queries::get_publication(tx, id)?
                .ok_or_else(|| RmdError::publication_not_found(id))?;
            queries::delete_publication_row(tx, id)?;
            if let Some(group_id) = publication.duplicate_group_id {
                queries::prune_duplicate_group(tx, group_id, Utc::now())?;
            }
            Ok(())
        })?;
        tracing::info!(publication = %id, "Deleted publication");
        Ok(())
    }

    // ==================== Import Operations ====================

    /// Attach a new import to a publication
    pub fn add_import(&self, publication_id: PublicationId, new: &NewImport) -> Result<Import> {
        new.validate()?;
        if self.get_publication(publication_id)?.is_none() {
            return Err(RmdError::publication_not_found(publication_id));
        }
        queries::insert_import(&self.conn, publication_id, new, Utc::now())
    }

    /// Get the imports of a publication
    pub fn imports_for(&self, publication_id: PublicationId) -> Result<Vec<Import>> {
        queries::imports_for(&self.conn, publication_id)
    }

    // ==================== Authorship Operations ====================

    /// Attach a new authorship to a publication
    pub fn add_authorship(
        &self,
        publication_id: PublicationId,
        new: &NewAuthorship,
    ) -> Result<Authorship> {
        if self.get_publication(publication_id)?.is_none() {
            return Err(RmdError::publication_not_found(publication_id));
        }
        queries::insert_authorship(&self.conn, publication_id, new)
    }

    /// Get the authorships of a publication
    pub fn authorships_for(&self, publication_id: PublicationId) -> Result<Vec<Authorship>> {
        queries::authorships_for(&self.conn, publication_id)
    }

    // ==================== Group Operations ====================

    /// Get a duplicate group by ID
    pub fn get_duplicate_group(
        &self,
        id: DuplicateGroupId,
    ) -> Result<Option<DuplicatePublicationGroup>> {
        queries::get_duplicate_group(&self.conn, id)
    }

    /// Get all duplicate groups
    pub fn list_duplicate_groups(&self) -> Result<Vec<DuplicatePublicationGroup>> {
        queries::all_duplicate_groups(&self.conn)
    }

    /// Get all recorded non-duplicate decisions
    pub fn list_non_duplicate_groups(&self) -> Result<Vec<NonDuplicatePublicationGroup>> {
        queries::all_non_duplicate_groups(&self.conn)
    }

    /// Get the non-duplicate decisions a publication is part of
    pub fn non_duplicate_groups_for(
        &self,
        publication_id: PublicationId,
    ) -> Result<Vec<NonDuplicatePublicationGroup>> {
        queries::non_duplicate_groups_for(&self.conn, publication_id)
    }

    /// Pairs among `ids` that were previously recorded as not duplicates
    pub fn known_non_duplicate_pairs(
        &self,
        ids: &[PublicationId],
    ) -> Result<Vec<(PublicationId, PublicationId)>> {
        queries::known_non_duplicate_pairs(&self.conn, ids)
    }

    // ==================== System Operations ====================

    /// Row counts for status reporting
    pub fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            publications: queries::count_rows(&self.conn, "publications")?,
            imports: queries::count_rows(&self.conn, "imports")?,
            duplicate_groups: queries::count_rows(&self.conn, "duplicate_publication_groups")?,
            non_duplicate_groups: queries::count_rows(
                &self.conn,
                "non_duplicate_publication_groups",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmd_domain::ImportSource;

    fn article(title: &str) -> NewPublication {
        NewPublication::new(title).with_year(2020)
    }

    #[test]
    fn test_repository_creation() {
        let repo = Repository::in_memory().unwrap();
        assert!(repo.list_publications().unwrap().is_empty());
        assert_eq!(repo.schema_version(), SCHEMA_VERSION);
    }

    #[test]
    fn test_publication_crud() {
        let mut repo = Repository::in_memory().unwrap();

        let new = article("Soil Carbon Dynamics")
            .with_doi(" 10.1000/soil ")
            .with_import(NewImport::new(ImportSource::Pure, "pure-1"))
            .with_authorship(NewAuthorship::new(11, 1).confirmed());
        let created = repo.create_publication(&new).unwrap();

        let loaded = repo.get_publication(created.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Soil Carbon Dynamics");
        assert_eq!(loaded.doi.as_deref(), Some("10.1000/soil"));
        assert_eq!(loaded.year, Some(2020));
        assert!(loaded.duplicate_group_id.is_none());

        let imports = repo.imports_for(created.id).unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source, ImportSource::Pure);
        assert!(!imports[0].auto_merged);

        let authorships = repo.authorships_for(created.id).unwrap();
        assert_eq!(authorships.len(), 1);
        assert!(authorships[0].confirmed);

        repo.delete_publication(created.id).unwrap();
        assert!(repo.get_publication(created.id).unwrap().is_none());
        assert!(repo.imports_for(created.id).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_publication_rejected() {
        let mut repo = Repository::in_memory().unwrap();
        let err = repo.create_publication(&NewPublication::new("")).unwrap_err();
        assert!(matches!(err, RmdError::Validation(_)));
        assert!(repo.list_publications().unwrap().is_empty());
    }

    #[test]
    fn test_delete_grouped_publication_prunes_pair_group() {
        let mut repo = Repository::in_memory().unwrap();
        let a = repo.create_publication(&article("Pair A")).unwrap().id;
        let b = repo.create_publication(&article("Pair B")).unwrap().id;
        let group = crate::duplicates::group_publications(&mut repo, &[a, b], false).unwrap();

        repo.delete_publication(a).unwrap();

        assert!(repo.get_duplicate_group(group.id).unwrap().is_none());
        assert!(repo.list_duplicate_groups().unwrap().is_empty());
        let survivor = repo.get_publication(b).unwrap().unwrap();
        assert_eq!(survivor.duplicate_group_id, None);
    }

    #[test]
    fn test_delete_grouped_publication_keeps_larger_group() {
        let mut repo = Repository::in_memory().unwrap();
        let a = repo.create_publication(&article("Trio A")).unwrap().id;
        let b = repo.create_publication(&article("Trio B")).unwrap().id;
        let c = repo.create_publication(&article("Trio C")).unwrap().id;
        let group = crate::duplicates::group_publications(&mut repo, &[a, b, c], false).unwrap();

        repo.delete_publication(b).unwrap();

        let remaining = repo.get_duplicate_group(group.id).unwrap().unwrap();
        assert_eq!(remaining.publication_ids, vec![a, c]);
        for id in [a, c] {
            let publication = repo.get_publication(id).unwrap().unwrap();
            assert_eq!(publication.duplicate_group_id, Some(group.id));
        }
    }

    #[test]
    fn test_duplicate_source_identifier_rolls_back() {
        let mut repo = Repository::in_memory().unwrap();
        repo.create_publication(
            &article("First").with_import(NewImport::new(ImportSource::ActivityInsight, "ai-7")),
        )
        .unwrap();

        let err = repo
            .create_publication(
                &article("Second")
                    .with_import(NewImport::new(ImportSource::ActivityInsight, "ai-7")),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RmdError::Persistence(PersistenceError::Conflict(_))
        ));
        // The publication row from the failed transaction is gone as well
        assert_eq!(repo.list_publications().unwrap().len(), 1);
    }

    #[test]
    fn test_add_import_to_missing_publication() {
        let repo = Repository::in_memory().unwrap();
        let err = repo
            .add_import(PublicationId(99), &NewImport::new(ImportSource::Pure, "x"))
            .unwrap_err();
        assert!(matches!(err, RmdError::NotFound(_)));
    }

    #[test]
    fn test_counts() {
        let mut repo = Repository::in_memory().unwrap();
        repo.create_publication(
            &article("Counted").with_import(NewImport::new(ImportSource::Manual, "m-1")),
        )
        .unwrap();
        let counts = repo.counts().unwrap();
        assert_eq!(counts.publications, 1);
        assert_eq!(counts.imports, 1);
        assert_eq!(counts.duplicate_groups, 0);
        assert_eq!(counts.non_duplicate_groups, 0);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rmd.db");

        let id = {
            let mut repo = Repository::new(&path).unwrap();
            repo.create_publication(&article("Persisted")).unwrap().id
        };

        let repo = Repository::new(&path).unwrap();
        assert_eq!(repo.schema_version(), SCHEMA_VERSION);
        let loaded = repo.get_publication(id).unwrap().unwrap();
        assert_eq!(loaded.title, "Persisted");
    }
}
