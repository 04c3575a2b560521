//! Row-level SQL shared by the repository and the duplicate workflow.
//!
//! Every function takes a plain `&Connection` so it runs the same inside or
//! outside a transaction (`Transaction` derefs to `Connection`).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use rmd_domain::{
    Authorship, AuthorshipId, DuplicateGroupId, DuplicatePublicationGroup, Import, ImportId,
    ImportSource, NewAuthorship, NewImport, NewPublication, NonDuplicateGroupId,
    NonDuplicatePublicationGroup, Publication, PublicationId,
};

use crate::error::Result;

const PUBLICATION_COLUMNS: &str = "id, title, secondary_title, publication_type, journal_title, doi, year, duplicate_publication_group_id, created_at, updated_at";

const IMPORT_COLUMNS: &str = "id, publication_id, source, source_identifier, auto_merged, created_at";

const AUTHORSHIP_COLUMNS: &str = "id, publication_id, user_id, author_number, confirmed";

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ==================== Publications ====================

fn row_to_publication(row: &Row) -> rusqlite::Result<Publication> {
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Publication {
        id: PublicationId(row.get(0)?),
        title: row.get(1)?,
        secondary_title: row.get(2)?,
        publication_type: row.get(3)?,
        journal_title: row.get(4)?,
        doi: row.get(5)?,
        year: row.get(6)?,
        duplicate_group_id: row.get::<_, Option<i64>>(7)?.map(DuplicateGroupId),
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
    })
}

pub(crate) fn insert_publication(
    conn: &Connection,
    new: &NewPublication,
    now: DateTime<Utc>,
) -> Result<PublicationId> {
    conn.execute(
        r#"
        INSERT INTO publications
        (title, secondary_title, publication_type, journal_title, doi, year, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
        params![
            new.title.trim(),
            new.secondary_title,
            new.publication_type,
            new.journal_title,
            new.doi.as_deref().map(str::trim),
            new.year,
            now.to_rfc3339(),
        ],
    )?;
    Ok(PublicationId(conn.last_insert_rowid()))
}

pub(crate) fn get_publication(conn: &Connection, id: PublicationId) -> Result<Option<Publication>> {
    let sql = format!("SELECT {} FROM publications WHERE id = ?1", PUBLICATION_COLUMNS);
    let publication = conn
        .query_row(&sql, [id.value()], row_to_publication)
        .optional()?;
    Ok(publication)
}

pub(crate) fn all_publications(conn: &Connection) -> Result<Vec<Publication>> {
    let sql = format!("SELECT {} FROM publications ORDER BY id", PUBLICATION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let publications = stmt
        .query_map([], row_to_publication)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(publications)
}

/// Write back the mutable bibliographic fields and bump `updated_at`
pub(crate) fn update_publication_fields(
    conn: &Connection,
    publication: &Publication,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE publications
        SET journal_title = ?1, doi = ?2, year = ?3, updated_at = ?4
        WHERE id = ?5
        "#,
        params![
            publication.journal_title,
            publication.doi,
            publication.year,
            now.to_rfc3339(),
            publication.id.value(),
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_publication_row(conn: &Connection, id: PublicationId) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM publications WHERE id = ?1", [id.value()])?;
    Ok(deleted > 0)
}

pub(crate) fn set_duplicate_group(
    conn: &Connection,
    publication_id: PublicationId,
    group_id: Option<DuplicateGroupId>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE publications SET duplicate_publication_group_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            group_id.map(|g| g.value()),
            now.to_rfc3339(),
            publication_id.value()
        ],
    )?;
    Ok(())
}

// ==================== Duplicate groups ====================

pub(crate) fn insert_duplicate_group(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<DuplicateGroupId> {
    conn.execute(
        "INSERT INTO duplicate_publication_groups (created_at) VALUES (?1)",
        [now.to_rfc3339()],
    )?;
    Ok(DuplicateGroupId(conn.last_insert_rowid()))
}

pub(crate) fn group_members(
    conn: &Connection,
    group_id: DuplicateGroupId,
) -> Result<Vec<PublicationId>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM publications WHERE duplicate_publication_group_id = ?1 ORDER BY id",
    )?;
    let ids = stmt
        .query_map([group_id.value()], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(PublicationId))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub(crate) fn get_duplicate_group(
    conn: &Connection,
    id: DuplicateGroupId,
) -> Result<Option<DuplicatePublicationGroup>> {
    let created_at: Option<String> = conn
        .query_row(
            "SELECT created_at FROM duplicate_publication_groups WHERE id = ?1",
            [id.value()],
            |row| row.get(0),
        )
        .optional()?;

    match created_at {
        Some(created_at) => Ok(Some(DuplicatePublicationGroup {
            id,
            created_at: parse_timestamp(0, &created_at)?,
            publication_ids: group_members(conn, id)?,
        })),
        None => Ok(None),
    }
}

pub(crate) fn all_duplicate_groups(conn: &Connection) -> Result<Vec<DuplicatePublicationGroup>> {
    let mut stmt = conn.prepare("SELECT id FROM duplicate_publication_groups ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut groups = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(group) = get_duplicate_group(conn, DuplicateGroupId(id))? {
            groups.push(group);
        }
    }
    Ok(groups)
}

/// Delete a group row and release its members
pub(crate) fn delete_duplicate_group(
    conn: &Connection,
    id: DuplicateGroupId,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE publications SET duplicate_publication_group_id = NULL, updated_at = ?1 WHERE duplicate_publication_group_id = ?2",
        params![now.to_rfc3339(), id.value()],
    )?;
    conn.execute(
        "DELETE FROM duplicate_publication_groups WHERE id = ?1",
        [id.value()],
    )?;
    Ok(())
}

/// Delete the group if it is down to one member or none.
///
/// Returns whether the group no longer exists.
pub(crate) fn prune_duplicate_group(
    conn: &Connection,
    id: DuplicateGroupId,
    now: DateTime<Utc>,
) -> Result<bool> {
    if get_duplicate_group(conn, id)?.is_none() {
        return Ok(true);
    }
    if group_members(conn, id)?.len() <= 1 {
        delete_duplicate_group(conn, id, now)?;
        tracing::debug!(group = %id, "Deleted duplicate group with fewer than two members");
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

// ==================== Imports ====================

fn row_to_import(row: &Row) -> rusqlite::Result<Import> {
    let source_str: String = row.get(2)?;
    let created_at: String = row.get(5)?;

    let source = source_str
        .parse::<ImportSource>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Import {
        id: ImportId(row.get(0)?),
        publication_id: PublicationId(row.get(1)?),
        source,
        source_identifier: row.get(3)?,
        auto_merged: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

pub(crate) fn insert_import(
    conn: &Connection,
    publication_id: PublicationId,
    new: &NewImport,
    now: DateTime<Utc>,
) -> Result<Import> {
    conn.execute(
        r#"
        INSERT INTO imports (publication_id, source, source_identifier, auto_merged, created_at)
        VALUES (?1, ?2, ?3, 0, ?4)
        "#,
        params![
            publication_id.value(),
            new.source.name(),
            new.source_identifier.trim(),
            now.to_rfc3339(),
        ],
    )?;

    Ok(Import {
        id: ImportId(conn.last_insert_rowid()),
        publication_id,
        source: new.source,
        source_identifier: new.source_identifier.trim().to_string(),
        auto_merged: false,
        created_at: now,
    })
}

pub(crate) fn imports_for(conn: &Connection, publication_id: PublicationId) -> Result<Vec<Import>> {
    let sql = format!(
        "SELECT {} FROM imports WHERE publication_id = ?1 ORDER BY id",
        IMPORT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let imports = stmt
        .query_map([publication_id.value()], row_to_import)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(imports)
}

/// Move every import of `from` onto `to`; returns the number moved
pub(crate) fn reassign_imports(
    conn: &Connection,
    from: PublicationId,
    to: PublicationId,
    auto_merged: bool,
) -> Result<usize> {
    let moved = if auto_merged {
        conn.execute(
            "UPDATE imports SET publication_id = ?1, auto_merged = 1 WHERE publication_id = ?2",
            params![to.value(), from.value()],
        )?
    } else {
        conn.execute(
            "UPDATE imports SET publication_id = ?1 WHERE publication_id = ?2",
            params![to.value(), from.value()],
        )?
    };
    Ok(moved)
}

// ==================== Authorships ====================

fn row_to_authorship(row: &Row) -> rusqlite::Result<Authorship> {
    Ok(Authorship {
        id: AuthorshipId(row.get(0)?),
        publication_id: PublicationId(row.get(1)?),
        user_id: row.get(2)?,
        author_number: row.get(3)?,
        confirmed: row.get(4)?,
    })
}

pub(crate) fn insert_authorship(
    conn: &Connection,
    publication_id: PublicationId,
    new: &NewAuthorship,
) -> Result<Authorship> {
    conn.execute(
        r#"
        INSERT INTO authorships (publication_id, user_id, author_number, confirmed)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            publication_id.value(),
            new.user_id,
            new.author_number,
            new.confirmed
        ],
    )?;

    Ok(Authorship {
        id: AuthorshipId(conn.last_insert_rowid()),
        publication_id,
        user_id: new.user_id,
        author_number: new.author_number,
        confirmed: new.confirmed,
    })
}

pub(crate) fn authorships_for(
    conn: &Connection,
    publication_id: PublicationId,
) -> Result<Vec<Authorship>> {
    let sql = format!(
        "SELECT {} FROM authorships WHERE publication_id = ?1 ORDER BY author_number, id",
        AUTHORSHIP_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let authorships = stmt
        .query_map([publication_id.value()], row_to_authorship)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(authorships)
}

pub(crate) fn authorship_for_user(
    conn: &Connection,
    publication_id: PublicationId,
    user_id: i64,
) -> Result<Option<Authorship>> {
    let sql = format!(
        "SELECT {} FROM authorships WHERE publication_id = ?1 AND user_id = ?2",
        AUTHORSHIP_COLUMNS
    );
    let authorship = conn
        .query_row(&sql, params![publication_id.value(), user_id], row_to_authorship)
        .optional()?;
    Ok(authorship)
}

pub(crate) fn move_authorship(
    conn: &Connection,
    id: AuthorshipId,
    to: PublicationId,
) -> Result<()> {
    conn.execute(
        "UPDATE authorships SET publication_id = ?1 WHERE id = ?2",
        params![to.value(), id.value()],
    )?;
    Ok(())
}

pub(crate) fn confirm_authorship(conn: &Connection, id: AuthorshipId) -> Result<()> {
    conn.execute(
        "UPDATE authorships SET confirmed = 1 WHERE id = ?1",
        [id.value()],
    )?;
    Ok(())
}

pub(crate) fn delete_authorship(conn: &Connection, id: AuthorshipId) -> Result<()> {
    conn.execute("DELETE FROM authorships WHERE id = ?1", [id.value()])?;
    Ok(())
}

// ==================== Non-duplicate groups ====================

fn non_duplicate_members(
    conn: &Connection,
    id: NonDuplicateGroupId,
) -> Result<Vec<PublicationId>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT publication_id FROM non_duplicate_publication_group_memberships
        WHERE non_duplicate_group_id = ?1 ORDER BY publication_id
        "#,
    )?;
    let ids = stmt
        .query_map([id.value()], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(PublicationId))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn row_to_group_header(row: &Row) -> rusqlite::Result<(i64, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn load_non_duplicate_groups(
    conn: &Connection,
    sql: &str,
    param: Option<i64>,
) -> Result<Vec<NonDuplicatePublicationGroup>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match param {
        Some(value) => stmt
            .query_map([value], row_to_group_header)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], row_to_group_header)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    let mut groups = Vec::with_capacity(rows.len());
    for (id, created_at) in rows {
        let id = NonDuplicateGroupId(id);
        groups.push(NonDuplicatePublicationGroup {
            id,
            created_at: parse_timestamp(1, &created_at)?,
            publication_ids: non_duplicate_members(conn, id)?,
        });
    }
    Ok(groups)
}

pub(crate) fn insert_non_duplicate_group(
    conn: &Connection,
    publication_ids: &BTreeSet<PublicationId>,
    now: DateTime<Utc>,
) -> Result<NonDuplicatePublicationGroup> {
    conn.execute(
        "INSERT INTO non_duplicate_publication_groups (created_at) VALUES (?1)",
        [now.to_rfc3339()],
    )?;
    let id = NonDuplicateGroupId(conn.last_insert_rowid());

    let mut stmt = conn.prepare(
        r#"
        INSERT INTO non_duplicate_publication_group_memberships (non_duplicate_group_id, publication_id)
        VALUES (?1, ?2)
        "#,
    )?;
    for publication_id in publication_ids {
        stmt.execute(params![id.value(), publication_id.value()])?;
    }

    Ok(NonDuplicatePublicationGroup {
        id,
        created_at: now,
        publication_ids: publication_ids.iter().copied().collect(),
    })
}

pub(crate) fn all_non_duplicate_groups(
    conn: &Connection,
) -> Result<Vec<NonDuplicatePublicationGroup>> {
    load_non_duplicate_groups(
        conn,
        "SELECT id, created_at FROM non_duplicate_publication_groups ORDER BY id",
        None,
    )
}

pub(crate) fn non_duplicate_groups_for(
    conn: &Connection,
    publication_id: PublicationId,
) -> Result<Vec<NonDuplicatePublicationGroup>> {
    load_non_duplicate_groups(
        conn,
        r#"
        SELECT g.id, g.created_at
        FROM non_duplicate_publication_groups g
        JOIN non_duplicate_publication_group_memberships m ON m.non_duplicate_group_id = g.id
        WHERE m.publication_id = ?1
        ORDER BY g.id
        "#,
        Some(publication_id.value()),
    )
}

/// Publications that share a non-duplicate decision with `publication_id`
pub(crate) fn non_duplicate_partners(
    conn: &Connection,
    publication_id: PublicationId,
) -> Result<BTreeSet<PublicationId>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT other.publication_id
        FROM non_duplicate_publication_group_memberships mine
        JOIN non_duplicate_publication_group_memberships other
          ON other.non_duplicate_group_id = mine.non_duplicate_group_id
        WHERE mine.publication_id = ?1 AND other.publication_id != ?1
        "#,
    )?;
    let partners = stmt
        .query_map([publication_id.value()], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(PublicationId))
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(partners)
}

/// Pairs among `ids` recorded together in some non-duplicate group.
///
/// Each pair is reported once, lower id first, in ascending order.
pub(crate) fn known_non_duplicate_pairs(
    conn: &Connection,
    ids: &[PublicationId],
) -> Result<Vec<(PublicationId, PublicationId)>> {
    let wanted: BTreeSet<PublicationId> = ids.iter().copied().collect();
    let mut pairs = BTreeSet::new();

    for id in &wanted {
        for partner in non_duplicate_partners(conn, *id)? {
            if *id < partner && wanted.contains(&partner) {
                pairs.insert((*id, partner));
            }
        }
    }

    Ok(pairs.into_iter().collect())
}

/// Re-point the non-duplicate memberships of `from` at `to`.
///
/// Memberships `to` already holds are dropped instead. Returns the number of
/// memberships re-pointed.
pub(crate) fn repoint_non_duplicate_memberships(
    conn: &Connection,
    from: PublicationId,
    to: PublicationId,
) -> Result<usize> {
    let moved = conn.execute(
        r#"
        UPDATE OR IGNORE non_duplicate_publication_group_memberships
        SET publication_id = ?1 WHERE publication_id = ?2
        "#,
        params![to.value(), from.value()],
    )?;
    conn.execute(
        "DELETE FROM non_duplicate_publication_group_memberships WHERE publication_id = ?1",
        [from.value()],
    )?;
    Ok(moved)
}
