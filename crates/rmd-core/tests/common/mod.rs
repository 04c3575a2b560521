//! Shared helpers for rmd-core integration tests

use rmd_core::domain::{
    ImportSource, NewAuthorship, NewImport, NewPublication, Publication, PublicationId,
};
use rmd_core::Repository;

pub fn repository() -> Repository {
    Repository::in_memory().expect("in-memory repository")
}

/// Create a journal article with one import from `source`
pub fn article(
    repo: &mut Repository,
    title: &str,
    year: i32,
    source: ImportSource,
    source_identifier: &str,
) -> Publication {
    repo.create_publication(
        &NewPublication::new(title)
            .with_year(year)
            .with_import(NewImport::new(source, source_identifier)),
    )
    .expect("create publication")
}

#[allow(dead_code)]
pub fn with_author(
    repo: &mut Repository,
    id: PublicationId,
    user_id: i64,
    author_number: i32,
    confirmed: bool,
) {
    let mut authorship = NewAuthorship::new(user_id, author_number);
    if confirmed {
        authorship = authorship.confirmed();
    }
    repo.add_authorship(id, &authorship).expect("add authorship");
}
