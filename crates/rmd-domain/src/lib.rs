//! Domain types for the publication metadata service
//!
//! This crate provides the records the deduplication workflow operates on:
//! - Publication: a bibliographic record, optionally in a duplicate group
//! - Import: provenance tying a publication to an external source record
//! - Authorship: a user's authorship of a publication
//! - DuplicatePublicationGroup / NonDuplicatePublicationGroup: pending
//!   duplicate sets and recorded "not a duplicate" decisions

pub mod authorship;
pub mod group;
pub mod ids;
pub mod import;
pub mod publication;

pub use authorship::*;
pub use group::*;
pub use ids::*;
pub use import::*;
pub use publication::*;
