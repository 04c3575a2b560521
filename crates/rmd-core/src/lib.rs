//! RMD Core - publication deduplication and merge
//!
//! This crate provides the duplicate-publication workflow of the research
//! metadata database:
//!
//! - **Persistence**: SQLite storage for publications, imports, authorships,
//!   duplicate groups and non-duplicate decisions
//! - **Deduplication**: title normalization and similarity scoring used to
//!   find candidate duplicates
//! - **Duplicates**: grouping suspected duplicates, ignoring groups,
//!   recording non-duplicate decisions, and transactional merge / auto-merge
//! - **Config**: thresholds, source priority and server settings
//!
//! # Lifecycle
//!
//! ```text
//! ungrouped ──group──▶ grouped ──merge──▶ merged (record deleted)
//!                         │
//!                         └──ignore──▶ ungrouped + non-duplicate decision
//! ```
//!
//! A group only exists while it has two or more members. A merge that would
//! fold together publications previously recorded as non-duplicates is
//! refused unless the caller explicitly overrides it.

pub mod config;
pub mod deduplication;
pub mod duplicates;
pub mod error;
pub mod persistence;

pub use config::{AutoMergeConfig, ConfigError, DeduplicationConfig, RmdConfig, ServerConfig};
pub use duplicates::{
    auto_merge, group_all_duplicates, group_duplicates_of, group_publications, ignore_group,
    merge, record_non_duplicates, remove_from_group, AutoMergeReason, AutoMergeReport, AutoMergedGroup,
    DetectionReport, MergeOutcome, MergeRequest, SkippedGroup,
};
pub use error::{GroupError, MergeError, PersistenceError, Result, RmdError};
pub use persistence::{Repository, Schema};

pub use rmd_domain as domain;
