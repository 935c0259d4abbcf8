//! Repository layer: query plan execution and reference-data persistence.
//!
//! # Responsibility
//! - Execute rendered plans against SQLite and materialize records.
//! - Import controlled-vocabulary concepts with injected accession issuing.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Empty results are values; only integrity and transport problems are
//!   errors.

pub mod concept_repo;
pub mod lookup_repo;

pub use concept_repo::{AcGenerator, ConceptStore, SqliteConceptStore, UuidAcGenerator};
pub use lookup_repo::{
    normalize_max_results, EntityRecord, LookupRepository, Page, RepoError, RepoResult,
    SqliteLookupRepository, CONCEPT_LOAD_DEPTH,
};
