//! Ontology-qualified entity lookups for a molecular-interaction curation
//! store.
//!
//! A [`LookupSpecification`] is resolved into one lookup mode per concept
//! slot, planned into a dialect-neutral [`QueryPlan`], then rendered and
//! executed by a [`LookupRepository`].

pub mod db;
pub mod logging;
pub mod lookup;
pub mod model;
pub mod plan;
pub mod render;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use lookup::spec::{
    ConceptResolution, Criterion, InvalidSpecificationError, LookupSpecification, MatchMode,
    ResolvedLookup, TargetField,
};
pub use model::concept::{Concept, CrossReference};
pub use model::schema::Schema;
pub use plan::{build_plan, PlanBuilder, QueryPlan};
pub use render::{JpqlRenderer, QueryRenderer, RenderError, RenderedQuery, SqliteRenderer};
pub use repo::{
    AcGenerator, ConceptStore, EntityRecord, LookupRepository, Page, RepoError, RepoResult,
    SqliteConceptStore, SqliteLookupRepository, UuidAcGenerator,
};
pub use service::{LookupService, XrefQuery};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
