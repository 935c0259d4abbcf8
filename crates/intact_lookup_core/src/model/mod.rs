//! Reference data and schema model.
//!
//! # Responsibility
//! - Define concepts, cross-references and the PSI-MI constants.
//! - Describe the entity-relation graph lookups are planned over.
//!
//! # Invariants
//! - Concepts are referenced by many entities and owned by none.
//! - Schema descriptors are static data; no subclassing per entity.

pub mod concept;
pub mod schema;
pub mod vocabulary;
