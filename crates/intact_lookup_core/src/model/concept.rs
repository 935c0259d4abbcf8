//! Controlled-vocabulary concepts and their cross-references.
//!
//! # Responsibility
//! - Define the read-mostly reference data shapes used by lookups.
//! - Answer "is this concept identified by ontology id X" in memory.
//!
//! # Invariants
//! - A concept owns its cross-reference list.
//! - Database and qualifier concepts are shared references, never owned.
//! - An xref without qualifier never counts as an ontology identifier.

use crate::model::vocabulary::{is_ontology_id_qualifier, IDENTITY, PSI_MI, PSI_MI_MI};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

static ONTOLOGY_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*:[A-Za-z0-9_.-]+$").expect("valid ontology id regex")
});

/// Controlled-vocabulary term, e.g. one PSI-MI ontology entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Stable accession in the curation store. `None` before import.
    pub ac: Option<String>,
    /// Human-readable label. Not guaranteed unique.
    pub short_name: String,
    pub full_name: Option<String>,
    pub xrefs: Vec<CrossReference>,
}

/// Typed pointer from a concept to a record in an external database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    /// Database concept, e.g. `psi-mi`.
    pub database: Arc<Concept>,
    /// Primary id inside `database`.
    pub id: String,
    /// Relationship of this xref, e.g. `identity` or `secondary-ac`.
    pub qualifier: Option<Arc<Concept>>,
}

impl Concept {
    /// Creates a concept with no accession and no cross-references.
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            ac: None,
            short_name: short_name.into(),
            full_name: None,
            xrefs: Vec::new(),
        }
    }

    /// Creates a concept identified by a PSI-MI `identity` cross-reference.
    pub fn with_ontology_id(short_name: impl Into<String>, ontology_id: impl Into<String>) -> Self {
        let mut concept = Self::new(short_name);
        concept.xrefs.push(CrossReference::new(
            psi_mi_database(),
            ontology_id,
            Some(identity_qualifier()),
        ));
        concept
    }

    /// Returns the first PSI-MI identity id, if the concept carries one.
    pub fn ontology_id(&self) -> Option<&str> {
        self.xrefs
            .iter()
            .find(|xref| {
                xref.database.short_name == PSI_MI
                    && xref
                        .qualifier
                        .as_ref()
                        .is_some_and(|qualifier| qualifier.short_name == IDENTITY)
            })
            .map(|xref| xref.id.as_str())
    }

    pub fn matches_ontology_id(&self, ontology_id: &str) -> bool {
        concept_matches_ontology_id(self, ontology_id)
    }
}

impl CrossReference {
    pub fn new(
        database: Arc<Concept>,
        id: impl Into<String>,
        qualifier: Option<Arc<Concept>>,
    ) -> Self {
        Self {
            database,
            id: id.into(),
            qualifier,
        }
    }

    /// Returns whether this xref identifies its owner in the PSI-MI ontology.
    pub fn is_ontology_reference(&self) -> bool {
        self.database.short_name == PSI_MI
            && self
                .qualifier
                .as_ref()
                .is_some_and(|qualifier| is_ontology_id_qualifier(&qualifier.short_name))
    }
}

/// Returns whether `concept` is identified by `ontology_id`.
///
/// Matches xrefs in the `psi-mi` database qualified as `identity` or
/// `secondary-ac`. Comparison of the id is exact.
pub fn concept_matches_ontology_id(concept: &Concept, ontology_id: &str) -> bool {
    concept
        .xrefs
        .iter()
        .any(|xref| xref.is_ontology_reference() && xref.id == ontology_id)
}

/// Returns whether `value` has the `PREFIX:LOCAL` ontology id shape.
pub fn is_well_formed_ontology_id(value: &str) -> bool {
    ONTOLOGY_ID_RE.is_match(value)
}

/// Shared `psi-mi` database concept, self-identified as `MI:0488`.
///
/// The nested database reference is left without xrefs to keep the graph
/// acyclic.
pub fn psi_mi_database() -> Arc<Concept> {
    let mut database = Concept::new(PSI_MI);
    database.xrefs.push(CrossReference::new(
        Arc::new(Concept::new(PSI_MI)),
        PSI_MI_MI,
        Some(Arc::new(Concept::new(IDENTITY))),
    ));
    Arc::new(database)
}

/// Shared `identity` qualifier concept.
pub fn identity_qualifier() -> Arc<Concept> {
    Arc::new(Concept::new(IDENTITY))
}
