//! Reference-data import for controlled-vocabulary concepts.
//!
//! # Responsibility
//! - Persist concepts and their cross-references into `cv_term` tables.
//! - Reuse already imported database/qualifier concepts instead of
//!   duplicating them.
//!
//! # Invariants
//! - Accessions are issued by an injected [`AcGenerator`].
//! - A concept is written in one transaction together with its xrefs.
//! - Existing rows are reused, never rewritten; a row matched by label
//!   only gains the xrefs it is missing.

use crate::lookup::spec::{LookupSpecification, TargetField};
use crate::model::concept::Concept;
use crate::model::schema::{Schema, CONCEPT_ENTITY, SELF_RELATION};
use crate::plan::build_plan;
use crate::repo::lookup_repo::{count_records, query_records, Page, RepoError, RepoResult};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

const DEFAULT_AC_PREFIX: &str = "EBI";

/// Source of new accessions for imported rows.
pub trait AcGenerator {
    fn next_ac(&self) -> String;
}

/// Issues `<prefix>-<uuid v4>` accessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidAcGenerator {
    prefix: String,
}

impl UuidAcGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidAcGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_AC_PREFIX)
    }
}

impl AcGenerator for UuidAcGenerator {
    fn next_ac(&self) -> String {
        format!("{}-{}", self.prefix, Uuid::new_v4())
    }
}

/// Write contract for reference data.
pub trait ConceptStore {
    /// Persists `concept` and returns its accession.
    fn store_concept(&mut self, concept: &Concept) -> RepoResult<String>;
}

/// SQLite-backed concept importer.
pub struct SqliteConceptStore<'conn, G: AcGenerator = UuidAcGenerator> {
    conn: &'conn mut Connection,
    ac_generator: G,
}

impl<'conn> SqliteConceptStore<'conn, UuidAcGenerator> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_generator(conn, UuidAcGenerator::default())
    }
}

impl<'conn, G: AcGenerator> SqliteConceptStore<'conn, G> {
    pub fn with_generator(conn: &'conn mut Connection, ac_generator: G) -> Self {
        Self { conn, ac_generator }
    }
}

impl<G: AcGenerator> ConceptStore for SqliteConceptStore<'_, G> {
    fn store_concept(&mut self, concept: &Concept) -> RepoResult<String> {
        let tx = self.conn.transaction()?;
        let ac = match store_in_tx(&tx, &self.ac_generator, concept) {
            Ok(ac) => ac,
            Err(err) => {
                warn!(
                    "event=concept_store module=repo status=error short_name_len={} error={}",
                    concept.short_name.len(),
                    err
                );
                return Err(err);
            }
        };
        tx.commit()?;
        info!(
            "event=concept_store module=repo status=ok xrefs={}",
            concept.xrefs.len()
        );
        Ok(ac)
    }
}

fn store_in_tx<G: AcGenerator>(
    tx: &Transaction<'_>,
    ac_generator: &G,
    concept: &Concept,
) -> RepoResult<String> {
    let ac = match existing_row(tx, concept)? {
        Some(ExistingRow::Complete(ac)) => return Ok(ac),
        Some(ExistingRow::SameName(ac)) => ac,
        None => {
            let ac = match &concept.ac {
                Some(ac) => ac.clone(),
                None => ac_generator.next_ac(),
            };
            tx.execute(
                "INSERT INTO cv_term (ac, shortlabel, fullname) VALUES (?1, ?2, ?3);",
                params![ac, concept.short_name, concept.full_name],
            )?;
            ac
        }
    };

    for xref in &concept.xrefs {
        let database_ac = store_in_tx(tx, ac_generator, &xref.database)?;
        if xref_exists(tx, &ac, &database_ac, &xref.id)? {
            continue;
        }
        let qualifier_ac = match &xref.qualifier {
            Some(qualifier) => Some(store_in_tx(tx, ac_generator, qualifier)?),
            None => None,
        };
        tx.execute(
            "INSERT INTO cv_term_xref (ac, parent_ac, database_ac, qualifier_ac, primary_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                ac_generator.next_ac(),
                ac,
                database_ac,
                qualifier_ac,
                xref.id
            ],
        )?;
    }
    Ok(ac)
}

/// Already imported row standing for a concept.
enum ExistingRow {
    /// Matched by accession, ontology id, or label of an id-less concept.
    Complete(String),
    /// Matched by label only; the row still lacks the concept's ontology id.
    SameName(String),
}

/// Resolution order: own accession, then PSI-MI ontology id, then short
/// label.
fn existing_row(conn: &Connection, concept: &Concept) -> RepoResult<Option<ExistingRow>> {
    if let Some(ac) = &concept.ac {
        let found: Option<String> = conn
            .query_row("SELECT ac FROM cv_term WHERE ac = ?1;", [ac], |row| row.get(0))
            .optional()?;
        return Ok(found.map(ExistingRow::Complete));
    }

    let by_name = LookupSpecification::new(TargetField::Name).name(concept.short_name.clone());
    let Some(ontology_id) = concept.ontology_id() else {
        return Ok(unique_concept_ac(conn, &by_name)?.map(ExistingRow::Complete));
    };

    let by_id = LookupSpecification::new(TargetField::Name).ontology_id(ontology_id);
    if let Some(ac) = unique_concept_ac(conn, &by_id)? {
        return Ok(Some(ExistingRow::Complete(ac)));
    }
    Ok(unique_concept_ac(conn, &by_name)?.map(ExistingRow::SameName))
}

fn unique_concept_ac(conn: &Connection, spec: &LookupSpecification) -> RepoResult<Option<String>> {
    let plan = build_plan(spec, CONCEPT_ENTITY, SELF_RELATION)?;
    let mut records = query_records(conn, Schema::intact(), &plan, &Page::new(0, 2))?;
    if records.len() > 1 {
        return Err(RepoError::AmbiguousResult {
            entity: CONCEPT_ENTITY.to_string(),
            rows: count_records(conn, Schema::intact(), &plan)?,
        });
    }
    Ok(records.pop().map(|record| record.ac))
}

fn xref_exists(conn: &Connection, parent_ac: &str, database_ac: &str, id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM cv_term_xref
            WHERE parent_ac = ?1 AND database_ac = ?2 AND primary_id = ?3
        );",
        [parent_ac, database_ac, id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{AcGenerator, ConceptStore, SqliteConceptStore, UuidAcGenerator};
    use crate::db::open_db_in_memory;
    use crate::lookup::spec::{LookupSpecification, TargetField};
    use crate::model::concept::Concept;
    use crate::model::schema::{Schema, CONCEPT_ENTITY, SELF_RELATION};
    use crate::model::vocabulary::{IDENTITY_MI, PSI_MI_MI};
    use crate::plan::build_plan;
    use crate::repo::lookup_repo::{
        query_records, LookupRepository, Page, RepoError, SqliteLookupRepository,
    };
    use rusqlite::Connection;

    fn rows_labelled(conn: &Connection, label: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM cv_term WHERE shortlabel = ?1;",
            [label],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn xref_rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM cv_term_xref;", [], |row| row.get(0))
            .unwrap()
    }

    fn acs_by_ontology_id(conn: &Connection, ontology_id: &str) -> Vec<String> {
        let spec = LookupSpecification::new(TargetField::Name).ontology_id(ontology_id);
        let plan = build_plan(&spec, CONCEPT_ENTITY, SELF_RELATION).unwrap();
        query_records(conn, Schema::intact(), &plan, &Page::default())
            .unwrap()
            .into_iter()
            .map(|record| record.ac)
            .collect()
    }

    #[test]
    fn uuid_generator_prefixes_accessions() {
        let generator = UuidAcGenerator::new("TEST");
        let first = generator.next_ac();
        let second = generator.next_ac();

        assert!(first.starts_with("TEST-"));
        assert_eq!(first.len(), "TEST-".len() + 36);
        assert_ne!(first, second);
    }

    #[test]
    fn identified_term_reuses_row_created_for_its_label() {
        let mut conn = open_db_in_memory().unwrap();
        let (identity_ac, again_ac) = {
            let mut store = SqliteConceptStore::new(&mut conn);
            store
                .store_concept(&Concept::with_ontology_id("phosphorylation", "MI:0217"))
                .unwrap();
            let identity = Concept::with_ontology_id("identity", IDENTITY_MI);
            let first = store.store_concept(&identity).unwrap();
            let xrefs_after_first = xref_rows(store.conn);
            let again = store.store_concept(&identity).unwrap();
            assert_eq!(xref_rows(store.conn), xrefs_after_first);
            (first, again)
        };

        assert_eq!(identity_ac, again_ac);
        assert_eq!(rows_labelled(&conn, "identity"), 1);
        assert_eq!(acs_by_ontology_id(&conn, IDENTITY_MI), vec![identity_ac.clone()]);

        let repo = SqliteLookupRepository::try_new(&conn).unwrap();
        let loaded = repo.load_concept(&identity_ac).unwrap().unwrap();
        assert_eq!(loaded.ontology_id(), Some(IDENTITY_MI));
    }

    #[test]
    fn plain_psi_mi_row_gains_its_self_reference() {
        let mut conn = open_db_in_memory().unwrap();
        let psi_mi_ac = {
            let mut store = SqliteConceptStore::new(&mut conn);
            let psi_mi_ac = store.store_concept(&Concept::new("psi-mi")).unwrap();
            store
                .store_concept(&Concept::with_ontology_id("protein", "MI:0326"))
                .unwrap();
            psi_mi_ac
        };

        assert_eq!(rows_labelled(&conn, "psi-mi"), 1);
        assert_eq!(acs_by_ontology_id(&conn, PSI_MI_MI), vec![psi_mi_ac]);
        assert_eq!(acs_by_ontology_id(&conn, "MI:0326").len(), 1);
    }

    #[test]
    fn ambiguous_label_reports_every_matching_row() {
        let mut conn = open_db_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO cv_term (ac, shortlabel) VALUES ('CV-1', 'kinase');
             INSERT INTO cv_term (ac, shortlabel) VALUES ('CV-2', 'kinase');
             INSERT INTO cv_term (ac, shortlabel) VALUES ('CV-3', 'kinase');",
        )
        .unwrap();

        let err = SqliteConceptStore::new(&mut conn)
            .store_concept(&Concept::new("kinase"))
            .unwrap_err();
        match err {
            RepoError::AmbiguousResult { entity, rows } => {
                assert_eq!(entity, CONCEPT_ENTITY);
                assert_eq!(rows, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(rows_labelled(&conn, "kinase"), 3);
    }
}
