use intact_lookup_core::db::open_db_in_memory;
use intact_lookup_core::model::concept::psi_mi_database;
use intact_lookup_core::{
    AcGenerator, Concept, ConceptStore, CrossReference, EntityRecord, InvalidSpecificationError,
    LookupRepository, LookupService, LookupSpecification, MatchMode, Page, RepoError,
    SqliteConceptStore, SqliteLookupRepository, TargetField, XrefQuery,
};
use rusqlite::{params, Connection};
use std::cell::Cell;
use std::sync::Arc;

struct SequenceAc(Cell<u32>);

impl AcGenerator for SequenceAc {
    fn next_ac(&self) -> String {
        let next = self.0.get() + 1;
        self.0.set(next);
        format!("CV-{next:04}")
    }
}

struct Vocabulary {
    protein: String,
    peptide: String,
    uniprotkb: String,
    identity: String,
    secondary: String,
    gene_name: String,
    comment: String,
    rogid: String,
    pubmed: String,
    doi: String,
    imex: String,
    primary_reference: String,
    imex_primary: String,
    see_also: String,
    two_hybrid: String,
}

struct Fixture {
    conn: Connection,
    cv: Vocabulary,
}

impl Fixture {
    fn seeded() -> Self {
        let mut conn = open_db_in_memory().unwrap();
        let cv = store_vocabulary(&mut conn);
        seed_interactors(&conn, &cv);
        seed_publications(&conn, &cv);
        Self { conn, cv }
    }

    fn service(&self) -> LookupService<SqliteLookupRepository<'_>> {
        LookupService::new(SqliteLookupRepository::try_new(&self.conn).unwrap())
    }
}

fn store_vocabulary(conn: &mut Connection) -> Vocabulary {
    let mut store = SqliteConceptStore::with_generator(conn, SequenceAc(Cell::new(0)));
    let mut put = |concept: Concept| store.store_concept(&concept).unwrap();

    let secondary = put(Concept::new("secondary-ac"));
    let mut kinase = Concept::new("kinase");
    kinase.xrefs.push(CrossReference::new(
        psi_mi_database(),
        "MI:0999",
        Some(Arc::new(Concept::new("secondary-ac"))),
    ));
    put(kinase);

    Vocabulary {
        protein: put(Concept::with_ontology_id("protein", "MI:0326")),
        peptide: put(Concept::with_ontology_id("peptide", "MI:0327")),
        uniprotkb: put(Concept::with_ontology_id("uniprotkb", "MI:0486")),
        identity: put(Concept::new("identity")),
        secondary,
        gene_name: put(Concept::with_ontology_id("gene name", "MI:0301")),
        comment: put(Concept::with_ontology_id("comment", "MI:0612")),
        rogid: put(Concept::new("rogid")),
        pubmed: put(Concept::with_ontology_id("pubmed", "MI:0446")),
        doi: put(Concept::with_ontology_id("doi", "MI:0574")),
        imex: put(Concept::with_ontology_id("imex", "MI:0670")),
        primary_reference: put(Concept::with_ontology_id("primary-reference", "MI:0358")),
        imex_primary: put(Concept::with_ontology_id("imex-primary", "MI:0662")),
        see_also: put(Concept::with_ontology_id("see-also", "MI:0361")),
        two_hybrid: put(Concept::with_ontology_id("two hybrid", "MI:0018")),
    }
}

fn seed_interactors(conn: &Connection, cv: &Vocabulary) {
    for (ac, label, type_ac) in [
        ("I-01", "p53", Some(cv.protein.as_str())),
        ("I-02", "p53b", Some(cv.protein.as_str())),
        ("I-03", "mdm2", Some(cv.peptide.as_str())),
        ("I-04", "orphan", None),
    ] {
        conn.execute(
            "INSERT INTO interactor (ac, shortlabel, interactor_type_ac) VALUES (?1, ?2, ?3);",
            params![ac, label, type_ac],
        )
        .unwrap();
    }

    for (ac, parent, qualifier, id) in [
        ("IX-1", "I-01", Some(cv.identity.as_str()), "P04637"),
        ("IX-2", "I-01", Some(cv.secondary.as_str()), "P04637-2"),
        ("IX-3", "I-02", None, "P04637"),
        ("IX-4", "I-03", Some(cv.identity.as_str()), "Q00987"),
    ] {
        insert_xref(conn, "interactor_xref", ac, parent, &cv.uniprotkb, qualifier, id);
    }

    conn.execute(
        "INSERT INTO interactor_alias (ac, parent_ac, alias_type_ac, name)
         VALUES ('IA-1', 'I-01', ?1, 'TP53');",
        [&cv.gene_name],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO interactor_annotation (ac, parent_ac, topic_ac, description)
         VALUES ('IN-1', 'I-01', ?1, 'tumour suppressor');",
        [&cv.comment],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO interactor_checksum (ac, parent_ac, method_ac, value)
         VALUES ('IC-1', 'I-01', ?1, 'ROG123');",
        [&cv.rogid],
    )
    .unwrap();
}

fn seed_publications(conn: &Connection, cv: &Vocabulary) {
    conn.execute_batch(
        "INSERT INTO publication (ac, shortlabel) VALUES ('PUB-1', 'smith-2004');
         INSERT INTO publication (ac, shortlabel) VALUES ('PUB-2', 'jones-2010');",
    )
    .unwrap();
    insert_xref(
        conn,
        "publication_xref",
        "PX-1",
        "PUB-1",
        &cv.pubmed,
        Some(cv.primary_reference.as_str()),
        "12345",
    );
    insert_xref(
        conn,
        "publication_xref",
        "PX-2",
        "PUB-1",
        &cv.imex,
        Some(cv.imex_primary.as_str()),
        "IM-1",
    );
    insert_xref(
        conn,
        "publication_xref",
        "PX-3",
        "PUB-1",
        &cv.doi,
        Some(cv.primary_reference.as_str()),
        "10.1000/xyz",
    );
    insert_xref(
        conn,
        "publication_xref",
        "PX-4",
        "PUB-2",
        &cv.pubmed,
        Some(cv.see_also.as_str()),
        "99999",
    );

    conn.execute(
        "INSERT INTO experiment (ac, shortlabel, detection_method_ac, publication_ac)
         VALUES ('EXP-1', 'smith-2004-1', ?1, 'PUB-1');",
        [&cv.two_hybrid],
    )
    .unwrap();
}

fn insert_xref(
    conn: &Connection,
    table: &str,
    ac: &str,
    parent: &str,
    database: &str,
    qualifier: Option<&str>,
    id: &str,
) {
    conn.execute(
        &format!(
            "INSERT INTO {table} (ac, parent_ac, database_ac, qualifier_ac, primary_id)
             VALUES (?1, ?2, ?3, ?4, ?5);"
        ),
        params![ac, parent, database, qualifier, id],
    )
    .unwrap();
}

fn acs(records: &[EntityRecord]) -> Vec<&str> {
    records.iter().map(|record| record.ac.as_str()).collect()
}

#[test]
fn concept_relation_by_name_and_ontology_id() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let page = Page::default();

    let by_name = service
        .by_concept("Interactor", "interactorType", Some("protein"), None, &page)
        .unwrap();
    assert_eq!(acs(&by_name), vec!["I-01", "I-02"]);
    assert_eq!(by_name[0].label.as_deref(), Some("p53"));
    assert_eq!(by_name[0].entity, "Interactor");

    let by_id = service
        .by_concept("Interactor", "interactorType", None, Some("MI:0327"), &page)
        .unwrap();
    assert_eq!(acs(&by_id), vec!["I-03"]);
}

#[test]
fn ontology_id_wins_over_conflicting_name() {
    let fixture = Fixture::seeded();
    let records = fixture
        .service()
        .by_concept(
            "Interactor",
            "interactorType",
            Some("protein"),
            Some("MI:0327"),
            &Page::default(),
        )
        .unwrap();

    assert_eq!(acs(&records), vec!["I-03"]);
}

#[test]
fn missing_name_and_id_selects_null_relation() {
    let fixture = Fixture::seeded();
    let records = fixture
        .service()
        .by_concept("Interactor", "interactorType", None, None, &Page::default())
        .unwrap();

    assert_eq!(acs(&records), vec!["I-04"]);
}

#[test]
fn xref_lookup_with_qualifier_variants() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let page = Page::default();
    let lookup = |query: XrefQuery| {
        service
            .by_xref("Interactor", &query, MatchMode::Exact, &page)
            .unwrap()
    };

    assert_eq!(
        acs(&lookup(XrefQuery::new("P04637").database("uniprotkb"))),
        vec!["I-01", "I-02"]
    );
    assert_eq!(
        acs(&lookup(
            XrefQuery::new("P04637")
                .database("uniprotkb")
                .qualifier("identity")
        )),
        vec!["I-01"]
    );
    assert_eq!(
        acs(&lookup(
            XrefQuery::new("P04637")
                .database("uniprotkb")
                .qualifier_absent()
        )),
        vec!["I-02"]
    );
    assert_eq!(
        acs(&lookup(
            XrefQuery::new("P04637-2")
                .database("uniprotkb")
                .qualifier("secondary-ac")
        )),
        vec!["I-01"]
    );
    assert_eq!(
        acs(&lookup(XrefQuery::new("Q00987").database_mi("MI:0486"))),
        vec!["I-03"]
    );
}

#[test]
fn xref_lookup_without_database_asks_for_missing_database() {
    let fixture = Fixture::seeded();
    let records = fixture
        .service()
        .by_xref(
            "Interactor",
            &XrefQuery::new("P04637"),
            MatchMode::Exact,
            &Page::default(),
        )
        .unwrap();

    assert!(records.is_empty());
}

#[test]
fn substring_match_deduplicates_entities_with_several_matching_xrefs() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let query = XrefQuery::new("p04637").database("uniprotkb");

    let records = service
        .by_xref(
            "Interactor",
            &query,
            MatchMode::SubstringCaseInsensitive,
            &Page::default(),
        )
        .unwrap();
    assert_eq!(acs(&records), vec!["I-01", "I-02"]);

    let spec = LookupSpecification::new(TargetField::Xref)
        .name("uniprotkb")
        .member_value("p04637")
        .match_mode(MatchMode::SubstringCaseInsensitive);
    assert_eq!(service.count(&spec, "Interactor", "dbXrefs").unwrap(), 2);
}

#[test]
fn empty_member_relations() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let page = Page::default();

    let without_xrefs = service
        .find(
            &LookupSpecification::new(TargetField::Xref),
            "Interactor",
            "dbXrefs",
            &page,
        )
        .unwrap();
    assert_eq!(acs(&without_xrefs), vec!["I-04"]);

    let without_annotations = service
        .find(
            &LookupSpecification::new(TargetField::AnnotationTopic),
            "Interactor",
            "annotations",
            &page,
        )
        .unwrap();
    assert_eq!(acs(&without_annotations), vec!["I-02", "I-03", "I-04"]);
}

#[test]
fn alias_annotation_and_checksum_members() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let page = Page::default();

    let alias = service
        .by_alias(
            "Interactor",
            Some("gene name"),
            None,
            Some("tp5"),
            MatchMode::SubstringCaseInsensitive,
            &page,
        )
        .unwrap();
    assert_eq!(acs(&alias), vec!["I-01"]);

    let alias_by_type_id = service
        .by_alias(
            "Interactor",
            None,
            Some("MI:0301"),
            Some("TP53"),
            MatchMode::Exact,
            &page,
        )
        .unwrap();
    assert_eq!(acs(&alias_by_type_id), vec!["I-01"]);

    let annotation = service
        .by_annotation(
            "Interactor",
            Some("comment"),
            None,
            Some("SUPPRESSOR"),
            MatchMode::SubstringCaseInsensitive,
            &page,
        )
        .unwrap();
    assert_eq!(acs(&annotation), vec!["I-01"]);

    let checksum = service
        .by_checksum("Interactor", Some("rogid"), None, Some("ROG123"), &page)
        .unwrap();
    assert_eq!(acs(&checksum), vec!["I-01"]);

    let wrong_case = service
        .by_checksum("Interactor", Some("rogid"), None, Some("rog123"), &page)
        .unwrap();
    assert!(wrong_case.is_empty());
}

#[test]
fn pagination_applies_after_ordering() {
    let fixture = Fixture::seeded();
    let service = fixture.service();

    let second = service
        .by_concept(
            "Interactor",
            "interactorType",
            Some("protein"),
            None,
            &Page::new(1, 1),
        )
        .unwrap();
    assert_eq!(acs(&second), vec!["I-02"]);

    let past_end = service
        .by_concept(
            "Interactor",
            "interactorType",
            Some("protein"),
            None,
            &Page::new(5, 10),
        )
        .unwrap();
    assert!(past_end.is_empty());
}

#[test]
fn unique_lookup_reports_ambiguity_and_absence() {
    let fixture = Fixture::seeded();
    let service = fixture.service();

    let ambiguous = service
        .find_unique(
            &LookupSpecification::new(TargetField::Name).name("protein"),
            "Interactor",
            "interactorType",
        )
        .unwrap_err();
    match ambiguous {
        RepoError::AmbiguousResult { entity, rows } => {
            assert_eq!(entity, "Interactor");
            assert_eq!(rows, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let unique = service
        .find_unique(
            &LookupSpecification::new(TargetField::Name).ontology_id("MI:0327"),
            "Interactor",
            "interactorType",
        )
        .unwrap();
    assert_eq!(unique.map(|record| record.ac), Some("I-03".to_string()));

    let missing = service
        .find_unique(
            &LookupSpecification::new(TargetField::Name).name("dna"),
            "Interactor",
            "interactorType",
        )
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn concept_lookups_by_name_and_ontology_id() {
    let fixture = Fixture::seeded();
    let service = fixture.service();
    let page = Page::default();

    let by_name = service
        .concepts_by_short_name("OTEI", MatchMode::SubstringCaseInsensitive, &page)
        .unwrap();
    assert_eq!(acs(&by_name), vec![fixture.cv.protein.as_str()]);

    let by_secondary_id = service.concepts_by_ontology_id("MI:0999", &page).unwrap();
    assert_eq!(by_secondary_id.len(), 1);
    assert_eq!(by_secondary_id[0].label.as_deref(), Some("kinase"));

    let concept = service.concept_by_ontology_id("MI:0326").unwrap().unwrap();
    assert_eq!(concept.ac.as_deref(), Some(fixture.cv.protein.as_str()));
    assert_eq!(concept.short_name, "protein");
    assert_eq!(concept.ontology_id(), Some("MI:0326"));
    let database = &concept.xrefs[0].database;
    assert_eq!(database.short_name, "psi-mi");
    assert_eq!(database.ontology_id(), Some("MI:0488"));
    assert!(database.xrefs[0].database.xrefs.is_empty());

    assert!(service.concept_by_ontology_id("MI:4242").unwrap().is_none());
}

#[test]
fn publication_reference_lookups() {
    let fixture = Fixture::seeded();
    let service = fixture.service();

    let pubmed = service.publication_by_pubmed("12345").unwrap().unwrap();
    assert_eq!(pubmed.ac, "PUB-1");
    assert_eq!(pubmed.label.as_deref(), Some("smith-2004"));
    assert_eq!(
        service.publication_by_imex("IM-1").unwrap().map(|p| p.ac),
        Some("PUB-1".to_string())
    );
    assert_eq!(
        service
            .publication_by_doi("10.1000/xyz")
            .unwrap()
            .map(|p| p.ac),
        Some("PUB-1".to_string())
    );
    // Only primary references count.
    assert!(service.publication_by_pubmed("99999").unwrap().is_none());
}

#[test]
fn experiment_by_detection_method_id() {
    let fixture = Fixture::seeded();
    let records = fixture
        .service()
        .by_concept(
            "Experiment",
            "interactionDetectionMethod",
            None,
            Some("MI:0018"),
            &Page::default(),
        )
        .unwrap();

    assert_eq!(acs(&records), vec!["EXP-1"]);
}

#[test]
fn invalid_specifications_surface_before_execution() {
    let fixture = Fixture::seeded();
    let service = fixture.service();

    let malformed = service
        .by_concept(
            "Interactor",
            "interactorType",
            None,
            Some("0326"),
            &Page::default(),
        )
        .unwrap_err();
    assert!(matches!(
        malformed,
        RepoError::InvalidSpecification(InvalidSpecificationError::MalformedOntologyId(_))
    ));

    let no_checksums = service
        .by_checksum("Publication", Some("rogid"), None, None, &Page::default())
        .unwrap_err();
    assert!(matches!(no_checksums, RepoError::InvalidSpecification(_)));
}

#[test]
fn storing_known_concept_reuses_its_accession() {
    let mut fixture = Fixture::seeded();
    let before: i64 = fixture
        .conn
        .query_row("SELECT COUNT(*) FROM cv_term;", [], |row| row.get(0))
        .unwrap();

    let ac = SqliteConceptStore::new(&mut fixture.conn)
        .store_concept(&Concept::with_ontology_id("protein", "MI:0326"))
        .unwrap();
    assert_eq!(ac, fixture.cv.protein);

    let after: i64 = fixture
        .conn
        .query_row("SELECT COUNT(*) FROM cv_term;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(before, after);

    let repo = SqliteLookupRepository::try_new(&fixture.conn).unwrap();
    let psi_mi_rows: i64 = fixture
        .conn
        .query_row(
            "SELECT COUNT(*) FROM cv_term WHERE shortlabel = 'psi-mi';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(psi_mi_rows, 1);
    assert!(repo.load_concept("missing").unwrap().is_none());
}
