//! Lookup use-case service.
//!
//! # Responsibility
//! - Offer the per-entity finder vocabulary (`by_xref`, `by_alias`...) over
//!   one generic plan-and-execute path.
//! - Pick the member relation of a base entity from the schema.
//!
//! # Invariants
//! - Every lookup goes through [`build_plan`], so tie-break and absence rules
//!   are identical for all entities.
//! - Unique lookups surface ambiguity as `RepoError::AmbiguousResult`.

use crate::lookup::spec::{
    Criterion, InvalidSpecificationError, LookupSpecification, MatchMode, TargetField,
};
use crate::model::concept::Concept;
use crate::model::schema::{MemberKind, Schema, CONCEPT_ENTITY, SELF_RELATION};
use crate::model::vocabulary::{
    DOI_MI, IMEX_MI, IMEX_PRIMARY_MI, PRIMARY_REFERENCE_MI, PUBMED_MI,
};
use crate::plan::{build_plan, QueryPlan};
use crate::repo::lookup_repo::{EntityRecord, LookupRepository, Page, RepoError, RepoResult};

const PUBLICATION_ENTITY: &str = "Publication";

/// Cross-reference criteria of a `by_xref` lookup.
///
/// Database and qualifier each accept a short name, an ontology id, or
/// both (the id wins). Leaving both database inputs unset asks for xrefs
/// with no database; `cv_term_xref.database_ac` and the other xref tables
/// declare that column `NOT NULL`, so such a query never matches a row of
/// the shipped schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrefQuery {
    pub database: Option<String>,
    pub database_mi: Option<String>,
    pub id: Option<String>,
    pub qualifier: Criterion,
    pub qualifier_mi: Option<String>,
}

impl XrefQuery {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }

    pub fn database_mi(mut self, ontology_id: impl Into<String>) -> Self {
        self.database_mi = Some(ontology_id.into());
        self
    }

    pub fn qualifier(mut self, name: impl Into<String>) -> Self {
        self.qualifier = Criterion::Value(name.into());
        self
    }

    pub fn qualifier_absent(mut self) -> Self {
        self.qualifier = Criterion::Absent;
        self
    }

    pub fn qualifier_mi(mut self, ontology_id: impl Into<String>) -> Self {
        self.qualifier_mi = Some(ontology_id.into());
        self
    }

    fn to_specification(&self, mode: MatchMode) -> LookupSpecification {
        let mut spec = LookupSpecification::from_params(
            TargetField::Xref,
            self.database.as_deref(),
            self.database_mi.as_deref(),
        )
        .match_mode(mode);
        spec.qualifier_name = self.qualifier.clone();
        spec.qualifier_ontology_id = self.qualifier_mi.clone();
        spec.member_value = self.id.clone();
        spec
    }
}

/// Generic finder facade over one [`LookupRepository`].
pub struct LookupService<R: LookupRepository> {
    repo: R,
}

impl<R: LookupRepository> LookupService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn find(
        &self,
        spec: &LookupSpecification,
        base_type: &str,
        relation_path: &str,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let plan = build_plan(spec, base_type, relation_path)?;
        self.repo.find(&plan, page)
    }

    pub fn find_unique(
        &self,
        spec: &LookupSpecification,
        base_type: &str,
        relation_path: &str,
    ) -> RepoResult<Option<EntityRecord>> {
        let plan = build_plan(spec, base_type, relation_path)?;
        self.repo.find_unique(&plan)
    }

    pub fn count(
        &self,
        spec: &LookupSpecification,
        base_type: &str,
        relation_path: &str,
    ) -> RepoResult<u64> {
        let plan = build_plan(spec, base_type, relation_path)?;
        self.repo.count(&plan)
    }

    /// Entities whose single-valued concept `relation` matches.
    ///
    /// `name == None && ontology_id == None` selects entities where the
    /// relation is null.
    pub fn by_concept(
        &self,
        base_type: &str,
        relation: &str,
        name: Option<&str>,
        ontology_id: Option<&str>,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let spec = LookupSpecification::from_params(TargetField::Name, name, ontology_id);
        self.find(&spec, base_type, relation, page)
    }

    pub fn by_xref(
        &self,
        base_type: &str,
        query: &XrefQuery,
        mode: MatchMode,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let relation = member_relation(base_type, MemberKind::Xref)?;
        self.find(&query.to_specification(mode), base_type, relation, page)
    }

    pub fn by_alias(
        &self,
        base_type: &str,
        type_name: Option<&str>,
        type_mi: Option<&str>,
        name: Option<&str>,
        mode: MatchMode,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let relation = member_relation(base_type, MemberKind::Alias)?;
        let spec = member_specification(TargetField::AliasType, type_name, type_mi, name, mode);
        self.find(&spec, base_type, relation, page)
    }

    pub fn by_annotation(
        &self,
        base_type: &str,
        topic_name: Option<&str>,
        topic_mi: Option<&str>,
        value: Option<&str>,
        mode: MatchMode,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let relation = member_relation(base_type, MemberKind::Annotation)?;
        let spec = member_specification(
            TargetField::AnnotationTopic,
            topic_name,
            topic_mi,
            value,
            mode,
        );
        self.find(&spec, base_type, relation, page)
    }

    pub fn by_checksum(
        &self,
        base_type: &str,
        method_name: Option<&str>,
        method_mi: Option<&str>,
        value: Option<&str>,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let relation = member_relation(base_type, MemberKind::Checksum)?;
        let spec = member_specification(
            TargetField::ChecksumMethod,
            method_name,
            method_mi,
            value,
            MatchMode::Exact,
        );
        self.find(&spec, base_type, relation, page)
    }

    pub fn concepts_by_short_name(
        &self,
        name: &str,
        mode: MatchMode,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let spec = LookupSpecification::new(TargetField::Name)
            .name(name)
            .match_mode(mode);
        self.find(&spec, CONCEPT_ENTITY, SELF_RELATION, page)
    }

    /// Concepts identified by `ontology_id` as identity or secondary id.
    pub fn concepts_by_ontology_id(
        &self,
        ontology_id: &str,
        page: &Page,
    ) -> RepoResult<Vec<EntityRecord>> {
        let spec = LookupSpecification::new(TargetField::Name).ontology_id(ontology_id);
        self.find(&spec, CONCEPT_ENTITY, SELF_RELATION, page)
    }

    /// Loads the single concept identified by `ontology_id`.
    pub fn concept_by_ontology_id(&self, ontology_id: &str) -> RepoResult<Option<Concept>> {
        let spec = LookupSpecification::new(TargetField::Name).ontology_id(ontology_id);
        let Some(record) = self.find_unique(&spec, CONCEPT_ENTITY, SELF_RELATION)? else {
            return Ok(None);
        };
        self.repo.load_concept(&record.ac)
    }

    pub fn publication_by_pubmed(&self, pubmed_id: &str) -> RepoResult<Option<EntityRecord>> {
        self.publication_by_reference(PUBMED_MI, PRIMARY_REFERENCE_MI, pubmed_id)
    }

    pub fn publication_by_doi(&self, doi: &str) -> RepoResult<Option<EntityRecord>> {
        self.publication_by_reference(DOI_MI, PRIMARY_REFERENCE_MI, doi)
    }

    pub fn publication_by_imex(&self, imex_id: &str) -> RepoResult<Option<EntityRecord>> {
        self.publication_by_reference(IMEX_MI, IMEX_PRIMARY_MI, imex_id)
    }

    fn publication_by_reference(
        &self,
        database_mi: &str,
        qualifier_mi: &str,
        id: &str,
    ) -> RepoResult<Option<EntityRecord>> {
        let plan = publication_reference_plan(database_mi, qualifier_mi, id)?;
        self.repo.find_unique(&plan)
    }
}

fn publication_reference_plan(
    database_mi: &str,
    qualifier_mi: &str,
    id: &str,
) -> RepoResult<QueryPlan> {
    let query = XrefQuery::new(id)
        .database_mi(database_mi)
        .qualifier_mi(qualifier_mi);
    let relation = member_relation(PUBLICATION_ENTITY, MemberKind::Xref)?;
    Ok(build_plan(
        &query.to_specification(MatchMode::Exact),
        PUBLICATION_ENTITY,
        relation,
    )?)
}

fn member_specification(
    target_field: TargetField,
    concept_name: Option<&str>,
    concept_mi: Option<&str>,
    value: Option<&str>,
    mode: MatchMode,
) -> LookupSpecification {
    let mut spec =
        LookupSpecification::from_params(target_field, concept_name, concept_mi).match_mode(mode);
    spec.member_value = value.map(str::to_string);
    spec
}

/// Returns the multi-valued relation of `base_type` holding `kind` members.
fn member_relation(base_type: &str, kind: MemberKind) -> RepoResult<&'static str> {
    let schema = Schema::intact();
    let entity = schema
        .entity(base_type)
        .ok_or_else(|| InvalidSpecificationError::UnknownEntity(base_type.to_string()))?;
    entity
        .relations
        .iter()
        .find(|relation| {
            schema
                .entity(relation.target)
                .and_then(|target| target.member)
                .is_some_and(|shape| shape.kind == kind)
        })
        .map(|relation| relation.name)
        .ok_or_else(|| {
            RepoError::InvalidSpecification(InvalidSpecificationError::UnknownRelation {
                entity: base_type.to_string(),
                relation: member_kind_label(kind).to_string(),
            })
        })
}

fn member_kind_label(kind: MemberKind) -> &'static str {
    match kind {
        MemberKind::Xref => "xrefs",
        MemberKind::Alias => "aliases",
        MemberKind::Annotation => "annotations",
        MemberKind::Checksum => "checksums",
    }
}
