//! Lookup specification to query plan mapping.
//!
//! # Responsibility
//! - Turn a resolved lookup into joins and predicates over the schema.
//! - Keep plan structure stable for equal specification shapes.
//!
//! # Invariants
//! - Axes are applied in fixed order: target relation, concept resolution,
//!   qualifier resolution, member value, match-mode wrapping.
//! - Building is pure: equal inputs yield equal plans.
//! - Ontology-id predicates always compare exactly.

use crate::lookup::spec::{
    ConceptResolution, InvalidSpecificationError, LookupSpecification, MatchMode,
};
use crate::model::schema::{
    Cardinality, EntityDescriptor, RelationDescriptor, Schema, CONCEPT_ENTITY, SELF_RELATION,
    SHORT_NAME_FIELD, XREFS_RELATION,
};
use crate::model::vocabulary::{IDENTITY, PSI_MI, SECONDARY};
use crate::plan::{Comparison, FieldPath, JoinStep, PlanRoot, Predicate, QueryPlan};
use log::{debug, warn};
use std::collections::BTreeMap;

const ROOT_ALIAS: &str = "e";
const MEMBER_ALIAS: &str = "m";

const PSI_MI_PARAM: &str = "psimi";
const IDENTITY_PARAM: &str = "identity";
const SECONDARY_PARAM: &str = "secondaryAc";
const MEMBER_VALUE_PARAM: &str = "memberValue";

type PlanResult<T> = Result<T, InvalidSpecificationError>;

/// Plans lookups over the built-in schema.
pub fn build_plan(
    spec: &LookupSpecification,
    base_type: &str,
    relation_path: &str,
) -> PlanResult<QueryPlan> {
    PlanBuilder::new(Schema::intact()).build(spec, base_type, relation_path)
}

/// Query plan builder bound to one schema.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder<'s> {
    schema: &'s Schema,
}

impl<'s> PlanBuilder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    /// Builds the plan for entities of `base_type` reached through `relation_path`.
    ///
    /// `relation_path` equal to [`SELF_RELATION`] addresses the base concept
    /// itself.
    ///
    /// # Errors
    /// - Any [`InvalidSpecificationError`] from resolution.
    /// - Unknown entity/relation, or a relation whose shape does not match the
    ///   specification's target field.
    pub fn build(
        &self,
        spec: &LookupSpecification,
        base_type: &str,
        relation_path: &str,
    ) -> PlanResult<QueryPlan> {
        match self.build_inner(spec, base_type, relation_path) {
            Ok(plan) => {
                debug!(
                    "event=plan_build module=plan status=ok base={} relation={} target={} joins={} distinct={}",
                    base_type,
                    relation_path,
                    spec.target_field.as_str(),
                    plan.joins.len(),
                    plan.distinct
                );
                Ok(plan)
            }
            Err(err) => {
                warn!(
                    "event=plan_build module=plan status=error base={} relation={} target={} error_code={}",
                    base_type,
                    relation_path,
                    spec.target_field.as_str(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn build_inner(
        &self,
        spec: &LookupSpecification,
        base_type: &str,
        relation_path: &str,
    ) -> PlanResult<QueryPlan> {
        let resolved = spec.resolve()?;
        let entity = self.entity(base_type)?;
        let mut draft = Draft::default();

        // Text comparison applies to the last value predicate only.
        let terminal = match resolved.match_mode {
            MatchMode::Exact => Comparison::Equals,
            MatchMode::SubstringCaseInsensitive => Comparison::LikeUpperCase,
        };
        let concept_name_comparison = if resolved.member_value.is_some() {
            Comparison::Equals
        } else {
            terminal
        };

        match resolved.target_field.member_kind() {
            None => {
                let slot = if relation_path == SELF_RELATION {
                    if !entity.is_concept() {
                        return Err(mismatch(entity, relation_path, spec));
                    }
                    Slot::SelfConcept(ROOT_ALIAS)
                } else {
                    let relation = self.relation(entity, relation_path)?;
                    if relation.cardinality != Cardinality::One || relation.target != CONCEPT_ENTITY
                    {
                        return Err(mismatch(entity, relation_path, spec));
                    }
                    Slot::Relation {
                        owner: ROOT_ALIAS,
                        relation: relation.name,
                    }
                };
                self.apply_resolution(
                    &mut draft,
                    slot,
                    &resolved.concept,
                    SlotRole::Concept,
                    concept_name_comparison,
                )?;
            }
            Some(kind) => {
                let relation = self.relation(entity, relation_path)?;
                let member_entity = self.entity(relation.target)?;
                let shape = match member_entity.member {
                    Some(shape) if shape.kind == kind && relation.cardinality == Cardinality::Many => {
                        shape
                    }
                    _ => return Err(mismatch(entity, relation_path, spec)),
                };

                if resolved.concept == ConceptResolution::Absent
                    && resolved.member_value.is_none()
                {
                    draft.predicates.push(Predicate::IsEmpty {
                        path: FieldPath::new(ROOT_ALIAS, &[relation.name]),
                    });
                } else {
                    draft.join(
                        ROOT_ALIAS,
                        relation.name,
                        MEMBER_ALIAS,
                        member_entity.name,
                        Cardinality::Many,
                    );
                    self.apply_resolution(
                        &mut draft,
                        Slot::Relation {
                            owner: MEMBER_ALIAS,
                            relation: shape.concept_field,
                        },
                        &resolved.concept,
                        SlotRole::Concept,
                        concept_name_comparison,
                    )?;

                    if let Some(qualifier) = resolved.qualifier.as_ref() {
                        let qualifier_field = shape
                            .qualifier_field
                            .ok_or_else(|| mismatch(entity, relation_path, spec))?;
                        self.apply_resolution(
                            &mut draft,
                            Slot::Relation {
                                owner: MEMBER_ALIAS,
                                relation: qualifier_field,
                            },
                            qualifier,
                            SlotRole::Qualifier,
                            Comparison::Equals,
                        )?;
                    }

                    if let Some(value) = resolved.member_value.as_deref() {
                        draft.compare(
                            FieldPath::new(MEMBER_ALIAS, &[shape.value_field]),
                            terminal,
                            MEMBER_VALUE_PARAM,
                            value,
                        );
                    }
                }
            }
        }

        Ok(draft.finish(entity.name))
    }

    fn apply_resolution(
        &self,
        draft: &mut Draft,
        slot: Slot,
        resolution: &ConceptResolution,
        role: SlotRole,
        name_comparison: Comparison,
    ) -> PlanResult<()> {
        match resolution {
            ConceptResolution::ByOntologyId(ontology_id) => {
                let concept_alias = match slot {
                    Slot::SelfConcept(alias) => alias.to_string(),
                    Slot::Relation { owner, relation } => {
                        let alias = format!("c{}", role.index());
                        draft.join(owner, relation, &alias, CONCEPT_ENTITY, Cardinality::One);
                        alias
                    }
                };

                let concept = self.entity(CONCEPT_ENTITY)?;
                let xrefs = self.relation(concept, XREFS_RELATION)?;
                let xref_entity = self.entity(xrefs.target)?;
                let Some(xref_shape) = xref_entity.member else {
                    return Err(InvalidSpecificationError::UnknownEntity(
                        xref_entity.name.to_string(),
                    ));
                };
                let Some(qualifier_field) = xref_shape.qualifier_field else {
                    return Err(InvalidSpecificationError::UnknownRelation {
                        entity: xref_entity.name.to_string(),
                        relation: "qualifier".to_string(),
                    });
                };

                let index = role.index();
                let xref_alias = format!("x{index}");
                let database_alias = format!("d{index}");
                let qualifier_alias = format!("q{index}");
                draft.join(
                    &concept_alias,
                    xrefs.name,
                    &xref_alias,
                    xref_entity.name,
                    Cardinality::Many,
                );
                draft.join(
                    &xref_alias,
                    xref_shape.concept_field,
                    &database_alias,
                    CONCEPT_ENTITY,
                    Cardinality::One,
                );
                draft.join(
                    &xref_alias,
                    qualifier_field,
                    &qualifier_alias,
                    CONCEPT_ENTITY,
                    Cardinality::One,
                );

                draft.compare(
                    FieldPath::new(database_alias, &[SHORT_NAME_FIELD]),
                    Comparison::Equals,
                    PSI_MI_PARAM,
                    PSI_MI,
                );
                draft.bind(IDENTITY_PARAM, IDENTITY);
                draft.bind(SECONDARY_PARAM, SECONDARY);
                draft.predicates.push(Predicate::InSet {
                    path: FieldPath::new(qualifier_alias, &[SHORT_NAME_FIELD]),
                    parameters: vec![IDENTITY_PARAM.to_string(), SECONDARY_PARAM.to_string()],
                });
                draft.compare(
                    FieldPath::new(xref_alias, &[xref_shape.value_field]),
                    Comparison::Equals,
                    role.ontology_id_param(),
                    ontology_id,
                );
            }
            ConceptResolution::ByName(name) => {
                let path = slot.path().child(SHORT_NAME_FIELD);
                draft.compare(path, name_comparison, role.name_param(), name);
            }
            ConceptResolution::Absent => match slot {
                Slot::SelfConcept(_) => return Err(InvalidSpecificationError::SelfAbsent),
                Slot::Relation { .. } => {
                    draft.predicates.push(Predicate::IsNull { path: slot.path() });
                }
            },
        }
        Ok(())
    }

    fn entity(&self, name: &str) -> PlanResult<&'s EntityDescriptor> {
        self.schema
            .entity(name)
            .ok_or_else(|| InvalidSpecificationError::UnknownEntity(name.to_string()))
    }

    fn relation(
        &self,
        entity: &'s EntityDescriptor,
        name: &str,
    ) -> PlanResult<&'s RelationDescriptor> {
        entity
            .relation(name)
            .ok_or_else(|| InvalidSpecificationError::UnknownRelation {
                entity: entity.name.to_string(),
                relation: name.to_string(),
            })
    }
}

/// Concept position a resolution is applied to.
#[derive(Debug, Clone, Copy)]
enum Slot {
    SelfConcept(&'static str),
    Relation {
        owner: &'static str,
        relation: &'static str,
    },
}

impl Slot {
    fn path(self) -> FieldPath {
        match self {
            Self::SelfConcept(alias) => FieldPath::new(alias, &[]),
            Self::Relation { owner, relation } => FieldPath::new(owner, &[relation]),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SlotRole {
    Concept,
    Qualifier,
}

impl SlotRole {
    fn index(self) -> u8 {
        match self {
            Self::Concept => 1,
            Self::Qualifier => 2,
        }
    }

    fn name_param(self) -> &'static str {
        match self {
            Self::Concept => "conceptName",
            Self::Qualifier => "qualifierName",
        }
    }

    fn ontology_id_param(self) -> &'static str {
        match self {
            Self::Concept => "conceptMi",
            Self::Qualifier => "qualifierMi",
        }
    }
}

#[derive(Debug, Default)]
struct Draft {
    joins: Vec<JoinStep>,
    predicates: Vec<Predicate>,
    parameters: BTreeMap<String, String>,
}

impl Draft {
    fn join(
        &mut self,
        from_alias: &str,
        relation: &str,
        alias: &str,
        entity: &str,
        cardinality: Cardinality,
    ) {
        self.joins.push(JoinStep {
            from_alias: from_alias.to_string(),
            relation: relation.to_string(),
            alias: alias.to_string(),
            entity: entity.to_string(),
            cardinality,
        });
    }

    fn bind(&mut self, name: &str, value: &str) {
        self.parameters.insert(name.to_string(), value.to_string());
    }

    fn compare(&mut self, path: FieldPath, comparison: Comparison, parameter: &str, value: &str) {
        let bound = match comparison {
            Comparison::Equals => value.to_string(),
            Comparison::LikeUpperCase => format!("%{value}%"),
        };
        self.parameters.insert(parameter.to_string(), bound);
        self.predicates.push(Predicate::Compare {
            path,
            comparison,
            parameter: parameter.to_string(),
        });
    }

    fn finish(self, entity: &str) -> QueryPlan {
        let distinct = self
            .joins
            .iter()
            .any(|join| join.cardinality == Cardinality::Many);
        QueryPlan {
            root: PlanRoot {
                entity: entity.to_string(),
                alias: ROOT_ALIAS.to_string(),
            },
            joins: self.joins,
            predicates: self.predicates,
            parameters: self.parameters,
            distinct,
        }
    }
}

fn mismatch(
    entity: &EntityDescriptor,
    relation_path: &str,
    spec: &LookupSpecification,
) -> InvalidSpecificationError {
    InvalidSpecificationError::TargetFieldMismatch {
        entity: entity.name.to_string(),
        relation: relation_path.to_string(),
        target_field: spec.target_field,
    }
}
