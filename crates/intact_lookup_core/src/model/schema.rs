//! Entity-relation descriptors for the curation store.
//!
//! # Responsibility
//! - Describe entities, their relations and member shapes as data.
//! - Map entity attributes and relations onto relational tables/columns.
//!
//! # Invariants
//! - Every relation target names an entity of the same schema.
//! - `Cardinality::One` relations store a foreign key on the owner table.
//! - `Cardinality::Many` relations store the owner key on the target table.
//! - Member entities expose their concept (and qualifier) slots as
//!   `Cardinality::One` relations to [`CONCEPT_ENTITY`].

use serde::{Deserialize, Serialize};

/// Entity name of controlled-vocabulary terms.
pub const CONCEPT_ENTITY: &str = "CvTerm";
/// Relation path addressing the base entity itself.
pub const SELF_RELATION: &str = "";

/// Attribute of every concept holding its human-readable label.
pub const SHORT_NAME_FIELD: &str = "shortName";
/// Multi-valued relation from a concept to its cross-references.
pub const XREFS_RELATION: &str = "dbXrefs";

const PARENT_COLUMN: &str = "parent_ac";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Kind of member row reachable through a multi-valued relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Xref,
    Alias,
    Annotation,
    Checksum,
}

/// Concept/value layout of a member entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberShape {
    pub kind: MemberKind,
    /// Relation to the concept classifying the member (database, type, topic...).
    pub concept_field: &'static str,
    /// Attribute carrying the member text (xref id, alias name...).
    pub value_field: &'static str,
    /// Relation to the qualifier concept. Only xrefs carry one.
    pub qualifier_field: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub name: &'static str,
    pub target: &'static str,
    pub cardinality: Cardinality,
    /// Foreign key column: on the owner for `One`, on the target for `Many`.
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    /// Attribute returned as record label by the executor.
    pub label_field: Option<&'static str>,
    pub fields: &'static [FieldDescriptor],
    pub relations: &'static [RelationDescriptor],
    pub member: Option<MemberShape>,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    /// Returns whether this entity is the controlled-vocabulary term entity.
    pub fn is_concept(&self) -> bool {
        self.name == CONCEPT_ENTITY
    }
}

/// Closed set of entity descriptors.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    entities: &'static [EntityDescriptor],
}

impl Schema {
    pub const fn new(entities: &'static [EntityDescriptor]) -> Self {
        Self { entities }
    }

    /// Returns the built-in curation store schema.
    pub fn intact() -> &'static Schema {
        &INTACT_SCHEMA
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn entities(&self) -> &[EntityDescriptor] {
        self.entities
    }
}

const fn field(name: &'static str, column: &'static str) -> FieldDescriptor {
    FieldDescriptor { name, column }
}

const fn one(name: &'static str, target: &'static str, column: &'static str) -> RelationDescriptor {
    RelationDescriptor {
        name,
        target,
        cardinality: Cardinality::One,
        column,
    }
}

const fn many(name: &'static str, target: &'static str) -> RelationDescriptor {
    RelationDescriptor {
        name,
        target,
        cardinality: Cardinality::Many,
        column: PARENT_COLUMN,
    }
}

const XREF_FIELDS: &[FieldDescriptor] = &[
    field("ac", "ac"),
    field("id", "primary_id"),
    field("secondaryId", "secondary_id"),
];
const XREF_RELATIONS: &[RelationDescriptor] = &[
    one("database", CONCEPT_ENTITY, "database_ac"),
    one("qualifier", CONCEPT_ENTITY, "qualifier_ac"),
];
const ALIAS_FIELDS: &[FieldDescriptor] = &[field("ac", "ac"), field("name", "name")];
const ALIAS_RELATIONS: &[RelationDescriptor] = &[one("type", CONCEPT_ENTITY, "alias_type_ac")];
const ANNOTATION_FIELDS: &[FieldDescriptor] = &[field("ac", "ac"), field("value", "description")];
const ANNOTATION_RELATIONS: &[RelationDescriptor] = &[one("topic", CONCEPT_ENTITY, "topic_ac")];
const CHECKSUM_FIELDS: &[FieldDescriptor] = &[field("ac", "ac"), field("value", "value")];
const CHECKSUM_RELATIONS: &[RelationDescriptor] = &[one("method", CONCEPT_ENTITY, "method_ac")];

const fn member_entity(
    name: &'static str,
    table: &'static str,
    fields: &'static [FieldDescriptor],
    relations: &'static [RelationDescriptor],
    member: MemberShape,
) -> EntityDescriptor {
    EntityDescriptor {
        name,
        table,
        key_column: "ac",
        label_field: None,
        fields,
        relations,
        member: Some(member),
    }
}

const fn xref_entity(name: &'static str, table: &'static str) -> EntityDescriptor {
    member_entity(
        name,
        table,
        XREF_FIELDS,
        XREF_RELATIONS,
        MemberShape {
            kind: MemberKind::Xref,
            concept_field: "database",
            value_field: "id",
            qualifier_field: Some("qualifier"),
        },
    )
}

const fn alias_entity(name: &'static str, table: &'static str) -> EntityDescriptor {
    member_entity(
        name,
        table,
        ALIAS_FIELDS,
        ALIAS_RELATIONS,
        MemberShape {
            kind: MemberKind::Alias,
            concept_field: "type",
            value_field: "name",
            qualifier_field: None,
        },
    )
}

const fn annotation_entity(name: &'static str, table: &'static str) -> EntityDescriptor {
    member_entity(
        name,
        table,
        ANNOTATION_FIELDS,
        ANNOTATION_RELATIONS,
        MemberShape {
            kind: MemberKind::Annotation,
            concept_field: "topic",
            value_field: "value",
            qualifier_field: None,
        },
    )
}

const fn checksum_entity(name: &'static str, table: &'static str) -> EntityDescriptor {
    member_entity(
        name,
        table,
        CHECKSUM_FIELDS,
        CHECKSUM_RELATIONS,
        MemberShape {
            kind: MemberKind::Checksum,
            concept_field: "method",
            value_field: "value",
            qualifier_field: None,
        },
    )
}

const INTACT_ENTITIES: &[EntityDescriptor] = &[
    EntityDescriptor {
        name: CONCEPT_ENTITY,
        table: "cv_term",
        key_column: "ac",
        label_field: Some(SHORT_NAME_FIELD),
        fields: &[
            field("ac", "ac"),
            field(SHORT_NAME_FIELD, "shortlabel"),
            field("fullName", "fullname"),
        ],
        relations: &[
            many(XREFS_RELATION, "CvTermXref"),
            many("synonyms", "CvTermAlias"),
            many("annotations", "CvTermAnnotation"),
        ],
        member: None,
    },
    xref_entity("CvTermXref", "cv_term_xref"),
    alias_entity("CvTermAlias", "cv_term_alias"),
    annotation_entity("CvTermAnnotation", "cv_term_annotation"),
    EntityDescriptor {
        name: "Interactor",
        table: "interactor",
        key_column: "ac",
        label_field: Some(SHORT_NAME_FIELD),
        fields: &[
            field("ac", "ac"),
            field(SHORT_NAME_FIELD, "shortlabel"),
            field("fullName", "fullname"),
        ],
        relations: &[
            one("interactorType", CONCEPT_ENTITY, "interactor_type_ac"),
            many(XREFS_RELATION, "InteractorXref"),
            many("aliases", "InteractorAlias"),
            many("annotations", "InteractorAnnotation"),
            many("checksums", "InteractorChecksum"),
        ],
        member: None,
    },
    xref_entity("InteractorXref", "interactor_xref"),
    alias_entity("InteractorAlias", "interactor_alias"),
    annotation_entity("InteractorAnnotation", "interactor_annotation"),
    checksum_entity("InteractorChecksum", "interactor_checksum"),
    EntityDescriptor {
        name: "Publication",
        table: "publication",
        key_column: "ac",
        label_field: Some(SHORT_NAME_FIELD),
        fields: &[
            field("ac", "ac"),
            field(SHORT_NAME_FIELD, "shortlabel"),
            field("title", "title"),
        ],
        relations: &[
            one("curationDepth", CONCEPT_ENTITY, "curation_depth_ac"),
            many(XREFS_RELATION, "PublicationXref"),
            many("annotations", "PublicationAnnotation"),
        ],
        member: None,
    },
    xref_entity("PublicationXref", "publication_xref"),
    annotation_entity("PublicationAnnotation", "publication_annotation"),
    EntityDescriptor {
        name: "Experiment",
        table: "experiment",
        key_column: "ac",
        label_field: Some(SHORT_NAME_FIELD),
        fields: &[field("ac", "ac"), field(SHORT_NAME_FIELD, "shortlabel")],
        relations: &[
            one(
                "interactionDetectionMethod",
                CONCEPT_ENTITY,
                "detection_method_ac",
            ),
            one(
                "participantIdentificationMethod",
                CONCEPT_ENTITY,
                "identification_method_ac",
            ),
            one("publication", "Publication", "publication_ac"),
            many(XREFS_RELATION, "ExperimentXref"),
            many("annotations", "ExperimentAnnotation"),
        ],
        member: None,
    },
    xref_entity("ExperimentXref", "experiment_xref"),
    annotation_entity("ExperimentAnnotation", "experiment_annotation"),
];

static INTACT_SCHEMA: Schema = Schema::new(INTACT_ENTITIES);
