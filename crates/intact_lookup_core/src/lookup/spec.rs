//! Lookup specification and its resolution into exclusive lookup modes.
//!
//! # Responsibility
//! - Capture caller intent for one ontology-qualified lookup.
//! - Normalize input and pick exactly one mode per concept slot.
//!
//! # Invariants
//! - An ontology id always wins over a simultaneously supplied name.
//! - An explicit "absent" name never combines with an ontology id.
//! - Resolution never mutates the specification.

use crate::model::concept::is_well_formed_ontology_id;
use crate::model::schema::MemberKind;
use crate::model::vocabulary::PSI_MI;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which concept slot of the traversed relation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    /// The relation points directly at a concept.
    Name,
    /// Database concept of cross-reference members.
    Xref,
    /// Type concept of alias members.
    AliasType,
    /// Topic concept of annotation members.
    AnnotationTopic,
    /// Method concept of checksum members.
    ChecksumMethod,
}

impl TargetField {
    /// Member kind expected behind the relation, `None` for direct concepts.
    pub fn member_kind(self) -> Option<MemberKind> {
        match self {
            Self::Name => None,
            Self::Xref => Some(MemberKind::Xref),
            Self::AliasType => Some(MemberKind::Alias),
            Self::AnnotationTopic => Some(MemberKind::Annotation),
            Self::ChecksumMethod => Some(MemberKind::Checksum),
        }
    }

    pub fn supports_qualifier(self) -> bool {
        matches!(self, Self::Xref)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Xref => "xref",
            Self::AliasType => "alias_type",
            Self::AnnotationTopic => "annotation_topic",
            Self::ChecksumMethod => "checksum_method",
        }
    }
}

/// Text comparison applied to the terminal predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    /// `upper(field) like upper('%value%')`.
    SubstringCaseInsensitive,
}

/// Tri-state name input: not given, explicitly null, or a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Unset,
    Absent,
    Value(String),
}

impl Criterion {
    /// Maps an optional DAO parameter: `None` means "not given".
    pub fn from_option(value: Option<&str>) -> Self {
        value.map_or(Self::Unset, |value| Self::Value(value.to_string()))
    }
}

/// Caller intent for one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupSpecification {
    pub target_field: TargetField,
    /// Short name of the target concept.
    pub match_value: Criterion,
    pub ontology_id: Option<String>,
    pub qualifier_name: Criterion,
    pub qualifier_ontology_id: Option<String>,
    /// Text carried by the member row (xref id, alias name, annotation text).
    pub member_value: Option<String>,
    pub match_mode: MatchMode,
}

impl LookupSpecification {
    pub fn new(target_field: TargetField) -> Self {
        Self {
            target_field,
            match_value: Criterion::Unset,
            ontology_id: None,
            qualifier_name: Criterion::Unset,
            qualifier_ontology_id: None,
            member_value: None,
            match_mode: MatchMode::Exact,
        }
    }

    /// Builds a specification from `(name, ontology id)` method parameters.
    ///
    /// Both `None` resolves to a lookup by absence.
    pub fn from_params(
        target_field: TargetField,
        name: Option<&str>,
        ontology_id: Option<&str>,
    ) -> Self {
        Self {
            match_value: Criterion::from_option(name),
            ontology_id: ontology_id.map(str::to_string),
            ..Self::new(target_field)
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.match_value = Criterion::Value(name.into());
        self
    }

    /// Requests entities whose concept slot is null.
    pub fn name_absent(mut self) -> Self {
        self.match_value = Criterion::Absent;
        self
    }

    pub fn ontology_id(mut self, ontology_id: impl Into<String>) -> Self {
        self.ontology_id = Some(ontology_id.into());
        self
    }

    pub fn qualifier_name(mut self, name: impl Into<String>) -> Self {
        self.qualifier_name = Criterion::Value(name.into());
        self
    }

    /// Requests members with no qualifier.
    pub fn qualifier_absent(mut self) -> Self {
        self.qualifier_name = Criterion::Absent;
        self
    }

    pub fn qualifier_ontology_id(mut self, ontology_id: impl Into<String>) -> Self {
        self.qualifier_ontology_id = Some(ontology_id.into());
        self
    }

    pub fn member_value(mut self, value: impl Into<String>) -> Self {
        self.member_value = Some(value.into());
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Namespace ontology ids are resolved in. Always `psi-mi`.
    pub fn ontology_namespace(&self) -> &'static str {
        PSI_MI
    }

    /// Validates the specification and picks one mode per concept slot.
    ///
    /// # Errors
    /// - [`InvalidSpecificationError`] when the inputs contradict each other,
    ///   are blank, or carry a malformed ontology id.
    pub fn resolve(&self) -> Result<ResolvedLookup, InvalidSpecificationError> {
        let concept = resolve_axis(
            Axis::Concept,
            &self.match_value,
            self.ontology_id.as_deref(),
        )?
        .unwrap_or(ConceptResolution::Absent);
        let qualifier = resolve_axis(
            Axis::Qualifier,
            &self.qualifier_name,
            self.qualifier_ontology_id.as_deref(),
        )?;
        let member_value = match self.member_value.as_deref() {
            Some(value) => Some(normalize_text("member_value", value)?),
            None => None,
        };

        if qualifier.is_some() {
            if !self.target_field.supports_qualifier() {
                return Err(InvalidSpecificationError::QualifierNotSupported(
                    self.target_field,
                ));
            }
            if concept == ConceptResolution::Absent && member_value.is_none() {
                return Err(InvalidSpecificationError::QualifierWithoutContext);
            }
        }

        if self.match_mode == MatchMode::SubstringCaseInsensitive
            && member_value.is_none()
            && !matches!(concept, ConceptResolution::ByName(_))
        {
            return Err(InvalidSpecificationError::NothingToMatch);
        }

        Ok(ResolvedLookup {
            target_field: self.target_field,
            concept,
            qualifier,
            member_value,
            match_mode: self.match_mode,
        })
    }
}

/// How one concept slot is matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConceptResolution {
    /// Join the concept's xrefs and match a psi-mi identity/secondary id.
    ByOntologyId(String),
    /// Match the concept short name directly.
    ByName(String),
    /// The slot must be null (or the relation empty).
    Absent,
}

/// Normalized, mutually exclusive lookup modes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedLookup {
    pub target_field: TargetField,
    pub concept: ConceptResolution,
    /// `None` leaves the qualifier unconstrained.
    pub qualifier: Option<ConceptResolution>,
    pub member_value: Option<String>,
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Concept,
    Qualifier,
}

impl Axis {
    fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Qualifier => "qualifier",
        }
    }
}

fn resolve_axis(
    axis: Axis,
    name: &Criterion,
    ontology_id: Option<&str>,
) -> Result<Option<ConceptResolution>, InvalidSpecificationError> {
    if let Some(raw_id) = ontology_id {
        let id = normalize_ontology_id(raw_id)?;
        match name {
            Criterion::Absent => {
                return Err(match axis {
                    Axis::Concept => InvalidSpecificationError::AbsentWithOntologyId,
                    Axis::Qualifier => InvalidSpecificationError::QualifierAbsentWithOntologyId,
                });
            }
            Criterion::Value(_) => debug!(
                "event=spec_resolve module=lookup status=ok axis={} tie_break=ontology_id_over_name",
                axis.as_str()
            ),
            Criterion::Unset => {}
        }
        return Ok(Some(ConceptResolution::ByOntologyId(id)));
    }

    match name {
        Criterion::Value(value) => {
            let field = match axis {
                Axis::Concept => "match_value",
                Axis::Qualifier => "qualifier_name",
            };
            Ok(Some(ConceptResolution::ByName(normalize_text(field, value)?)))
        }
        Criterion::Absent => Ok(Some(ConceptResolution::Absent)),
        Criterion::Unset => Ok(None),
    }
}

fn normalize_text(field: &'static str, value: &str) -> Result<String, InvalidSpecificationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InvalidSpecificationError::BlankValue(field));
    }
    Ok(trimmed.to_string())
}

fn normalize_ontology_id(value: &str) -> Result<String, InvalidSpecificationError> {
    let trimmed = value.trim();
    if !is_well_formed_ontology_id(trimmed) {
        return Err(InvalidSpecificationError::MalformedOntologyId(
            trimmed.to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Self-contradictory or unplannable lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSpecificationError {
    /// Explicit "no concept" combined with an ontology id.
    AbsentWithOntologyId,
    /// Explicit "no qualifier" combined with a qualifier ontology id.
    QualifierAbsentWithOntologyId,
    QualifierNotSupported(TargetField),
    /// Qualifier criteria with nothing to qualify.
    QualifierWithoutContext,
    /// Substring mode with no text predicate to wrap.
    NothingToMatch,
    BlankValue(&'static str),
    MalformedOntologyId(String),
    UnknownEntity(String),
    UnknownRelation {
        entity: String,
        relation: String,
    },
    TargetFieldMismatch {
        entity: String,
        relation: String,
        target_field: TargetField,
    },
    /// A self lookup cannot ask for the base entity to be null.
    SelfAbsent,
}

impl InvalidSpecificationError {
    /// Stable error code for log events. Carries no caller input.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AbsentWithOntologyId => "absent_with_ontology_id",
            Self::QualifierAbsentWithOntologyId => "qualifier_absent_with_ontology_id",
            Self::QualifierNotSupported(_) => "qualifier_not_supported",
            Self::QualifierWithoutContext => "qualifier_without_context",
            Self::NothingToMatch => "nothing_to_match",
            Self::BlankValue(_) => "blank_value",
            Self::MalformedOntologyId(_) => "malformed_ontology_id",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::UnknownRelation { .. } => "unknown_relation",
            Self::TargetFieldMismatch { .. } => "target_field_mismatch",
            Self::SelfAbsent => "self_absent",
        }
    }
}

impl Display for InvalidSpecificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AbsentWithOntologyId => {
                write!(f, "ontology id given together with an explicit absent name")
            }
            Self::QualifierAbsentWithOntologyId => write!(
                f,
                "qualifier ontology id given together with an explicit absent qualifier"
            ),
            Self::QualifierNotSupported(target) => {
                write!(f, "target field `{}` has no qualifier", target.as_str())
            }
            Self::QualifierWithoutContext => write!(
                f,
                "qualifier criteria require a concept or member value to qualify"
            ),
            Self::NothingToMatch => {
                write!(f, "substring match requires a name or member value")
            }
            Self::BlankValue(field) => write!(f, "`{field}` must not be blank"),
            Self::MalformedOntologyId(value) => write!(f, "malformed ontology id `{value}`"),
            Self::UnknownEntity(entity) => write!(f, "unknown entity `{entity}`"),
            Self::UnknownRelation { entity, relation } => {
                write!(f, "entity `{entity}` has no relation `{relation}`")
            }
            Self::TargetFieldMismatch {
                entity,
                relation,
                target_field,
            } => write!(
                f,
                "relation `{entity}.{relation}` cannot be resolved as `{}`",
                target_field.as_str()
            ),
            Self::SelfAbsent => write!(f, "self lookup requires a name or ontology id"),
        }
    }
}

impl Error for InvalidSpecificationError {}
