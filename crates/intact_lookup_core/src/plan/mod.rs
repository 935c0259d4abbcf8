//! Storage-agnostic query plans.
//!
//! # Responsibility
//! - Represent joins and predicates derived from a lookup specification.
//! - Stay purely descriptive: no session or connection handles.
//!
//! # Invariants
//! - Predicates form one conjunction.
//! - `distinct` is set iff some join step traverses a multi-valued relation.
//! - Every parameter referenced by a predicate is present in `parameters`.

pub mod builder;

use crate::model::schema::Cardinality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub use builder::{build_plan, PlanBuilder};

/// Attribute or relation reached from an alias, e.g. `e.interactorType.shortName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    pub alias: String,
    pub segments: Vec<String>,
}

impl FieldPath {
    pub fn new(alias: impl Into<String>, segments: &[&str]) -> Self {
        Self {
            alias: alias.into(),
            segments: segments.iter().map(|segment| segment.to_string()).collect(),
        }
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut path = self.clone();
        path.segments.push(segment.to_string());
        path
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.alias)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equals,
    /// `upper(path) like upper(:parameter)`; the parameter carries `%value%`.
    LikeUpperCase,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        path: FieldPath,
        comparison: Comparison,
        parameter: String,
    },
    InSet {
        path: FieldPath,
        parameters: Vec<String>,
    },
    /// Single-valued relation is null.
    IsNull { path: FieldPath },
    /// Multi-valued relation has no members.
    IsEmpty { path: FieldPath },
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compare {
                path,
                comparison: Comparison::Equals,
                parameter,
            } => write!(f, "{path} = :{parameter}"),
            Self::Compare {
                path,
                comparison: Comparison::LikeUpperCase,
                parameter,
            } => write!(f, "upper({path}) like upper(:{parameter})"),
            Self::InSet { path, parameters } => {
                let placeholders = parameters
                    .iter()
                    .map(|parameter| format!(":{parameter}"))
                    .collect::<Vec<_>>();
                write!(f, "{path} in ({})", placeholders.join(", "))
            }
            Self::IsNull { path } => write!(f, "{path} is null"),
            Self::IsEmpty { path } => write!(f, "{path} is empty"),
        }
    }
}

/// One `from_alias.relation as alias` traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinStep {
    pub from_alias: String,
    pub relation: String,
    pub alias: String,
    /// Entity reached by the join.
    pub entity: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanRoot {
    pub entity: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root: PlanRoot,
    pub joins: Vec<JoinStep>,
    pub predicates: Vec<Predicate>,
    /// Named parameter values, keyed without placeholder prefix.
    pub parameters: BTreeMap<String, String>,
    pub distinct: bool,
}

impl QueryPlan {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Returns whether some join step traverses `relation`.
    pub fn joins_relation(&self, relation: &str) -> bool {
        self.joins.iter().any(|join| join.relation == relation)
    }

    /// Parameter-free signature; equal for plans of the same lookup shape.
    pub fn shape(&self) -> String {
        let mut parts = vec![format!("{} {}", self.root.entity, self.root.alias)];
        for join in &self.joins {
            let fan_out = match join.cardinality {
                Cardinality::One => "",
                Cardinality::Many => "*",
            };
            parts.push(format!(
                "join {}.{}{fan_out} {}",
                join.from_alias, join.relation, join.alias
            ));
        }
        for predicate in &self.predicates {
            parts.push(predicate.to_string());
        }
        if self.distinct {
            parts.push("distinct".to_string());
        }
        parts.join(" | ")
    }
}
