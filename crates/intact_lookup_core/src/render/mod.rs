//! Per-dialect query plan renderers.
//!
//! # Responsibility
//! - Translate a [`QueryPlan`] into query text plus named parameters.
//! - Keep dialect details out of planning.
//!
//! # Invariants
//! - Placeholders use the `:name` form and match plan parameter keys.
//! - Rendering never inlines parameter values into query text.

pub mod jpql;
pub mod sqlite;

use crate::plan::QueryPlan;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use jpql::JpqlRenderer;
pub use sqlite::SqliteRenderer;

/// Query text with its parallel parameter map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub text: String,
    pub parameters: BTreeMap<String, String>,
}

/// Dialect adapter contract handed to query executors.
pub trait QueryRenderer {
    fn render(&self, plan: &QueryPlan) -> RenderResult<RenderedQuery>;
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Plan cannot be mapped onto the dialect's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnknownEntity(String),
    UnknownAlias(String),
    UnknownRelation { entity: String, relation: String },
    UnknownField { entity: String, field: String },
    /// Path shape unsupported by the dialect (e.g. traversal of a multi-valued relation).
    InvalidPath(String),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "no mapping for entity `{entity}`"),
            Self::UnknownAlias(alias) => write!(f, "plan references undeclared alias `{alias}`"),
            Self::UnknownRelation { entity, relation } => {
                write!(f, "no mapping for relation `{entity}.{relation}`")
            }
            Self::UnknownField { entity, field } => {
                write!(f, "no mapping for field `{entity}.{field}`")
            }
            Self::InvalidPath(path) => write!(f, "unsupported path `{path}`"),
        }
    }
}

impl Error for RenderError {}
