//! Lookup execution contracts and SQLite implementation.
//!
//! # Responsibility
//! - Bind rendered plans to a live connection and materialize records.
//! - Own pagination and single-result semantics.
//!
//! # Invariants
//! - Result ordering is deterministic: `ac ASC`.
//! - No match is `Ok(vec![])` / `Ok(None)`, never an error.
//! - More than one match on a unique lookup is `RepoError::AmbiguousResult`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::lookup::spec::InvalidSpecificationError;
use crate::model::concept::{Concept, CrossReference};
use crate::model::schema::Schema;
use crate::plan::QueryPlan;
use crate::render::{QueryRenderer, RenderError, SqliteRenderer};
use log::{debug, error};
use rusqlite::types::{ToSql, Value};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_MAX_RESULTS: u32 = 50;
const MAX_RESULTS_CAP: u32 = 500;
/// Levels of nested xref concepts materialized by [`LookupRepository::load_concept`].
pub const CONCEPT_LOAD_DEPTH: u8 = 2;

pub type RepoResult<T> = Result<T, RepoError>;

/// Lookup execution error.
#[derive(Debug)]
pub enum RepoError {
    InvalidSpecification(InvalidSpecificationError),
    Render(RenderError),
    Db(DbError),
    /// A unique lookup matched several rows: a data-integrity issue.
    AmbiguousResult {
        entity: String,
        rows: u64,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSpecification(err) => write!(f, "invalid lookup specification: {err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::AmbiguousResult { entity, rows } => {
                write!(f, "expected at most one {entity}, found {rows} matching rows")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "lookup repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "lookup repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpecification(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::AmbiguousResult { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<InvalidSpecificationError> for RepoError {
    fn from(value: InvalidSpecificationError) -> Self {
        Self::InvalidSpecification(value)
    }
}

impl From<RenderError> for RepoError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pagination window, applied after de-duplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub first_result: u32,
    /// Defaults to 50 and clamps to 500.
    pub max_results: Option<u32>,
}

impl Page {
    pub fn new(first_result: u32, max_results: u32) -> Self {
        Self {
            first_result,
            max_results: Some(max_results),
        }
    }
}

/// Normalizes `max_results` according to the pagination contract.
pub fn normalize_max_results(max_results: Option<u32>) -> u32 {
    match max_results {
        Some(0) | None => DEFAULT_MAX_RESULTS,
        Some(value) => value.min(MAX_RESULTS_CAP),
    }
}

/// One matching root entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: String,
    pub ac: String,
    /// Short label, when the entity carries one.
    pub label: Option<String>,
}

/// Executor boundary for query plans.
pub trait LookupRepository {
    /// Returns one page of matching entities.
    fn find(&self, plan: &QueryPlan, page: &Page) -> RepoResult<Vec<EntityRecord>>;
    /// Returns the single match, `None` when nothing matches.
    fn find_unique(&self, plan: &QueryPlan) -> RepoResult<Option<EntityRecord>>;
    /// Counts all distinct matches.
    fn count(&self, plan: &QueryPlan) -> RepoResult<u64>;
    /// Loads one concept with its cross-reference graph.
    fn load_concept(&self, ac: &str) -> RepoResult<Option<Concept>>;
}

/// SQLite-backed lookup executor.
pub struct SqliteLookupRepository<'conn> {
    conn: &'conn Connection,
    schema: &'static Schema,
}

impl<'conn> SqliteLookupRepository<'conn> {
    /// Creates repository from a fully migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let schema = Schema::intact();
        ensure_lookup_connection_ready(conn, schema)?;
        Ok(Self { conn, schema })
    }
}

impl LookupRepository for SqliteLookupRepository<'_> {
    fn find(&self, plan: &QueryPlan, page: &Page) -> RepoResult<Vec<EntityRecord>> {
        let started_at = Instant::now();
        let result = query_records(self.conn, self.schema, plan, page);
        log_execution("find", plan, started_at, result.as_ref().map(Vec::len));
        result
    }

    fn find_unique(&self, plan: &QueryPlan) -> RepoResult<Option<EntityRecord>> {
        let started_at = Instant::now();
        let window = Page::new(0, 2);
        let records = query_records(self.conn, self.schema, plan, &window);
        log_execution(
            "find_unique",
            plan,
            started_at,
            records.as_ref().map(Vec::len),
        );

        let mut records = records?;
        if records.len() > 1 {
            let rows = self.count(plan)?;
            error!(
                "event=lookup_exec module=repo status=error op=find_unique entity={} rows={} error_code=ambiguous_result",
                plan.root.entity, rows
            );
            return Err(RepoError::AmbiguousResult {
                entity: plan.root.entity.clone(),
                rows,
            });
        }
        Ok(records.pop())
    }

    fn count(&self, plan: &QueryPlan) -> RepoResult<u64> {
        count_records(self.conn, self.schema, plan)
    }

    fn load_concept(&self, ac: &str) -> RepoResult<Option<Concept>> {
        let mut loader = ConceptLoader::new(self.conn);
        Ok(loader
            .load(ac, CONCEPT_LOAD_DEPTH)?
            .map(|concept| Concept::clone(&concept)))
    }
}

/// Renders `plan` and returns one page of records.
pub(crate) fn query_records(
    conn: &Connection,
    schema: &Schema,
    plan: &QueryPlan,
    page: &Page,
) -> RepoResult<Vec<EntityRecord>> {
    let rendered = SqliteRenderer::new(schema).render(plan)?;
    let mut sql = rendered.text;
    let mut extra = vec![(
        ":limit".to_string(),
        Value::Integer(i64::from(normalize_max_results(page.max_results))),
    )];
    sql.push_str(" ORDER BY ac ASC LIMIT :limit");
    if page.first_result > 0 {
        sql.push_str(" OFFSET :offset");
        extra.push((
            ":offset".to_string(),
            Value::Integer(i64::from(page.first_result)),
        ));
    }

    let named = bind_parameters(rendered.parameters.into_iter(), extra);
    let bound = as_named_params(&named);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(bound.as_slice())?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(EntityRecord {
            entity: plan.root.entity.clone(),
            ac: row.get("ac")?,
            label: row.get("label")?,
        });
    }
    Ok(records)
}

/// Counts all distinct rows matched by `plan`.
pub(crate) fn count_records(conn: &Connection, schema: &Schema, plan: &QueryPlan) -> RepoResult<u64> {
    let rendered = SqliteRenderer::new(schema).render(plan)?;
    let sql = format!("SELECT COUNT(*) FROM ({})", rendered.text);
    let named = bind_parameters(rendered.parameters.into_iter(), Vec::new());
    let bound = as_named_params(&named);
    let count: i64 = conn.query_row(&sql, bound.as_slice(), |row| row.get(0))?;
    u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
}

fn bind_parameters(
    parameters: impl Iterator<Item = (String, String)>,
    mut extra: Vec<(String, Value)>,
) -> Vec<(String, Value)> {
    let mut named = parameters
        .map(|(name, value)| (format!(":{name}"), Value::Text(value)))
        .collect::<Vec<_>>();
    named.append(&mut extra);
    named
}

fn as_named_params(named: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    named
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn log_execution(
    op: &str,
    plan: &QueryPlan,
    started_at: Instant,
    outcome: Result<usize, &RepoError>,
) {
    match outcome {
        Ok(rows) => debug!(
            "event=lookup_exec module=repo status=ok op={op} entity={} rows={rows} distinct={} duration_ms={}",
            plan.root.entity,
            plan.distinct,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=lookup_exec module=repo status=error op={op} entity={} duration_ms={} error={}",
            plan.root.entity,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}

/// Depth-limited concept graph loader sharing nested concepts by accession.
struct ConceptLoader<'conn> {
    conn: &'conn Connection,
    cache: HashMap<(String, u8), Arc<Concept>>,
}

impl<'conn> ConceptLoader<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            cache: HashMap::new(),
        }
    }

    fn load(&mut self, ac: &str, depth: u8) -> RepoResult<Option<Arc<Concept>>> {
        if let Some(concept) = self.cache.get(&(ac.to_string(), depth)) {
            return Ok(Some(Arc::clone(concept)));
        }

        let row = self
            .conn
            .query_row(
                "SELECT ac, shortlabel, fullname FROM cv_term WHERE ac = ?1;",
                [ac],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((ac, short_name, full_name)) = row else {
            return Ok(None);
        };

        let xrefs = if depth == 0 {
            Vec::new()
        } else {
            self.load_xrefs(&ac, depth - 1)?
        };

        let concept = Arc::new(Concept {
            ac: Some(ac.clone()),
            short_name,
            full_name,
            xrefs,
        });
        self.cache.insert((ac, depth), Arc::clone(&concept));
        Ok(Some(concept))
    }

    fn load_xrefs(&mut self, parent_ac: &str, depth: u8) -> RepoResult<Vec<CrossReference>> {
        let mut stmt = self.conn.prepare(
            "SELECT database_ac, primary_id, qualifier_ac
             FROM cv_term_xref
             WHERE parent_ac = ?1
             ORDER BY ac ASC;",
        )?;
        let rows = stmt
            .query_map([parent_ac], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut xrefs = Vec::with_capacity(rows.len());
        for (database_ac, id, qualifier_ac) in rows {
            let database = self.load_required(&database_ac, depth)?;
            let qualifier = match qualifier_ac {
                Some(qualifier_ac) => Some(self.load_required(&qualifier_ac, depth)?),
                None => None,
            };
            xrefs.push(CrossReference {
                database,
                id,
                qualifier,
            });
        }
        Ok(xrefs)
    }

    fn load_required(&mut self, ac: &str, depth: u8) -> RepoResult<Arc<Concept>> {
        self.load(ac, depth)?.ok_or_else(|| {
            RepoError::InvalidData(format!("cv_term_xref references missing cv_term `{ac}`"))
        })
    }
}

fn ensure_lookup_connection_ready(conn: &Connection, schema: &Schema) -> RepoResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for entity in schema.entities() {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [entity.table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(entity.table));
        }
    }
    Ok(())
}
