//! SQLite renderer over the relational mapping of [`Schema`].
//!
//! # Invariants
//! - Returned rows expose columns `ac` and `label` of the root entity.
//! - Path navigation through single-valued relations becomes an inner join.
//! - Null checks on single-valued relations test the foreign-key column.

use crate::model::schema::{Cardinality, EntityDescriptor, RelationDescriptor, Schema};
use crate::plan::{Comparison, FieldPath, Predicate, QueryPlan};
use crate::render::{QueryRenderer, RenderError, RenderResult, RenderedQuery};
use std::collections::BTreeMap;

/// Renders plans as SQLite `SELECT` statements.
#[derive(Debug, Clone, Copy)]
pub struct SqliteRenderer<'s> {
    schema: &'s Schema,
}

impl<'s> SqliteRenderer<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    fn entity(&self, name: &str) -> RenderResult<&'s EntityDescriptor> {
        self.schema
            .entity(name)
            .ok_or_else(|| RenderError::UnknownEntity(name.to_string()))
    }
}

impl Default for SqliteRenderer<'static> {
    fn default() -> Self {
        Self::new(Schema::intact())
    }
}

impl QueryRenderer for SqliteRenderer<'_> {
    fn render(&self, plan: &QueryPlan) -> RenderResult<RenderedQuery> {
        let root_entity = self.entity(&plan.root.entity)?;
        let mut scope = Scope::default();
        scope.declare(&plan.root.alias, root_entity);

        let mut joins = Vec::with_capacity(plan.joins.len());
        for join in &plan.joins {
            let owner = scope.lookup(&join.from_alias)?;
            let relation = relation_of(owner, &join.relation)?;
            if relation.target != join.entity {
                return Err(RenderError::InvalidPath(format!(
                    "{}.{} does not reach {}",
                    join.from_alias, join.relation, join.entity
                )));
            }
            let target = self.entity(relation.target)?;
            joins.push(join_clause(
                &join.from_alias,
                owner,
                relation,
                &join.alias,
                target,
            ));
            scope.declare(&join.alias, target);
        }

        let mut conditions = Vec::with_capacity(plan.predicates.len());
        for predicate in &plan.predicates {
            conditions.push(self.condition(&mut scope, predicate)?);
        }
        joins.append(&mut scope.implicit_joins);

        let label = match root_entity.label_field {
            Some(field) => format!("{}.{}", plan.root.alias, column_of(root_entity, field)?),
            None => "NULL".to_string(),
        };
        let mut text = format!(
            "SELECT {}{}.{} AS ac, {label} AS label FROM {} {}",
            if plan.distinct { "DISTINCT " } else { "" },
            plan.root.alias,
            root_entity.key_column,
            root_entity.table,
            plan.root.alias
        );
        for join in joins {
            text.push(' ');
            text.push_str(&join);
        }
        if !conditions.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&conditions.join(" AND "));
        }

        Ok(RenderedQuery {
            text,
            parameters: plan.parameters.clone(),
        })
    }
}

impl<'s> SqliteRenderer<'s> {
    fn condition(&self, scope: &mut Scope<'s>, predicate: &Predicate) -> RenderResult<String> {
        match predicate {
            Predicate::Compare {
                path,
                comparison,
                parameter,
            } => {
                let column = self.field_column(scope, path)?;
                Ok(match comparison {
                    Comparison::Equals => format!("{column} = :{parameter}"),
                    Comparison::LikeUpperCase => {
                        format!("UPPER({column}) LIKE UPPER(:{parameter})")
                    }
                })
            }
            Predicate::InSet { path, parameters } => {
                let column = self.field_column(scope, path)?;
                let placeholders = parameters
                    .iter()
                    .map(|parameter| format!(":{parameter}"))
                    .collect::<Vec<_>>();
                Ok(format!("{column} IN ({})", placeholders.join(", ")))
            }
            Predicate::IsNull { path } => {
                let (alias, owner, last) = self.walk(scope, path)?;
                let relation = relation_of(owner, last)?;
                if relation.cardinality != Cardinality::One {
                    return Err(RenderError::InvalidPath(path.to_string()));
                }
                Ok(format!("{alias}.{} IS NULL", relation.column))
            }
            Predicate::IsEmpty { path } => {
                let (alias, owner, last) = self.walk(scope, path)?;
                let relation = relation_of(owner, last)?;
                if relation.cardinality != Cardinality::Many {
                    return Err(RenderError::InvalidPath(path.to_string()));
                }
                let target = self.entity(relation.target)?;
                Ok(format!(
                    "NOT EXISTS (SELECT 1 FROM {0} WHERE {0}.{1} = {alias}.{2})",
                    target.table, relation.column, owner.key_column
                ))
            }
        }
    }

    fn field_column(&self, scope: &mut Scope<'s>, path: &FieldPath) -> RenderResult<String> {
        let (alias, owner, last) = self.walk(scope, path)?;
        Ok(format!("{alias}.{}", column_of(owner, last)?))
    }

    /// Follows all but the last segment, adding implicit joins as needed.
    fn walk<'p>(
        &self,
        scope: &mut Scope<'s>,
        path: &'p FieldPath,
    ) -> RenderResult<(String, &'s EntityDescriptor, &'p str)> {
        let Some((last, prefix)) = path.segments.split_last() else {
            return Err(RenderError::InvalidPath(path.to_string()));
        };

        let mut alias = path.alias.clone();
        let mut entity = scope.lookup(&alias)?;
        for segment in prefix {
            let relation = relation_of(entity, segment)?;
            if relation.cardinality != Cardinality::One {
                return Err(RenderError::InvalidPath(path.to_string()));
            }
            let target = self.entity(relation.target)?;
            alias = scope.implicit_join(&alias, entity, relation, target);
            entity = target;
        }
        Ok((alias, entity, last.as_str()))
    }
}

#[derive(Debug, Default)]
struct Scope<'s> {
    aliases: BTreeMap<String, &'s EntityDescriptor>,
    implicit: BTreeMap<(String, &'static str), String>,
    implicit_joins: Vec<String>,
}

impl<'s> Scope<'s> {
    fn declare(&mut self, alias: &str, entity: &'s EntityDescriptor) {
        self.aliases.insert(alias.to_string(), entity);
    }

    fn lookup(&self, alias: &str) -> RenderResult<&'s EntityDescriptor> {
        self.aliases
            .get(alias)
            .copied()
            .ok_or_else(|| RenderError::UnknownAlias(alias.to_string()))
    }

    /// Returns the alias joined for `owner_alias.relation`, creating it once.
    fn implicit_join(
        &mut self,
        owner_alias: &str,
        owner: &EntityDescriptor,
        relation: &RelationDescriptor,
        target: &'s EntityDescriptor,
    ) -> String {
        let key = (owner_alias.to_string(), relation.name);
        if let Some(alias) = self.implicit.get(&key) {
            return alias.clone();
        }
        let alias = format!("p{}", self.implicit.len() + 1);
        self.implicit_joins
            .push(join_clause(owner_alias, owner, relation, &alias, target));
        self.implicit.insert(key, alias.clone());
        self.aliases.insert(alias.clone(), target);
        alias
    }
}

fn join_clause(
    owner_alias: &str,
    owner: &EntityDescriptor,
    relation: &RelationDescriptor,
    alias: &str,
    target: &EntityDescriptor,
) -> String {
    match relation.cardinality {
        Cardinality::One => format!(
            "JOIN {} {alias} ON {alias}.{} = {owner_alias}.{}",
            target.table, target.key_column, relation.column
        ),
        Cardinality::Many => format!(
            "JOIN {} {alias} ON {alias}.{} = {owner_alias}.{}",
            target.table, relation.column, owner.key_column
        ),
    }
}

fn relation_of<'e>(entity: &'e EntityDescriptor, name: &str) -> RenderResult<&'e RelationDescriptor> {
    entity
        .relation(name)
        .ok_or_else(|| RenderError::UnknownRelation {
            entity: entity.name.to_string(),
            relation: name.to_string(),
        })
}

fn column_of<'e>(entity: &'e EntityDescriptor, field: &str) -> RenderResult<&'e str> {
    entity
        .field(field)
        .map(|descriptor| descriptor.column)
        .ok_or_else(|| RenderError::UnknownField {
            entity: entity.name.to_string(),
            field: field.to_string(),
        })
}
