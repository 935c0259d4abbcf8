//! Object query language renderer (`select e from Entity e join ...`).

use crate::plan::QueryPlan;
use crate::render::{QueryRenderer, RenderResult, RenderedQuery};

/// Renders plans in the entity query dialect used by ORM-backed hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpqlRenderer;

impl QueryRenderer for JpqlRenderer {
    fn render(&self, plan: &QueryPlan) -> RenderResult<RenderedQuery> {
        let root = &plan.root;
        let mut text = if plan.distinct {
            format!("select distinct {0} from {1} {0}", root.alias, root.entity)
        } else {
            format!("select {0} from {1} {0}", root.alias, root.entity)
        };

        for join in &plan.joins {
            text.push_str(&format!(
                " join {}.{} as {}",
                join.from_alias, join.relation, join.alias
            ));
        }

        if !plan.predicates.is_empty() {
            let conditions = plan
                .predicates
                .iter()
                .map(|predicate| predicate.to_string())
                .collect::<Vec<_>>();
            text.push_str(" where ");
            text.push_str(&conditions.join(" and "));
        }

        Ok(RenderedQuery {
            text,
            parameters: plan.parameters.clone(),
        })
    }
}
