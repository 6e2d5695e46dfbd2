//! Projection operator for expression evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use evolvdb_core::{Schema, Tuple, Value};

use crate::error::QueryResult;
use crate::exec::context::ExecutionContext;
use crate::exec::eval::evaluate_bound;
use crate::exec::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};
use crate::plan::logical::ProjectItem;
use crate::plan::physical::ProjectExecNode;

/// Projection operator.
///
/// Evaluates each output item against the input row.
pub struct ProjectOp {
    /// Base operator state.
    base: OperatorBase,
    /// Items to project.
    items: Vec<ProjectItem>,
    /// Scan names the input binds.
    qualifiers: HashSet<String>,
    /// Input operator.
    input: BoxedOperator,
}

impl ProjectOp {
    /// Creates a new projection operator.
    #[must_use]
    pub fn new(node: ProjectExecNode, qualifiers: HashSet<String>, input: BoxedOperator) -> Self {
        Self { base: OperatorBase::new(node.schema), items: node.items, qualifiers, input }
    }

    /// Returns the projection items.
    #[must_use]
    pub fn items(&self) -> &[ProjectItem] {
        &self.items
    }
}

impl Operator for ProjectOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.input.open(ctx)?;
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }
        let Some(input) = self.input.next()? else {
            return Ok(self.base.emit(None));
        };
        let input_schema = self.input.schema();
        let values = self
            .items
            .iter()
            .map(|item| evaluate_bound(&item.expr, &input, &input_schema, &self.qualifiers))
            .collect::<QueryResult<Vec<Value>>>()?;
        Ok(self.base.emit(Some(Tuple::new(values))))
    }

    fn close(&mut self) -> QueryResult<()> {
        let closed = self.input.close();
        self.base.set_closed();
        closed
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "Project"
    }
}

#[cfg(test)]
mod tests {
    use evolvdb_core::{Column, DataType};

    use super::*;
    use crate::error::QueryError;
    use crate::exec::operators::fixtures;
    use crate::plan::logical::LogicalExpr;
    use crate::plan::physical::Cost;

    fn name_only() -> ProjectExecNode {
        ProjectExecNode {
            items: vec![ProjectItem::unnamed(LogicalExpr::qualified_column("users", "name"))],
            schema: Arc::new(Schema::new(vec![Column::new("name", DataType::String)])),
            cost: Cost::zero(),
        }
    }

    #[test]
    fn project_computes_items() {
        let ctx = fixtures::context();
        let node = ProjectExecNode {
            items: vec![
                ProjectItem::new(LogicalExpr::column("name"), "name"),
                ProjectItem::new(LogicalExpr::column("id").mul(LogicalExpr::integer(10)), "scaled"),
            ],
            schema: Arc::new(Schema::new(vec![
                Column::new("name", DataType::String),
                Column::new("scaled", DataType::BigInt),
            ])),
            cost: Cost::zero(),
        };
        let input = fixtures::scan(&ctx, "users");
        let mut project = ProjectOp::new(node, fixtures::qualifiers("users"), input);
        assert_eq!(project.items().len(), 2);

        let rows = fixtures::drain(&mut project, &ctx);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].values(), &[Value::from("Bob"), Value::BigInt(20)]);
        assert_eq!(project.schema().names(), vec!["name", "scaled"]);
    }

    #[test]
    fn foreign_qualifier_is_rejected() {
        let ctx = fixtures::context();
        let input = fixtures::scan(&ctx, "users");
        let mut project = ProjectOp::new(name_only(), fixtures::qualifiers("orders"), input);
        project.open(&ctx).unwrap();
        assert!(matches!(project.next(), Err(QueryError::UnknownTableQualifier(_))));
        project.close().unwrap();
    }

    #[test]
    fn close_marks_closed_when_input_fails() {
        let ctx = fixtures::context();
        let input = fixtures::failing_close(fixtures::users_schema());
        let mut project = ProjectOp::new(name_only(), fixtures::qualifiers("users"), input);
        project.open(&ctx).unwrap();
        assert!(project.next().unwrap().is_none());
        assert!(matches!(project.close(), Err(QueryError::InvalidState(_))));
        assert!(project.state().is_closed());
    }
}
