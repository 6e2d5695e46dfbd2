//! End-to-end tests for `evolvdb-query`.
//!
//! These tests drive bound logical plans through rewriting, physical
//! planning and execution against an in-memory catalog:
//! - Aggregation, joins and inserts
//! - Equivalence of optimized and baseline plans
//! - Operator lifecycle through the executor
//! - Memo reuse

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use evolvdb_core::{Column, DataType, InMemoryStatsProvider, MemoryCatalog, Schema, Tuple, Value};
use evolvdb_query::plan::logical::{JoinType, ProjectItem};
use evolvdb_query::plan::physical::{CostModel, Memo, PhysicalPlanner, VolcanoOptimizer};
use evolvdb_query::{
    execute, optimize, rewrite, run, ExecutionConfig, ExecutionContext, LogicalExpr, LogicalPlan,
    OperatorState, PhysicalPlan, QueryError,
};

// ============================================================================
// Fixtures
// ============================================================================

fn col(name: &str, data_type: DataType) -> Column {
    Column::new(name, data_type)
}

fn ints(values: &[i32]) -> Tuple {
    Tuple::new(values.iter().map(|v| Value::Int(*v)).collect())
}

/// users(id, name), orders(id, user_id, amount), items(order_id, sku).
fn shop() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog
        .create_table_with_rows(
            "users",
            Schema::new(vec![col("id", DataType::Int), col("name", DataType::String)]),
            ["Alice", "Bob", "Carol"]
                .iter()
                .zip(1..)
                .map(|(name, id)| Tuple::new(vec![Value::Int(id), Value::from(*name)]))
                .collect(),
        )
        .unwrap();
    catalog
        .create_table_with_rows(
            "orders",
            Schema::new(vec![
                col("id", DataType::Int),
                col("user_id", DataType::Int),
                col("amount", DataType::Int),
            ]),
            vec![
                ints(&[10, 1, 100]),
                ints(&[11, 1, 250]),
                ints(&[12, 2, 75]),
                ints(&[13, 3, 30]),
                ints(&[14, 5, 40]),
            ],
        )
        .unwrap();
    catalog
        .create_table_with_rows(
            "items",
            Schema::new(vec![col("order_id", DataType::Int), col("sku", DataType::Int)]),
            vec![ints(&[10, 1]), ints(&[10, 2]), ints(&[12, 3]), ints(&[14, 4])],
        )
        .unwrap();
    catalog
}

fn context(catalog: MemoryCatalog) -> ExecutionContext {
    ExecutionContext::new(Arc::new(catalog))
}

fn baseline(ctx: &ExecutionContext) -> ExecutionContext {
    ctx.clone().with_config(ExecutionConfig::new().with_cost_based(false))
}

fn scan(ctx: &ExecutionContext, table: &str, alias: &str) -> LogicalPlan {
    LogicalPlan::scan_table(ctx.catalog(), table, Some(alias)).unwrap()
}

fn qcol(qualifier: &str, name: &str) -> LogicalExpr {
    LogicalExpr::qualified_column(qualifier, name)
}

/// Rows as display strings, sorted, for multiset comparison.
fn sorted(rows: &[Tuple]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> =
        rows.iter().map(|r| r.values().iter().map(ToString::to_string).collect()).collect();
    out.sort();
    out
}

fn node_types(plan: &PhysicalPlan) -> Vec<&'static str> {
    let mut types = vec![plan.node_type()];
    for child in plan.children() {
        types.extend(node_types(child));
    }
    types
}

// ============================================================================
// Aggregation
// ============================================================================

mod aggregation {
    use super::*;

    #[test]
    fn group_by_count() {
        let catalog = MemoryCatalog::new();
        catalog
            .create_table_with_rows(
                "orders",
                Schema::new(vec![col("user_id", DataType::Int), col("amount", DataType::Int)]),
                vec![ints(&[1, 10]), ints(&[1, 20]), ints(&[2, 5])],
            )
            .unwrap();
        let ctx = context(catalog);

        let plan = scan(&ctx, "orders", "orders")
            .aggregate(
                vec![LogicalExpr::column("user_id")],
                vec![
                    ProjectItem::unnamed(LogicalExpr::column("user_id")),
                    ProjectItem::new(LogicalExpr::count_star(), "n"),
                ],
            )
            .unwrap();

        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(rows, vec![
            Tuple::new(vec![Value::Int(1), Value::BigInt(2)]),
            Tuple::new(vec![Value::Int(2), Value::BigInt(1)]),
        ]);
    }

    fn empty_orders() -> ExecutionContext {
        let catalog = MemoryCatalog::new();
        catalog
            .create_table(
                "orders",
                Schema::new(vec![col("user_id", DataType::Int), col("amount", DataType::Int)]),
            )
            .unwrap();
        context(catalog)
    }

    fn summary_outputs() -> Vec<ProjectItem> {
        let amount = || LogicalExpr::column("amount");
        vec![
            ProjectItem::new(LogicalExpr::count_star(), "n"),
            ProjectItem::new(LogicalExpr::sum(amount()), "total"),
            ProjectItem::new(LogicalExpr::avg(amount()), "mean"),
            ProjectItem::new(LogicalExpr::min(amount()), "low"),
            ProjectItem::new(LogicalExpr::max(amount()), "high"),
        ]
    }

    #[test]
    fn empty_ungrouped_input_yields_one_row() {
        let ctx = empty_orders();
        let plan = scan(&ctx, "orders", "orders").aggregate(vec![], summary_outputs()).unwrap();

        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(rows, vec![Tuple::new(vec![
            Value::BigInt(0),
            Value::BigInt(0),
            Value::Null,
            Value::Null,
            Value::Null,
        ])]);
    }

    #[test]
    fn empty_grouped_input_yields_nothing() {
        let ctx = empty_orders();
        let plan = scan(&ctx, "orders", "orders")
            .aggregate(vec![LogicalExpr::column("user_id")], summary_outputs())
            .unwrap();
        assert!(run(&plan, &ctx).unwrap().is_empty());
    }

    #[test]
    fn aggregate_over_join() {
        let ctx = context(shop());
        // SELECT u.name, SUM(o.amount) FROM users u JOIN orders o ON u.id = o.user_id GROUP BY u.name
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
            .aggregate(
                vec![qcol("u", "name")],
                vec![
                    ProjectItem::unnamed(qcol("u", "name")),
                    ProjectItem::new(LogicalExpr::sum(qcol("o", "amount")), "spent"),
                ],
            )
            .unwrap();

        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(sorted(&rows), vec![
            vec!["Alice".to_owned(), "350".to_owned()],
            vec!["Bob".to_owned(), "75".to_owned()],
            vec!["Carol".to_owned(), "30".to_owned()],
        ]);
    }
}

// ============================================================================
// Joins
// ============================================================================

mod joins {
    use super::*;

    fn users_orders(ctx: &ExecutionContext) -> LogicalPlan {
        scan(ctx, "users", "u")
            .inner_join(scan(ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
    }

    #[test]
    fn nested_loop_and_hash_agree() {
        let ctx = context(shop());
        let plan = users_orders(&ctx);

        let hashed = optimize(&rewrite(&plan), &ctx).unwrap();
        assert!(node_types(&hashed).contains(&"HashJoin"));

        let looped = optimize(&plan, &baseline(&ctx)).unwrap();
        assert!(node_types(&looped).contains(&"NestedLoopJoin"));

        let fast = execute(&hashed, &ctx).unwrap();
        let slow = execute(&looped, &ctx).unwrap();
        assert_eq!(fast.len(), 4);
        assert_eq!(sorted(&fast), sorted(&slow));
    }

    #[test]
    fn left_join_pads_unmatched_rows() {
        let ctx = context(shop());
        // orders o LEFT JOIN users u: order 14 references user 5.
        let plan = scan(&ctx, "orders", "o")
            .left_join(scan(&ctx, "users", "u"), qcol("o", "user_id").eq(qcol("u", "id")));

        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(rows.len(), 5);
        let padded: Vec<_> = rows.iter().filter(|r| r.get(3) == Some(&Value::Null)).collect();
        assert_eq!(padded.len(), 1);
        assert_eq!(padded[0].get(0), Some(&Value::Int(14)));
        assert_eq!(padded[0].get(4), Some(&Value::Null));
    }

    #[test]
    fn full_join_pads_both_sides() {
        let ctx = context(shop());
        let plan = scan(&ctx, "items", "i").join(
            scan(&ctx, "users", "u"),
            JoinType::Full,
            Some(qcol("i", "sku").eq(qcol("u", "id"))),
        );

        // skus 1..3 match users; sku 4 has no user; every user matches.
        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().any(|r| r.get(1) == Some(&Value::Int(4)) && r.get(2) == Some(&Value::Null)));
    }

    #[test]
    fn filter_above_left_join_keeps_padding_semantics() {
        let ctx = context(shop());
        // The right-side conjunct must not be pushed under a LEFT join.
        let plan = scan(&ctx, "orders", "o")
            .left_join(scan(&ctx, "users", "u"), qcol("o", "user_id").eq(qcol("u", "id")))
            .filter(qcol("u", "name").eq(LogicalExpr::string("Alice")));

        let rows = run(&plan, &ctx).unwrap();
        assert_eq!(rows.len(), 2);
        let reference = execute(&optimize(&plan, &baseline(&ctx)).unwrap(), &ctx).unwrap();
        assert_eq!(sorted(&rows), sorted(&reference));
    }

    #[test]
    fn filter_over_join_binds_qualified_columns_per_table() {
        let ctx = context(shop());
        let alice = run(&users_orders(&ctx).filter(qcol("u", "name").eq(LogicalExpr::string("Alice"))), &ctx)
            .unwrap();
        assert_eq!(alice.len(), 2);

        // `name` exists only on users, so `o.name` must not read it.
        for ctx in [ctx.clone(), baseline(&ctx)] {
            let plan = users_orders(&ctx).filter(qcol("o", "name").eq(LogicalExpr::string("Alice")));
            assert!(matches!(run(&plan, &ctx), Err(QueryError::UnknownColumn(_))));

            let plan = users_orders(&ctx).filter(qcol("zz", "id").eq(LogicalExpr::integer(1)));
            assert!(matches!(run(&plan, &ctx), Err(QueryError::UnknownTableQualifier(_))));
        }
    }

    #[test]
    fn baseline_planner_only_loops() {
        let ctx = context(shop());
        let plan = users_orders(&ctx)
            .inner_join(scan(&ctx, "items", "i"), qcol("o", "id").eq(qcol("i", "order_id")));

        let physical = PhysicalPlanner::new(CostModel::default()).plan(&plan).unwrap();
        let types = node_types(&physical);
        assert_eq!(types.iter().filter(|t| **t == "NestedLoopJoin").count(), 2);
        assert!(!types.contains(&"HashJoin"));
        assert!(!types.contains(&"SortMergeJoin"));
    }
}

// ============================================================================
// Optimized vs. Baseline Equivalence
// ============================================================================

mod equivalence {
    use super::*;

    fn assert_equivalent(plan: &LogicalPlan, ctx: &ExecutionContext) {
        let optimized = run(plan, ctx).unwrap();
        let reference = execute(&optimize(plan, &baseline(ctx)).unwrap(), ctx).unwrap();
        assert_eq!(sorted(&optimized), sorted(&reference));
    }

    #[test]
    fn filtered_three_way_join() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
            .inner_join(scan(&ctx, "items", "i"), qcol("o", "id").eq(qcol("i", "order_id")))
            .filter(
                qcol("o", "amount")
                    .gt(LogicalExpr::integer(50))
                    .and(qcol("u", "name").not_eq(LogicalExpr::string("Carol"))),
            );
        assert_equivalent(&plan, &ctx);
    }

    #[test]
    fn reordered_join_with_stats() {
        let stats = InMemoryStatsProvider::new()
            .with_table("users", 3)
            .with_table("orders", 5)
            .with_table("items", 4);
        let ctx = context(shop()).with_stats(Arc::new(stats));
        let plan = scan(&ctx, "orders", "o")
            .inner_join(scan(&ctx, "items", "i"), qcol("o", "id").eq(qcol("i", "order_id")))
            .inner_join(scan(&ctx, "users", "u"), qcol("o", "user_id").eq(qcol("u", "id")));

        let rewritten = rewrite(&plan);
        assert_eq!(rewritten.schema().len(), plan.schema().len());
        assert_equivalent(&plan, &ctx);
    }

    #[test]
    fn projection_over_join() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
            .project(vec![
                ProjectItem::unnamed(qcol("u", "name")),
                ProjectItem::new(qcol("o", "amount").mul(LogicalExpr::integer(2)), "doubled"),
            ])
            .unwrap();
        assert_equivalent(&plan, &ctx);
    }

    #[test]
    fn memo_and_plain_search_agree() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
            .filter(qcol("o", "amount").gt(LogicalExpr::integer(60)));

        let memo_ctx = ctx.clone().with_config(ExecutionConfig::new().with_memo(true));
        let with_memo = optimize(&plan, &memo_ctx).unwrap();
        let without = optimize(&plan, &ctx).unwrap();
        assert_eq!(with_memo.cost().total(), without.cost().total());
        let (a, b) = (execute(&with_memo, &ctx).unwrap(), execute(&without, &ctx).unwrap());
        assert_eq!(sorted(&a), sorted(&b));
    }
}

// ============================================================================
// Inserts
// ============================================================================

mod inserts {
    use super::*;

    fn people() -> (ExecutionContext, Arc<Schema>) {
        let catalog = MemoryCatalog::new();
        let schema = Schema::new(vec![col("id", DataType::Int), col("name", DataType::String)]);
        catalog.create_table("people", schema).unwrap();
        let ctx = context(catalog);
        let schema = ctx.catalog().lookup_table("people").unwrap().schema;
        (ctx, schema)
    }

    fn person(id: i64, name: &str) -> Vec<LogicalExpr> {
        vec![LogicalExpr::integer(id), LogicalExpr::string(name)]
    }

    #[test]
    fn insert_then_scan() {
        let (ctx, schema) = people();
        let insert = LogicalPlan::insert(
            "people",
            Arc::clone(&schema),
            schema.columns().to_vec(),
            vec![person(1, "Ann"), person(2, "Ben"), person(3, "Cat")],
        );

        assert_eq!(run(&insert, &ctx).unwrap(), vec![Tuple::new(vec![Value::BigInt(3)])]);

        let rows = run(&scan(&ctx, "people", "p"), &ctx).unwrap();
        assert_eq!(rows, vec![
            Tuple::new(vec![Value::Int(1), Value::from("Ann")]),
            Tuple::new(vec![Value::Int(2), Value::from("Ben")]),
            Tuple::new(vec![Value::Int(3), Value::from("Cat")]),
        ]);
    }

    #[test]
    fn insert_requires_every_column() {
        let (ctx, schema) = people();
        let insert = LogicalPlan::insert(
            "people",
            Arc::clone(&schema),
            vec![schema.columns()[0].clone()],
            vec![vec![LogicalExpr::integer(1)]],
        );
        assert!(matches!(run(&insert, &ctx), Err(QueryError::MissingColumnDefault(_))));
    }

    #[test]
    fn insert_rejects_out_of_range_integers() {
        let (ctx, schema) = people();
        let insert = LogicalPlan::insert(
            "people",
            Arc::clone(&schema),
            schema.columns().to_vec(),
            vec![person(i64::from(i32::MAX) + 1, "Big")],
        );
        assert!(matches!(run(&insert, &ctx), Err(QueryError::Arithmetic(_))));
    }
}

// ============================================================================
// Executor Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn executor_lifecycle() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")));
        let mut executor = optimize(&plan, &ctx).unwrap().create(&ctx);

        assert!(matches!(executor.next(), Err(QueryError::InvalidState(_))));
        executor.open().unwrap();
        assert_eq!(executor.state(), OperatorState::Open);

        let mut rows = 0;
        while executor.next().unwrap().is_some() {
            rows += 1;
        }
        assert_eq!(rows, 4);
        assert!(executor.next().unwrap().is_none());

        executor.close().unwrap();
        executor.close().unwrap();
        assert!(executor.state().is_closed());
    }

    #[test]
    fn close_without_open() {
        let ctx = context(shop());
        let mut executor = optimize(&scan(&ctx, "users", "u"), &ctx).unwrap().create(&ctx);
        executor.close().unwrap();
        assert!(executor.state().is_closed());
    }

    #[test]
    fn binding_errors_surface_at_execution() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u").filter(qcol("u", "email").eq(LogicalExpr::integer(1)));
        let physical = optimize(&plan, &ctx).unwrap();
        assert!(matches!(execute(&physical, &ctx), Err(QueryError::UnknownColumn(_))));
    }
}

// ============================================================================
// Memo
// ============================================================================

mod memo {
    use super::*;

    #[test]
    fn memo_reuses_groups() {
        let ctx = context(shop());
        let plan = scan(&ctx, "users", "u")
            .inner_join(scan(&ctx, "orders", "o"), qcol("u", "id").eq(qcol("o", "user_id")))
            .filter(qcol("o", "amount").gt(LogicalExpr::integer(60)));

        let optimizer = VolcanoOptimizer::default();
        let mut memo = Memo::new();
        let first = optimizer.optimize_with_memo(&plan, &mut memo).unwrap();
        assert_eq!(memo.group_count(), plan.node_count());
        assert_eq!(memo.hits(), 0);

        let second = optimizer.optimize_with_memo(&plan, &mut memo).unwrap();
        assert_eq!(memo.hits(), 1);
        assert_eq!(memo.group_count(), plan.node_count());
        assert_eq!(first, second);
    }
}
