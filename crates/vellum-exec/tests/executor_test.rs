//! Executor integration tests: every operator wired through a real catalog,
//! table heap, and secondary indexes.

use std::collections::BTreeMap;
use std::sync::Arc;

use vellum_common::types::TxnId;
use vellum_exec::catalog::Catalog;
use vellum_exec::executor::{collect, create_executor, Executor, ExecutorContext};
use vellum_exec::expr::{ComparisonOp, Expr};
use vellum_exec::optimizer;
use vellum_exec::plan::{
    AggregationPlan, AggregationType, DeletePlan, HashJoinPlan, IndexScanPlan, InsertPlan,
    JoinType, NestedIndexJoinPlan, NestedLoopJoinPlan, OrderByType, PlanNode, SeqScanPlan,
    SortPlan, TopNPlan, UpdatePlan, ValuesPlan, WindowFunction, WindowFunctionType, WindowPlan,
};
use vellum_exec::schema::{Column, Schema};
use vellum_exec::tuple::Tuple;
use vellum_exec::value::{DataType, Value};
use vellum_storage::buffer::BufferPoolManager;
use vellum_storage::disk::{FileDiskManager, MemoryDiskManager};

const BATCH: usize = 64;

fn make_ctx(frames: usize) -> Arc<ExecutorContext> {
    let disk = Arc::new(MemoryDiskManager::new());
    let bpm = Arc::new(BufferPoolManager::with_pool_size(frames, disk).unwrap());
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
    ExecutorContext::new(catalog, bpm, TxnId::new(1))
}

fn int_schema(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| Column::new(*n, DataType::Integer))
            .collect(),
    )
}

fn count_schema() -> Schema {
    int_schema(&["rows"])
}

fn values_plan(schema: Schema, rows: Vec<Vec<i32>>) -> PlanNode {
    PlanNode::Values(ValuesPlan {
        rows: rows
            .into_iter()
            .map(|row| row.into_iter().map(Expr::int).collect())
            .collect(),
        output_schema: schema,
    })
}

/// Creates table `name`, inserts `rows` through the insert executor, and
/// returns the inserted row count.
fn create_and_fill(ctx: &Arc<ExecutorContext>, name: &str, schema: Schema, rows: Vec<Vec<i32>>) -> i32 {
    let table = ctx.catalog.create_table(name, schema.clone()).unwrap();
    let plan = PlanNode::Insert(InsertPlan {
        table_oid: table.oid,
        child: Box::new(values_plan(schema, rows)),
        output_schema: count_schema(),
    });
    run_count(ctx, &plan)
}

/// Runs a plan expected to produce exactly one single-integer batch.
fn run_count(ctx: &Arc<ExecutorContext>, plan: &PlanNode) -> i32 {
    let mut exec = create_executor(ctx, plan);
    exec.init();

    let mut tuples = Vec::new();
    let mut rids = Vec::new();
    assert!(exec.next(&mut tuples, &mut rids, BATCH));
    assert_eq!(tuples.len(), 1, "exactly one result tuple");
    let count = tuples[0]
        .value_at(&count_schema(), 0)
        .as_integer()
        .unwrap();
    assert!(
        !exec.next(&mut tuples, &mut rids, BATCH),
        "count is reported exactly once"
    );
    count
}

fn run_rows(ctx: &Arc<ExecutorContext>, plan: &PlanNode) -> Vec<Vec<Value>> {
    let mut exec = create_executor(ctx, plan);
    exec.init();
    let schema = exec.output_schema().clone();
    collect(exec.as_mut(), BATCH)
        .into_iter()
        .map(|t| t.values(&schema))
        .collect()
}

fn ints(row: &[Value]) -> Vec<Option<i32>> {
    row.iter().map(Value::as_integer).collect()
}

#[test]
fn insert_then_scan_round_trips() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id", "score"]);
    let inserted = create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        vec![vec![1, 10], vec![2, 20], vec![3, 30]],
    );
    assert_eq!(inserted, 3);

    let table = ctx.catalog.get_table_by_name("t").unwrap();
    let scan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: None,
        output_schema: schema,
    });
    let rows = run_rows(&ctx, &scan);
    assert_eq!(rows.len(), 3);
    assert_eq!(ints(&rows[0]), vec![Some(1), Some(10)]);
}

#[test]
fn seq_scan_applies_filter_and_skips_deleted() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id", "score"]);
    create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        (1..=10).map(|i| vec![i, i * 10]).collect(),
    );
    let table = ctx.catalog.get_table_by_name("t").unwrap();

    // Delete ids above 5.
    let delete = PlanNode::Delete(DeletePlan {
        table_oid: table.oid,
        child: Box::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: table.oid,
            filter: Some(Expr::cmp(
                ComparisonOp::GreaterThan,
                Expr::column(0),
                Expr::int(5),
            )),
            output_schema: schema.clone(),
        })),
        output_schema: count_schema(),
    });
    assert_eq!(run_count(&ctx, &delete), 5);

    let scan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: Some(Expr::cmp(
            ComparisonOp::GreaterThanOrEqual,
            Expr::column(1),
            Expr::int(30),
        )),
        output_schema: schema,
    });
    let rows = run_rows(&ctx, &scan);
    let ids: Vec<_> = rows.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(ids, vec![3, 4, 5]);
}

#[test]
fn update_is_delete_then_insert_with_index_maintenance() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id", "score"]);
    create_and_fill(&ctx, "t", schema.clone(), vec![vec![1, 10], vec![2, 20]]);
    let table = ctx.catalog.get_table_by_name("t").unwrap();
    let index = ctx
        .catalog
        .create_index("t_id", "t", int_schema(&["id"]), vec![0])
        .unwrap();

    // score += 5 for id = 2.
    let update = PlanNode::Update(UpdatePlan {
        table_oid: table.oid,
        target_exprs: vec![
            Expr::column(0),
            Expr::Arithmetic {
                op: vellum_exec::expr::ArithmeticOp::Add,
                left: Box::new(Expr::column(1)),
                right: Box::new(Expr::int(5)),
            },
        ],
        child: Box::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: table.oid,
            filter: Some(Expr::eq(Expr::column(0), Expr::int(2))),
            output_schema: schema.clone(),
        })),
        output_schema: count_schema(),
    });
    assert_eq!(run_count(&ctx, &update), 1);

    // The index resolves id=2 to the *new* tuple.
    let mut rids = Vec::new();
    let key = Tuple::from_values(&[Value::Integer(2)], &index.key_schema);
    index.scan_key(&key, &mut rids, ctx.txn);
    assert_eq!(rids.len(), 1);
    let (meta, tuple) = table.table.get_tuple(rids[0]).unwrap();
    assert!(!meta.is_deleted);
    assert_eq!(tuple.value_at(&schema, 1), Value::Integer(25));

    // The old version is still in the heap, flagged deleted.
    let deleted: Vec<i32> = table
        .table
        .iter()
        .filter(|(_, meta, _)| meta.is_deleted)
        .map(|(_, _, t)| t.value_at(&schema, 1).as_integer().unwrap())
        .collect();
    assert_eq!(deleted, vec![20]);
}

#[test]
fn index_scan_point_lookup_and_full_walk() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id", "score"]);
    create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        vec![vec![5, 50], vec![1, 10], vec![3, 30], vec![4, 40]],
    );
    let table = ctx.catalog.get_table_by_name("t").unwrap();
    let index = ctx
        .catalog
        .create_index("t_id", "t", int_schema(&["id"]), vec![0])
        .unwrap();

    // Point lookups over {1, 4}.
    let scan = PlanNode::IndexScan(IndexScanPlan {
        table_oid: table.oid,
        index_oid: index.oid,
        pred_keys: vec![Expr::int(1), Expr::int(4)],
        filter: None,
        output_schema: schema.clone(),
    });
    let rows = run_rows(&ctx, &scan);
    let ids: Vec<_> = rows.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(ids, vec![1, 4]);

    // Full walk comes back in key order regardless of insertion order.
    let scan = PlanNode::IndexScan(IndexScanPlan {
        table_oid: table.oid,
        index_oid: index.oid,
        pred_keys: vec![],
        filter: None,
        output_schema: schema,
    });
    let rows = run_rows(&ctx, &scan);
    let ids: Vec<_> = rows.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(ids, vec![1, 3, 4, 5]);
}

#[test]
fn nested_loop_join_inner_and_left() {
    let ctx = make_ctx(64);
    let left_schema = int_schema(&["a", "b"]);
    let right_schema = int_schema(&["c", "d"]);
    let out = Schema::join(&left_schema, &right_schema);

    let make = |join_type| {
        PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
            left: Box::new(values_plan(
                left_schema.clone(),
                vec![vec![1, 100], vec![2, 200], vec![3, 300]],
            )),
            right: Box::new(values_plan(
                right_schema.clone(),
                vec![vec![1, 11], vec![3, 33], vec![3, 34]],
            )),
            predicate: Some(Expr::eq(Expr::column_of(0, 0), Expr::column_of(1, 0))),
            join_type,
            output_schema: out.clone(),
        })
    };

    let rows = run_rows(&ctx, &make(JoinType::Inner));
    let got: Vec<_> = rows.iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(100), Some(1), Some(11)],
            vec![Some(3), Some(300), Some(3), Some(33)],
            vec![Some(3), Some(300), Some(3), Some(34)],
        ]
    );

    let rows = run_rows(&ctx, &make(JoinType::Left));
    let got: Vec<_> = rows.iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(100), Some(1), Some(11)],
            vec![Some(2), Some(200), None, None],
            vec![Some(3), Some(300), Some(3), Some(33)],
            vec![Some(3), Some(300), Some(3), Some(34)],
        ]
    );
}

#[test]
#[should_panic(expected = "not supported")]
fn unsupported_join_type_aborts() {
    let schema = int_schema(&["a"]);
    let plan = NestedLoopJoinPlan {
        left: Box::new(values_plan(schema.clone(), vec![])),
        right: Box::new(values_plan(schema.clone(), vec![])),
        predicate: None,
        join_type: JoinType::Full,
        output_schema: Schema::join(&schema, &schema),
    };
    let ctx = make_ctx(16);
    let _ = create_executor(&ctx, &PlanNode::NestedLoopJoin(plan));
}

#[test]
fn hash_join_matches_and_spills() {
    let ctx = make_ctx(256);
    let left_schema = int_schema(&["a", "pad_a"]);
    let right_schema = int_schema(&["b", "pad_b"]);
    let out = Schema::join(&left_schema, &right_schema);

    // 300 rows per side; join key matches every third left row twice.
    let left_rows: Vec<Vec<i32>> = (0..300).map(|i| vec![i, i]).collect();
    let right_rows: Vec<Vec<i32>> = (0..300)
        .filter(|i| i % 3 == 0)
        .flat_map(|i| vec![vec![i, 1000 + i], vec![i, 2000 + i]])
        .collect();

    let make = |join_type| {
        PlanNode::HashJoin(HashJoinPlan {
            left: Box::new(values_plan(left_schema.clone(), left_rows.clone())),
            right: Box::new(values_plan(right_schema.clone(), right_rows.clone())),
            left_keys: vec![Expr::column(0)],
            right_keys: vec![Expr::column(0)],
            join_type,
            output_schema: out.clone(),
        })
    };

    let rows = run_rows(&ctx, &make(JoinType::Inner));
    // 100 matching keys, two build rows each.
    assert_eq!(rows.len(), 200);
    for row in &rows {
        assert_eq!(row[0], row[2]);
    }

    let rows = run_rows(&ctx, &make(JoinType::Left));
    assert_eq!(rows.len(), 300 - 100 + 200);
    let unmatched = rows.iter().filter(|r| r[2].is_null()).count();
    assert_eq!(unmatched, 200);
}

#[test]
fn nested_index_join_probes_inner_index() {
    let ctx = make_ctx(64);
    let inner_schema = int_schema(&["id", "payload"]);
    create_and_fill(
        &ctx,
        "inner_t",
        inner_schema.clone(),
        vec![vec![1, 10], vec![2, 20], vec![4, 40]],
    );
    let inner = ctx.catalog.get_table_by_name("inner_t").unwrap();
    let index = ctx
        .catalog
        .create_index("inner_id", "inner_t", int_schema(&["id"]), vec![0])
        .unwrap();

    let outer_schema = int_schema(&["k"]);
    let out = Schema::join(&outer_schema, &inner_schema);
    let make = |join_type| {
        PlanNode::NestedIndexJoin(NestedIndexJoinPlan {
            child: Box::new(values_plan(
                outer_schema.clone(),
                vec![vec![1], vec![3], vec![4]],
            )),
            inner_table_oid: inner.oid,
            index_oid: index.oid,
            key_predicate: Expr::column(0),
            inner_schema: inner_schema.clone(),
            join_type,
            output_schema: out.clone(),
        })
    };

    let rows = run_rows(&ctx, &make(JoinType::Inner));
    let got: Vec<_> = rows.iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(1), Some(10)],
            vec![Some(4), Some(4), Some(40)],
        ]
    );

    let rows = run_rows(&ctx, &make(JoinType::Left));
    let got: Vec<_> = rows.iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(1), Some(10)],
            vec![Some(3), None, None],
            vec![Some(4), Some(4), Some(40)],
        ]
    );
}

#[test]
fn external_sort_orders_large_input() {
    let ctx = make_ctx(256);
    let schema = int_schema(&["v", "tag"]);
    // Enough rows to force several runs and pairwise merge levels.
    let rows: Vec<Vec<i32>> = (0..1000).map(|i| vec![(i * 7919) % 1000, i]).collect();

    let plan = PlanNode::Sort(SortPlan {
        child: Box::new(values_plan(schema.clone(), rows)),
        order_bys: vec![(OrderByType::Asc, Expr::column(0))],
        output_schema: schema.clone(),
    });
    let sorted = run_rows(&ctx, &plan);
    assert_eq!(sorted.len(), 1000);
    let keys: Vec<i32> = sorted.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));

    // Descending, too.
    let plan = PlanNode::Sort(SortPlan {
        child: Box::new(values_plan(
            schema.clone(),
            (0..100).map(|i| vec![i, i]).collect(),
        )),
        order_bys: vec![(OrderByType::Desc, Expr::column(0))],
        output_schema: schema,
    });
    let sorted = run_rows(&ctx, &plan);
    let keys: Vec<i32> = sorted.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(keys, (0..100).rev().collect::<Vec<_>>());
}

#[test]
fn topn_keeps_the_first_n() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["v"]);
    let rows: Vec<Vec<i32>> = [5, 1, 9, 3, 7, 2, 8].iter().map(|&v| vec![v]).collect();

    let plan = PlanNode::TopN(TopNPlan {
        child: Box::new(values_plan(schema.clone(), rows)),
        order_bys: vec![(OrderByType::Asc, Expr::column(0))],
        n: 3,
        output_schema: schema,
    });
    let rows = run_rows(&ctx, &plan);
    let got: Vec<i32> = rows.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(got, vec![1, 2, 3]);
}

#[test]
fn window_rank_and_partition_sum() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["grp", "v"]);
    let rows = vec![
        vec![1, 30],
        vec![1, 10],
        vec![2, 5],
        vec![1, 10],
        vec![2, 7],
    ];

    // RANK() OVER (PARTITION BY grp ORDER BY v)
    let out = int_schema(&["grp", "v", "rnk"]);
    let mut fns = BTreeMap::new();
    fns.insert(
        2,
        WindowFunction {
            function: Expr::column(1),
            kind: WindowFunctionType::Rank,
            partition_by: vec![Expr::column(0)],
            order_by: vec![(OrderByType::Asc, Expr::column(1))],
        },
    );
    let plan = PlanNode::Window(WindowPlan {
        child: Box::new(values_plan(schema.clone(), rows.clone())),
        columns: vec![Expr::column(0), Expr::column(1), Expr::column(0)],
        window_functions: fns,
        output_schema: out,
    });
    let got: Vec<Vec<Option<i32>>> = run_rows(&ctx, &plan).iter().map(|r| ints(r)).collect();
    // Output follows (partition, order) sorting; equal values share a rank.
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(10), Some(1)],
            vec![Some(1), Some(10), Some(1)],
            vec![Some(1), Some(30), Some(3)],
            vec![Some(2), Some(5), Some(1)],
            vec![Some(2), Some(7), Some(2)],
        ]
    );

    // SUM(v) OVER (PARTITION BY grp) -- whole-partition, no ORDER BY.
    let out = int_schema(&["grp", "total"]);
    let mut fns = BTreeMap::new();
    fns.insert(
        1,
        WindowFunction {
            function: Expr::column(1),
            kind: WindowFunctionType::Sum,
            partition_by: vec![Expr::column(0)],
            order_by: vec![],
        },
    );
    let plan = PlanNode::Window(WindowPlan {
        child: Box::new(values_plan(schema, rows)),
        columns: vec![Expr::column(0), Expr::column(1)],
        window_functions: fns,
        output_schema: out,
    });
    let got: Vec<Vec<Option<i32>>> = run_rows(&ctx, &plan).iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(50)],
            vec![Some(1), Some(50)],
            vec![Some(1), Some(50)],
            vec![Some(2), Some(12)],
            vec![Some(2), Some(12)],
        ]
    );
}

#[test]
fn window_running_sum_with_order_by() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["grp", "v"]);
    let rows = vec![vec![1, 10], vec![1, 20], vec![1, 20], vec![1, 40]];

    // SUM(v) OVER (PARTITION BY grp ORDER BY v): range-peer semantics, so
    // the two equal rows share the accumulated value.
    let out = int_schema(&["v", "running"]);
    let mut fns = BTreeMap::new();
    fns.insert(
        1,
        WindowFunction {
            function: Expr::column(1),
            kind: WindowFunctionType::Sum,
            partition_by: vec![Expr::column(0)],
            order_by: vec![(OrderByType::Asc, Expr::column(1))],
        },
    );
    let plan = PlanNode::Window(WindowPlan {
        child: Box::new(values_plan(schema, rows)),
        columns: vec![Expr::column(1), Expr::column(1)],
        window_functions: fns,
        output_schema: out,
    });
    let got: Vec<Vec<Option<i32>>> = run_rows(&ctx, &plan).iter().map(|r| ints(r)).collect();
    assert_eq!(
        got,
        vec![
            vec![Some(10), Some(10)],
            vec![Some(20), Some(50)],
            vec![Some(20), Some(50)],
            vec![Some(40), Some(90)],
        ]
    );
}

#[test]
fn aggregation_groups_and_empty_identity() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["grp", "v"]);

    let make = |rows: Vec<Vec<i32>>, group_bys: Vec<Expr>, out: Schema| {
        PlanNode::Aggregation(AggregationPlan {
            child: Box::new(values_plan(schema.clone(), rows)),
            group_bys,
            aggregates: vec![Expr::column(1), Expr::column(1)],
            agg_types: vec![AggregationType::CountStar, AggregationType::Sum],
            output_schema: out,
        })
    };

    let out = int_schema(&["grp", "cnt", "total"]);
    let plan = make(
        vec![vec![1, 10], vec![2, 5], vec![1, 30], vec![2, 2]],
        vec![Expr::column(0)],
        out,
    );
    let mut got: Vec<Vec<Option<i32>>> = run_rows(&ctx, &plan).iter().map(|r| ints(r)).collect();
    got.sort();
    assert_eq!(
        got,
        vec![
            vec![Some(1), Some(2), Some(40)],
            vec![Some(2), Some(2), Some(7)],
        ]
    );

    // Empty input with no group-bys produces the identity tuple.
    let out = int_schema(&["cnt", "total"]);
    let plan = make(vec![], vec![], out);
    let rows = run_rows(&ctx, &plan);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Integer(0));
    assert!(rows[0][1].is_null());
}

#[test]
fn optimized_plan_returns_same_rows() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id", "score"]);
    create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        (0..50).map(|i| vec![i, i * 2]).collect(),
    );
    let table = ctx.catalog.get_table_by_name("t").unwrap();
    ctx.catalog
        .create_index("t_id", "t", int_schema(&["id"]), vec![0])
        .unwrap();

    let filter = Expr::or(
        Expr::eq(Expr::column(0), Expr::int(7)),
        Expr::eq(Expr::column(0), Expr::int(21)),
    );
    let plan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: Some(filter),
        output_schema: schema,
    });

    let baseline = run_rows(&ctx, &plan);
    let optimized_plan = optimizer::optimize(plan, &ctx.catalog);
    assert!(matches!(optimized_plan, PlanNode::IndexScan(_)));
    let optimized = run_rows(&ctx, &optimized_plan);

    assert_eq!(baseline, optimized);
    let ids: Vec<_> = optimized
        .iter()
        .map(|r| r[0].as_integer().unwrap())
        .collect();
    assert_eq!(ids, vec![7, 21]);
}

#[test]
fn dml_reports_exactly_one_integer_batch() {
    let ctx = make_ctx(64);
    let schema = int_schema(&["id"]);
    let inserted = create_and_fill(&ctx, "t", schema.clone(), vec![vec![1], vec![2]]);
    assert_eq!(inserted, 2);
    let table = ctx.catalog.get_table_by_name("t").unwrap();

    let update = PlanNode::Update(UpdatePlan {
        table_oid: table.oid,
        target_exprs: vec![Expr::column(0)],
        child: Box::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: table.oid,
            filter: None,
            output_schema: schema.clone(),
        })),
        output_schema: count_schema(),
    });
    assert_eq!(run_count(&ctx, &update), 2);

    let delete = PlanNode::Delete(DeletePlan {
        table_oid: table.oid,
        child: Box::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: table.oid,
            filter: None,
            output_schema: schema.clone(),
        })),
        output_schema: count_schema(),
    });
    assert_eq!(run_count(&ctx, &delete), 2);

    // Everything is gone now.
    let scan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: None,
        output_schema: schema,
    });
    assert!(run_rows(&ctx, &scan).is_empty());
}

#[test]
fn spill_pages_are_reclaimed() {
    let ctx = make_ctx(256);
    let schema = int_schema(&["v", "pad"]);
    let rows: Vec<Vec<i32>> = (0..500).map(|i| vec![i, i]).collect();

    {
        let plan = PlanNode::Sort(SortPlan {
            child: Box::new(values_plan(schema.clone(), rows.clone())),
            order_bys: vec![(OrderByType::Asc, Expr::column(0))],
            output_schema: schema.clone(),
        });
        let sorted = run_rows(&ctx, &plan);
        assert_eq!(sorted.len(), 500);
        // Executor dropped here; its run pages are deleted.
    }

    // All pages the sort spilled are unpinned and deletable; the pool can
    // still hand out everything it owns.
    let mut guards = Vec::new();
    for _ in 0..ctx.bpm.num_frames() {
        guards.push(ctx.bpm.new_page().unwrap());
    }
}

#[test]
fn file_backed_pool_survives_eviction_pressure() {
    // A pool far smaller than the data set, over a real file: every scan
    // batch churns frames through the ARC replacer and the disk.
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(FileDiskManager::open(dir.path().join("exec.db")).unwrap());
    let bpm = Arc::new(BufferPoolManager::with_pool_size(8, disk).unwrap());
    let catalog = Arc::new(Catalog::new(Arc::clone(&bpm)));
    let ctx = ExecutorContext::new(catalog, bpm, TxnId::new(1));

    let schema = int_schema(&["id", "score"]);
    let inserted = create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        (0..2000).map(|i| vec![i, i * 3]).collect(),
    );
    assert_eq!(inserted, 2000);
    ctx.bpm.flush_all_pages().unwrap();

    let table = ctx.catalog.get_table_by_name("t").unwrap();
    let scan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: None,
        output_schema: schema,
    });
    let rows = run_rows(&ctx, &scan);
    assert_eq!(rows.len(), 2000);
    assert_eq!(ints(&rows[1999]), vec![Some(1999), Some(5997)]);
    assert!(ctx.bpm.stats().evictions > 0);
}

#[test]
fn executors_leave_no_pins_behind() {
    let ctx = make_ctx(128);
    let schema = int_schema(&["id", "score"]);
    create_and_fill(
        &ctx,
        "t",
        schema.clone(),
        (0..200).map(|i| vec![i, i % 17]).collect(),
    );
    let table = ctx.catalog.get_table_by_name("t").unwrap();
    ctx.catalog
        .create_index("t_id", "t", int_schema(&["id"]), vec![0])
        .unwrap();

    let scan = PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        filter: None,
        output_schema: schema.clone(),
    });
    let sort = PlanNode::Sort(SortPlan {
        child: Box::new(scan),
        order_bys: vec![(OrderByType::Asc, Expr::column(1))],
        output_schema: schema,
    });
    let _ = run_rows(&ctx, &sort);

    for id in 0..1024u32 {
        if let Some(pins) = ctx.bpm.pin_count(vellum_common::types::PageId::new(id)) {
            assert_eq!(pins, 0, "page {id} still pinned");
        }
    }
}
