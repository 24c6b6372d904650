//! Integration tests for the reference store.

use ormq_core::{
    Catalog, Database, DatabaseConfig, EntityDef, Error, FieldDef, QueryBudget, RelationDef,
    StorageConfig,
};
use ormq_proto::{
    AggregateFunction, ArithOp, Assignment, CompareOp, Datum, Expr, InSet, JoinKind, JoinSpec,
    MutationDescriptor, NullOrdering, OrderSpec, Pagination, PredicateExpr, Projection,
    QueryDescriptor, RelationRef, RelationalStore, SelectItem, Shape, Source, Value, ValueType,
};
use pretty_assertions::assert_eq;

struct TestContext {
    db: Database,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_budget(QueryBudget::default())
    }

    fn with_budget(budget: QueryBudget) -> Self {
        let storage_dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::sled(StorageConfig::new(storage_dir.path())).with_budget(budget);
        let db = Database::open(schema(), config).unwrap();
        let ctx = Self {
            db,
            _storage_dir: storage_dir,
        };
        ctx.seed();
        ctx
    }

    fn seed(&self) {
        let team_a = self.team("teamA");
        let team_b = self.team("teamB");
        self.member("member1", 10, Some(&team_a));
        self.member("member2", 20, Some(&team_a));
        self.member("member3", 30, Some(&team_b));
        self.member("member4", 40, Some(&team_b));
    }

    fn team(&self, name: &str) -> Value {
        self.db
            .insert("Team", vec![("name".into(), Value::from(name))])
            .unwrap()
    }

    fn member(&self, username: &str, age: i32, team: Option<&Value>) -> Value {
        self.db
            .insert(
                "Member",
                vec![
                    ("username".into(), Value::from(username)),
                    ("age".into(), Value::from(age)),
                    ("team_id".into(), team.cloned().unwrap_or(Value::Null)),
                ],
            )
            .unwrap()
    }
}

fn schema() -> Catalog {
    Catalog::new()
        .with_entity(
            EntityDef::new("Team", "id")
                .with_field(FieldDef::new("id", ValueType::Int64))
                .with_field(FieldDef::new("name", ValueType::String)),
        )
        .unwrap()
        .with_entity(
            EntityDef::new("Member", "id")
                .with_field(FieldDef::new("id", ValueType::Int64))
                .with_field(FieldDef::optional("username", ValueType::String))
                .with_field(FieldDef::new("age", ValueType::Int32))
                .with_field(FieldDef::optional("team_id", ValueType::Int64)),
        )
        .unwrap()
        .with_relation(RelationDef::many_to_one(
            "team", "Member", "team_id", "Team", "id",
        ))
        .unwrap()
        .with_relation(RelationDef::one_to_many(
            "members", "Team", "id", "Member", "team_id",
        ))
        .unwrap()
}

fn col(alias: &str, field: &str) -> Expr {
    Expr::column(alias, field)
}

fn cmp(op: CompareOp, lhs: Expr, rhs: Expr) -> PredicateExpr {
    PredicateExpr::Compare { op, lhs, rhs }
}

fn select(items: Vec<SelectItem>, shape: Shape) -> QueryDescriptor {
    QueryDescriptor::new(Projection::new(items, shape))
}

fn members(items: Vec<SelectItem>, shape: Shape) -> QueryDescriptor {
    select(items, shape).with_source(Source::new("Member", "m"))
}

fn values(rows: &[ormq_proto::Row], index: usize) -> Vec<Value> {
    rows.iter()
        .map(|row| match &row.data[index] {
            Datum::Value(v) => v.clone(),
            Datum::Entity(e) => e.as_ref().map(|e| e.key.clone()).unwrap_or(Value::Null),
        })
        .collect()
}

fn usernames() -> Vec<SelectItem> {
    vec![SelectItem::expr(col("m", "username"))]
}

#[test]
fn test_filter_and_order() {
    let ctx = TestContext::new();
    let query = members(usernames(), Shape::Scalar)
        .with_filter(
            cmp(CompareOp::Ge, col("m", "age"), Expr::literal(20))
                .and(cmp(CompareOp::Lt, col("m", "age"), Expr::literal(40))),
        )
        .with_order(OrderSpec::desc(col("m", "age")));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(
        values(&rows, 0),
        vec![Value::from("member3"), Value::from("member2")]
    );
}

#[test]
fn test_identity_keys_are_assigned_in_order() {
    let ctx = TestContext::new();
    let query = members(vec![SelectItem::expr(col("m", "id"))], Shape::Scalar);
    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(
        values(&rows, 0),
        (1..=4).map(Value::Int64).collect::<Vec<_>>()
    );
}

#[test]
fn test_entity_projection_and_paging() {
    let ctx = TestContext::new();
    let query = members(vec![SelectItem::entity("m")], Shape::Entity)
        .with_order(OrderSpec::desc(col("m", "username")))
        .with_pagination(Pagination::new(1, 2));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(rows.len(), 2);
    let first = rows[0].data[0].as_entity().flatten().unwrap();
    assert_eq!(first.entity, "Member");
    assert_eq!(first.get("username"), Some(&Value::from("member3")));

    assert_eq!(ctx.db.count(&query).unwrap(), 4);
}

#[test]
fn test_nulls_last_ordering() {
    let ctx = TestContext::new();
    ctx.member("", 100, None);
    ctx.db
        .insert(
            "Member",
            vec![("age".into(), Value::from(100))],
        )
        .unwrap();
    ctx.member("member5", 100, None);
    ctx.member("member6", 100, None);

    let query = members(usernames(), Shape::Scalar)
        .with_filter(cmp(CompareOp::Eq, col("m", "age"), Expr::literal(100)))
        .with_order(OrderSpec::desc(col("m", "age")))
        .with_order(OrderSpec::asc(col("m", "username")).with_nulls(NullOrdering::Last));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(
        values(&rows, 0),
        vec![
            Value::from(""),
            Value::from("member5"),
            Value::from("member6"),
            Value::Null
        ]
    );
}

#[test]
fn test_whole_set_aggregates() {
    let ctx = TestContext::new();
    let age = || Some(col("m", "age"));
    let query = members(
        vec![
            SelectItem::expr(Expr::aggregate(AggregateFunction::Count, None)),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Sum, age())),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Avg, age())),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Max, age())),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Min, age())),
        ],
        Shape::Tuple,
    );

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].data,
        vec![
            Datum::Value(Value::Int64(4)),
            Datum::Value(Value::Int64(100)),
            Datum::Value(Value::Float64(25.0)),
            Datum::Value(Value::Int32(40)),
            Datum::Value(Value::Int32(10)),
        ]
    );
}

#[test]
fn test_group_by_with_join_and_having() {
    let ctx = TestContext::new();
    let query = members(
        vec![
            SelectItem::expr(col("t", "name")),
            SelectItem::expr(Expr::aggregate(AggregateFunction::Avg, Some(col("m", "age")))),
        ],
        Shape::Tuple,
    )
    .with_join(JoinSpec::relation(
        JoinKind::Inner,
        RelationRef {
            from_alias: "m".into(),
            name: "team".into(),
        },
        Source::new("Team", "t"),
    ))
    .with_group(col("t", "name"));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(values(&rows, 0), vec![Value::from("teamA"), Value::from("teamB")]);
    assert_eq!(values(&rows, 1), vec![Value::Float64(15.0), Value::Float64(35.0)]);
    assert_eq!(ctx.db.count(&query).unwrap(), 2);

    let having = query.clone().with_having(cmp(
        CompareOp::Gt,
        Expr::aggregate(AggregateFunction::Avg, Some(col("m", "age"))),
        Expr::literal(20),
    ));
    let rows = ctx.db.execute(&having).unwrap();
    assert_eq!(values(&rows, 0), vec![Value::from("teamB")]);
}

#[test]
fn test_left_join_on_keeps_unmatched() {
    let ctx = TestContext::new();
    let query = members(
        vec![SelectItem::entity("m"), SelectItem::entity("t")],
        Shape::Tuple,
    )
    .with_join(JoinSpec {
        on: Some(cmp(CompareOp::Eq, col("t", "name"), Expr::literal("teamA"))),
        ..JoinSpec::relation(
            JoinKind::Left,
            RelationRef {
                from_alias: "m".into(),
                name: "team".into(),
            },
            Source::new("Team", "t"),
        )
    });

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(rows.len(), 4);
    let teams: Vec<bool> = rows
        .iter()
        .map(|r| r.data[1].as_entity().flatten().is_some())
        .collect();
    assert_eq!(teams, vec![true, true, false, false]);
}

#[test]
fn test_ad_hoc_join_requires_on() {
    let ctx = TestContext::new();
    let mut join = JoinSpec::ad_hoc(
        JoinKind::Inner,
        Source::new("Team", "t"),
        cmp(CompareOp::Eq, col("m", "username"), col("t", "name")),
    );
    join.on = None;
    let query = members(usernames(), Shape::Scalar).with_join(join);
    assert!(matches!(ctx.db.execute(&query), Err(Error::InvalidQuery(_))));
}

#[test]
fn test_theta_join_cross_product() {
    let ctx = TestContext::new();
    ctx.member("teamA", 0, None);
    ctx.member("teamB", 0, None);
    ctx.member("teamC", 0, None);

    let query = members(usernames(), Shape::Scalar)
        .with_source(Source::new("Team", "t"))
        .with_filter(cmp(CompareOp::Eq, col("m", "username"), col("t", "name")));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(values(&rows, 0), vec![Value::from("teamA"), Value::from("teamB")]);
}

#[test]
fn test_cross_product_budget() {
    let ctx = TestContext::with_budget(QueryBudget::default().with_max_intermediate_rows(5));
    let query = members(usernames(), Shape::Scalar).with_source(Source::new("Team", "t"));
    assert!(matches!(
        ctx.db.execute(&query),
        Err(Error::BudgetExceeded { .. })
    ));
}

#[test]
fn test_fetch_join_attaches_relation() {
    let ctx = TestContext::new();
    let mut join = JoinSpec::relation(
        JoinKind::Inner,
        RelationRef {
            from_alias: "m".into(),
            name: "team".into(),
        },
        Source::new("Team", "t"),
    );
    join.fetch = true;
    let query = members(vec![SelectItem::entity("m")], Shape::Entity)
        .with_join(join)
        .with_filter(cmp(CompareOp::Eq, col("m", "username"), Expr::literal("member1")));

    let rows = ctx.db.execute(&query).unwrap();
    let member = rows[0].data[0].as_entity().flatten().unwrap();
    let team = member.fetched("team").flatten().unwrap();
    assert_eq!(team.get("name"), Some(&Value::from("teamA")));
}

#[test]
fn test_one_to_many_join() {
    let ctx = TestContext::new();
    let query = select(vec![SelectItem::expr(col("m", "username"))], Shape::Scalar)
        .with_source(Source::new("Team", "t"))
        .with_join(JoinSpec::relation(
            JoinKind::Inner,
            RelationRef {
                from_alias: "t".into(),
                name: "members".into(),
            },
            Source::new("Member", "m"),
        ))
        .with_filter(cmp(CompareOp::Eq, col("t", "name"), Expr::literal("teamB")));

    let rows = ctx.db.execute(&query).unwrap();
    assert_eq!(values(&rows, 0), vec![Value::from("member3"), Value::from("member4")]);
}

fn max_age_subquery() -> QueryDescriptor {
    select(
        vec![SelectItem::expr(Expr::aggregate(
            AggregateFunction::Max,
            Some(col("sub", "age")),
        ))],
        Shape::Scalar,
    )
    .with_source(Source::new("Member", "sub"))
}

#[test]
fn test_scalar_and_in_subqueries() {
    let ctx = TestContext::new();
    let query = members(vec![SelectItem::expr(col("m", "age"))], Shape::Scalar).with_filter(cmp(
        CompareOp::Eq,
        col("m", "age"),
        Expr::Subquery(Box::new(max_age_subquery())),
    ));
    assert_eq!(values(&ctx.db.execute(&query).unwrap(), 0), vec![Value::Int32(40)]);

    let older_than_ten = select(vec![SelectItem::expr(col("sub", "age"))], Shape::Scalar)
        .with_source(Source::new("Member", "sub"))
        .with_filter(cmp(CompareOp::Gt, col("sub", "age"), Expr::literal(10)));
    let query = members(vec![SelectItem::expr(col("m", "age"))], Shape::Scalar).with_filter(
        PredicateExpr::In {
            expr: col("m", "age"),
            set: InSet::Subquery(Box::new(older_than_ten)),
            negated: false,
        },
    );
    assert_eq!(
        values(&ctx.db.execute(&query).unwrap(), 0),
        vec![Value::Int32(20), Value::Int32(30), Value::Int32(40)]
    );
}

#[test]
fn test_correlated_exists() {
    let ctx = TestContext::new();
    ctx.team("teamEmpty");
    let has_members = select(vec![SelectItem::expr(col("m", "id"))], Shape::Scalar)
        .with_source(Source::new("Member", "m"))
        .with_filter(cmp(CompareOp::Eq, col("m", "team_id"), col("t", "id")));
    let query = select(vec![SelectItem::expr(col("t", "name"))], Shape::Scalar)
        .with_source(Source::new("Team", "t"))
        .with_filter(PredicateExpr::Exists {
            query: Box::new(has_members),
            negated: true,
        });

    assert_eq!(
        values(&ctx.db.execute(&query).unwrap(), 0),
        vec![Value::from("teamEmpty")]
    );
}

#[test]
fn test_scalar_subquery_cardinality() {
    let ctx = TestContext::new();
    let all_ages = select(vec![SelectItem::expr(col("sub", "age"))], Shape::Scalar)
        .with_source(Source::new("Member", "sub"));
    let query = members(
        vec![SelectItem::expr(Expr::Subquery(Box::new(all_ages)))],
        Shape::Scalar,
    );
    assert!(matches!(
        ctx.db.execute(&query),
        Err(Error::SubqueryCardinality { rows: 4 })
    ));
}

#[test]
fn test_bulk_update_and_delete() {
    let ctx = TestContext::new();
    let update = MutationDescriptor::update(
        Source::new("Member", "m"),
        vec![Assignment::new(
            "age",
            Expr::arith(ArithOp::Add, col("m", "age"), Expr::literal(1)),
        )],
    )
    .with_filter(cmp(CompareOp::Lt, col("m", "age"), Expr::literal(28)));
    assert_eq!(ctx.db.execute_mutation(&update).unwrap(), 2);

    let ages = members(vec![SelectItem::expr(col("m", "age"))], Shape::Scalar);
    assert_eq!(
        values(&ctx.db.execute(&ages).unwrap(), 0),
        vec![Value::Int32(11), Value::Int32(21), Value::Int32(30), Value::Int32(40)]
    );

    let delete = MutationDescriptor::delete(Source::new("Member", "m"))
        .with_filter(cmp(CompareOp::Gt, col("m", "age"), Expr::literal(18)));
    assert_eq!(ctx.db.execute_mutation(&delete).unwrap(), 3);
    assert_eq!(ctx.db.count(&ages).unwrap(), 1);
}

#[test]
fn test_update_type_mismatch_leaves_table_untouched() {
    let ctx = TestContext::new();
    let update = MutationDescriptor::update(
        Source::new("Member", "m"),
        vec![Assignment::new("age", Expr::literal("old"))],
    );
    assert!(matches!(
        ctx.db.execute_mutation(&update),
        Err(Error::TypeMismatch(_))
    ));

    let ages = members(vec![SelectItem::expr(col("m", "age"))], Shape::Scalar);
    assert_eq!(values(&ctx.db.execute(&ages).unwrap(), 0)[0], Value::Int32(10));
}

#[test]
fn test_update_subquery_on_same_table() {
    let ctx = TestContext::new();
    let update = MutationDescriptor::update(
        Source::new("Member", "m"),
        vec![Assignment::new("age", Expr::literal(0))],
    )
    .with_filter(cmp(
        CompareOp::Eq,
        col("m", "age"),
        Expr::Subquery(Box::new(max_age_subquery())),
    ));
    assert_eq!(ctx.db.execute_mutation(&update).unwrap(), 1);
}

#[test]
fn test_unknown_names() {
    let ctx = TestContext::new();
    let query = members(vec![SelectItem::expr(col("m", "nickname"))], Shape::Scalar);
    assert!(matches!(ctx.db.execute(&query), Err(Error::UnknownField { .. })));

    let query = members(vec![SelectItem::expr(col("x", "age"))], Shape::Scalar);
    assert!(matches!(ctx.db.execute(&query), Err(Error::UnknownAlias(_))));

    let query = select(usernames(), Shape::Scalar).with_source(Source::new("Order", "m"));
    assert!(matches!(ctx.db.execute(&query), Err(Error::UnknownEntity(_))));
}

#[test]
fn test_rows_survive_reopen() {
    let storage_dir = tempfile::tempdir().unwrap();
    let config = || DatabaseConfig::sled(StorageConfig::new(storage_dir.path()));
    {
        let db = Database::open(schema(), config()).unwrap();
        db.insert("Team", vec![("name".into(), Value::from("teamA"))])
            .unwrap();
        db.flush().unwrap();
    }

    let db = Database::open(schema(), config()).unwrap();
    let key = db
        .insert("Team", vec![("name".into(), Value::from("teamB"))])
        .unwrap();
    assert_eq!(key, Value::Int64(2));

    let query = select(vec![SelectItem::expr(col("t", "name"))], Shape::Scalar)
        .with_source(Source::new("Team", "t"));
    assert_eq!(
        values(&db.execute(&query).unwrap(), 0),
        vec![Value::from("teamA"), Value::from("teamB")]
    );
}

#[test]
fn test_count_does_not_project_rows() {
    let ctx = TestContext::new();
    let all_ages = select(vec![SelectItem::expr(col("sub", "age"))], Shape::Scalar)
        .with_source(Source::new("Member", "sub"));
    let query = members(
        vec![SelectItem::expr(Expr::Subquery(Box::new(all_ages)))],
        Shape::Scalar,
    )
    .with_pagination(Pagination::new(0, 1));

    // Projecting any row would fail on the multi-row scalar subquery.
    assert!(matches!(
        ctx.db.execute(&query),
        Err(Error::SubqueryCardinality { .. })
    ));
    assert_eq!(ctx.db.count(&query).unwrap(), 4);
}

#[test]
fn test_count_applies_distinct_and_having() {
    let ctx = TestContext::new();
    let mut teams = members(vec![SelectItem::expr(col("m", "team_id"))], Shape::Scalar);
    assert_eq!(ctx.db.count(&teams).unwrap(), 4);
    teams.projection.distinct = true;
    assert_eq!(ctx.db.count(&teams).unwrap(), 2);

    let older_teams = members(
        vec![SelectItem::expr(col("m", "team_id"))],
        Shape::Scalar,
    )
    .with_group(col("m", "team_id"))
    .with_having(cmp(
        CompareOp::Gt,
        Expr::aggregate(AggregateFunction::Avg, Some(col("m", "age"))),
        Expr::literal(20),
    ));
    assert_eq!(ctx.db.count(&older_teams).unwrap(), 1);
}

#[test]
fn test_statements_under_debug_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let ctx = TestContext::new();
        let query = members(usernames(), Shape::Scalar)
            .with_filter(cmp(CompareOp::Lt, col("m", "age"), Expr::literal(5)))
            .with_pagination(Pagination::new(0, 2));

        assert!(ctx.db.execute(&query).unwrap().is_empty());
        assert_eq!(ctx.db.count(&query).unwrap(), 0);

        let ages = members(vec![SelectItem::expr(col("m", "age"))], Shape::Scalar);
        assert_eq!(ctx.db.execute(&ages).unwrap().len(), 4);
        assert_eq!(ctx.db.count(&ages).unwrap(), 4);
    });
}
