//! Query string to SQL, end to end, against the fixture catalog.

mod common;

use dbrest::error::{CompileError, QueryError};
use dbrest::query::{CompiledQuery, PagingLimits, QueryOptions};
use dbrest::sql::{dialect_for, BindValue, DatabaseFamily, StatementBuilder};

fn compile(pairs: Vec<(&str, &str)>, entity: &str) -> Result<CompiledQuery, CompileError> {
    let catalog = common::catalog();
    let entity = catalog.entity("sales", entity).unwrap();
    let options = QueryOptions::from_pairs(pairs)?;
    CompiledQuery::compile(&options, entity, &catalog, &PagingLimits::default())
}

fn list_sql(pairs: Vec<(&str, &str)>, family: DatabaseFamily) -> dbrest::sql::ListStatements {
    let catalog = common::catalog();
    let entity = catalog.entity("sales", "customers").unwrap();
    let options = QueryOptions::from_pairs(pairs).unwrap();
    let query = CompiledQuery::compile(&options, entity, &catalog, &PagingLimits::default()).unwrap();
    StatementBuilder::new(dialect_for(family), entity).select_list(&query)
}

#[test]
fn equality_is_bound_not_inlined() {
    let list = list_sql(vec![("filter", "ID eq 42")], DatabaseFamily::Postgres);
    assert!(list.select.sql.contains(r#"WHERE "t_customers"."ID" = $1::bigint"#));
    assert!(!list.select.sql.contains("42"));
    assert_eq!(list.select.params.values().collect::<Vec<_>>(), vec![&BindValue::I64(42)]);
}

#[test]
fn contains_is_case_insensitive() {
    let list = list_sql(vec![("filter", "Name ct 'Bill'")], DatabaseFamily::Postgres);
    assert!(list.select.sql.contains(r#""t_customers"."Name" ILIKE $1::text"#));
    assert_eq!(list.select.params.get("Name"), Some(&BindValue::String("%Bill%".into())));
}

#[test]
fn malformed_filters_are_rejected() {
    assert!(matches!(
        compile(vec![("filter", "((( ID eq 42")], "customers"),
        Err(CompileError::Query(QueryError::UnbalancedParenthesis(_)))
    ));
    assert!(matches!(
        compile(vec![("filter", "ID eq 42 AND")], "customers"),
        Err(CompileError::Query(QueryError::DanglingOperator(_)))
    ));
}

#[test]
fn paging_is_clamped() {
    assert_eq!(compile(vec![("limit", "0")], "customers").unwrap().paging.limit, 25);
    assert_eq!(compile(vec![("limit", "100000")], "customers").unwrap().paging.limit, 5000);
    assert_eq!(compile(vec![("offset", "-5")], "customers").unwrap().paging.offset, 0);
    let huge = compile(
        vec![("limit", "99999999999999999999"), ("offset", "-99999999999999999999")],
        "customers",
    )
    .unwrap();
    assert_eq!(huge.paging.limit, 5000);
    assert_eq!(huge.paging.offset, 0);
}

#[test]
fn nesting_is_bounded() {
    let deep = format!("{}ID eq 1{}", "(".repeat(5000), ")".repeat(5000));
    assert!(matches!(
        compile(vec![("filter", deep.as_str())], "customers"),
        Err(CompileError::Query(QueryError::MalformedFilter(_)))
    ));
    let chain = vec!["Age gt 1"; 5000].join(" or ");
    assert!(matches!(
        compile(vec![("filter", chain.as_str())], "customers"),
        Err(CompileError::Query(QueryError::MalformedFilter(_)))
    ));
}

#[test]
fn decimals_are_read_back_as_text_on_postgres() {
    let catalog = common::catalog();
    let orders = catalog.entity("sales", "orders").unwrap();
    let query = compile(vec![], "orders").unwrap();

    let pg = StatementBuilder::new(dialect_for(DatabaseFamily::Postgres), orders);
    let list = pg.select_list(&query);
    assert!(list.select.sql.starts_with(
        r#"SELECT "t_orders"."OrderID", "t_orders"."CustomerID", "t_orders"."Total"::text AS "Total" FROM"#
    ));
    let one = pg.select_one(&query, "7").unwrap();
    assert!(one.sql.contains(r#""t_orders"."Total"::text AS "Total""#));
    let body = serde_json::json!({ "CustomerID": 1, "Total": 9.5 });
    let insert = pg.insert(body.as_object().unwrap()).unwrap();
    assert!(insert
        .sql
        .ends_with(r#"RETURNING "OrderID", "CustomerID", "Total"::text AS "Total""#));

    let mysql = StatementBuilder::new(dialect_for(DatabaseFamily::MySql), orders).select_list(&query);
    assert!(mysql.select.sql.starts_with("SELECT `t_orders`.* FROM"));
}

#[test]
fn include_chain_resolves_both_hops() {
    let query = compile(vec![("include", "orders,orderdetails")], "customers").unwrap();
    assert_eq!(query.includes.len(), 2);
    assert_eq!(query.includes[0].parent_table, "customers");
    assert_eq!(query.includes[0].parent_column, "ID");
    assert_eq!(query.includes[0].child_column, "CustomerID");
    assert_eq!(query.includes[1].parent_table, "orders");
    assert_eq!(query.includes[1].child_table, "orderdetails");
    assert_eq!(query.includes[1].parent_column, "OrderID");
    assert_eq!(query.includes[1].child_column, "OrderID");

    let catalog = common::catalog_without_detail_fk();
    let customers = catalog.entity("sales", "customers").unwrap();
    let options = QueryOptions::from_pairs(vec![("include", "orders,orderdetails")]).unwrap();
    let err = CompiledQuery::compile(&options, customers, &catalog, &PagingLimits::default()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("orders") && message.contains("orderdetails"));
}

#[test]
fn list_and_count_agree_for_every_dialect() {
    let pairs = vec![
        ("filter", "(Age ge 18 or Name sw 'A') and CreatedAt gt '2024-01-01T00:00:00+02:00'"),
        ("include", "orders"),
        ("fields", "Name,orders.Total"),
        ("sort", "Name:desc"),
    ];
    for family in [
        DatabaseFamily::Postgres,
        DatabaseFamily::MySql,
        DatabaseFamily::Sqlite,
        DatabaseFamily::SqlServer,
    ] {
        let list = list_sql(pairs.clone(), family);
        let where_start = list.count.sql.find(" LEFT OUTER JOIN").unwrap();
        let shared = &list.count.sql[where_start..];
        assert!(list.select.sql.contains(shared), "{:?}: {}", family, list.select.sql);
        assert_eq!(list.select.params, list.count.params);
        assert_eq!(list.select.params.len(), 3);
    }
}

#[test]
fn offsets_are_compared_in_utc() {
    use chrono::{TimeZone, Utc};
    let list = list_sql(
        vec![("filter", "CreatedAt gt '2024-01-01T02:00:00+02:00'")],
        DatabaseFamily::Postgres,
    );
    assert_eq!(
        list.select.params.get("CreatedAt"),
        Some(&BindValue::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
    );
}

#[test]
fn dialects_differ_only_in_syntax() {
    let pairs = vec![("filter", "Name ct 'Bi_ll'"), ("limit", "10"), ("offset", "20")];
    let mysql = list_sql(pairs.clone(), DatabaseFamily::MySql);
    assert!(mysql.select.sql.contains("LOWER(`t_customers`.`Name`) LIKE LOWER(?)"));
    assert!(mysql.select.sql.ends_with("LIMIT 10 OFFSET 20"));

    let sqlite = list_sql(pairs.clone(), DatabaseFamily::Sqlite);
    assert!(sqlite.select.sql.contains(r#""t_customers"."Name" LIKE :Name ESCAPE '\'"#));
    assert_eq!(sqlite.select.params.get("Name"), Some(&BindValue::String("%Bi\\_ll%".into())));

    let mssql = list_sql(pairs, DatabaseFamily::SqlServer);
    assert!(mssql.select.sql.contains("LOWER([t_customers].[Name]) LIKE LOWER(@Name)"));
    assert!(mssql.select.sql.ends_with("OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
    assert_eq!(mssql.select.params.get("Name"), Some(&BindValue::String("%Bi[_]ll%".into())));
}
