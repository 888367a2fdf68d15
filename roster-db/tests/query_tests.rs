//! Statement rendering and execution against a real SQLite connection

use roster_db::query::{delete, insert, select, update};
use roster_db::*;

fn setup() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE t (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT
        );",
    )
    .unwrap();
    db
}

#[test]
fn test_mutations_without_where_never_render() {
    let data = Values::new().set("x", 1);
    let update_err = update("t", &data, &[]).unwrap_err();
    assert!(update_err.is_construction_error());
    assert!(matches!(update_err, DbError::MissingWhere(_)));

    assert!(matches!(delete("t", &[]), Err(DbError::MissingWhere(_))));
    assert!(matches!(
        update("t", &Values::new(), &[Condition::eq("id", 1)]),
        Err(DbError::EmptyData(_))
    ));
}

#[test]
fn test_guarded_mutations_leave_table_untouched() {
    let mut db = setup();
    db.insert("t", &Values::new().set("name", "keep")).unwrap();

    assert!(db.delete("t", &[]).is_err());
    assert!(db.update("t", &Values::new().set("name", "gone"), &[]).is_err());

    let rows = db.select("t", &[], &[], &SelectOptions::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("name"), Some("keep"));
}

#[test]
fn test_where_rendering_matches_expected_text() {
    let stmt = select(
        "t",
        &[
            Condition::eq("a", 1),
            Condition::or(vec![
                Comparison::new("b", CompareOp::Gt, 5),
                Comparison::new("b", CompareOp::Lt, 0),
            ]),
            Condition::raw("c", "= NOW()"),
        ],
        &[],
        &SelectOptions::default(),
    )
    .unwrap();

    assert!(
        stmt.sql
            .ends_with("WHERE a = ? AND (b > ? OR b < ?) AND c = NOW()")
    );
    assert_eq!(
        stmt.params,
        vec![SqlValue::Integer(1), SqlValue::Integer(5), SqlValue::Integer(0)]
    );
}

#[test]
fn test_insert_round_trip() {
    let stmt = insert("t", &Values::new().set("name", "x")).unwrap();
    assert_eq!(stmt.sql, "INSERT INTO t (name) VALUES (?)");
    assert_eq!(stmt.params, vec![SqlValue::Text("x".into())]);

    let mut db = setup();
    let id = db.insert("t", &Values::new().set("name", "x")).unwrap();
    let row = db.select_one("t", &[Condition::eq("id", id)]).unwrap().unwrap();
    assert_eq!(row.get_i64("id"), Some(id));
    assert_eq!(row.get_str("name"), Some("x"));
}

#[test]
fn test_raw_insert_value_is_evaluated_by_database() {
    let mut db = setup();
    let id = db
        .insert(
            "t",
            &Values::new()
                .set("name", "stamped")
                .set("created_at", ColumnValue::raw("CURRENT_TIMESTAMP")),
        )
        .unwrap();
    let row = db.select_one("t", &[Condition::eq("id", id)]).unwrap().unwrap();
    let stamp = row.get_str("created_at").unwrap();
    assert_eq!(stamp.len(), 19);
}

#[test]
fn test_raw_where_fragment() {
    let mut db = setup();
    db.insert("t", &Values::new().set("name", "a")).unwrap();
    db.insert(
        "t",
        &Values::new()
            .set("name", "b")
            .set("created_at", ColumnValue::raw("CURRENT_TIMESTAMP")),
    )
    .unwrap();

    let missing = db
        .select("t", &[Condition::raw("created_at", "IS NULL")], &[], &SelectOptions::default())
        .unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].get_str("name"), Some("a"));
}

#[test]
fn test_transaction_state_errors() {
    let mut db = setup();
    assert!(matches!(db.commit(), Err(DbError::NoActiveTransaction)));
    assert!(matches!(db.rollback(), Err(DbError::NoActiveTransaction)));

    db.begin_transaction().unwrap();
    assert!(matches!(
        db.begin_transaction(),
        Err(DbError::TransactionAlreadyActive)
    ));
    db.rollback().unwrap();
}

#[test]
fn test_rollback_discards_insert() {
    let mut db = setup();
    db.begin_transaction().unwrap();
    let id = db.insert("t", &Values::new().set("name", "temp")).unwrap();
    assert!(db.in_transaction());
    db.rollback().unwrap();

    assert!(!db.in_transaction());
    assert!(db.select_one("t", &[Condition::eq("id", id)]).unwrap().is_none());
}

#[test]
fn test_commit_persists_across_statements() {
    let mut db = setup();
    db.begin_transaction().unwrap();
    let a = db.insert("t", &Values::new().set("name", "a")).unwrap();
    let b = db.insert("t", &Values::new().set("name", "b")).unwrap();
    db.update(
        "t",
        &Values::new().set("name", "a2"),
        &[Condition::eq("id", a)],
    )
    .unwrap();
    db.commit().unwrap();

    let rows = db
        .select(
            "t",
            &[],
            &[Column::from("id"), Column::from("name")],
            &SelectOptions::new().order_by("id", SortOrder::Asc),
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_str("name"), Some("a2"));
    assert_eq!(rows[1].get_i64("id"), Some(b));
}

#[test]
fn test_select_with_like_and_pagination() {
    let mut db = setup();
    for name in ["alpha", "alpine", "beta", "alps", "gamma"] {
        db.insert("t", &Values::new().set("name", name)).unwrap();
    }

    let spec = QuerySpec::table("t")
        .columns(["name"])
        .filter(Condition::like("name", "al%"))
        .order_by("name", SortOrder::Asc);

    let page = db.paginate(&spec, &Pagination::new(1, 2)).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.last_page, 2);
    let names: Vec<&str> = page.items.iter().filter_map(|r| r.get_str("name")).collect();
    assert_eq!(names, vec!["alpha", "alpine"]);
}

#[test]
fn test_page_past_signed_range_is_empty() {
    let mut db = setup();
    db.insert("t", &Values::new().set("name", "only")).unwrap();

    let spec = QuerySpec::table("t").order_by("id", SortOrder::Asc);
    let page = db
        .paginate(&spec, &Pagination::from_params(Some("18446744073709551615"), Some("20")))
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items.is_empty());
}

#[test]
fn test_row_keeps_select_column_order() {
    let mut db = setup();
    db.insert("t", &Values::new().set("name", "Ada").set("created_at", "2024-01-01 00:00:00"))
        .unwrap();

    let rows = db
        .select(
            "t",
            &[],
            &[Column::from("name"), Column::from("created_at"), Column::from("id")],
            &SelectOptions::new(),
        )
        .unwrap();
    let json = rows.into_iter().next().unwrap().into_json();
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "created_at", "id"]);
    assert_eq!(
        serde_json::to_string(&json).unwrap(),
        r#"{"name":"Ada","created_at":"2024-01-01 00:00:00","id":1}"#
    );
}

#[test]
fn test_group_by_having_against_sqlite() {
    let mut db = setup();
    for name in ["a", "a", "a", "b", "b", "c"] {
        db.insert("t", &Values::new().set("name", name)).unwrap();
    }

    let rows = db
        .select(
            "t",
            &[],
            &[Column::from("name"), Column::raw("COUNT(*) AS n")],
            &SelectOptions::new()
                .group_by("name")
                .having(Having::new("COUNT(*) >= ?", vec![SqlValue::Integer(2)]))
                .order_by("name", SortOrder::Desc),
        )
        .unwrap();
    let summary: Vec<(String, i64)> = rows
        .iter()
        .map(|r| (r.get_str("name").unwrap().to_string(), r.get_i64("n").unwrap()))
        .collect();
    assert_eq!(summary, vec![("b".to_string(), 2), ("a".to_string(), 3)]);
}
