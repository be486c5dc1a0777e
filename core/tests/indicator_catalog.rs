//! Indicator query catalog tests.
//!
//! Covers: add/find/list semantics and definition seeding with
//! version-triggered replacement.

use tally_core::{
    config::{IndicatorDefinition, IndicatorDefinitions, ReportingConfig},
    indicator::IndicatorQuery,
    store::{ReportStore, SeedReport},
};

fn build_store() -> ReportStore {
    let store = ReportStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn definition(code: &str, query: &str) -> IndicatorDefinition {
    IndicatorDefinition {
        key:            format!("key_{code}"),
        description:    format!("Indicator {code}"),
        indicator_code: code.into(),
        query:          query.into(),
        multi_result:   false,
        sub_key_column: None,
    }
}

#[test]
fn add_assigns_row_ids_and_does_not_dedupe_by_code() {
    let store = build_store();
    let mut first = IndicatorQuery::new("1234", "select count(*) from ec_child");
    let mut second = IndicatorQuery::new("1234", "select count(*) from ec_family");

    let id_a = store.add_indicator_query(&mut first).expect("add first");
    let id_b = store.add_indicator_query(&mut second).expect("add second");

    assert_eq!(first.id, Some(id_a));
    assert_ne!(id_a, id_b);

    let all = store.all_indicator_queries().expect("all queries");
    assert_eq!(all.len(), 2, "both rows share a code and both are kept");
    assert_eq!(all[&id_b].query, "select count(*) from ec_family");
}

#[test]
fn find_unknown_code_returns_empty_string() {
    let store = build_store();
    let found = store
        .find_query_by_indicator_code("does-not-exist")
        .expect("lookup must not fail on a miss");
    assert_eq!(found, "");
}

#[test]
fn find_returns_first_stored_query_for_code() {
    let store = build_store();
    store
        .add_indicator_query(&mut IndicatorQuery::new("1234", "select 1"))
        .expect("add");
    store
        .add_indicator_query(&mut IndicatorQuery::new("1234", "select 2"))
        .expect("add");
    store
        .add_indicator_query(&mut IndicatorQuery::new("9999", "select 9"))
        .expect("add");

    assert_eq!(store.find_query_by_indicator_code("1234").unwrap(), "select 1");
    assert_eq!(store.find_query_by_indicator_code("9999").unwrap(), "select 9");
}

#[test]
fn multi_result_flag_and_sub_key_column_round_trip_through_the_catalog() {
    let store = build_store();
    let mut query = IndicatorQuery::new("G-01", "select gender, count(*) from ec_child group by gender")
        .multi_result(Some("gender"))
        .with_version(4);
    let id = store.add_indicator_query(&mut query).expect("add");

    let stored = &store.all_indicator_queries().unwrap()[&id];
    assert_eq!(stored, &query);
}

#[test]
fn seeding_inserts_then_leaves_same_version_alone() {
    let store = build_store();
    let config = ReportingConfig::default_test();

    let first = store
        .seed_indicator_definitions(&config.definitions)
        .expect("first seed");
    assert_eq!(first, SeedReport { inserted: 2, ..SeedReport::default() });

    let second = store
        .seed_indicator_definitions(&config.definitions)
        .expect("second seed");
    assert_eq!(second, SeedReport { unchanged: 2, ..SeedReport::default() });

    assert_eq!(store.all_indicator_queries().unwrap().len(), 2);
    assert_eq!(
        store.report_indicators().unwrap().len(),
        2,
        "report indicators are stored once per key"
    );
}

#[test]
fn higher_db_version_replaces_stored_query() {
    let store = build_store();
    let v1 = IndicatorDefinitions {
        db_version: 1,
        indicators: vec![definition("1234", "select count(*) from ec_child")],
    };
    store.seed_indicator_definitions(&v1).expect("seed v1");

    let v2 = IndicatorDefinitions {
        db_version: 2,
        indicators: vec![definition("1234", "select count(*) from ec_child where is_closed = 0")],
    };
    let report = store.seed_indicator_definitions(&v2).expect("seed v2");
    assert_eq!(report.replaced, 1);

    let all = store.all_indicator_queries().unwrap();
    assert_eq!(all.len(), 1, "old version must be removed, not kept alongside");
    let stored = all.values().next().unwrap();
    assert_eq!(stored.db_version, 2);
    assert_eq!(
        store.find_query_by_indicator_code("1234").unwrap(),
        "select count(*) from ec_child where is_closed = 0"
    );

    // Seeding an older version afterwards changes nothing.
    let report = store.seed_indicator_definitions(&v1).expect("seed v1 again");
    assert_eq!(report.unchanged, 1);
    assert_eq!(store.all_indicator_queries().unwrap().values().next().unwrap().db_version, 2);
}

#[test]
fn blank_definitions_are_skipped() {
    let store = build_store();
    let defs = IndicatorDefinitions {
        db_version: 1,
        indicators: vec![
            definition("", "select 1"),
            definition("EMPTY", "   "),
            definition("OK", "select 1"),
        ],
    };
    let report = store.seed_indicator_definitions(&defs).expect("seed");

    assert_eq!(report.skipped, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(store.find_query_by_indicator_code("EMPTY").unwrap(), "");
}
