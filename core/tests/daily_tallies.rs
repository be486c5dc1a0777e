//! Tally store tests: upsert uniqueness and grouped retrieval.

use tally_core::{store::ReportStore, tally::CompositeIndicatorTally};

fn build_store() -> ReportStore {
    let store = ReportStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn tally(code: &str, date: &str, sub_key: Option<&str>, value: f64) -> CompositeIndicatorTally {
    CompositeIndicatorTally {
        indicator_code: code.into(),
        date:           date.into(),
        sub_key:        sub_key.map(str::to_string),
        value,
    }
}

#[test]
fn same_key_is_upserted_not_duplicated() {
    let store = build_store();
    store.add_tally(&tally("1234", "2019-07-01", None, 10.0)).unwrap();
    store.add_tally(&tally("1234", "2019-07-01", None, 12.0)).unwrap();

    assert_eq!(store.tally_count().unwrap(), 1);
    let days = store.indicators_daily_tallies().unwrap();
    assert_eq!(days[0].get("1234").unwrap().value, 12.0);
}

#[test]
fn sub_keys_and_dates_are_part_of_the_identity() {
    let store = build_store();
    store.add_tally(&tally("G-01", "2019-07-01", None, 14.0)).unwrap();
    store.add_tally(&tally("G-01", "2019-07-01", Some("A"), 5.0)).unwrap();
    store.add_tally(&tally("G-01", "2019-07-01", Some("B"), 9.0)).unwrap();
    store.add_tally(&tally("G-01", "2019-07-02", Some("A"), 1.0)).unwrap();

    assert_eq!(store.tally_count().unwrap(), 4);
}

#[test]
fn missing_and_empty_sub_keys_are_distinct_tallies() {
    let store = build_store();
    store.add_tally(&tally("G-02", "2019-07-01", None, 2.0)).unwrap();
    store.add_tally(&tally("G-02", "2019-07-01", Some(""), 1.0)).unwrap();
    store.add_tally(&tally("G-02", "2019-07-01", Some("F"), 1.0)).unwrap();

    assert_eq!(store.tally_count().unwrap(), 3);
    let days = store.indicators_daily_tallies().unwrap();
    assert_eq!(days[0].get_sub("G-02", None).unwrap().value, 2.0);
    assert_eq!(days[0].get_sub("G-02", Some("")).unwrap().value, 1.0);
    assert_eq!(days[0].get_sub("G-02", Some("F")).unwrap().value, 1.0);

    // Upserting the empty-string group leaves the missing-key group alone.
    store.add_tally(&tally("G-02", "2019-07-01", Some(""), 7.0)).unwrap();
    let days = store.indicators_daily_tallies().unwrap();
    assert_eq!(store.tally_count().unwrap(), 3);
    assert_eq!(days[0].get_sub("G-02", None).unwrap().value, 2.0);
    assert_eq!(days[0].get_sub("G-02", Some("")).unwrap().value, 7.0);
}

#[test]
fn daily_tallies_are_grouped_by_date_in_order() {
    let store = build_store();
    store.add_tally(&tally("B", "2019-07-02", None, 2.0)).unwrap();
    store.add_tally(&tally("A", "2019-07-01", None, 1.0)).unwrap();
    store.add_tally(&tally("A", "2019-07-02", None, 3.0)).unwrap();
    store.add_tally(&tally("C", "2019-07-01", Some("x"), 4.0)).unwrap();

    let days = store.indicators_daily_tallies().unwrap();
    let dates: Vec<_> = days.iter().map(|d| d.date.as_str()).collect();
    assert_eq!(dates, vec!["2019-07-01", "2019-07-02"]);

    assert_eq!(days[0].tallies.len(), 2);
    assert_eq!(days[0].get("A").unwrap().value, 1.0);
    assert_eq!(days[0].get_sub("C", Some("x")).unwrap().value, 4.0);
    assert!(days[0].get("C").is_none(), "sub-keyed tally is not the single-result tally");

    assert_eq!(days[1].tallies.len(), 2);
    assert_eq!(days[1].get("B").unwrap().value, 2.0);
}

#[test]
fn empty_store_has_no_days() {
    let store = build_store();
    assert!(store.indicators_daily_tallies().unwrap().is_empty());
}
