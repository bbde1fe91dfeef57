mod common;

use std::collections::BTreeMap;

use proptest::prelude::*;
use store_lookup::{
    data::Value,
    lookup::{find_contains, find_exact, find_exact_in},
    reconcile::reconcile,
    schema,
    source::SourceKind,
    table::Table,
};

use common::{number, table, text};

fn stores() -> Table {
    table(
        &["no_tienda", "nombre", "zona", "ventas"],
        vec![
            vec![text("1001"), text("Centro"), text("Norte"), number(500.0)],
            vec![text("0042"), text("Plaza Sur"), text("Sur"), None],
            vec![text("AB7"), text("Aeropuerto"), None, number(12.5)],
        ],
    )
}

#[test]
fn find_exact_ignores_padding_and_case() {
    let table = stores();
    let record = find_exact(&table, " 1001 ").expect("store 1001");
    assert_eq!(record.get("nombre"), Some(&Value::from("Centro")));

    let record = find_exact(&table, "ab7").expect("store AB7");
    assert_eq!(record.key(), Some(&Value::from("AB7")));
}

#[test]
fn find_exact_keeps_leading_zeros_significant() {
    let table = stores();
    assert!(find_exact(&table, "0042").is_some());
    assert!(find_exact(&table, "42").is_none());
}

#[test]
fn find_exact_on_table_without_key_column_finds_nothing() {
    let table = table(&["nombre"], vec![vec![text("Centro")]]);
    assert!(find_exact(&table, "Centro").is_none());
    assert!(find_exact(&Table::empty(), "1001").is_none());
}

#[test]
fn find_exact_in_matches_other_columns() {
    let table = stores();
    let record = find_exact_in(&table, "nombre", "plaza sur").expect("by name");
    assert_eq!(record.key(), Some(&Value::from("0042")));
    assert!(find_exact_in(&table, "missing", "x").is_none());
}

#[test]
fn find_contains_scans_every_cell_in_table_order() {
    let table = stores();
    let keys = |query: &str| {
        find_contains(&table, query)
            .iter()
            .map(|record| record.key().map(Value::as_display).unwrap_or_default())
            .collect::<Vec<_>>()
    };
    assert_eq!(keys("sur"), vec!["0042"]);
    assert_eq!(keys("R"), vec!["1001", "0042", "AB7"]);
    assert_eq!(keys("12.5"), vec!["AB7"]);
    assert_eq!(keys("500"), vec!["1001"]);
    assert!(keys("zzz").is_empty());
}

#[test]
fn find_contains_with_empty_query_returns_all_rows() {
    let table = stores();
    assert_eq!(find_contains(&table, "").len(), table.row_count());
    assert!(find_contains(&Table::empty(), "").is_empty());
}

#[test]
fn lookups_do_not_modify_the_table() {
    let table = stores();
    let before = table.clone();
    let _ = find_exact(&table, "1001");
    let _ = find_contains(&table, "a");
    assert_eq!(table, before);
}

#[test]
fn lookup_over_reconciled_sources() {
    let sources = BTreeMap::from([
        (
            SourceKind::PointsOfSale,
            table(&["NOTIENDA", "NOMBRE"], vec![vec![text("1001"), text("Centro")]]),
        ),
        (
            SourceKind::Promotions,
            table(&["No Tienda", "Promo"], vec![vec![text("1001"), text("2x1")]]),
        ),
    ]);
    let result = reconcile(&sources);

    let record = find_exact(&result.unified, "1001").expect("joined store");
    let fields = record
        .fields()
        .map(|(name, value)| (name.to_string(), value.map(Value::as_display)))
        .collect::<Vec<_>>();
    assert_eq!(
        fields,
        vec![
            ("no_tienda".to_string(), Some("1001".to_string())),
            ("nombre".to_string(), Some("Centro".to_string())),
            ("promo".to_string(), Some("2x1".to_string())),
        ]
    );
}

#[test]
fn record_serializes_as_ordered_object() {
    let table = stores();
    let record = find_exact(&table, "0042").expect("store");
    let json = serde_json::to_string(&record).expect("serialize");
    assert_eq!(
        json,
        r#"{"no_tienda":"0042","nombre":"Plaza Sur","zona":"Sur","ventas":null}"#
    );
}

proptest! {
    #[test]
    fn find_exact_matches_iff_some_key_normalizes_equal(
        keys in prop::collection::vec("[ ]?[a-cA-C0-9]{1,3}[ ]?", 0..8),
        query in "[ ]?[a-cA-C0-9]{1,3}[ ]?",
    ) {
        let table = table(
            &["no_tienda"],
            keys.iter().map(|k| vec![text(k)]).collect(),
        );
        let expected = keys
            .iter()
            .position(|k| schema::normalize_key(k) == schema::normalize_key(&query));

        let found = find_exact(&table, &query);

        prop_assert_eq!(found.is_some(), expected.is_some());
        if let (Some(record), Some(idx)) = (found, expected) {
            prop_assert_eq!(record.key(), table.cell(idx, "no_tienda"));
        }
    }
}
