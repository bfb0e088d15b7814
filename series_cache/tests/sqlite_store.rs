mod common;

use common::*;
use diesel::{QueryableByName, RunQueryDsl, sql_query, sql_types::Text};
use esett_ingestor::models::{
    row::{ConsumptionValues, PriceValues, ProductionValues, Row, RowValues},
    series::{Series, SeriesKey},
    zone::Zone,
};
use series_cache::{db::migrate, store::SeriesStore};

fn production(hour: i64, zone: Zone, total: f64, hydro: Option<f64>) -> Row {
    Row {
        time: h(hour),
        zone,
        values: RowValues::Production(ProductionValues {
            total: Some(total),
            hydro,
            ..Default::default()
        }),
    }
}

fn consumption(hour: i64, zone: Zone, total: f64) -> Row {
    Row {
        time: h(hour),
        zone,
        values: RowValues::Consumption(ConsumptionValues {
            total: Some(total),
            ..Default::default()
        }),
    }
}

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    name: String,
}

#[tokio::test]
async fn open_applies_pragmas_and_schema() {
    let db = TestDb::new();
    let _store = db.store();

    let mut conn = db.connect();
    assert_sqlite_pragmas(&mut conn);

    let tables: Vec<String> =
        sql_query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;")
            .load::<TableName>(&mut conn)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
    for expected in ["consumption", "covered_interval", "imbalance_price", "production"] {
        assert!(tables.iter().any(|t| t == expected), "missing {expected}: {tables:?}");
    }

    // Already migrated by open.
    assert_eq!(migrate::run_pending(&mut conn).unwrap(), 0);
}

#[tokio::test]
async fn upsert_is_last_write_wins() {
    let db = TestDb::new();
    let store = db.store();
    let key = SeriesKey::new(Series::Production, Zone::Se3);

    store
        .upsert(&[production(0, Zone::Se3, 1.0, Some(2.0))])
        .await
        .unwrap();
    let revised = production(0, Zone::Se3, 9.0, None);
    store.upsert(std::slice::from_ref(&revised)).await.unwrap();

    let rows = store.read_range(key, range(h(0), h(1))).await.unwrap();
    assert_eq!(rows, vec![revised]);
}

#[tokio::test]
async fn read_range_is_half_open_sorted_and_keyed() {
    let db = TestDb::new();
    let store = db.store();

    let mut rows: Vec<Row> = (0..6).rev().map(|i| production(i, Zone::Se3, i as f64, None)).collect();
    rows.push(production(2, Zone::Se4, 100.0, None));
    rows.push(consumption(2, Zone::Se3, 50.0));
    store.upsert(&rows).await.unwrap();

    let got = store
        .read_range(SeriesKey::new(Series::Production, Zone::Se3), range(h(1), h(4)))
        .await
        .unwrap();
    let times: Vec<_> = got.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![h(1), h(2), h(3)]);
    assert!(got.iter().all(|r| r.zone == Zone::Se3 && r.series() == Series::Production));

    let other_series = store
        .read_range(SeriesKey::new(Series::Consumption, Zone::Se3), range(h(0), h(6)))
        .await
        .unwrap();
    assert_eq!(other_series, vec![consumption(2, Zone::Se3, 50.0)]);
}

#[tokio::test]
async fn price_rows_keep_every_component() {
    let db = TestDb::new();
    let store = db.store();
    let row = Row {
        time: h(7),
        zone: Zone::Fi,
        values: RowValues::Prices(PriceValues {
            up_reg_price: Some(81.25),
            down_reg_price: Some(-3.5),
            imbl_sales_price: Some(40.0),
            value_of_avoided_activation: Some(12.0),
            ..Default::default()
        }),
    };

    store.upsert(std::slice::from_ref(&row)).await.unwrap();
    let got = store
        .read_range(SeriesKey::new(Series::Prices, Zone::Fi), range(h(0), h(24)))
        .await
        .unwrap();
    assert_eq!(got, vec![row]);
}

#[tokio::test]
async fn commit_merges_adjacent_coverage() {
    let db = TestDb::new();
    let store = db.store();
    let key = SeriesKey::new(Series::Production, Zone::No1);

    let rows: Vec<Row> = (0..10).map(|i| production(i, Zone::No1, 1.0, None)).collect();
    store.commit(key, range(h(0), h(5)), &rows[..5]).await.unwrap();
    store.commit(key, range(h(20), h(30)), &[]).await.unwrap();
    store.commit(key, range(h(5), h(10)), &rows[5..]).await.unwrap();

    assert_eq!(
        store.coverage(key).await.unwrap(),
        vec![range(h(0), h(10)), range(h(20), h(30))]
    );
    assert_eq!(store.read_range(key, range(h(0), h(30))).await.unwrap().len(), 10);

    // An empty range persists rows but no coverage.
    store
        .commit(key, range(h(40), h(40)), &[production(40, Zone::No1, 1.0, None)])
        .await
        .unwrap();
    assert_eq!(store.coverage(key).await.unwrap().len(), 2);
    assert_eq!(store.read_range(key, range(h(40), h(41))).await.unwrap().len(), 1);
}

#[tokio::test]
async fn coverage_is_per_key() {
    let db = TestDb::new();
    let store = db.store();
    let se1 = SeriesKey::new(Series::Prices, Zone::Se1);
    let se2 = SeriesKey::new(Series::Prices, Zone::Se2);

    store.record_coverage(se1, range(h(0), h(24))).await.unwrap();

    assert_eq!(store.coverage(se1).await.unwrap(), vec![range(h(0), h(24))]);
    assert!(store.coverage(se2).await.unwrap().is_empty());
}

#[tokio::test]
async fn reopen_keeps_rows_and_coverage() {
    let db = TestDb::new();
    let key = SeriesKey::new(Series::Consumption, Zone::Dk1);
    let rows: Vec<Row> = (0..3).map(|i| consumption(i, Zone::Dk1, i as f64)).collect();

    {
        let store = db.store();
        store.commit(key, range(h(0), h(3)), &rows).await.unwrap();
    }

    let store = db.store();
    assert_eq!(store.coverage(key).await.unwrap(), vec![range(h(0), h(3))]);
    assert_eq!(store.read_range(key, range(h(0), h(3))).await.unwrap(), rows);
}
