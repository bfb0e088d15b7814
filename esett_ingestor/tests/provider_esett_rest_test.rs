#![cfg(test)]
use chrono::{Duration, DurationRound, Utc};
use esett_ingestor::{
    codec::decode,
    models::{range::TimeRange, series::Series, zone::Zone},
    providers::{
        UpstreamSource,
        esett_rest::{EsettProvider, EsettSettings},
    },
};
use futures::TryStreamExt;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore]
async fn test_esett_provider_fetches_consumption() {
    // Hits the public eSett API. Run with `--ignored` when network is available.
    let provider = EsettProvider::new(EsettSettings::default()).expect("provider should build");

    let end = Utc::now().duration_trunc(Duration::days(1)).unwrap() - Duration::days(7);
    let range = TimeRange::new(end - Duration::days(2), end).unwrap();

    let pages: Vec<_> = provider
        .fetch_page_sequence(Series::Consumption, Zone::Fi, range)
        .try_collect()
        .await
        .expect("fetch should succeed");

    let rows: Vec<_> = pages
        .iter()
        .flatten()
        .map(|raw| decode(Series::Consumption, Zone::Fi, raw))
        .collect::<Result<_, _>>()
        .expect("records should decode");

    assert!(!rows.is_empty(), "expected at least one hourly row");
    assert!(rows.windows(2).all(|w| w[0].time <= w[1].time));
}
