//! Tests for the metric value queries and CSV export determinism.

mod helpers;

use helpers::seed_metric_chain;
use scanboard::data::metrics::{self, IdFilter, NameFilter};
use scanboard::web::metric_export::{to_csv, CSV_HEADER};
use sqlx::PgPool;

#[sqlx::test]
async fn id_filter_narrows_to_one_study(pool: PgPool) {
    let fixture_a = seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "snr",
        9.75,
    )
    .await;

    let filter = IdFilter {
        studies: Some(vec![fixture_a.study_id]),
        ..Default::default()
    };
    let rows = metrics::values_by_id(&pool, &filter).await.expect("query failed");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].study_id, fixture_a.study_id);
    assert_eq!(rows[0].value, 12.5);
}

#[sqlx::test]
async fn id_filter_accepts_multiple_studies(pool: PgPool) {
    let fixture_a = seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    let fixture_b = seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "snr",
        9.75,
    )
    .await;

    let filter = IdFilter {
        studies: Some(vec![fixture_a.study_id, fixture_b.study_id]),
        ..Default::default()
    };
    let rows = metrics::values_by_id(&pool, &filter).await.expect("query failed");
    assert_eq!(rows.len(), 2);
}

#[sqlx::test]
async fn name_filter_matches_study_nickname(pool: PgPool) {
    seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "snr",
        9.75,
    )
    .await;

    let filter = NameFilter {
        studies: Some(vec!["ABC".to_string()]),
        ..Default::default()
    };
    let rows = metrics::values_by_name(&pool, &filter).await.expect("query failed");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].session_name, "ABC_CMH_0001_01_01");
}

#[sqlx::test]
async fn combined_filters_intersect(pool: PgPool) {
    let fixture = seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;

    // Matching study but a different metric type: no rows.
    let filter = IdFilter {
        studies: Some(vec![fixture.study_id]),
        metrictypes: Some(vec![fixture.metrictype_id + 999]),
        ..Default::default()
    };
    let rows = metrics::values_by_id(&pool, &filter).await.expect("query failed");
    assert!(rows.is_empty());

    // Both match: one row.
    let filter = IdFilter {
        studies: Some(vec![fixture.study_id]),
        metrictypes: Some(vec![fixture.metrictype_id]),
        ..Default::default()
    };
    let rows = metrics::values_by_id(&pool, &filter).await.expect("query failed");
    assert_eq!(rows.len(), 1);
}

#[sqlx::test]
async fn empty_filter_returns_everything(pool: PgPool) {
    seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "tsnr",
        88.0,
    )
    .await;

    let rows = metrics::values_by_id(&pool, &IdFilter::default())
        .await
        .expect("query failed");
    assert_eq!(rows.len(), 2);
}

#[sqlx::test]
async fn rows_flatten_their_joined_associations(pool: PgPool) {
    let fixture = seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;

    let rows = metrics::values_by_id(&pool, &IdFilter::default())
        .await
        .expect("query failed");
    let row = &rows[0];

    assert_eq!(row.metrictype, "snr");
    assert_eq!(row.metrictype_id, fixture.metrictype_id);
    assert_eq!(row.scan_id, fixture.scan_id);
    assert_eq!(row.scantype_id, fixture.scantype_id);
    assert_eq!(row.session_id, fixture.session_id);
    assert_eq!(row.session_name, "ABC_CMH_0001_01_01");
    assert_eq!(row.site_id, fixture.site_id);
    assert_eq!(row.site_name, "CMH");
    assert_eq!(row.study_id, fixture.study_id);
    assert_eq!(row.study_name, "ABC Study");
}

#[sqlx::test]
async fn repeated_exports_are_byte_identical(pool: PgPool) {
    seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "tsnr",
        88.0,
    )
    .await;

    let filter = IdFilter::default();
    let first = to_csv(&metrics::values_by_id(&pool, &filter).await.expect("query failed"));
    let second = to_csv(&metrics::values_by_id(&pool, &filter).await.expect("query failed"));

    assert_eq!(first, second, "same filter set must export identical bytes");
    assert!(first.starts_with(&CSV_HEADER.join(",")));
}

#[sqlx::test]
async fn metric_name_pairs_cover_each_study(pool: PgPool) {
    seed_metric_chain(
        &pool,
        "ABC",
        "CMH",
        "ABC_CMH_0001_01",
        "ABC_CMH_0001_01_01",
        "snr",
        12.5,
    )
    .await;
    seed_metric_chain(
        &pool,
        "XYZ",
        "UTO",
        "XYZ_UTO_0002_01",
        "XYZ_UTO_0002_01_01",
        "tsnr",
        88.0,
    )
    .await;

    let mut pairs = metrics::study_metric_names(&pool).await.expect("query failed");
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("ABC".to_string(), "snr".to_string()),
            ("XYZ".to_string(), "tsnr".to_string()),
        ]
    );
}
