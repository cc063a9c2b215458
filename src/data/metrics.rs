//! Metric value queries behind the export endpoints.
//!
//! Filters arrive pre-normalized as either id lists or name lists; every
//! filter field is optional and absent filters place no constraint on the
//! query. SQL uses nullable-array parameters so one statement covers every
//! filter combination.

use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;

/// Filters addressing rows by numeric database ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdFilter {
    pub studies: Option<Vec<i32>>,
    pub sites: Option<Vec<i32>>,
    pub sessions: Option<Vec<i32>>,
    pub scans: Option<Vec<i32>>,
    pub scantypes: Option<Vec<i32>>,
    pub metrictypes: Option<Vec<i32>>,
}

/// Filters addressing rows by human-readable names. Studies match their
/// short nickname, everything else its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    pub studies: Option<Vec<String>>,
    pub sites: Option<Vec<String>>,
    pub sessions: Option<Vec<String>>,
    pub scans: Option<Vec<String>>,
    pub scantypes: Option<Vec<String>>,
    pub metrictypes: Option<Vec<String>>,
}

/// A metric value flattened from its joined associations.
///
/// Field order here is the CSV column order; exports of the same filter set
/// are byte-identical because the header and rows both derive from it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MetricValueRow {
    pub value: f64,
    pub metrictype: String,
    pub metrictype_id: i32,
    pub scan_id: i32,
    pub scan_name: String,
    pub scan_description: Option<String>,
    pub scantype: String,
    pub scantype_id: i32,
    pub session_id: i32,
    pub session_name: String,
    pub site_id: i32,
    pub site_name: String,
    pub study_id: i32,
    pub study_name: String,
}

const METRIC_SELECT: &str = "SELECT mv.value, mt.name AS metrictype, mv.metrictype_id, \
            mv.scan_id, sc.name AS scan_name, sc.description AS scan_description, \
            st.name AS scantype, sc.scantype_id, \
            se.id AS session_id, se.name AS session_name, \
            t.site_id, si.name AS site_name, \
            t.study_id, stu.name AS study_name \
     FROM metric_values mv \
     JOIN metrictypes mt ON mt.id = mv.metrictype_id \
     JOIN scans sc ON sc.id = mv.scan_id \
     JOIN scantypes st ON st.id = sc.scantype_id \
     JOIN sessions se ON se.id = sc.session_id \
     JOIN timepoints t ON t.id = se.timepoint_id \
     JOIN sites si ON si.id = t.site_id \
     JOIN studies stu ON stu.id = t.study_id";

/// Fetch metric values matching an id filter.
pub async fn values_by_id(pool: &PgPool, filter: &IdFilter) -> Result<Vec<MetricValueRow>> {
    let rows = sqlx::query_as::<_, MetricValueRow>(&format!(
        "{METRIC_SELECT} \
         WHERE ($1::int[] IS NULL OR t.study_id = ANY($1)) \
           AND ($2::int[] IS NULL OR t.site_id = ANY($2)) \
           AND ($3::int[] IS NULL OR se.id = ANY($3)) \
           AND ($4::int[] IS NULL OR mv.scan_id = ANY($4)) \
           AND ($5::int[] IS NULL OR sc.scantype_id = ANY($5)) \
           AND ($6::int[] IS NULL OR mv.metrictype_id = ANY($6)) \
         ORDER BY mv.id"
    ))
    .bind(filter.studies.as_deref())
    .bind(filter.sites.as_deref())
    .bind(filter.sessions.as_deref())
    .bind(filter.scans.as_deref())
    .bind(filter.scantypes.as_deref())
    .bind(filter.metrictypes.as_deref())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch metric values matching a name filter.
pub async fn values_by_name(pool: &PgPool, filter: &NameFilter) -> Result<Vec<MetricValueRow>> {
    let rows = sqlx::query_as::<_, MetricValueRow>(&format!(
        "{METRIC_SELECT} \
         WHERE ($1::text[] IS NULL OR stu.nickname = ANY($1)) \
           AND ($2::text[] IS NULL OR si.name = ANY($2)) \
           AND ($3::text[] IS NULL OR se.name = ANY($3)) \
           AND ($4::text[] IS NULL OR sc.name = ANY($4)) \
           AND ($5::text[] IS NULL OR st.name = ANY($5)) \
           AND ($6::text[] IS NULL OR mt.name = ANY($6)) \
         ORDER BY mv.id"
    ))
    .bind(filter.studies.as_deref())
    .bind(filter.sites.as_deref())
    .bind(filter.sessions.as_deref())
    .bind(filter.scans.as_deref())
    .bind(filter.scantypes.as_deref())
    .bind(filter.metrictypes.as_deref())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// One row of the (study, site, scantype, metrictype) option sets backing
/// the metric selection form.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MetricTypeOption {
    pub study_id: i32,
    pub study_name: String,
    pub site_id: i32,
    pub site_name: String,
    pub scantype_id: i32,
    pub scantype_name: String,
    pub metrictype_id: i32,
    pub metrictype_name: String,
}

/// Distinct filter options narrowed by any already-selected ids, so picking
/// a study narrows the site/scantype/metrictype choices.
pub async fn metric_type_options(
    pool: &PgPool,
    filter: &IdFilter,
) -> Result<Vec<MetricTypeOption>> {
    let rows = sqlx::query_as::<_, MetricTypeOption>(
        "SELECT DISTINCT t.study_id, stu.name AS study_name, \
                t.site_id, si.name AS site_name, \
                sc.scantype_id, st.name AS scantype_name, \
                mt.id AS metrictype_id, mt.name AS metrictype_name \
         FROM metric_values mv \
         JOIN metrictypes mt ON mt.id = mv.metrictype_id \
         JOIN scans sc ON sc.id = mv.scan_id \
         JOIN scantypes st ON st.id = sc.scantype_id \
         JOIN sessions se ON se.id = sc.session_id \
         JOIN timepoints t ON t.id = se.timepoint_id \
         JOIN sites si ON si.id = t.site_id \
         JOIN studies stu ON stu.id = t.study_id \
         WHERE ($1::int[] IS NULL OR t.study_id = ANY($1)) \
           AND ($2::int[] IS NULL OR t.site_id = ANY($2)) \
           AND ($3::int[] IS NULL OR sc.scantype_id = ANY($3)) \
           AND ($4::int[] IS NULL OR mv.metrictype_id = ANY($4)) \
         ORDER BY study_name, site_name, scantype_name, metrictype_name",
    )
    .bind(filter.studies.as_deref())
    .bind(filter.sites.as_deref())
    .bind(filter.scantypes.as_deref())
    .bind(filter.metrictypes.as_deref())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// `(study nickname, metric name)` pairs for the metric name cache.
pub async fn study_metric_names(pool: &PgPool) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT DISTINCT stu.nickname, mt.name \
         FROM metric_values mv \
         JOIN metrictypes mt ON mt.id = mv.metrictype_id \
         JOIN scans sc ON sc.id = mv.scan_id \
         JOIN sessions se ON se.id = sc.session_id \
         JOIN timepoints t ON t.id = se.timepoint_id \
         JOIN studies stu ON stu.id = t.study_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
