//! Metric data query and export handlers.
//!
//! Two request shapes address the same filters: GET uses plural resource
//! keys with comma-separated values (`?studies=1,2&metrictypes=84`), POST
//! uses database column names with repeated fields (`study_id=1&study_id=2`).
//! Both normalize into a single [`MetricFilter`] before touching the
//! database; `byname=true` switches matching from numeric ids to names.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::Form;
use serde::Deserialize;
use serde_json::json;

use crate::data::metrics::{IdFilter, MetricValueRow, NameFilter};
use crate::state::AppState;
use crate::web::auth::extractors::AuthUser;
use crate::web::error::{db_error, ApiError};
use crate::web::flash::{clear_flash_cookie, flash_redirect, pop_flash};

/// A normalized metric query: filter values are either all numeric ids or
/// all names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricFilter {
    ById(IdFilter),
    ByName(NameFilter),
}

/// GET parameter shape: plural keys, comma-separated values.
#[derive(Debug, Default, Deserialize)]
pub struct MetricQueryParams {
    pub byname: Option<String>,
    pub studies: Option<String>,
    pub sites: Option<String>,
    pub sessions: Option<String>,
    pub scans: Option<String>,
    pub scantypes: Option<String>,
    pub metrictypes: Option<String>,
}

/// POST form shape: column-name keys, repeated fields for multiple values.
#[derive(Debug, Default, Deserialize)]
pub struct MetricQueryForm {
    pub byname: Option<String>,
    #[serde(default)]
    pub study_id: Vec<String>,
    #[serde(default)]
    pub site_id: Vec<String>,
    #[serde(default)]
    pub session_id: Vec<String>,
    #[serde(default)]
    pub scan_id: Vec<String>,
    #[serde(default)]
    pub scantype_id: Vec<String>,
    #[serde(default)]
    pub metrictype_id: Vec<String>,
    /// Set by the page script once every selection box has a value.
    pub query_complete: Option<String>,
}

/// Raw filter values with the request-shape differences already erased.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawFilter {
    pub studies: Vec<String>,
    pub sites: Vec<String>,
    pub sessions: Vec<String>,
    pub scans: Vec<String>,
    pub scantypes: Vec<String>,
    pub metrictypes: Vec<String>,
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clean(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn parse_byname(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}

impl RawFilter {
    pub fn from_query(params: &MetricQueryParams) -> Self {
        Self {
            studies: split_csv(params.studies.as_deref()),
            sites: split_csv(params.sites.as_deref()),
            sessions: split_csv(params.sessions.as_deref()),
            scans: split_csv(params.scans.as_deref()),
            scantypes: split_csv(params.scantypes.as_deref()),
            metrictypes: split_csv(params.metrictypes.as_deref()),
        }
    }

    pub fn from_form(form: &MetricQueryForm) -> Self {
        Self {
            studies: clean(form.study_id.clone()),
            sites: clean(form.site_id.clone()),
            sessions: clean(form.session_id.clone()),
            scans: clean(form.scan_id.clone()),
            scantypes: clean(form.scantype_id.clone()),
            metrictypes: clean(form.metrictype_id.clone()),
        }
    }

    /// Normalize into a typed filter. By-id values must parse as integers;
    /// the first malformed value is reported back to the caller.
    pub fn normalize(self, byname: bool) -> Result<MetricFilter, String> {
        if byname {
            return Ok(MetricFilter::ByName(NameFilter {
                studies: none_if_empty(self.studies),
                sites: none_if_empty(self.sites),
                sessions: none_if_empty(self.sessions),
                scans: none_if_empty(self.scans),
                scantypes: none_if_empty(self.scantypes),
                metrictypes: none_if_empty(self.metrictypes),
            }));
        }

        Ok(MetricFilter::ById(IdFilter {
            studies: parse_ids("studies", self.studies)?,
            sites: parse_ids("sites", self.sites)?,
            sessions: parse_ids("sessions", self.sessions)?,
            scans: parse_ids("scans", self.scans)?,
            scantypes: parse_ids("scantypes", self.scantypes)?,
            metrictypes: parse_ids("metrictypes", self.metrictypes)?,
        }))
    }
}

fn none_if_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn parse_ids(field: &str, values: Vec<String>) -> Result<Option<Vec<i32>>, String> {
    if values.is_empty() {
        return Ok(None);
    }
    let mut ids = Vec::with_capacity(values.len());
    for value in values {
        let id = value
            .parse::<i32>()
            .map_err(|_| format!("invalid numeric value '{value}' for filter '{field}'"))?;
        ids.push(id);
    }
    Ok(Some(ids))
}

async fn run_query(
    state: &AppState,
    filter: &MetricFilter,
) -> Result<Vec<MetricValueRow>, ApiError> {
    match filter {
        MetricFilter::ById(filter) => crate::data::metrics::values_by_id(&state.db_pool, filter)
            .await
            .map_err(|e| db_error("Metric query", e)),
        MetricFilter::ByName(filter) => {
            crate::data::metrics::values_by_name(&state.db_pool, filter)
                .await
                .map_err(|e| db_error("Metric query", e))
        }
    }
}

/// `GET /metricDataAsJson`
pub async fn metric_data_json_get(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<MetricQueryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = RawFilter::from_query(&params)
        .normalize(parse_byname(params.byname.as_deref()))
        .map_err(ApiError::bad_request)?;
    let rows = run_query(&state, &filter).await?;
    Ok(Json(json!({ "data": rows })))
}

/// `POST /metricDataAsJson`
pub async fn metric_data_json_post(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Form(form): Form<MetricQueryForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = RawFilter::from_form(&form)
        .normalize(parse_byname(form.byname.as_deref()))
        .map_err(ApiError::bad_request)?;
    let rows = run_query(&state, &filter).await?;
    Ok(Json(json!({ "data": rows })))
}

/// Column order for CSV exports. Matches the field order of
/// [`MetricValueRow`] so JSON and CSV exports agree.
pub const CSV_HEADER: [&str; 14] = [
    "value",
    "metrictype",
    "metrictype_id",
    "scan_id",
    "scan_name",
    "scan_description",
    "scantype",
    "scantype_id",
    "session_id",
    "session_name",
    "site_id",
    "site_name",
    "study_id",
    "study_name",
];

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Serialize result rows as CSV with a fixed column order, so identical
/// filter sets always produce byte-identical output.
pub fn to_csv(rows: &[MetricValueRow]) -> String {
    let mut csv = CSV_HEADER.join(",");
    csv.push('\n');
    for row in rows {
        let fields = [
            row.value.to_string(),
            csv_escape(&row.metrictype),
            row.metrictype_id.to_string(),
            row.scan_id.to_string(),
            csv_escape(&row.scan_name),
            csv_escape(row.scan_description.as_deref().unwrap_or("")),
            csv_escape(&row.scantype),
            row.scantype_id.to_string(),
            row.session_id.to_string(),
            csv_escape(&row.session_name),
            row.site_id.to_string(),
            csv_escape(&row.site_name),
            row.study_id.to_string(),
            csv_escape(&row.study_name),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }
    csv
}

/// Selection options for the metric form, deduplicated and name-sorted.
async fn form_options(
    state: &AppState,
    filter: &IdFilter,
) -> Result<serde_json::Value, ApiError> {
    let options = crate::data::metrics::metric_type_options(&state.db_pool, filter)
        .await
        .map_err(|e| db_error("Metric options", e))?;

    fn collect(pairs: impl Iterator<Item = (i32, String)>) -> Vec<(i32, String)> {
        let mut values: Vec<(i32, String)> = pairs.collect();
        values.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        values.dedup();
        values
    }

    let studies = collect(options.iter().map(|o| (o.study_id, o.study_name.clone())));
    let sites = collect(options.iter().map(|o| (o.site_id, o.site_name.clone())));
    let scantypes = collect(options.iter().map(|o| (o.scantype_id, o.scantype_name.clone())));
    let metrictypes = collect(
        options
            .iter()
            .map(|o| (o.metrictype_id, o.metrictype_name.clone())),
    );

    Ok(json!({
        "studies": studies,
        "sites": sites,
        "scantypes": scantypes,
        "metrictypes": metrictypes,
    }))
}

/// `GET /metricData` — selection page model.
pub async fn metric_data_page(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let options = form_options(&state, &IdFilter::default()).await?;
    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "options": options,
        "csv": serde_json::Value::Null,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    Ok(response)
}

/// `POST /metricData` — narrow the selection options and, once the client
/// marks the query complete, run the export.
///
/// The generated CSV is kept per-user for `GET /DownloadCSV`.
pub async fn metric_data_submit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<MetricQueryForm>,
) -> Result<Response, ApiError> {
    let csv = if parse_byname(form.query_complete.as_deref()) {
        let filter = RawFilter::from_form(&form)
            .normalize(parse_byname(form.byname.as_deref()))
            .map_err(ApiError::bad_request)?;
        let rows = run_query(&state, &filter).await?;
        let csv = to_csv(&rows);
        state.export_cache.store(user.id, csv.clone());
        Some(csv)
    } else {
        None
    };

    // The options query only narrows on id filters; a by-name submission
    // still refreshes the full option sets.
    let id_filter = RawFilter::from_form(&form)
        .normalize(false)
        .ok()
        .and_then(|filter| match filter {
            MetricFilter::ById(filter) => Some(filter),
            MetricFilter::ByName(_) => None,
        })
        .unwrap_or_default();

    let options = form_options(&state, &id_filter).await?;
    let flash = pop_flash(&headers);
    let mut response = Json(json!({
        "options": options,
        "csv": csv,
        "flash": flash,
    }))
    .into_response();
    clear_flash_cookie(&mut response);
    Ok(response)
}

/// `GET /DownloadCSV` — re-serve the user's most recent export.
pub async fn download_csv(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Response {
    let Some(export) = state.export_cache.get(user.id) else {
        return flash_redirect("No export available. Run a metric query first.", "/metricData");
    };

    let mut response = export.body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!(
        "attachment; filename={}",
        export.filename
    )) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_params(byname: &str, studies: &str) -> MetricQueryParams {
        MetricQueryParams {
            byname: Some(byname.to_string()),
            studies: Some(studies.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn get_params_by_id_coerce_to_integers() {
        let params = query_params("false", "1,2");
        let filter = RawFilter::from_query(&params)
            .normalize(parse_byname(params.byname.as_deref()))
            .unwrap();
        assert_eq!(
            filter,
            MetricFilter::ById(IdFilter {
                studies: Some(vec![1, 2]),
                ..Default::default()
            })
        );
    }

    #[test]
    fn get_params_by_name_keep_strings() {
        let params = query_params("true", "StudyA");
        let filter = RawFilter::from_query(&params)
            .normalize(parse_byname(params.byname.as_deref()))
            .unwrap();
        assert_eq!(
            filter,
            MetricFilter::ByName(NameFilter {
                studies: Some(vec!["StudyA".to_string()]),
                ..Default::default()
            })
        );
    }

    #[test]
    fn malformed_numeric_values_are_reported() {
        let params = query_params("false", "1,abc");
        let err = RawFilter::from_query(&params)
            .normalize(parse_byname(params.byname.as_deref()))
            .unwrap_err();
        assert!(err.contains("'abc'"), "error should name the bad value: {err}");
        assert!(err.contains("studies"), "error should name the field: {err}");
    }

    #[test]
    fn absent_filters_are_dropped() {
        let params = MetricQueryParams::default();
        let filter = RawFilter::from_query(&params).normalize(false).unwrap();
        assert_eq!(filter, MetricFilter::ById(IdFilter::default()));
    }

    #[test]
    fn whitespace_and_empty_values_are_trimmed() {
        let params = query_params("false", " 3 , ,4 ");
        let filter = RawFilter::from_query(&params).normalize(false).unwrap();
        assert_eq!(
            filter,
            MetricFilter::ById(IdFilter {
                studies: Some(vec![3, 4]),
                ..Default::default()
            })
        );
    }

    #[test]
    fn post_form_fields_match_get_params() {
        let form = MetricQueryForm {
            byname: Some("false".to_string()),
            study_id: vec!["1".to_string(), "2".to_string()],
            metrictype_id: vec!["84".to_string()],
            ..Default::default()
        };
        let params = MetricQueryParams {
            byname: Some("false".to_string()),
            studies: Some("1,2".to_string()),
            metrictypes: Some("84".to_string()),
            ..Default::default()
        };
        assert_eq!(
            RawFilter::from_form(&form).normalize(false).unwrap(),
            RawFilter::from_query(&params).normalize(false).unwrap(),
        );
    }

    fn sample_row(value: f64) -> MetricValueRow {
        MetricValueRow {
            value,
            metrictype: "snr".to_string(),
            metrictype_id: 84,
            scan_id: 7,
            scan_name: "ABC_CMH_0001_01_01_T1_02".to_string(),
            scan_description: Some("T1 weighted".to_string()),
            scantype: "T1".to_string(),
            scantype_id: 3,
            session_id: 12,
            session_name: "ABC_CMH_0001_01_01".to_string(),
            site_id: 2,
            site_name: "CMH".to_string(),
            study_id: 1,
            study_name: "Study A".to_string(),
        }
    }

    #[test]
    fn csv_header_matches_row_field_order() {
        let csv = to_csv(&[sample_row(1.5)]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "1.5,snr,84,7,ABC_CMH_0001_01_01_T1_02,T1 weighted,T1,3,12,ABC_CMH_0001_01_01,2,CMH,1,Study A"
        );
    }

    #[test]
    fn identical_inputs_produce_identical_csv() {
        let rows = vec![sample_row(1.5), sample_row(2.25)];
        assert_eq!(to_csv(&rows), to_csv(&rows));
    }

    #[test]
    fn csv_fields_are_escaped() {
        let mut row = sample_row(0.5);
        row.scan_description = Some("bad, \"weird\" description".to_string());
        let csv = to_csv(&[row]);
        assert!(csv.contains("\"bad, \"\"weird\"\" description\""));
    }

    #[test]
    fn byname_parsing_is_strict() {
        assert!(parse_byname(Some("true")));
        assert!(parse_byname(Some("True")));
        assert!(parse_byname(Some("1")));
        assert!(!parse_byname(Some("false")));
        assert!(!parse_byname(Some("False")));
        assert!(!parse_byname(Some("0")));
        assert!(!parse_byname(None));
    }
}
