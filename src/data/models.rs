//! Shared row types mapped with `sqlx::FromRow`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub realname: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub has_phi: bool,
    pub is_active: bool,
    pub github_name: Option<String>,
    pub gitlab_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Study {
    pub id: i32,
    pub nickname: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Site {
    pub id: i32,
    pub name: String,
}

/// A study access grant. `is_admin` unlocks destructive operations scoped to
/// the study.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudyUser {
    pub study_id: i32,
    pub user_id: i32,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Timepoint {
    pub id: String,
    pub study_id: i32,
    pub site_id: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimepointComment {
    pub id: i32,
    pub timepoint_id: String,
    pub user_id: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IncidentalFinding {
    pub id: i32,
    pub timepoint_id: String,
    pub user_id: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: i32,
    pub timepoint_id: String,
    pub num: i32,
    pub name: String,
    pub signed_off_by: Option<i32>,
    pub signed_off_at: Option<DateTime<Utc>>,
    pub gh_issue: Option<i32>,
    pub redcap_record: Option<String>,
    pub redcap_url: Option<String>,
    pub redcap_version: Option<String>,
    pub redcap_projectid: Option<String>,
    pub redcap_eventid: Option<String>,
    pub redcap_instrument: Option<String>,
    pub redcap_comment: Option<String>,
    pub redcap_dismissed: bool,
    pub missing_scans_ignored_by: Option<i32>,
    pub missing_scans_comment: Option<String>,
    pub missing_scans_ignored_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Scan {
    pub id: i32,
    pub session_id: i32,
    pub scantype_id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Blacklist reason; `None` means the scan is not blacklisted.
    pub bl_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScanComment {
    pub id: i32,
    pub scan_id: i32,
    pub user_id: i32,
    pub analysis_id: Option<i32>,
    pub excluded: bool,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Analysis {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub software: Option<String>,
}
