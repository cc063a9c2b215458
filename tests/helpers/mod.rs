//! Shared seed helpers for integration tests.
//!
//! Each helper inserts one row and returns its id so tests can build up the
//! study → timepoint → session → scan hierarchy they need.

#![allow(dead_code)]

use sqlx::PgPool;

pub async fn seed_user(pool: &PgPool, realname: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO users (realname) VALUES ($1) RETURNING id")
        .bind(realname)
        .fetch_one(pool)
        .await
        .expect("failed to seed user")
}

pub async fn seed_admin(pool: &PgPool, realname: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO users (realname, is_admin) VALUES ($1, TRUE) RETURNING id")
        .bind(realname)
        .fetch_one(pool)
        .await
        .expect("failed to seed admin")
}

pub async fn seed_study(pool: &PgPool, nickname: &str, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO studies (nickname, name) VALUES ($1, $2) RETURNING id")
        .bind(nickname)
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("failed to seed study")
}

pub async fn seed_site(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO sites (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("failed to seed site")
}

pub async fn grant_access(pool: &PgPool, study_id: i32, user_id: i32, is_admin: bool) {
    sqlx::query("INSERT INTO study_users (study_id, user_id, is_admin) VALUES ($1, $2, $3)")
        .bind(study_id)
        .bind(user_id)
        .bind(is_admin)
        .execute(pool)
        .await
        .expect("failed to grant access");
}

pub async fn seed_timepoint(pool: &PgPool, id: &str, study_id: i32, site_id: i32) {
    sqlx::query("INSERT INTO timepoints (id, study_id, site_id) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(study_id)
        .bind(site_id)
        .execute(pool)
        .await
        .expect("failed to seed timepoint");
}

pub async fn seed_session(pool: &PgPool, timepoint_id: &str, num: i32, name: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO sessions (timepoint_id, num, name) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(timepoint_id)
    .bind(num)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("failed to seed session")
}

pub async fn seed_scantype(pool: &PgPool, name: &str) -> i32 {
    sqlx::query_scalar("INSERT INTO scantypes (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("failed to seed scantype")
}

pub async fn seed_scan(pool: &PgPool, session_id: i32, scantype_id: i32, name: &str) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO scans (session_id, scantype_id, name) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(session_id)
    .bind(scantype_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("failed to seed scan")
}

pub async fn seed_metrictype(pool: &PgPool, name: &str, scantype_id: i32) -> i32 {
    sqlx::query_scalar("INSERT INTO metrictypes (name, scantype_id) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(scantype_id)
        .fetch_one(pool)
        .await
        .expect("failed to seed metrictype")
}

pub async fn seed_metric_value(pool: &PgPool, scan_id: i32, metrictype_id: i32, value: f64) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO metric_values (scan_id, metrictype_id, value) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(scan_id)
    .bind(metrictype_id)
    .bind(value)
    .fetch_one(pool)
    .await
    .expect("failed to seed metric value")
}

/// Build the full study → timepoint → session → scan chain with one metric
/// value attached, returning the interesting ids.
pub struct MetricFixture {
    pub study_id: i32,
    pub site_id: i32,
    pub session_id: i32,
    pub scan_id: i32,
    pub scantype_id: i32,
    pub metrictype_id: i32,
}

pub async fn seed_metric_chain(
    pool: &PgPool,
    study_nickname: &str,
    site_name: &str,
    timepoint_id: &str,
    session_name: &str,
    metric_name: &str,
    value: f64,
) -> MetricFixture {
    let study_id = seed_study(pool, study_nickname, &format!("{study_nickname} Study")).await;
    let site_id = seed_site(pool, site_name).await;
    seed_timepoint(pool, timepoint_id, study_id, site_id).await;
    let session_id = seed_session(pool, timepoint_id, 1, session_name).await;
    let scantype_id = seed_scantype(pool, &format!("{study_nickname}-T1")).await;
    let scan_id = seed_scan(
        pool,
        session_id,
        scantype_id,
        &format!("{session_name}_T1_02"),
    )
    .await;
    let metrictype_id = seed_metrictype(pool, metric_name, scantype_id).await;
    seed_metric_value(pool, scan_id, metrictype_id, value).await;

    MetricFixture {
        study_id,
        site_id,
        session_id,
        scan_id,
        scantype_id,
        metrictype_id,
    }
}
