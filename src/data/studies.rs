//! Study queries and landing-page counts.

use anyhow::Result;
use sqlx::PgPool;

use crate::data::models::{Site, Study};

pub async fn get(pool: &PgPool, study_id: i32) -> Result<Option<Study>> {
    sqlx::query_as::<_, Study>(
        "SELECT id, nickname, name, description FROM studies WHERE id = $1",
    )
    .bind(study_id)
    .fetch_optional(pool)
    .await
    .map_err(anyhow::Error::from)
}

pub async fn sites(pool: &PgPool, study_id: i32) -> Result<Vec<Site>> {
    sqlx::query_as::<_, Site>(
        "SELECT s.id, s.name FROM sites s \
         JOIN study_sites ss ON ss.site_id = s.id \
         WHERE ss.study_id = $1 ORDER BY s.name",
    )
    .bind(study_id)
    .fetch_all(pool)
    .await
    .map_err(anyhow::Error::from)
}

/// Counts shown on the landing page.
#[derive(Debug, Clone, Copy)]
pub struct IndexCounts {
    pub studies: i64,
    pub sites: i64,
    pub timepoints: i64,
}

pub async fn index_counts(pool: &PgPool) -> Result<IndexCounts> {
    let (studies,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM studies")
        .fetch_one(pool)
        .await?;
    let (sites,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sites")
        .fetch_one(pool)
        .await?;
    let (timepoints,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM timepoints")
        .fetch_one(pool)
        .await?;
    Ok(IndexCounts {
        studies,
        sites,
        timepoints,
    })
}
