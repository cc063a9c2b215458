//! Database models and query functions.

pub mod analyses;
pub mod health;
pub mod metrics;
pub mod models;
pub mod scans;
pub mod sessions;
pub mod studies;
pub mod timepoints;
pub mod users;
