//! Web API module for the scanboard application.

pub mod analyses;
pub mod auth;
pub mod error;
pub mod flash;
pub mod guards;
pub mod health;
pub mod index;
pub mod metric_export;
pub mod middleware;
pub mod redcap;
pub mod routes;
pub mod scans;
pub mod sessions;
pub mod studies;
pub mod timepoints;
pub mod todo;
pub mod users;

pub use routes::*;
