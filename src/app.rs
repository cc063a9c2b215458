use crate::config::Config;
use crate::state::AppState;
use anyhow::Context;
use figment::{providers::Env, Figment};
use sqlx::postgres::PgPoolOptions;
use sqlx::ConnectOptions;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new() -> Result<Self, anyhow::Error> {
        // Load configuration
        let config: Config = Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")?;

        // Create database connection pool
        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 8,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            "database pool established"
        );

        // Run database migrations
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        // Seed the initial dashboard admin if configured
        if let Some(admin_id) = config.seed_admin_id {
            match crate::data::users::ensure_seed_admin(&db_pool, admin_id).await {
                Ok(Some(user)) => {
                    info!(user_id = admin_id, realname = %user.realname, "Seed admin ensured");
                }
                Ok(None) => {
                    warn!(user_id = admin_id, "Seed admin id does not match any user");
                }
                Err(e) => {
                    error!(error = %e, "Failed to seed admin user");
                    return Err(e.context("Failed to seed admin user on startup"));
                }
            }
        }

        let app_state = AppState::new(db_pool, config.clone());

        // Load metric name cache from DB (may be empty on first run)
        if let Err(e) = app_state.load_metric_name_cache().await {
            info!(error = %e, "Could not load metric name cache on startup (may be empty)");
        }

        // Refresh the metric name cache every 30 minutes
        app_state.spawn_metric_name_cache_refresh(Duration::from_secs(30 * 60));

        Ok(App { config, app_state })
    }

    /// Bind the listener and serve until shutdown is requested.
    pub async fn run(self) -> ExitCode {
        let router = crate::web::create_router(self.app_state);
        let addr = format!("0.0.0.0:{}", self.config.port);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, addr = %addr, "Failed to bind listener");
                return ExitCode::FAILURE;
            }
        };

        info!(addr = %addr, "web server listening");

        let serve = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        });

        match serve.await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "web server exited with error");
                ExitCode::FAILURE
            }
        }
    }
}
