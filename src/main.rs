use std::net::SocketAddr;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use clinic_backend::billing::spawn_monthly_charge_scheduler;
use clinic_backend::config::{self, StoreBackend};
use clinic_backend::routes::app;
use clinic_backend::store::Stores;
use clinic_backend::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();

    let stores = match *config::STORE_BACKEND {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Stores::in_memory()
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(config::DATABASE_URL.as_str())
                .await?;

            if let Err(error) = sqlx::migrate!().run(&pool).await {
                if *config::ALLOW_MIGRATION_FAILURE {
                    tracing::warn!(
                        ?error,
                        "Database migrations failed but continuing due to ALLOW_MIGRATION_FAILURE"
                    );
                } else {
                    return Err(Box::new(error) as Box<dyn std::error::Error>);
                }
            }
            Stores::postgres(pool)
        }
    };

    let policy = *config::BOOKING_CONFLICT_POLICY;
    tracing::info!(policy = policy.as_str(), "booking conflict policy");
    let state = AppState::new(stores, policy);

    if *config::BILLING_SCHEDULER_ENABLED {
        let interval = Duration::from_secs(*config::BILLING_SCAN_INTERVAL_SECS);
        spawn_monthly_charge_scheduler(state.billing.clone(), interval);
        tracing::info!(interval_secs = interval.as_secs(), "monthly charge scheduler started");
    }

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let router = app(state)
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .layer(prometheus_layer);

    let addr: SocketAddr = format!("{}:{}", config::BIND_ADDRESS.as_str(), *config::BIND_PORT)
        .parse()
        .map_err(|error| Box::new(error) as Box<dyn std::error::Error>)?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
