use std::net::SocketAddr;
use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promopass::api;
use promopass::api::middleware::session::AppState;
use promopass::config::Config;
use promopass::db;
use promopass::jobs::expiry_sweep;
use promopass::services::notifier::{LogNotifier, Notifier};
use promopass::services::pin_session::SessionSigner;
use promopass::store::{PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "promopass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting promopass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let signer = Arc::new(SessionSigner::new(&config.session_secret));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    // Hourly sweep keeps the stored status column in step with expiry
    let scheduler = JobScheduler::new().await?;
    let sweep_store = Arc::clone(&store);
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_id, _scheduler| {
            let store = Arc::clone(&sweep_store);
            Box::pin(async move {
                if let Err(e) = expiry_sweep::sweep_expired_coupons(store.as_ref()).await {
                    tracing::error!(error = %e, "Expiry sweep failed");
                }
            })
        })?)
        .await?;
    scheduler.start().await?;
    tracing::info!("Expiry sweep scheduled");

    // Build application state and router
    let state = AppState {
        store,
        signer,
        notifier,
        admin_api_key: config.admin_api_key.clone(),
    };
    let app = api::app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
