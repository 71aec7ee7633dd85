use anyhow::Context;
use quickmeds_api::{
    config, db,
    events::{create_event_channel, process_events},
    services::payments::{DisabledGateway, PaymentGateway, RazorpayGateway},
    services::NotificationService,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;

    init_tracing(&config);
    info!(
        "Starting quickmeds-api in {} mode",
        config.environment
    );

    let db_config = db::DbConfig::from_app_config(&config);
    let db = Arc::new(
        db::establish_connection_with_config(&db_config)
            .await
            .context("failed to connect to database")?,
    );

    if config.auto_migrate {
        db::run_migrations(&db).await.context("migrations failed")?;
    }

    let gateway: Arc<dyn PaymentGateway> =
        match (&config.razorpay_key_id, &config.razorpay_key_secret) {
            (Some(key_id), Some(key_secret)) => Arc::new(RazorpayGateway::new(
                key_id.clone(),
                key_secret.clone(),
                Duration::from_secs(config.gateway_timeout_secs),
            )),
            _ => {
                warn!("Razorpay credentials not set; online payment is disabled");
                Arc::new(DisabledGateway)
            }
        };

    let (event_sender, event_rx) = create_event_channel(EVENT_CHANNEL_CAPACITY);
    let notifications = NotificationService::new(&config.redis_url)
        .context("failed to create notification service")?;
    tokio::spawn(process_events(event_rx, notifications));

    let addr = config.server_addr();
    let state = Arc::new(AppState::new(
        db,
        Arc::new(config),
        Arc::new(event_sender),
        gateway,
    ));

    let app = quickmeds_api::app_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &config::AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
