// Main entry point for the FieldLens API server

use std::sync::Arc;

use anyhow::{Context, Result};
use fieldlens_core::domains::jobs::messages::Messages;
use fieldlens_core::domains::jobs::photo_types::ExampleImages;
use fieldlens_core::domains::validation::{LocalValidationPipeline, RemoteValidationPipeline};
use fieldlens_core::kernel::{
    BaseMediaFetcher, BaseNotifier, BaseValidationPipeline, DocumentStore, HttpMediaFetcher,
    LocalBlobStore, LoggingNotifier, MemoryStore, PostgresStore, ServerDeps, TwilioAdapter,
    UrlSigner,
};
use fieldlens_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fieldlens_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FieldLens API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded");

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            let store = PostgresStore::new(pool);
            info!("Running database migrations...");
            store.migrate().await.context("Failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let storage = &config.storage;
    let blobs = Arc::new(LocalBlobStore::new(
        storage.local_dir.clone(),
        UrlSigner::new(storage.public_base_url.clone(), storage.signing_secret.clone()),
    ));
    info!(dir = %storage.local_dir.display(), "Local blob store ready");

    let pipeline: Arc<dyn BaseValidationPipeline> = match &config.analysis_service_url {
        Some(url) => {
            info!(url = %url, "Using remote analysis service");
            Arc::new(RemoteValidationPipeline::new(url.clone())?)
        }
        None => {
            info!("Using local validation pipeline");
            Arc::new(LocalValidationPipeline::new(config.processing.blur_threshold))
        }
    };

    let (notifier, media): (Arc<dyn BaseNotifier>, Arc<dyn BaseMediaFetcher>) =
        match &config.twilio {
            Some(twilio) => {
                if twilio.whatsapp_from.is_none() {
                    warn!("TWILIO_WHATSAPP_FROM not set; outbound replies will fail");
                }
                let service = Arc::new(TwilioService::new(TwilioOptions {
                    account_sid: twilio.account_sid.clone(),
                    auth_token: twilio.auth_token.clone(),
                    from_number: twilio.whatsapp_from.clone().unwrap_or_default(),
                }));
                let notifier: Arc<dyn BaseNotifier> = Arc::new(TwilioAdapter::new(service.clone()));
                let media: Arc<dyn BaseMediaFetcher> = Arc::new(TwilioAdapter::new(service));
                (notifier, media)
            }
            None => {
                warn!("Twilio not configured; outbound messages are logged only");
                let notifier: Arc<dyn BaseNotifier> = Arc::new(LoggingNotifier);
                let media: Arc<dyn BaseMediaFetcher> = Arc::new(HttpMediaFetcher::new()?);
                (notifier, media)
            }
        };

    let deps = ServerDeps::new(
        store,
        blobs,
        pipeline,
        notifier,
        media,
        Messages::new(ExampleImages::new(config.example_image_base_url.clone())),
        config.processing.clone(),
        storage.presign_ttl,
    );

    let app = build_app(deps.clone(), &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for in-flight photo validations...");
    deps.drain_background().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
