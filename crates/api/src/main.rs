//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::{AppStore, Remotes};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{
    EmailSender, InMemoryEmailSender, NotificationPipeline, ShutdownMode, SmtpEmailSender,
    TextInvoiceRenderer,
};
use store::{InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn email_sender(config: &Config) -> Arc<dyn EmailSender> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "using SMTP email sender");
            Arc::new(SmtpEmailSender::new(smtp).expect("invalid SMTP configuration"))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails are recorded in memory only");
            Arc::new(InMemoryEmailSender::new())
        }
    }
}

async fn serve<S: AppStore>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
    pipeline: NotificationPipeline,
) {
    let remotes = Remotes::from_config(&config).expect("failed to build HTTP client");
    let state = api::create_state(
        store,
        remotes,
        Arc::new(pipeline.handle()),
        config.company.clone(),
    );
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // In-flight requests are done; flush what they queued.
    let report = pipeline.shutdown(ShutdownMode::Drain).await;
    tracing::info!(
        processed = report.processed,
        discarded = report.discarded,
        "server shut down gracefully"
    );
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Start the notification pipeline
    let pipeline = NotificationPipeline::start(
        config.pipeline.clone(),
        Arc::new(TextInvoiceRenderer::new(config.invoice_dir.clone())),
        email_sender(&config),
    );

    // 4. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");
            serve(store, config, metrics_handle, pipeline).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle, pipeline).await;
        }
    }
}
