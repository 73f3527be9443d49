use clap::Parser;
use dotenvy::dotenv;
use showroom_backend::config::AppConfig;
use showroom_backend::models::RecordKind;
use showroom_backend::infrastructure::{records, storage};
use showroom_backend::services::session_sweeper::SessionSweeper;
use showroom_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Use the development profile (in-memory records, short idle timeout)
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showroom_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if args.dev {
        AppConfig::development()
    } else {
        AppConfig::from_env()
    };

    info!(
        "🚀 Starting Showroom Backend [profile: {}]...",
        if args.dev { "development" } else { "env" }
    );
    info!(
        "🛡️  Limits: {} image(s) per entry, {} per vehicle, {}MB per image, close={:?}",
        config.max_images_for(RecordKind::Documentation),
        config.max_images_for(RecordKind::Vehicle),
        config.max_image_size / 1024 / 1024,
        config.close_behavior
    );
    if config.uses_default_secret() {
        warn!("⚠️  JWT_SECRET is not set, using the insecure development default");
    }

    // 2. Setup Infrastructure
    let record_store = records::setup_record_store(&config)?;
    let object_storage = storage::setup_storage(&config).await?;
    let state = AppState::new(config.clone(), record_store, object_storage)?;

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // 4. Idle form sweeper
    let sweeper = SessionSweeper::new(
        state.forms.clone(),
        Duration::from_secs(config.session_idle_minutes * 60),
        Duration::from_secs(config.sweep_interval_secs),
        shutdown_rx,
    );
    let sweeper_handle = tokio::spawn(sweeper.run());
    info!("👷 Session sweeper initialized.");

    // 5. API Service
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri().path());
        })
        .on_response(
            |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    // 6. Tear down open forms and their previews
    info!("🛑 Shutting down backend services...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        error!("❌ Session sweeper did not stop cleanly: {}", e);
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
