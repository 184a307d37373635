mod core;
mod features;
mod shared;

use crate::core::config::Config;
use crate::core::database;
use crate::core::router::{build_router, AppServices};
use crate::features::coaching::clients::{OpenAIClient, WebhookNotifier};
use crate::features::coaching::CoachingService;
use crate::features::rate_limits::RateLimiter;
use crate::features::usage::{UsagePruner, UsageStore};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let dotenv_error = match dotenvy::dotenv() {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(e) = dotenv_error {
        tracing::warn!("Error loading .env file: {}", e);
    }

    // Every configuration problem is reported at once
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    if config.app.insecure_debug {
        tracing::warn!("INSECURE_DEBUG is on: upstream error details are returned to clients");
    }

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Rate limiting
    let usage_store = Arc::new(UsageStore::new(pool.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.clone(),
        Arc::clone(&usage_store),
    ));
    match (config.rate_limit.hourly_limit, config.rate_limit.daily_limit) {
        (None, None) => tracing::info!("Rate limiting disabled"),
        (hourly, daily) => tracing::info!(
            "Rate limiting enabled: hourly={:?}, daily={:?}, mode={:?}, record_on={:?}",
            hourly,
            daily,
            config.rate_limit.mode,
            config.rate_limit.record_on
        ),
    }

    if config.rate_limit.is_enabled() && !config.usage.prune_interval.is_zero() {
        let pruner = UsagePruner::new(
            Arc::clone(&usage_store),
            Arc::clone(&rate_limiter),
            config.usage.prune_interval,
        );
        tokio::spawn(async move {
            pruner.run().await;
        });
        tracing::info!("Usage pruner worker spawned");
    }

    // Upstream completion client and notifications
    let openai_client = OpenAIClient::new(config.openai.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create OpenAI client: {}", e))?;
    tracing::info!(
        "OpenAI client initialized (model: {}, base url: {})",
        config.openai.model,
        config.openai.base_url
    );

    let webhook = Arc::new(WebhookNotifier::new(&config.webhook));
    if webhook.is_enabled() {
        tracing::info!("Discord webhook notifications enabled");
    }

    let coaching_service = Arc::new(CoachingService::new(
        Arc::clone(&rate_limiter),
        Arc::new(openai_client),
        webhook,
        config.app.insecure_debug,
    ));

    let app = build_router(
        &config,
        AppServices {
            coaching: coaching_service,
            rate_limiter,
        },
    );

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
