use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use langblog::auth::{password, session, users};
use langblog::config::{Cli, Command, Config};
use langblog::state::{AppState, DbPool};
use langblog::{db, rate_limit, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateAdmin {
            email,
            name,
            password,
        } => {
            let hash = password::hash(password, config.auth.password_cost).await?;
            let conn = pool.get()?;
            let admin = users::upsert_admin(&conn, &email, &name, &hash)?;
            tracing::info!(user_id = %admin.id, email = %admin.email, "Admin user ready");
            Ok(())
        }
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    {
        let conn = pool.get()?;
        let purged = session::purge_expired(&conn)?;
        if purged > 0 {
            tracing::info!("Purged {} expired sessions", purged);
        }
    }

    let state = AppState::new(pool, config.clone());

    let sweeper = config.rate_limit.enabled.then(|| {
        rate_limit::spawn_sweeper(
            vec![state.limits.api.clone(), state.limits.auth.clone()],
            Duration::from_secs(config.rate_limit.sweep_interval_secs),
        )
    });

    let app = routes::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("HTTP server closed");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received: closing HTTP server"),
        _ = terminate => tracing::info!("SIGTERM received: closing HTTP server"),
    }
}
