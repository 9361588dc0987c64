use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use clip_ops::agents::DEFAULT_CONTEXT_MAX_AGE_HOURS;
use clip_ops::{create_router, AppState, Config, DatabasePool};

#[derive(Parser)]
#[command(name = "clip-ops", version, about = "LLM orchestration and accounting core")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "CLIP_OPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply database migrations and exit
    Migrate,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default_sqlite()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    clip_ops::observability::init_tracing(&config.logging);

    match cli.command {
        Command::Migrate => {
            let pool = DatabasePool::new(&config.database).await?;
            pool.run_migrations().await?;
            pool.close().await;
            info!("Migrations applied");
            Ok(())
        }
        Command::Serve { bind, port } => {
            let state = AppState::from_config(&config).await?;

            // Sweep stale agent sessions in the background
            let _janitor = state.context_manager.clone().spawn_janitor(
                Duration::from_secs(3600),
                chrono::Duration::hours(DEFAULT_CONTEXT_MAX_AGE_HOURS),
            );

            let api = config.api.as_ref();
            let bind = bind
                .or_else(|| api.map(|a| a.bind.clone()))
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let port = port.or_else(|| api.map(|a| a.port)).unwrap_or(8080);
            let address = format!("{bind}:{port}");

            let router = create_router(Arc::clone(&state));
            let listener = tokio::net::TcpListener::bind(&address)
                .await
                .with_context(|| format!("failed to bind {address}"))?;

            info!(%address, "clip-ops listening");
            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}
