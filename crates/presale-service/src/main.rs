use clap::Parser;
use presale_core::PresaleConfig;
use presale_service::{build_router, ServiceConfig, ServiceState};
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "presaled", version, about = "Token presale recording REST service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8097
    #[arg(long, default_value = "127.0.0.1:8097", env = "PRESALE_LISTEN")]
    listen: SocketAddr,
    /// Comma-separated actors allowed to record purchases.
    #[arg(long, value_delimiter = ',', env = "PRESALE_RECORDER_ACTORS")]
    recorder_actors: Vec<String>,
    /// Comma-separated actors allowed to configure and activate stages.
    #[arg(long, value_delimiter = ',', env = "PRESALE_STAGE_MANAGER_ACTORS")]
    stage_manager_actors: Vec<String>,
    /// Comma-separated actors allowed to finalize the presale.
    #[arg(long, value_delimiter = ',', env = "PRESALE_FINALIZER_ACTORS")]
    finalizer_actors: Vec<String>,
    /// Comma-separated actors allowed to pause, unpause and tune promo limits.
    #[arg(long, value_delimiter = ',', env = "PRESALE_ADMIN_ACTORS")]
    admin_actors: Vec<String>,
    /// Grant every capability to every caller. Meant for local development.
    #[arg(long, default_value_t = false, env = "PRESALE_ALLOW_ALL")]
    allow_all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "presale_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig {
        recorder_actors: cli.recorder_actors,
        stage_manager_actors: cli.stage_manager_actors,
        finalizer_actors: cli.finalizer_actors,
        admin_actors: cli.admin_actors,
        allow_all: cli.allow_all,
        limits: PresaleConfig::default(),
    };
    let state = ServiceState::bootstrap(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("presale-service REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
