use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use raptor_server::access::{AccessEgressProvider, GridAccessEgressCache, LiveRouting};
use raptor_server::load::{LoadError, Settings, load_schedule};
use raptor_server::web::{AppState, create_router};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Default listen address.
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("RAPTOR_SCHEDULE must name a schedule file")]
    MissingSchedule,

    #[error("invalid RAPTOR_ADDR {0}")]
    InvalidAddr(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let schedule_path = std::env::var_os("RAPTOR_SCHEDULE")
        .map(PathBuf::from)
        .ok_or(StartupError::MissingSchedule)?;
    let settings = match std::env::var_os("RAPTOR_CONFIG") {
        Some(path) => Settings::load(&PathBuf::from(path))?,
        None => Settings::default(),
    };
    let addr_text = std::env::var("RAPTOR_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = addr_text
        .parse()
        .map_err(|_| StartupError::InvalidAddr(addr_text.clone()))?;

    let schedule = load_schedule(&schedule_path, &settings.raptor)?;

    let provider: Arc<dyn AccessEgressProvider> = match std::env::var_os("RAPTOR_GRID_CACHE") {
        Some(path) => {
            let grid = GridAccessEgressCache::read(
                &PathBuf::from(path),
                &schedule,
                settings.grid.clone(),
                settings.feeder_router(),
            )
            .map_err(LoadError::from)?;
            if grid.is_empty() {
                warn!("access grid has no stops; feeder legs are routed live");
            }
            Arc::new(grid)
        }
        None => Arc::new(LiveRouting::new(settings.feeder_router())),
    };

    let state = AppState::new(schedule, settings.raptor, provider, &settings.cache);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "journey planner listening");
    axum::serve(listener, app).await?;
    Ok(())
}
