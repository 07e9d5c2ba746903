//! Precompute the access/egress grid cache for a schedule.
//!
//! Usage: `build-access-grid <schedule.json> <settings.json> <out[.gz]>`

use std::path::PathBuf;
use std::time::Instant;

use raptor_server::access::{CacheFileError, GridAccessEgressCache};
use raptor_server::load::{LoadError, Settings, load_schedule};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum BuildError {
    #[error("usage: build-access-grid <schedule.json> <settings.json> <out[.gz]>")]
    Usage,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Write(#[from] CacheFileError),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(std::env::args().skip(1).collect()) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Vec<String>) -> Result<(), BuildError> {
    let [schedule_path, settings_path, out_path] = <[String; 3]>::try_from(args)
        .map_err(|_| BuildError::Usage)?
        .map(PathBuf::from);

    let settings = Settings::load(&settings_path)?;
    let schedule = load_schedule(&schedule_path, &settings.raptor)?;

    let started = Instant::now();
    let grid = GridAccessEgressCache::precompute(
        &schedule,
        settings.grid.clone(),
        settings.feeder_router(),
    );
    info!(
        stops = grid.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "grid computed"
    );

    grid.write(&out_path)?;
    Ok(())
}
