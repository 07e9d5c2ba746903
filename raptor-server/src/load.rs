//! Loading schedules and settings from disk.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::access::{BeelineRouter, CacheFileError, GridConfig};
use crate::cache::CacheConfig;
use crate::planner::{ConfigError, RaptorConfig};
use crate::schedule::{CompiledSchedule, RawSchedule, ScheduleError};

/// Error loading input files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    GridCache(#[from] CacheFileError),
}

/// Everything read from the settings file.
///
/// Search parameters sit under `raptor`, the access grid layout under
/// `grid` and the connection cache size under `cache`. Every section may
/// be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub raptor: RaptorConfig,
    pub grid: GridConfig,
    pub cache: CacheConfig,
}

impl Settings {
    /// Read and validate a settings file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let settings: Settings = read_json(path)?;
        settings.raptor.validate()?;
        info!(
            path = %path.display(),
            mode_to_mode_penalties = settings.raptor.uses_mode_to_mode_penalties(),
            intermodal = settings.raptor.intermodal.enabled,
            "loaded settings"
        );
        Ok(settings)
    }

    /// Beeline router for the configured feeder profiles.
    pub fn feeder_router(&self) -> BeelineRouter {
        BeelineRouter::new(self.raptor.intermodal.profiles.iter().cloned())
    }
}

/// Read and compile a schedule file.
pub fn load_schedule(path: &Path, config: &RaptorConfig) -> Result<CompiledSchedule, LoadError> {
    let raw: RawSchedule = read_json(path)?;
    info!(
        path = %path.display(),
        stops = raw.stops.len(),
        lines = raw.lines.len(),
        "loaded schedule"
    );
    Ok(CompiledSchedule::compile(&raw, config)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.display().to_string(),
        source,
    })
}
