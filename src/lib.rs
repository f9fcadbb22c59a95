// src/lib.rs
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// --- Declare modules ---
pub mod app;
mod config;
pub mod form;
pub mod locate;
pub mod map;
pub mod notice;
pub mod render;
pub mod storage;
pub mod workout;

// --- Expose public types ---
pub use app::{AppError, Banner, Marker, SortKey, WorkoutApp};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, ConfigError, StandardColor, ThemeConfig,
};
pub use form::{FieldVisibility, FormField, FormState, FormValues, ValidationError};
pub use locate::{FixedPosition, GeolocationError, GeolocationProvider};
pub use map::{Bounds, MapAdapter, MarkerHandle, MemoryMap, Popup};
pub use storage::{
    get_db_path as get_db_path_util, KeyValueStore, MemoryStore, Persistence, SqliteStore,
    StorageError,
};
pub use workout::{Coords, Workout, WorkoutId, WorkoutKind, WorkoutType};

/// A controller backed by the on-disk store, plus where its files live.
pub struct AppService {
    pub config: Config,
    pub app: WorkoutApp<MemoryMap, SqliteStore>,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService {
    /// Loads config, opens the store and restores the saved workouts.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or opening fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {config_path:?}"))?;

        let db_path = storage::get_db_path().context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        let mut app = WorkoutApp::new(MemoryMap::new(), store, &config);
        app.restore();

        Ok(Self {
            config,
            app,
            db_path,
            config_path,
        })
    }

    /// Resolves the map position: an explicit override first, then the configured home.
    pub fn locate(&mut self, position_override: Option<Coords>) {
        let provider = FixedPosition(position_override.or(self.config.home));
        self.app.locate(&provider);
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}
