pub mod combine;
pub mod ingest;
pub mod simulate;

use std::path::Path;
use tracing::debug;

use portfolio_mc_core::storage::{LocalMetadataStore, LocalObjectStore};
use portfolio_mc_core::SimulationConfig;

use crate::input;

/// Validated configuration plus the filesystem stores every command works on.
pub struct Workspace {
    pub config: SimulationConfig,
    pub objects: LocalObjectStore,
    pub metadata: LocalMetadataStore,
}

impl Workspace {
    /// Load the configuration from `config_path`, else piped stdin, else
    /// defaults, and open the stores under `store_dir`.
    pub fn open(
        config_path: Option<&str>,
        store_dir: &Path,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: SimulationConfig = if let Some(path) = config_path {
            input::file::read_config(path)?
        } else if let Some(data) = input::stdin::read_stdin()? {
            serde_json::from_value(data)?
        } else {
            SimulationConfig::default()
        };
        if seed.is_some() {
            config.seed = seed;
        }
        config.validate()?;
        debug!(
            store_dir = %store_dir.display(),
            bucket = %config.bucket,
            assets = config.assets.len(),
            "Opened workspace"
        );

        Ok(Workspace {
            config,
            objects: LocalObjectStore::new(store_dir.join("objects")),
            metadata: LocalMetadataStore::new(store_dir.join("metadata")),
        })
    }
}
