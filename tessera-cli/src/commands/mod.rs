pub mod prefetch;
pub mod probe;

use anyhow::{Context, Result};
use std::path::Path;
use tessera_core::TileSourceConfig;

/// Loads a tile source configuration from a JSON document.
pub fn load_source_config(path: &Path) -> Result<TileSourceConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source config: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse source config: {}", path.display()))
}
