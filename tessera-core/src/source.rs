//! Data-source configuration and the filesystem transport.
//!
//! A [`TileSourceConfig`] is what an imagery layer or elevation model hands
//! this engine: the pyramid parameters plus a path template that turns tile
//! coordinates into resource keys. The engine never interprets the key beyond
//! using it for caching and handing it to a [`TileSource`] transport.

use crate::level::{LevelSet, LevelSetResult};
use crate::retrieve::{ResourceKind, RetrieveError, RetrieveResult, TileSource};
use crate::geo::Sector;
use crate::tile::TileAddress;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_sector() -> Sector {
    Sector::full_sphere()
}

fn default_tile_size() -> u32 {
    512
}

fn default_kind() -> ResourceKind {
    ResourceKind::Imagery
}

fn default_path_template() -> String {
    "{name}/{level}/{row}/{column}".to_string()
}

/// Configuration of one tiled data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSourceConfig {
    /// Source name, substituted into the path template.
    pub name: String,

    /// Angular tile size in degrees at level 0.
    pub first_level_delta: f64,

    /// Number of pyramid levels.
    pub num_levels: u32,

    /// Geographic coverage, the whole globe by default.
    #[serde(default = "default_sector")]
    pub sector: Sector,

    #[serde(default = "default_tile_size")]
    pub tile_width: u32,

    #[serde(default = "default_tile_size")]
    pub tile_height: u32,

    #[serde(default = "default_kind")]
    pub kind: ResourceKind,

    /// Template with `{name}`, `{level}`, `{row}`, `{column}` placeholders.
    #[serde(default = "default_path_template")]
    pub path_template: String,

    /// Resource cache capacity in bytes; defaults depend on the resource
    /// kind when absent.
    #[serde(default)]
    pub cache_capacity: Option<u64>,
}

impl TileSourceConfig {
    /// Builds the immutable resolution pyramid this source describes.
    pub fn level_set(&self) -> LevelSetResult<LevelSet> {
        LevelSet::new(
            self.sector,
            self.first_level_delta,
            self.num_levels,
            self.tile_width,
            self.tile_height,
        )
    }

    /// The resource path for one tile, the `urlForTile` strategy of this
    /// source. Doubles as the cache key.
    pub fn tile_path(&self, address: &TileAddress) -> String {
        self.path_template
            .replace("{name}", &self.name)
            .replace("{level}", &address.level_number().to_string())
            .replace("{row}", &address.row().to_string())
            .replace("{column}", &address.column().to_string())
    }

    /// Effective cache capacity: the configured value, or a resolution-class
    /// default (tens of MB for imagery, single-digit MB for elevation).
    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity.unwrap_or(match self.kind {
            ResourceKind::Imagery => 64 * 1024 * 1024,
            ResourceKind::Elevation => 4 * 1024 * 1024,
        })
    }
}

/// A [`TileSource`] that resolves tile paths beneath a root directory. The
/// CLI's transport, and the test double for the retrieval pipeline.
pub struct FileTileSource {
    root: PathBuf,
}

impl FileTileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TileSource for FileTileSource {
    fn fetch(&self, path: &str) -> RetrieveResult<Vec<u8>> {
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(RetrieveError::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
