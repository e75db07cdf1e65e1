//! The resolution pyramid: [`Level`] and [`LevelSet`].
//!
//! A `LevelSet` is the immutable description of a tiled data source: a fixed
//! sector covered by an ordered sequence of levels whose tile delta halves at
//! every step. Level 0 is the coarsest. Each imagery layer or elevation model
//! owns exactly one `LevelSet`, created once at configuration time.

use crate::geo::Sector;
use thiserror::Error;

/// Errors raised when constructing a [`LevelSet`] from an invalid
/// configuration. These indicate programmer or configuration error and are
/// fatal at construction time, never retried.
#[derive(Debug, Error, PartialEq)]
pub enum LevelSetError {
    #[error("a level set requires at least one level")]
    NoLevels,

    #[error("first level tile delta must be positive, got {0}")]
    InvalidTileDelta(f64),

    #[error("tile pixel dimensions must be positive, got {width}x{height}")]
    InvalidTileDimensions { width: u32, height: u32 },

    #[error("level set sector has zero area")]
    DegenerateSector,
}

pub type LevelSetResult<T> = Result<T, LevelSetError>;

/// One resolution tier of a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    /// Position in the pyramid, 0 = coarsest.
    pub level_number: u32,
    /// Angular width and height of one tile at this level, in degrees.
    pub tile_delta: f64,
    /// Pixel dimensions of a tile's resource at this level.
    pub tile_width: u32,
    pub tile_height: u32,
    /// Grid dimensions of this level over the owning set's sector.
    pub num_rows: u32,
    pub num_columns: u32,
}

impl Level {
    /// Degrees of ground extent represented by one pixel of a tile resource
    /// at this level. This is the quantity compared against a desired
    /// resolution when picking a target level.
    pub fn texel_size(&self) -> f64 {
        self.tile_delta / self.tile_width as f64
    }
}

/// An ordered sequence of [`Level`]s covering a fixed sector.
#[derive(Debug, Clone)]
pub struct LevelSet {
    sector: Sector,
    levels: Vec<Level>,
}

impl LevelSet {
    /// Builds `num_levels` levels starting from `first_level_delta` degrees
    /// per tile at level 0, halving the delta at each subsequent level.
    pub fn new(
        sector: Sector,
        first_level_delta: f64,
        num_levels: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> LevelSetResult<Self> {
        if num_levels == 0 {
            return Err(LevelSetError::NoLevels);
        }
        if !(first_level_delta > 0.0) {
            return Err(LevelSetError::InvalidTileDelta(first_level_delta));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(LevelSetError::InvalidTileDimensions {
                width: tile_width,
                height: tile_height,
            });
        }
        if sector.width() <= 0.0 || sector.height() <= 0.0 {
            return Err(LevelSetError::DegenerateSector);
        }

        let mut levels = Vec::with_capacity(num_levels as usize);
        let mut delta = first_level_delta;
        for level_number in 0..num_levels {
            levels.push(Level {
                level_number,
                tile_delta: delta,
                tile_width,
                tile_height,
                num_rows: (sector.height() / delta).ceil().max(1.0) as u32,
                num_columns: (sector.width() / delta).ceil().max(1.0) as u32,
            });
            delta *= 0.5;
        }

        Ok(Self { sector, levels })
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn num_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn level(&self, level_number: u32) -> Option<&Level> {
        self.levels.get(level_number as usize)
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    pub fn is_last_level(&self, level_number: u32) -> bool {
        level_number + 1 == self.num_levels()
    }

    /// Grid dimensions `(rows, columns)` of the coarsest level.
    pub fn first_level_tile_grid(&self) -> (u32, u32) {
        let first = self.first_level();
        (first.num_rows, first.num_columns)
    }

    /// Returns the coarsest level whose texel size is less than or equal to
    /// the target, never selecting unnecessarily fine detail. A target
    /// exactly equal to a level's texel size selects that level. Targets
    /// finer than the finest level clamp to the last level, the natural
    /// resolution ceiling of the data source.
    pub fn level_for_resolution(&self, target_texel_size: f64) -> &Level {
        self.levels
            .iter()
            .find(|level| level.texel_size() <= target_texel_size)
            .unwrap_or_else(|| self.last_level())
    }
}
