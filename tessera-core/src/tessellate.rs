//! Per-frame quadtree tessellation.
//!
//! Each frame the [`Tessellator`] walks the pyramid depth-first against the
//! current view. Two gates decide each tile's fate: the visibility gate
//! prunes branches whose sector misses the view frustum, and the refinement
//! gate compares the tile's texel footprint against the screen pixel
//! footprint at the eye distance, descending while the tile is too coarse
//! and a finer level exists. The result is the frame's working set, ordered
//! coarse-to-fine so fallback imagery composites painter's-algorithm style.
//!
//! The traversal carries no state between frames beyond the cache contents;
//! every frame is a fresh walk, so correctness never depends on the previous
//! frame's tree shape.

use crate::cache::MemoryCache;
use crate::geo::{Position, Sector, EARTH_RADIUS_M};
use crate::level::{LevelSet, LevelSetResult};
use crate::retrieve::TileResource;
use crate::source::TileSourceConfig;
use crate::stats::FrameStatistics;
use crate::tile::{TextureTile, TileAddress, TileResult};
use log::trace;

/// Visibility seam: the renderer supplies the frustum test, typically by
/// projecting sectors to Cartesian extents. This crate only needs the
/// boolean answer.
pub trait ViewFrustum {
    fn intersects(&self, sector: &Sector) -> bool;
}

/// A frustum expressed as a visible geographic region, sufficient for
/// headless use and testing.
#[derive(Debug, Clone)]
pub struct RegionFrustum {
    region: Sector,
}

impl RegionFrustum {
    pub fn new(region: Sector) -> Self {
        Self { region }
    }

    /// A square region of the given angular radius around a point, clipped
    /// to valid coordinates. A crude stand-in for a real frustum footprint.
    pub fn centered_on(latitude: f64, longitude: f64, radius_degrees: f64) -> Self {
        let region = Sector {
            min_latitude: (latitude - radius_degrees).max(-90.0),
            max_latitude: (latitude + radius_degrees).min(90.0),
            min_longitude: (longitude - radius_degrees).max(-180.0),
            max_longitude: (longitude + radius_degrees).min(180.0),
        };
        Self { region }
    }
}

impl ViewFrustum for RegionFrustum {
    fn intersects(&self, sector: &Sector) -> bool {
        self.region.intersects(sector)
    }
}

/// Everything the traversal needs to know about the current view.
pub struct FrameContext<'a> {
    pub eye: Position,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Vertical field of view in degrees.
    pub field_of_view: f64,
    /// Quality knob: 1.0 targets one texel per pixel, larger values accept
    /// coarser imagery.
    pub detail_factor: f64,
    pub frustum: &'a dyn ViewFrustum,
}

impl FrameContext<'_> {
    /// Ground size in meters covered by one screen pixel at the given eye
    /// distance, from the vertical field of view.
    pub fn pixel_size_at(&self, distance: f64) -> f64 {
        2.0 * distance * (0.5 * self.field_of_view.to_radians()).tan()
            / self.viewport_height as f64
    }
}

/// Walks one data source's pyramid each frame, producing the working set of
/// texture tiles to draw.
pub struct Tessellator {
    config: TileSourceConfig,
    levels: LevelSet,
}

impl Tessellator {
    pub fn new(config: TileSourceConfig) -> LevelSetResult<Self> {
        let levels = config.level_set()?;
        Ok(Self { config, levels })
    }

    pub fn level_set(&self) -> &LevelSet {
        &self.levels
    }

    pub fn config(&self) -> &TileSourceConfig {
        &self.config
    }

    /// Produces this frame's working set: visible tiles refined until their
    /// resolution suffices for the view or the pyramid bottoms out, ordered
    /// by level, coarse first. Consults the resource cache to attach the
    /// nearest resident ancestor as each tile's fallback.
    pub fn tessellate(
        &self,
        frame: &FrameContext<'_>,
        resources: &MemoryCache<TileResource>,
        stats: &FrameStatistics,
    ) -> TileResult<Vec<TextureTile>> {
        let mut working_set = Vec::new();
        let (rows, columns) = self.levels.first_level_tile_grid();
        for row in 0..rows {
            for column in 0..columns {
                let address = TileAddress::new(&self.levels, 0, row, column)?;
                self.traverse(address, frame, resources, stats, &mut working_set)?;
            }
        }

        // Depth-first emission interleaves levels across branches; painter's
        // order wants strictly coarse-to-fine.
        working_set.sort_by_key(|tile| tile.address.level_number());
        stats.add_tiles_rendered(working_set.len() as u64);
        Ok(working_set)
    }

    fn traverse(
        &self,
        address: TileAddress,
        frame: &FrameContext<'_>,
        resources: &MemoryCache<TileResource>,
        stats: &FrameStatistics,
        working_set: &mut Vec<TextureTile>,
    ) -> TileResult<()> {
        // Visibility gate: prune the whole branch, children are never built.
        if !frame.frustum.intersects(address.sector()) {
            stats.inc_tiles_culled();
            return Ok(());
        }

        // Refinement gate: emit when the tile resolves finely enough for the
        // eye distance, or when the pyramid has nothing finer to offer.
        if self.meets_resolution(&address, frame) || self.levels.is_last_level(address.level_number())
        {
            working_set.push(self.emit(address, resources));
            return Ok(());
        }

        for child in address.subdivide(&self.levels)? {
            self.traverse(child, frame, resources, stats, working_set)?;
        }
        Ok(())
    }

    /// True when the tile's texel footprint on the ground is no larger than
    /// the screen pixel footprint at its distance, scaled by the detail
    /// factor.
    fn meets_resolution(&self, address: &TileAddress, frame: &FrameContext<'_>) -> bool {
        let Some(level) = self.levels.level(address.level_number()) else {
            return true;
        };
        let texel_meters = level.texel_size().to_radians() * EARTH_RADIUS_M;
        let distance = address.sector().distance_to(&frame.eye);
        let tolerated = frame.pixel_size_at(distance) * frame.detail_factor;
        trace!(
            "tile {}/{}/{}: texel {texel_meters:.1}m vs tolerated {tolerated:.1}m",
            address.level_number(),
            address.row(),
            address.column()
        );
        texel_meters <= tolerated
    }

    /// Builds the emitted tile, attaching the nearest ancestor whose resource
    /// is resident as its fallback. The presence probe deliberately does not
    /// promote the entry; promotion happens if the fallback actually binds.
    fn emit(&self, address: TileAddress, resources: &MemoryCache<TileResource>) -> TextureTile {
        let mut tile = TextureTile::new(address.clone(), self.config.tile_path(&address));

        let mut cursor = address.parent(&self.levels);
        while let Some(ancestor) = cursor {
            let path = self.config.tile_path(&ancestor);
            if resources.contains(&path) {
                tile.set_fallback(TextureTile::new(ancestor, path));
                break;
            }
            cursor = ancestor.parent(&self.levels);
        }
        tile
    }
}
