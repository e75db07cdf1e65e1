//! Tile addressing and the resource tile variants.
//!
//! A [`TileAddress`] is the (sector, level, row, column) tuple that identifies
//! one tile of a pyramid. Addresses are constructed on demand during
//! traversal and are cheap: no I/O, no allocation beyond the struct itself.
//! Only the *resources* tiles refer to are cached, keyed by the path string
//! derived from the address.
//!
//! [`TextureTile`] and [`ElevationTile`] pair an address with its resource
//! path by composition rather than inheritance; the fallback protocol is the
//! [`Bindable`] trait.

use crate::draw::{DrawContext, TextureTransform};
use crate::geo::Sector;
use crate::level::LevelSet;
use std::hash::{Hash, Hasher};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TileError {
    #[error("level {level} out of range, pyramid has {num_levels} levels")]
    LevelOutOfRange { level: u32, num_levels: u32 },

    #[error("row {row} out of range, level has {num_rows} rows")]
    RowOutOfRange { row: u32, num_rows: u32 },

    #[error("column {column} out of range, level has {num_columns} columns")]
    ColumnOutOfRange { column: u32, num_columns: u32 },

    #[error("level {0} is the finest level, cannot subdivide")]
    NoFinerLevel(u32),
}

pub type TileResult<T> = Result<T, TileError>;

/// Identity and spatial footprint of one tile in a pyramid.
///
/// Equality and hashing use `(level, row, column)` only: the sector is a
/// deterministic function of those coordinates and the owning level set.
#[derive(Debug, Clone)]
pub struct TileAddress {
    sector: Sector,
    level_number: u32,
    row: u32,
    column: u32,
}

impl PartialEq for TileAddress {
    fn eq(&self, other: &Self) -> bool {
        self.level_number == other.level_number
            && self.row == other.row
            && self.column == other.column
    }
}

impl Eq for TileAddress {}

impl Hash for TileAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level_number.hash(state);
        self.row.hash(state);
        self.column.hash(state);
    }
}

impl TileAddress {
    /// Builds the address of the tile at `(row, column)` of the given level,
    /// deriving its sector from the level set's origin. Row 0 sits at the
    /// southern edge, column 0 at the western edge.
    pub fn new(levels: &LevelSet, level_number: u32, row: u32, column: u32) -> TileResult<Self> {
        let level = levels.level(level_number).ok_or(TileError::LevelOutOfRange {
            level: level_number,
            num_levels: levels.num_levels(),
        })?;
        if row >= level.num_rows {
            return Err(TileError::RowOutOfRange {
                row,
                num_rows: level.num_rows,
            });
        }
        if column >= level.num_columns {
            return Err(TileError::ColumnOutOfRange {
                column,
                num_columns: level.num_columns,
            });
        }

        let origin = levels.sector();
        let min_latitude = origin.min_latitude + row as f64 * level.tile_delta;
        let min_longitude = origin.min_longitude + column as f64 * level.tile_delta;
        // Edge tiles of a grid that does not divide evenly are clipped to the
        // level set's sector.
        let sector = Sector {
            min_latitude,
            max_latitude: (min_latitude + level.tile_delta).min(origin.max_latitude),
            min_longitude,
            max_longitude: (min_longitude + level.tile_delta).min(origin.max_longitude),
        };

        Ok(Self {
            sector,
            level_number,
            row,
            column,
        })
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// The cache key for this tile's resource under a source-specific prefix,
    /// in the conventional `prefix/level/row/column` form.
    pub fn cache_path(&self, prefix: &str) -> String {
        format!(
            "{prefix}/{}/{}/{}",
            self.level_number, self.row, self.column
        )
    }

    /// The ancestor address one level up, or `None` at level 0.
    pub fn parent(&self, levels: &LevelSet) -> Option<TileAddress> {
        if self.level_number == 0 {
            return None;
        }
        TileAddress::new(levels, self.level_number - 1, self.row / 2, self.column / 2).ok()
    }

    /// Splits this tile into its children at the next finer level,
    /// partitioning the sector. Pure and side-effect free.
    ///
    /// Children are ordered `[SW, SE, NW, NE]`; child row/column are
    /// `2*row + {0,1}` and `2*column + {0,1}`, with sectors derived exactly
    /// as [`TileAddress::new`] derives them, so a child's footprint always
    /// agrees with its coordinates. A clipped edge tile of a grid that does
    /// not divide evenly yields fewer than four children: quadrants falling
    /// outside the child level's grid are skipped.
    pub fn subdivide(&self, levels: &LevelSet) -> TileResult<Vec<TileAddress>> {
        if levels.is_last_level(self.level_number) {
            return Err(TileError::NoFinerLevel(self.level_number));
        }

        let child_level = self.level_number + 1;
        let mut children = Vec::with_capacity(4);
        for (dr, dc) in [(0u32, 0u32), (0, 1), (1, 0), (1, 1)] {
            match TileAddress::new(levels, child_level, 2 * self.row + dr, 2 * self.column + dc) {
                Ok(child) => children.push(child),
                Err(TileError::RowOutOfRange { .. }) | Err(TileError::ColumnOutOfRange { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(children)
    }

    /// Estimated in-memory footprint of the address itself, used for cache
    /// accounting. The externally cached resource is accounted separately
    /// when it enters the resource cache.
    pub fn estimated_size(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
    }
}

/// Anything that can bind a drawable resource for the current frame.
pub trait Bindable {
    /// Returns true when a usable resource, the tile's own or a fallback's,
    /// was bound to the draw context.
    fn bind(&self, dc: &mut DrawContext<'_>) -> bool;
}

/// An imagery tile: an address plus the resource cache key of its image,
/// and optionally a coarser ancestor to substitute while the image is absent.
#[derive(Debug, Clone)]
pub struct TextureTile {
    pub address: TileAddress,
    pub image_path: String,
    /// Nearest ancestor known to be resident when this tile was emitted.
    /// Used only for rendering substitution, assigned fresh every frame.
    pub fallback: Option<Box<TextureTile>>,
}

impl TextureTile {
    pub fn new(address: TileAddress, image_path: String) -> Self {
        Self {
            address,
            image_path,
            fallback: None,
        }
    }

    pub fn set_fallback(&mut self, fallback: TextureTile) {
        self.fallback = Some(Box::new(fallback));
    }

    pub fn estimated_size(&self) -> u64 {
        let own = std::mem::size_of::<Self>() as u64 + self.image_path.len() as u64;
        own + self
            .fallback
            .as_ref()
            .map_or(0, |fallback| fallback.estimated_size())
    }

    /// The texture-coordinate remap that crops the given ancestor's image to
    /// this tile's sector: scale `1/2^k` for a `k`-level offset, offset from
    /// this tile's position within the ancestor's `2^k x 2^k` descendant grid.
    pub fn fallback_transform(&self, ancestor: &TileAddress) -> TextureTransform {
        debug_assert!(ancestor.level_number() < self.address.level_number());
        let k = self.address.level_number() - ancestor.level_number();
        let n = 1u64 << k;
        let scale = 1.0 / n as f64;
        let column_offset = self.address.column() as u64 - ancestor.column() as u64 * n;
        let row_offset = self.address.row() as u64 - ancestor.row() as u64 * n;
        TextureTransform {
            scale_x: scale,
            scale_y: scale,
            offset_x: column_offset as f64 * scale,
            offset_y: row_offset as f64 * scale,
        }
    }

    /// Composes the draw context's current texture transform into `matrix`,
    /// remapping texture coordinates when a fallback's image is bound in
    /// place of this tile's own.
    pub fn apply_internal_transform(&self, dc: &DrawContext<'_>, matrix: &mut TextureTransform) {
        *matrix = dc.texture_transform().compose(matrix);
    }
}

impl Bindable for TextureTile {
    fn bind(&self, dc: &mut DrawContext<'_>) -> bool {
        if dc.bind_texture(&self.image_path) {
            dc.set_texture_transform(TextureTransform::IDENTITY);
            return true;
        }

        // Own resource absent: delegate to the fallback ancestor, cropping
        // its image down to this tile's sector. No fallback means nothing is
        // drawn for this tile this frame, corrected once the request lands.
        let Some(fallback) = &self.fallback else {
            return false;
        };
        if !fallback.bind(dc) {
            return false;
        }
        let outer = dc.texture_transform();
        let remap = self.fallback_transform(&fallback.address);
        dc.set_texture_transform(outer.compose(&remap));
        true
    }
}

/// An elevation tile: an address plus the cache key of its sample grid.
#[derive(Debug, Clone)]
pub struct ElevationTile {
    pub address: TileAddress,
    pub data_path: String,
}

impl ElevationTile {
    pub fn new(address: TileAddress, data_path: String) -> Self {
        Self { address, data_path }
    }

    pub fn estimated_size(&self) -> u64 {
        std::mem::size_of::<Self>() as u64 + self.data_path.len() as u64
    }

    /// Resolves this tile's sample grid from the resource cache, promoting
    /// the entry. Returns `None` when the data is absent or not elevation.
    pub fn samples<'c>(
        &self,
        cache: &'c mut crate::cache::MemoryCache<crate::retrieve::TileResource>,
    ) -> Option<&'c [f32]> {
        match cache.get(&self.data_path) {
            Some(crate::retrieve::TileResource::Elevation { samples }) => Some(samples.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::geo::Sector;
    use crate::retrieve::TileResource;
    use crate::stats::FrameStatistics;

    fn pyramid() -> LevelSet {
        LevelSet::new(Sector::full_sphere(), 36.0, 4, 512, 512).unwrap()
    }

    #[test]
    fn construction_validates_grid_coordinates() {
        let levels = pyramid();
        assert!(TileAddress::new(&levels, 0, 0, 0).is_ok());
        assert_eq!(
            TileAddress::new(&levels, 9, 0, 0).unwrap_err(),
            TileError::LevelOutOfRange {
                level: 9,
                num_levels: 4
            }
        );
        assert_eq!(
            TileAddress::new(&levels, 0, 5, 0).unwrap_err(),
            TileError::RowOutOfRange { row: 5, num_rows: 5 }
        );
        assert_eq!(
            TileAddress::new(&levels, 0, 0, 10).unwrap_err(),
            TileError::ColumnOutOfRange {
                column: 10,
                num_columns: 10
            }
        );
    }

    #[test]
    fn cache_path_encodes_identity() {
        let levels = pyramid();
        let addr = TileAddress::new(&levels, 2, 7, 13).unwrap();
        assert_eq!(addr.cache_path("blue-marble"), "blue-marble/2/7/13");
    }

    #[test]
    fn subdivision_yields_exact_quadrants() {
        let levels = pyramid();
        let parent = TileAddress::new(&levels, 0, 2, 4).unwrap();
        let children = parent.subdivide(&levels).unwrap();

        for child in &children {
            assert_eq!(child.level_number(), 1);
        }
        assert_eq!((children[0].row(), children[0].column()), (4, 8));
        assert_eq!((children[1].row(), children[1].column()), (4, 9));
        assert_eq!((children[2].row(), children[2].column()), (5, 8));
        assert_eq!((children[3].row(), children[3].column()), (5, 9));

        // Quadrant sectors tile the parent: shared midpoints, outer edges.
        let (mid_lat, mid_lon) = parent.sector().centroid();
        assert_eq!(children[0].sector().max_latitude, mid_lat);
        assert_eq!(children[2].sector().min_latitude, mid_lat);
        assert_eq!(children[1].sector().min_longitude, mid_lon);
        assert_eq!(children[0].sector().min_latitude, parent.sector().min_latitude);
        assert_eq!(children[3].sector().max_longitude, parent.sector().max_longitude);
    }

    #[test]
    fn subdividing_clipped_edge_tiles_skips_out_of_grid_children() {
        // 50.4 degrees of latitude does not divide evenly: level 0 has 2
        // rows (the second clipped), level 1 has ceil(50.4 / 18) = 3.
        let sector = Sector::new(0.0, 50.4, 0.0, 72.0).unwrap();
        let levels = LevelSet::new(sector, 36.0, 2, 512, 512).unwrap();

        let edge = TileAddress::new(&levels, 0, 1, 0).unwrap();
        let children = edge.subdivide(&levels).unwrap();

        // The northern quadrants would land on row 3, which the child grid
        // does not contain; only the southern pair survives.
        assert_eq!(children.len(), 2);
        assert_eq!((children[0].row(), children[0].column()), (2, 0));
        assert_eq!((children[1].row(), children[1].column()), (2, 1));
        assert!(matches!(
            TileAddress::new(&levels, 1, 3, 0),
            Err(TileError::RowOutOfRange { .. })
        ));

        // Every child agrees with direct construction at its coordinates,
        // clipped sector included.
        for child in &children {
            let direct = TileAddress::new(&levels, 1, child.row(), child.column()).unwrap();
            assert_eq!(child.sector(), direct.sector());
            assert_eq!(child.sector().max_latitude, 50.4);
        }
    }

    #[test]
    fn subdividing_the_finest_level_fails() {
        let levels = pyramid();
        let addr = TileAddress::new(&levels, 3, 0, 0).unwrap();
        assert_eq!(addr.subdivide(&levels).unwrap_err(), TileError::NoFinerLevel(3));
    }

    #[test]
    fn children_round_trip_to_parent() {
        let levels = pyramid();
        let parent = TileAddress::new(&levels, 1, 3, 6).unwrap();
        for child in parent.subdivide(&levels).unwrap() {
            assert_eq!(child.parent(&levels).unwrap(), parent);
        }
    }

    #[test]
    fn bind_uses_own_resource_when_resident() {
        let levels = pyramid();
        let stats = FrameStatistics::default();
        let mut cache: MemoryCache<TileResource> = MemoryCache::new(1 << 20);

        let addr = TileAddress::new(&levels, 1, 0, 0).unwrap();
        let tile = TextureTile::new(addr.clone(), addr.cache_path("img"));
        cache.put(&tile.image_path, TileResource::Image { bytes: vec![1, 2, 3] }, 3);

        let mut dc = DrawContext::new(&mut cache, &stats);
        assert!(tile.bind(&mut dc));
        assert_eq!(dc.bound_texture(), Some("img/1/0/0"));
        assert_eq!(dc.texture_transform(), TextureTransform::IDENTITY);
    }

    #[test]
    fn bind_falls_back_to_resident_ancestor_with_crop() {
        let levels = pyramid();
        let stats = FrameStatistics::default();
        let mut cache: MemoryCache<TileResource> = MemoryCache::new(1 << 20);

        let parent = TileAddress::new(&levels, 0, 0, 0).unwrap();
        let parent_path = parent.cache_path("img");
        cache.put(&parent_path, TileResource::Image { bytes: vec![0; 16] }, 16);

        // The NE child of that parent.
        let child = parent.subdivide(&levels).unwrap()[3].clone();
        let mut tile = TextureTile::new(child.clone(), child.cache_path("img"));
        tile.set_fallback(TextureTile::new(parent.clone(), parent_path.clone()));

        let mut dc = DrawContext::new(&mut cache, &stats);
        assert!(tile.bind(&mut dc));
        assert_eq!(dc.bound_texture(), Some(parent_path.as_str()));

        // NE quadrant: upper-right quarter of the ancestor image.
        let transform = dc.texture_transform();
        assert_eq!(
            transform,
            TextureTransform {
                scale_x: 0.5,
                scale_y: 0.5,
                offset_x: 0.5,
                offset_y: 0.5,
            }
        );
    }

    #[test]
    fn fallback_transform_spans_multiple_levels() {
        let levels = pyramid();
        let root = TileAddress::new(&levels, 0, 1, 1).unwrap();
        // Two levels down, offset (1, 2) within the 4x4 descendant grid.
        let deep = TileAddress::new(&levels, 2, 4 * 1 + 1, 4 * 1 + 2).unwrap();
        let tile = TextureTile::new(deep.clone(), deep.cache_path("img"));

        let transform = tile.fallback_transform(&root);
        assert_eq!(transform.scale_x, 0.25);
        assert_eq!(transform.offset_x, 0.5);
        assert_eq!(transform.offset_y, 0.25);
    }

    #[test]
    fn bind_without_resource_or_fallback_draws_nothing() {
        let levels = pyramid();
        let stats = FrameStatistics::default();
        let mut cache: MemoryCache<TileResource> = MemoryCache::new(1 << 20);

        let addr = TileAddress::new(&levels, 1, 2, 2).unwrap();
        let tile = TextureTile::new(addr.clone(), addr.cache_path("img"));

        let mut dc = DrawContext::new(&mut cache, &stats);
        assert!(!tile.bind(&mut dc));
        assert_eq!(dc.bound_texture(), None);
    }

    #[test]
    fn elevation_samples_resolve_from_cache() {
        let levels = pyramid();
        let mut cache: MemoryCache<TileResource> = MemoryCache::new(1 << 20);

        let addr = TileAddress::new(&levels, 0, 0, 0).unwrap();
        let tile = ElevationTile::new(addr.clone(), addr.cache_path("dem"));
        cache.put(
            &tile.data_path,
            TileResource::Elevation {
                samples: vec![12.5, -3.0],
            },
            8,
        );

        assert_eq!(tile.samples(&mut cache), Some(&[12.5, -3.0][..]));
    }
}
