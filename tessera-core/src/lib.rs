/*!
# Tessera Core

Multi-resolution tile level-of-detail management and caching for virtual
globe viewers.

## Architecture

The engine decides, for a given viewpoint, which imagery or elevation tiles
at which pyramid level to draw, and bounds memory while doing it:

1. **Pyramid**: a [`LevelSet`] describes a data source's resolution tiers;
   [`TileAddress`] identifies one tile within it.
2. **Tessellation**: each frame the [`Tessellator`] walks the pyramid
   quadtree, pruning invisible branches and refining visible tiles until
   their resolution suffices, emitting the frame's working set.
3. **Caching**: [`MemoryCache`] bounds resource memory with strict LRU
   eviction; [`GpuResourceCache`] adds deterministic native-handle disposal.
4. **Retrieval**: the [`TileRetriever`] fetches missing resources
   asynchronously, de-duplicated per path, and drains completions once per
   frame so cache mutation never races with traversal.

Tiles whose resources are still in flight render through the fallback
protocol: the nearest resident ancestor's image, cropped to the tile's
sector. Degraded resolution is the only user-visible failure mode.
*/

pub mod cache;
pub mod draw;
pub mod geo;
pub mod level;
pub mod retrieve;
pub mod source;
pub mod stats;
pub mod tessellate;
pub mod tile;

// Re-export the types most consumers touch.
pub use cache::{GpuDisposer, GpuResource, GpuResourceCache, MemoryCache};
pub use draw::{DrawContext, TextureTransform};
pub use geo::{Position, Sector, EARTH_RADIUS_M};
pub use level::{Level, LevelSet, LevelSetError};
pub use retrieve::{ResourceKind, RetrieveError, TileResource, TileRetriever, TileSource};
pub use source::{FileTileSource, TileSourceConfig};
pub use stats::{FrameStatistics, StatsSnapshot};
pub use tessellate::{FrameContext, RegionFrustum, Tessellator, ViewFrustum};
pub use tile::{Bindable, ElevationTile, TextureTile, TileAddress, TileError};

/// Version information for the Tessera core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
