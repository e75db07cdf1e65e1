//! The renderer-facing draw context.
//!
//! [`DrawContext`] is the narrow interface tiles bind against: a resource
//! cache lookup plus a texture-coordinate transform for fallback remapping.
//! The actual rendering pipeline (shaders, draw calls) lives outside this
//! crate and consumes the bound path and transform.

use crate::cache::MemoryCache;
use crate::retrieve::TileResource;
use crate::stats::FrameStatistics;

/// An affine texture-coordinate remap: `uv' = offset + scale * uv`.
///
/// Used to crop and scale a coarser ancestor's image so it stands in for a
/// descendant tile's sector. The v axis follows tile rows, origin at the
/// southern edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl TextureTransform {
    pub const IDENTITY: TextureTransform = TextureTransform {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Applies `self` after `inner`: the result maps `uv` through `inner`
    /// first, then through `self`.
    pub fn compose(&self, inner: &TextureTransform) -> TextureTransform {
        TextureTransform {
            scale_x: self.scale_x * inner.scale_x,
            scale_y: self.scale_y * inner.scale_y,
            offset_x: self.offset_x + self.scale_x * inner.offset_x,
            offset_y: self.offset_y + self.scale_y * inner.offset_y,
        }
    }

    /// Maps a texture coordinate through this transform.
    pub fn apply(&self, u: f64, v: f64) -> (f64, f64) {
        (self.offset_x + self.scale_x * u, self.offset_y + self.scale_y * v)
    }
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Per-frame binding state handed to tiles by the renderer.
pub struct DrawContext<'a> {
    resources: &'a mut MemoryCache<TileResource>,
    stats: &'a FrameStatistics,
    bound_path: Option<String>,
    transform: TextureTransform,
}

impl<'a> DrawContext<'a> {
    pub fn new(resources: &'a mut MemoryCache<TileResource>, stats: &'a FrameStatistics) -> Self {
        Self {
            resources,
            stats,
            bound_path: None,
            transform: TextureTransform::IDENTITY,
        }
    }

    /// Attempts to bind the resource at `path`. A hit promotes the cache
    /// entry and records the path as the currently bound texture.
    pub fn bind_texture(&mut self, path: &str) -> bool {
        if self.resources.get(path).is_some() {
            self.stats.inc_texture_cache_hits();
            self.bound_path = Some(path.to_string());
            true
        } else {
            self.stats.inc_texture_cache_misses();
            false
        }
    }

    /// The path bound by the last successful [`DrawContext::bind_texture`].
    pub fn bound_texture(&self) -> Option<&str> {
        self.bound_path.as_deref()
    }

    pub fn texture_transform(&self) -> TextureTransform {
        self.transform
    }

    pub fn set_texture_transform(&mut self, transform: TextureTransform) {
        self.transform = transform;
    }

    pub fn stats(&self) -> &FrameStatistics {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_applies_inner_first() {
        // Inner maps into the SW quadrant, outer into the NE quadrant.
        let inner = TextureTransform {
            scale_x: 0.5,
            scale_y: 0.5,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        let outer = TextureTransform {
            scale_x: 0.5,
            scale_y: 0.5,
            offset_x: 0.5,
            offset_y: 0.5,
        };
        let combined = outer.compose(&inner);
        assert_eq!(combined.apply(1.0, 1.0), (0.75, 0.75));
        assert_eq!(combined.apply(0.0, 0.0), (0.5, 0.5));
    }

    #[test]
    fn identity_composes_neutrally() {
        let t = TextureTransform {
            scale_x: 0.25,
            scale_y: 0.25,
            offset_x: 0.5,
            offset_y: 0.75,
        };
        assert_eq!(TextureTransform::IDENTITY.compose(&t), t);
        assert_eq!(t.compose(&TextureTransform::IDENTITY), t);
    }
}
