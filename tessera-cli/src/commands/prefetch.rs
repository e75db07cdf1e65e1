//! Prefetch command implementation - run tessellation frames against a
//! filesystem tile store until the working set is resident.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tessera_core::{
    ElevationTile, FileTileSource, FrameContext, FrameStatistics, MemoryCache, Position,
    RegionFrustum, ResourceKind, Tessellator, TileResource, TileRetriever,
};

pub struct PrefetchArgs {
    pub source: PathBuf,
    pub root: PathBuf,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub radius: f64,
    pub viewport_height: u32,
    pub fov: f64,
    pub detail: f64,
    pub max_frames: u32,
}

pub fn execute(args: PrefetchArgs) -> Result<()> {
    let config = super::load_source_config(&args.source)?;
    log::info!("Source '{}': {} levels, {}° first-level delta", config.name, config.num_levels, config.first_level_delta);

    let tessellator = Tessellator::new(config.clone())?;
    let stats = Arc::new(FrameStatistics::default());
    let mut cache: MemoryCache<TileResource> = MemoryCache::new(config.cache_capacity());
    let retriever = TileRetriever::new(
        Arc::new(FileTileSource::new(&args.root)),
        config.kind,
        stats.clone(),
    );

    let frustum = RegionFrustum::centered_on(args.lat, args.lon, args.radius);
    let frame = FrameContext {
        eye: Position::new(args.lat, args.lon, args.altitude),
        viewport_height: args.viewport_height,
        field_of_view: args.fov,
        detail_factor: args.detail,
        frustum: &frustum,
    };

    let mut resident = false;
    let mut working_set = Vec::new();
    for frame_index in 0..args.max_frames {
        working_set = tessellator.tessellate(&frame, &cache, &stats)?;

        let mut missing = 0usize;
        for tile in &working_set {
            if !cache.contains(&tile.image_path) {
                missing += 1;
                retriever.request(&tile.image_path);
            }
        }
        log::info!(
            "frame {frame_index}: {} tiles in working set, {missing} missing",
            working_set.len()
        );

        if missing == 0 {
            resident = true;
            break;
        }
        drain(&retriever, &mut cache);
    }

    if resident {
        log::info!("working set fully resident");
    } else {
        log::warn!(
            "gave up after {} frames; some tiles never arrived",
            args.max_frames
        );
    }

    let snap = stats.snapshot();
    println!("requests issued:      {}", snap.requests_issued);
    println!("retrievals completed: {}", snap.retrievals_completed);
    println!("retrievals failed:    {}", snap.retrievals_failed);
    println!("tiles emitted:        {}", snap.tiles_rendered);
    println!("tiles culled:         {}", snap.tiles_culled);
    println!(
        "cache: {} entries, {} / {} bytes",
        cache.len(),
        cache.used_capacity(),
        cache.capacity()
    );

    // For elevation sources the payloads are sample grids; summarize the
    // terrain the working set resolved to.
    if config.kind == ResourceKind::Elevation {
        let mut total = 0usize;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for tile in &working_set {
            let grid = ElevationTile::new(tile.address.clone(), tile.image_path.clone());
            if let Some(samples) = grid.samples(&mut cache) {
                total += samples.len();
                for &sample in samples {
                    min = min.min(sample);
                    max = max.max(sample);
                }
            }
        }
        if total > 0 {
            println!("elevation samples:    {total} ({min:.1}..{max:.1} m)");
        }
    }
    Ok(())
}

/// Waits for every outstanding retrieval of this frame, draining completions
/// into the cache as they arrive.
fn drain(retriever: &TileRetriever, cache: &mut MemoryCache<TileResource>) {
    while retriever.pending() > 0 {
        retriever.poll_completions(cache);
        std::thread::sleep(Duration::from_millis(5));
    }
    retriever.poll_completions(cache);
}
