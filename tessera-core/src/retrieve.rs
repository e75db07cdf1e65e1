//! The tile retrieval pipeline.
//!
//! For every tile in a frame's working set that lacks a cached resource the
//! [`TileRetriever`] issues at most one outstanding fetch per path. Fetches
//! run on the rayon pool; completions are queued on a channel and drained
//! once per frame tick by [`TileRetriever::poll_completions`], so cache
//! mutation never races with traversal. Failed fetches clear their in-flight
//! marker and are retried implicitly when a later traversal requests the
//! path again, which throttles retries to roughly one per redraw cycle.

use crate::cache::MemoryCache;
use crate::stats::FrameStatistics;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by tile fetch and decode.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tile not found: {0}")]
    NotFound(String),

    #[error("empty payload for {0}")]
    EmptyPayload(String),

    #[error("decode error for {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("request timed out: {0}")]
    Timeout(String),
}

pub type RetrieveResult<T> = Result<T, RetrieveError>;

/// The kind of resource a data source serves. Determines how payloads are
/// decoded before they enter the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Imagery,
    Elevation,
}

/// A decoded tile resource as stored in the CPU-side resource cache.
///
/// The engine is agnostic to image encodings: imagery payloads are kept as
/// the encoded bytes for the renderer to decode, while elevation payloads are
/// decoded here into little-endian f32 sample arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum TileResource {
    Image { bytes: Vec<u8> },
    Elevation { samples: Vec<f32> },
}

impl TileResource {
    /// Cache accounting size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            TileResource::Image { bytes } => bytes.len() as u64,
            TileResource::Elevation { samples } => (samples.len() * 4) as u64,
        }
    }

    fn decode(kind: ResourceKind, path: &str, bytes: Vec<u8>) -> RetrieveResult<Self> {
        if bytes.is_empty() {
            return Err(RetrieveError::EmptyPayload(path.to_string()));
        }
        match kind {
            ResourceKind::Imagery => Ok(TileResource::Image { bytes }),
            ResourceKind::Elevation => {
                if bytes.len() % 4 != 0 {
                    return Err(RetrieveError::Decode {
                        path: path.to_string(),
                        reason: format!("payload length {} is not a multiple of 4", bytes.len()),
                    });
                }
                let samples = bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect();
                Ok(TileResource::Elevation { samples })
            }
        }
    }
}

/// Transport seam: anything that can turn a tile path into a byte payload.
/// Implementations decide what the path means (file under a root directory,
/// URL against a WMS/WMTS endpoint, object-store key).
pub trait TileSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> RetrieveResult<Vec<u8>>;
}

struct Completion {
    path: String,
    result: RetrieveResult<Vec<u8>>,
}

/// Issues asynchronous tile fetches with per-path de-duplication.
pub struct TileRetriever {
    source: Arc<dyn TileSource>,
    kind: ResourceKind,
    /// Outstanding paths, each with the instant its fetch was issued.
    in_flight: Arc<DashMap<String, Instant>>,
    timeout: Option<Duration>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    stats: Arc<FrameStatistics>,
}

impl TileRetriever {
    pub fn new(source: Arc<dyn TileSource>, kind: ResourceKind, stats: Arc<FrameStatistics>) -> Self {
        let (tx, rx) = channel();
        Self {
            source,
            kind,
            in_flight: Arc::new(DashMap::new()),
            timeout: None,
            tx,
            rx,
            stats,
        }
    }

    /// Sets a per-request deadline. Requests still outstanding past it are
    /// expired on the next [`TileRetriever::poll_completions`] as
    /// [`RetrieveError::Timeout`] failures, clearing their in-flight marker
    /// so a later traversal may retry. The fetch itself is not cancelled; a
    /// late completion still populates the cache.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests a tile payload unless a request for the same path is already
    /// outstanding. Returns whether a new fetch was spawned.
    pub fn request(&self, path: &str) -> bool {
        if self.in_flight.contains_key(path) {
            return false;
        }
        self.in_flight.insert(path.to_string(), Instant::now());
        self.stats.inc_requests_issued();
        debug!("requesting {path}");

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let path = path.to_string();
        rayon::spawn(move || {
            let result = source.fetch(&path);
            // The receiver disappears only on shutdown; a lost completion is
            // harmless then.
            let _ = tx.send(Completion { path, result });
        });
        true
    }

    /// Number of requests currently outstanding.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Drains completed fetches into the resource cache, then expires any
    /// request older than the configured timeout. Call once per frame tick
    /// from the thread that owns the cache. Returns the number of newly
    /// cached resources; a non-zero count means the frame is dirty and a
    /// redraw should be scheduled.
    pub fn poll_completions(&self, cache: &mut MemoryCache<TileResource>) -> usize {
        let mut newly_cached = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight.remove(&completion.path);
            let decoded = completion
                .result
                .and_then(|bytes| TileResource::decode(self.kind, &completion.path, bytes));
            match decoded {
                Ok(resource) => {
                    let size = resource.size();
                    cache.put(&completion.path, resource, size);
                    self.stats.inc_retrievals_completed();
                    newly_cached += 1;
                }
                Err(err) => {
                    // No automatic retry: the tile is fetched again only when
                    // a later traversal still wants it.
                    warn!("retrieval failed for {}: {err}", completion.path);
                    self.stats.inc_retrievals_failed();
                }
            }
        }

        if let Some(timeout) = self.timeout {
            self.in_flight.retain(|path, issued| {
                if issued.elapsed() < timeout {
                    return true;
                }
                let err = RetrieveError::Timeout(path.clone());
                warn!("retrieval failed for {path}: {err}");
                self.stats.inc_retrievals_failed();
                false
            });
        }
        newly_cached
    }
}
