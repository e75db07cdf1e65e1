//! Bounded key/value caches with least-recently-used eviction.
//!
//! [`MemoryCache`] is the generic store used for tile resources on the CPU
//! side; [`GpuResourceCache`] specializes it for GPU-side handles whose
//! disposal must happen deterministically rather than at drop time.
//!
//! Caches are explicitly constructed and passed by reference to the
//! tessellator and the retrieval pipeline. There are no process-wide cache
//! globals; tests run independent instances side by side.

use crate::stats::FrameStatistics;
use log::debug;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Callback invoked whenever an entry leaves the cache, whether through LRU
/// eviction, explicit removal, replacement, or `clear`. Required because
/// dropping a wrapper object does not release an underlying native resource.
pub type DisposalListener<V> = Box<dyn Fn(&str, &V)>;

struct CacheEntry<V> {
    value: V,
    size: u64,
    /// Monotonic stamp updated on every read access.
    last_used: u64,
    /// Monotonic stamp fixed at insertion, the eviction tie-breaker.
    inserted: u64,
}

/// A bounded key/value store with strict LRU eviction.
///
/// `used_capacity` never exceeds `capacity` after any operation. Insertion
/// beyond capacity synchronously evicts least-recently-used entries until the
/// new entry fits; an entry that cannot fit at all is silently rejected
/// (refetching later is cheaper than failing the frame).
pub struct MemoryCache<V> {
    capacity: u64,
    used: u64,
    entries: HashMap<String, CacheEntry<V>>,
    clock: u64,
    listeners: Vec<DisposalListener<V>>,
}

impl<V> MemoryCache<V> {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: 0,
            entries: HashMap::new(),
            clock: 0,
            listeners: Vec::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used_capacity(&self) -> u64 {
        self.used
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers a disposal listener. Listeners run synchronously inside the
    /// mutating call, before it returns.
    pub fn add_disposal_listener(&mut self, listener: DisposalListener<V>) {
        self.listeners.push(listener);
    }

    /// Changes the capacity, evicting LRU entries if the cache is now over.
    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        while self.used > self.capacity {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Stores or replaces an entry, evicting LRU entries until it fits.
    ///
    /// Returns false without storing when `size` is zero or no amount of
    /// eviction can make room. A rejected or replaced value is still handed
    /// to the disposal listeners so native handles backing it are released.
    pub fn put(&mut self, key: &str, value: V, size: u64) -> bool {
        if size == 0 || size > self.capacity {
            debug!(
                "cache rejecting {key}: size {size} vs capacity {}",
                self.capacity
            );
            self.notify(key, &value);
            return false;
        }

        if let Some(old) = self.entries.remove(key) {
            self.used -= old.size;
            self.notify(key, &old.value);
        }

        while self.used + size > self.capacity {
            if !self.evict_one() {
                // Cannot happen while entries remain, but guards an empty map.
                self.notify(key, &value);
                return false;
            }
        }

        self.clock += 1;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                size,
                last_used: self.clock,
                inserted: self.clock,
            },
        );
        self.used += size;
        true
    }

    /// Looks an entry up and promotes it to most-recently-used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            &entry.value
        })
    }

    /// Presence test that does not promote the entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.used -= entry.size;
                self.notify(key, &entry.value);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.used = 0;
        for (key, entry) in &entries {
            self.notify(key, &entry.value);
        }
    }

    /// Evicts the least-recently-used entry, ties broken by insertion order.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_used, entry.inserted))
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                debug!("cache evicting {key}");
                self.remove(&key)
            }
            None => false,
        }
    }

    fn notify(&self, key: &str, value: &V) {
        for listener in &self.listeners {
            listener(key, value);
        }
    }
}

/// A GPU-side resource tracked by the [`GpuResourceCache`]: a native handle
/// plus the byte size it occupies in GPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuResource {
    Texture { handle: u64, bytes: u64 },
    Buffer { handle: u64, bytes: u64 },
}

impl GpuResource {
    pub fn bytes(&self) -> u64 {
        match self {
            GpuResource::Texture { bytes, .. } | GpuResource::Buffer { bytes, .. } => *bytes,
        }
    }
}

/// Seam to the rendering backend: deletes native handles and reports whether
/// a GL/GPU context is current on the calling thread.
pub trait GpuDisposer {
    fn context_current(&self) -> bool;
    fn delete(&self, resource: &GpuResource);
}

/// A [`MemoryCache`] of GPU resources that releases native handles on every
/// eviction. Disposal requires a current context; evictions that happen while
/// none is current queue the handle, and [`GpuResourceCache::dispose_pending`]
/// drains the queue on the next render pass.
pub struct GpuResourceCache {
    cache: MemoryCache<GpuResource>,
    pending: Rc<std::cell::RefCell<Vec<GpuResource>>>,
    disposer: Rc<dyn GpuDisposer>,
    stats: Arc<FrameStatistics>,
}

impl GpuResourceCache {
    pub fn new(capacity: u64, disposer: Rc<dyn GpuDisposer>, stats: Arc<FrameStatistics>) -> Self {
        let mut cache = MemoryCache::new(capacity);
        let pending = Rc::new(std::cell::RefCell::new(Vec::new()));

        let listener_disposer = Rc::clone(&disposer);
        let listener_pending = Rc::clone(&pending);
        cache.add_disposal_listener(Box::new(move |_key, resource: &GpuResource| {
            if listener_disposer.context_current() {
                listener_disposer.delete(resource);
            } else {
                listener_pending.borrow_mut().push(resource.clone());
            }
        }));

        Self {
            cache,
            pending,
            disposer,
            stats,
        }
    }

    /// Stores a resource, accounting its GPU byte size and counting the load
    /// for the stats overlay.
    pub fn put(&mut self, key: &str, resource: GpuResource) -> bool {
        let size = resource.bytes();
        if !self.cache.put(key, resource, size) {
            return false;
        }
        self.stats.inc_gpu_resource_loads();
        true
    }

    pub fn get(&mut self, key: &str) -> Option<&GpuResource> {
        self.cache.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.cache.remove(key)
    }

    pub fn clear(&mut self) {
        self.cache.clear()
    }

    pub fn used_capacity(&self) -> u64 {
        self.cache.used_capacity()
    }

    pub fn capacity(&self) -> u64 {
        self.cache.capacity()
    }

    /// Number of handles waiting for a current context.
    pub fn pending_disposals(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Deletes queued handles. Call at the start of a render pass, when the
    /// context is known to be current.
    pub fn dispose_pending(&mut self) {
        for resource in self.pending.borrow_mut().drain(..) {
            self.disposer.delete(&resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn round_trip() {
        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        assert!(cache.put("k", 7, 10));
        assert_eq!(cache.get("k"), Some(&7));
        assert_eq!(cache.used_capacity(), 10);
    }

    #[test]
    fn rejects_zero_and_oversized_entries() {
        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        assert!(!cache.put("zero", 1, 0));
        assert!(!cache.put("huge", 2, 101));
        assert!(cache.is_empty());
        assert_eq!(cache.used_capacity(), 0);
    }

    #[test]
    fn evicts_least_recently_used_first() {
        // Spec scenario: capacity 100, entries of size 40 for a, b, c.
        let mut cache: MemoryCache<&str> = MemoryCache::new(100);
        assert!(cache.put("a", "A", 40));
        assert!(cache.put("b", "B", 40));
        assert!(cache.put("c", "C", 40));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(&"B"));
        assert_eq!(cache.get("c"), Some(&"C"));
        assert!(cache.used_capacity() <= cache.capacity());
    }

    #[test]
    fn get_promotes_to_most_recently_used() {
        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        cache.put("a", 1, 40);
        cache.put("b", 2, 40);
        // Touch a so b becomes the LRU entry.
        cache.get("a");
        cache.put("c", 3, 40);

        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(&3));
    }

    #[test]
    fn eviction_ties_break_by_insertion_order() {
        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        cache.put("first", 1, 50);
        cache.put("second", 2, 50);
        // Neither has been read; the older insertion goes first.
        cache.put("third", 3, 50);
        assert!(!cache.contains("first"));
        assert!(cache.contains("second"));
    }

    #[test]
    fn replace_updates_size_and_disposes_old_value() {
        let disposed: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&disposed);

        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        cache.add_disposal_listener(Box::new(move |_, v| log.borrow_mut().push(*v)));
        cache.put("k", 1, 30);
        cache.put("k", 2, 60);

        assert_eq!(cache.used_capacity(), 60);
        assert_eq!(cache.get("k"), Some(&2));
        assert_eq!(*disposed.borrow(), vec![1]);
    }

    #[test]
    fn clear_disposes_everything() {
        let count = Rc::new(RefCell::new(0u32));
        let log = Rc::clone(&count);

        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        cache.add_disposal_listener(Box::new(move |_, _| *log.borrow_mut() += 1));
        cache.put("a", 1, 10);
        cache.put("b", 2, 10);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.used_capacity(), 0);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn shrinking_capacity_evicts_down() {
        let mut cache: MemoryCache<u32> = MemoryCache::new(100);
        cache.put("a", 1, 40);
        cache.put("b", 2, 40);
        cache.get("b");
        cache.set_capacity(50);

        assert_eq!(cache.used_capacity(), 40);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    struct RecordingDisposer {
        current: std::cell::Cell<bool>,
        deleted: RefCell<Vec<u64>>,
    }

    impl GpuDisposer for RecordingDisposer {
        fn context_current(&self) -> bool {
            self.current.get()
        }

        fn delete(&self, resource: &GpuResource) {
            let handle = match resource {
                GpuResource::Texture { handle, .. } | GpuResource::Buffer { handle, .. } => *handle,
            };
            self.deleted.borrow_mut().push(handle);
        }
    }

    #[test]
    fn gpu_eviction_deletes_handles_when_context_current() {
        let disposer = Rc::new(RecordingDisposer {
            current: std::cell::Cell::new(true),
            deleted: RefCell::new(Vec::new()),
        });
        let stats = Arc::new(FrameStatistics::default());
        let mut cache = GpuResourceCache::new(100, disposer.clone(), stats.clone());

        cache.put("t1", GpuResource::Texture { handle: 1, bytes: 60 });
        cache.put("t2", GpuResource::Texture { handle: 2, bytes: 60 });

        assert_eq!(*disposer.deleted.borrow(), vec![1]);
        assert_eq!(cache.pending_disposals(), 0);
        // Both stores succeeded, so both count as GPU loads.
        assert_eq!(stats.snapshot().gpu_resource_loads, 2);
    }

    #[test]
    fn gpu_load_counter_skips_rejected_stores() {
        let disposer = Rc::new(RecordingDisposer {
            current: std::cell::Cell::new(true),
            deleted: RefCell::new(Vec::new()),
        });
        let stats = Arc::new(FrameStatistics::default());
        let mut cache = GpuResourceCache::new(100, disposer.clone(), stats.clone());

        assert!(cache.put("t1", GpuResource::Texture { handle: 1, bytes: 60 }));
        assert!(!cache.put("huge", GpuResource::Buffer { handle: 2, bytes: 500 }));

        assert_eq!(stats.snapshot().gpu_resource_loads, 1);
        // The rejected buffer was still handed to the disposer.
        assert_eq!(*disposer.deleted.borrow(), vec![2]);
    }

    #[test]
    fn gpu_disposal_defers_without_current_context() {
        let disposer = Rc::new(RecordingDisposer {
            current: std::cell::Cell::new(false),
            deleted: RefCell::new(Vec::new()),
        });
        let stats = Arc::new(FrameStatistics::default());
        let mut cache = GpuResourceCache::new(100, disposer.clone(), stats);

        cache.put("t1", GpuResource::Texture { handle: 1, bytes: 60 });
        cache.put("t2", GpuResource::Texture { handle: 2, bytes: 60 });

        assert!(disposer.deleted.borrow().is_empty());
        assert_eq!(cache.pending_disposals(), 1);

        disposer.current.set(true);
        cache.dispose_pending();
        assert_eq!(*disposer.deleted.borrow(), vec![1]);
        assert_eq!(cache.pending_disposals(), 0);
    }
}
