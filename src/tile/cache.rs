//! Rendered-tile caching.
//!
//! The renderer talks to a cache through the [`CacheBackend`] trait and never
//! depends on a concrete store. A handle may or may not be attached to a
//! request; [`get_cache`] resolves it from the request's extensions.
//!
//! # Cache Key
//!
//! Entries are keyed by a namespace and the request fingerprint, rendered as
//! `"{namespace}:{fingerprint}"`. The fingerprint already covers every
//! parameter that affects the output bytes.
//!
//! # Size-Based Eviction
//!
//! [`MemoryCache`] tracks the total size of cached images in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::encode::ImageType;
use crate::error::CacheError;

/// Default cache capacity: 100MB
pub const DEFAULT_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Arc<str>,
    pub fingerprint: Arc<str>,
}

impl CacheKey {
    pub fn new(namespace: impl Into<Arc<str>>, fingerprint: impl Into<Arc<str>>) -> Self {
        Self {
            namespace: namespace.into(),
            fingerprint: fingerprint.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.fingerprint)
    }
}

// =============================================================================
// Cached Value
// =============================================================================

/// An encoded tile and the format it was encoded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub content: Bytes,
    pub format: ImageType,
}

impl CachedImage {
    pub fn new(content: Bytes, format: ImageType) -> Self {
        Self { content, format }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.media_type()
    }

    pub fn content_length(&self) -> usize {
        self.content.len()
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// A store for rendered tiles.
///
/// Implementations must be safe to share across tasks. Errors are reported
/// but callers treat them as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedImage>, CacheError>;

    async fn set(&self, key: CacheKey, value: CachedImage) -> Result<(), CacheError>;
}

/// Shared handle to a cache backend.
pub type CacheHandle = Arc<dyn CacheBackend>;

/// Cache handle attached to a request, if any.
pub fn get_cache(extensions: &http::Extensions) -> Option<CacheHandle> {
    extensions.get::<CacheHandle>().cloned()
}

// =============================================================================
// In-memory Backend
// =============================================================================

/// LRU cache for rendered tiles with size-based capacity.
///
/// # Thread Safety
///
/// The cache is internally synchronized and can be shared across async tasks
/// via `Arc`.
///
/// # Example
///
/// ```
/// use raster_tiler::tile::{CacheBackend, CacheKey, CachedImage, MemoryCache};
/// use raster_tiler::ImageType;
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCache::new();
///     let key = CacheKey::new("tile", "3f2a");
///     let image = CachedImage::new(Bytes::from_static(b"\x89PNG"), ImageType::Png);
///
///     cache.set(key.clone(), image.clone()).await.unwrap();
///     assert_eq!(cache.get(&key).await.unwrap(), Some(image));
/// }
/// ```
pub struct MemoryCache {
    cache: RwLock<LruCache<CacheKey, CachedImage>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl MemoryCache {
    /// Create a cache with default capacity (100MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache bounded both in bytes and in entry count.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Check if an entry is cached without updating LRU order.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.cache.read().await.contains(key)
    }

    /// Store an entry, evicting least-recently-used entries while over
    /// capacity. Entries larger than the whole capacity are not kept.
    pub async fn put(&self, key: CacheKey, value: CachedImage) {
        let value_size = value.content_length();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let existing = cache.peek(&key).map(CachedImage::content_length);
        if let Some(old_size) = existing {
            *current_size = current_size.saturating_sub(old_size);
        }

        // For a new key at the entry limit, push displaces the LRU entry
        if let Some((_, displaced)) = cache.push(key, value) {
            if existing.is_none() {
                *current_size = current_size.saturating_sub(displaced.content_length());
            }
        }
        *current_size += value_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.content_length());
                }
                None => break,
            }
        }
    }

    /// Remove an entry, returning it if present.
    pub async fn remove(&self, key: &CacheKey) -> Option<CachedImage> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        let removed = cache.pop(key)?;
        *current_size = current_size.saturating_sub(removed.content_length());
        Some(removed)
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached content in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedImage>, CacheError> {
        // LRU promotion needs the write lock
        let mut cache = self.cache.write().await;
        Ok(cache.get(key).cloned())
    }

    async fn set(&self, key: CacheKey, value: CachedImage) -> Result<(), CacheError> {
        self.put(key, value).await;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
