//! Test utilities for integration tests.
//!
//! This module provides a temporary tile tree, a cache backend that records
//! its traffic, and helpers for driving the router.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use ndarray::Array3;
use tempfile::TempDir;
use tower::ServiceExt;

use raster_tiler::encode::encode_npy;
use raster_tiler::error::CacheError;
use raster_tiler::tile::{CacheBackend, CacheKey, CachedImage, MemoryCache};
use raster_tiler::{
    create_router, full_mask, Mask, NpyDirectorySource, RouterConfig, TileData, TileRenderer,
};

// =============================================================================
// Tile Tree Fixture
// =============================================================================

/// A temporary `{identifier}/{z}/{x}/{y}.npy` tree.
pub struct TileTree {
    dir: TempDir,
}

impl TileTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a tile with a full mask.
    pub fn with_tile(self, identifier: &str, z: u8, x: u32, y: u32, data: TileData) -> Self {
        let (_, rows, cols) = data.shape();
        self.with_masked_tile(identifier, z, x, y, data, full_mask(rows, cols))
    }

    pub fn with_masked_tile(
        self,
        identifier: &str,
        z: u8,
        x: u32,
        y: u32,
        data: TileData,
        mask: Mask,
    ) -> Self {
        let dir = self
            .path()
            .join(identifier)
            .join(z.to_string())
            .join(x.to_string());
        std::fs::create_dir_all(&dir).expect("failed to create tile dir");
        std::fs::write(dir.join(format!("{y}.npy")), encode_npy(&data, &mask))
            .expect("failed to write tile");
        self
    }

    pub fn renderer(&self) -> TileRenderer<NpyDirectorySource> {
        TileRenderer::new(NpyDirectorySource::new(self.path()))
    }

    pub fn router(&self, config: RouterConfig) -> Router {
        create_router(self.renderer(), config)
    }

    pub fn cached_router(&self) -> Router {
        self.router(RouterConfig::new().with_cache(Arc::new(MemoryCache::new())))
    }
}

/// 3-band u16 ramp, values 0..=3000.
pub fn rgb_u16_tile(size: usize) -> TileData {
    let n = size * size;
    let values: Vec<u16> = (0..3 * n).map(|i| ((i % n) * 3000 / n.max(1)) as u16).collect();
    TileData::from(Array3::from_shape_vec((3, size, size), values).expect("shape"))
}

/// Single-band u8 tile cycling through values 0..4.
pub fn class_tile(size: usize) -> TileData {
    let values: Vec<u8> = (0..size * size).map(|i| (i % 4) as u8).collect();
    TileData::from(Array3::from_shape_vec((1, size, size), values).expect("shape"))
}

/// Single-band f32 elevation tile.
pub fn elevation_tile(size: usize) -> TileData {
    let values: Vec<f32> = (0..size * size).map(|i| i as f32 * 1.5 - 20.0).collect();
    TileData::from(Array3::from_shape_vec((1, size, size), values).expect("shape"))
}

// =============================================================================
// Recording Cache Backend
// =============================================================================

/// Memory cache that counts its operations.
pub struct RecordingCache {
    inner: MemoryCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(),
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl CacheBackend for RecordingCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedImage>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: CacheKey, value: CachedImage) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }
}

/// Cache backend that is always down.
pub struct UnavailableCache;

#[async_trait]
impl CacheBackend for UnavailableCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedImage>, CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _key: CacheKey, _value: CachedImage) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".to_string()))
    }
}

// =============================================================================
// HTTP Helpers
// =============================================================================

/// Send a GET request and collect the response.
pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, headers, body)
}

/// Parse a JSON error body.
pub fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("JSON body")
}

pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
