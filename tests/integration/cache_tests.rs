//! Cache behavior tests.
//!
//! Tests verify:
//! - MISS then HIT with identical bodies
//! - Distinct parameters get distinct entries
//! - A failing backend degrades to uncached rendering
//! - Caching disabled renders every request

use std::sync::Arc;

use axum::http::StatusCode;

use raster_tiler::tile::{CacheHandle, MemoryCache, TileRequest, CACHE_NAMESPACE};
use raster_tiler::{fingerprint, CacheBackend, CacheKey, ImageType, RouterConfig, TileCoord};

use super::test_utils::{get, header, rgb_u16_tile, RecordingCache, TileTree, UnavailableCache};

fn fixture() -> TileTree {
    TileTree::new().with_tile("rgb", 3, 2, 1, rgb_u16_tile(16))
}

#[tokio::test]
async fn test_miss_then_hit() {
    let tree = fixture();
    let router = tree.cached_router();
    let uri = "/tiles/rgb/3/2/1.png?rescale=0,3000";

    let (status1, headers1, body1) = get(&router, uri).await;
    assert_eq!(status1, StatusCode::OK);
    assert_eq!(header(&headers1, "x-cache"), Some("MISS"));
    assert!(headers1.contains_key("x-server-timings"));

    let (status2, headers2, body2) = get(&router, uri).await;
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(header(&headers2, "x-cache"), Some("HIT"));
    assert_eq!(header(&headers2, "content-type"), Some("image/png"));
    // Nothing was rendered on a hit
    assert!(!headers2.contains_key("x-server-timings"));

    assert_eq!(body1, body2);
}

#[tokio::test]
async fn test_distinct_parameters_are_distinct_entries() {
    let tree = fixture();
    let cache = Arc::new(RecordingCache::new());
    let router = tree.router(RouterConfig::new().with_cache(cache.clone()));

    let uris = [
        "/tiles/rgb/3/2/1.png?rescale=0,3000",
        "/tiles/rgb/3/2/1.png?rescale=0,2000",
        "/tiles/rgb/3/2/1.webp?rescale=0,3000",
        "/tiles/rgb/3/2/1.png?rescale=0,3000&color_formula=gamma%20rgb%202",
    ];
    for uri in uris {
        let (_, headers, _) = get(&router, uri).await;
        assert_eq!(header(&headers, "x-cache"), Some("MISS"), "{uri}");
    }

    assert_eq!(cache.len().await, uris.len());
    assert_eq!(cache.gets(), uris.len());
    assert_eq!(cache.sets(), uris.len());
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let tree = fixture();
    let cache = Arc::new(RecordingCache::new());
    let router = tree.router(RouterConfig::new().with_cache(cache.clone()));

    let (status, _, _) = get(&router, "/tiles/rgb/3/2/9.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = get(&router, "/tiles/rgb/3/2/1.png?rescale=4,4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(cache.sets(), 0);
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn test_unavailable_cache_still_serves() {
    let tree = fixture();
    let uri = "/tiles/rgb/3/2/1.png?rescale=0,3000";

    let broken = tree.router(RouterConfig::new().with_cache(Arc::new(UnavailableCache)));
    let (status, headers, body) = get(&broken, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-cache"), Some("MISS"));

    let (_, headers, again) = get(&broken, uri).await;
    assert_eq!(header(&headers, "x-cache"), Some("MISS"));

    let uncached = tree.router(RouterConfig::new());
    let (_, _, plain) = get(&uncached, uri).await;

    assert_eq!(body, again);
    assert_eq!(body, plain);
}

#[tokio::test]
async fn test_disabled_cache_renders_every_time() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new().without_cache());
    let uri = "/tiles/rgb/3/2/1.png?rescale=0,3000";

    for _ in 0..2 {
        let (_, headers, _) = get(&router, uri).await;
        assert!(headers.get("x-cache").is_none());
        assert!(headers.contains_key("x-server-timings"));
    }
}

#[tokio::test]
async fn test_entries_are_keyed_by_request_fingerprint() {
    let tree = fixture();
    let cache = Arc::new(MemoryCache::new());
    let router = tree.router(RouterConfig::new().with_cache(cache.clone()));

    let (_, _, body) = get(&router, "/tiles/rgb/3/2/1.png?rescale=0,3000").await;

    let request = TileRequest::new(TileCoord::new("rgb", 3, 2, 1), ImageType::Png)
        .with_rescale("0,3000");
    let key = CacheKey::new(CACHE_NAMESPACE, fingerprint(&request).unwrap());

    let entry = cache.get(&key).await.unwrap().expect("entry under fingerprint key");
    assert_eq!(entry.content, body);
    assert_eq!(entry.format, ImageType::Png);
    assert_eq!(entry.content_type(), "image/png");
}

#[tokio::test]
async fn test_renderer_shares_cache_with_router() {
    let tree = fixture();
    let cache: CacheHandle = Arc::new(MemoryCache::new());
    let request = TileRequest::new(TileCoord::new("rgb", 3, 2, 1), ImageType::Jpeg)
        .with_rescale("0,3000");

    // Warm the cache through the library API, then hit it over HTTP
    let rendered = tree.renderer().render(&request, Some(&cache)).await.unwrap();
    assert!(!rendered.cache_hit);

    let router = tree.router(RouterConfig::new().with_cache(cache));
    let (_, headers, body) = get(&router, "/tiles/rgb/3/2/1.jpg?rescale=0,3000").await;
    assert_eq!(header(&headers, "x-cache"), Some("HIT"));
    assert_eq!(body, rendered.content);
}
