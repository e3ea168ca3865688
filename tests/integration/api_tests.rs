//! API integration tests for tile retrieval and error handling.
//!
//! Tests verify:
//! - Tile retrieval in every format
//! - Query parameters (rescale, color_formula, colormap)
//! - Error cases (missing tile, bad parameters, unsupported format)
//! - HTTP response codes and headers

use axum::http::StatusCode;
use image::{ColorType, ImageFormat};
use std::io::Cursor;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

use raster_tiler::encode::{decode_npy, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_TIEPOINT};
use raster_tiler::{DataType, RouterConfig};

use super::test_utils::{
    class_tile, elevation_tile, get, header, json, rgb_u16_tile, TileTree,
};

fn fixture() -> TileTree {
    TileTree::new()
        .with_tile("rgb", 3, 2, 1, rgb_u16_tile(16))
        .with_tile("classes", 0, 0, 0, class_tile(8))
        .with_tile("dem", 5, 10, 12, elevation_tile(8))
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_png_tile_with_rescale() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, headers, body) = get(&router, "/tiles/rgb/3/2/1.png?rescale=0,3000").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/png"));
    assert_eq!(
        header(&headers, "cache-control"),
        Some("public, max-age=3600")
    );

    let img = image::load_from_memory_with_format(&body, ImageFormat::Png).unwrap();
    assert_eq!(img.color(), ColorType::Rgba8);
    assert_eq!((img.width(), img.height()), (16, 16));
    let rgba = img.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0).0, [0, 0, 0, 255]);
}

#[tokio::test]
async fn test_pngraw_keeps_16_bit_without_alpha() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1.pngraw").await;

    assert_eq!(status, StatusCode::OK);
    let img = image::load_from_memory_with_format(&body, ImageFormat::Png).unwrap();
    assert_eq!(img.color(), ColorType::Rgb16);
}

#[tokio::test]
async fn test_every_format_is_served() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let cases = [
        ("png", "image/png"),
        ("pngraw", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("webp", "image/webp"),
        ("tif", "image/tiff; application=geotiff"),
        ("npy", "application/x-binary"),
    ];

    for (ext, media_type) in cases {
        let uri = format!("/tiles/rgb/3/2/1.{ext}?rescale=0,3000");
        let (status, headers, body) = get(&router, &uri).await;
        assert_eq!(status, StatusCode::OK, "{ext}");
        assert_eq!(header(&headers, "content-type"), Some(media_type), "{ext}");
        assert!(!body.is_empty(), "{ext}");
    }
}

#[tokio::test]
async fn test_geotiff_is_georeferenced() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/dem/5/10/12.tif").await;
    assert_eq!(status, StatusCode::OK);

    let mut decoder = Decoder::new(Cursor::new(body.as_ref())).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (8, 8));
    // Georeferenced tiles are written uncompressed
    assert_eq!(decoder.get_tag_u32(Tag::Compression).unwrap(), 1);
    assert!(decoder
        .get_tag_u32_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .is_ok());
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .unwrap();
    assert_eq!(tiepoint.len(), 6);
}

#[tokio::test]
async fn test_npy_returns_raw_values() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/dem/5/10/12.npy").await;
    assert_eq!(status, StatusCode::OK);

    let (data, mask) = decode_npy(&body).unwrap();
    assert_eq!(data, elevation_tile(8));
    assert_eq!(data.dtype(), DataType::Float32);
    assert!(mask.iter().all(|&m| m == 255));
}

#[tokio::test]
async fn test_color_formula_changes_output() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (_, _, plain) = get(&router, "/tiles/rgb/3/2/1.png?rescale=0,3000").await;
    let (status, _, graded) = get(
        &router,
        "/tiles/rgb/3/2/1.png?rescale=0,3000&color_formula=gamma%20rgb%201.8%20saturation%201.2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_ne!(plain, graded);
}

#[tokio::test]
async fn test_colormap_parameter() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    // {"1":[255,0,0,255],"2":[0,0,255,255]}
    let colormap = "%7B%221%22%3A%5B255%2C0%2C0%2C255%5D%2C%222%22%3A%5B0%2C0%2C255%2C255%5D%7D";
    let uri = format!("/tiles/classes/0/0/0.png?colormap={colormap}");
    let (status, _, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);

    let rgba = image::load_from_memory_with_format(&body, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    // Row-major values cycle 0, 1, 2, 3
    assert_eq!(rgba.get_pixel(0, 0).0[3], 0);
    assert_eq!(rgba.get_pixel(1, 0).0, [255, 0, 0, 255]);
    assert_eq!(rgba.get_pixel(2, 0).0, [0, 0, 255, 255]);
    assert_eq!(rgba.get_pixel(3, 0).0[3], 0);
}

#[tokio::test]
async fn test_no_cache_headers_without_cache() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (_, headers, _) = get(&router, "/tiles/rgb/3/2/1.jpg?rescale=0,3000").await;

    assert!(headers.get("x-cache").is_none());
    let timings = header(&headers, "x-server-timings").unwrap();
    assert!(timings.starts_with("Read - "));
    assert!(timings.contains("Post-process - "));
    assert!(timings.contains("Format - "));
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new().with_cache_max_age(60));
    let (_, headers, _) = get(&router, "/tiles/rgb/3/2/1.npy").await;
    assert_eq!(header(&headers, "cache-control"), Some("public, max-age=60"));
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_missing_tile_is_404() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/rgb/3/2/2.png").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json(&body);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_unsupported_format_is_400() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1.gif").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "unsupported_format");
}

#[tokio::test]
async fn test_missing_extension_is_400() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_path");
}

#[tokio::test]
async fn test_bad_rescale_is_400() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());

    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1.png?rescale=0,abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_rescale");

    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1.png?rescale=5,5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_rescale_range");
}

#[tokio::test]
async fn test_bad_color_formula_is_400() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());

    let (status, _, body) = get(
        &router,
        "/tiles/rgb/3/2/1.png?rescale=0,3000&color_formula=hue%20rgb%202",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_color_formula");

    // Saturation needs three bands
    let (status, _, _) = get(
        &router,
        "/tiles/classes/0/0/0.png?color_formula=saturation%201.5",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_colormap_is_400() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    let (status, _, body) = get(&router, "/tiles/classes/0/0/0.png?colormap=not-json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_colormap");
}

#[tokio::test]
async fn test_unencodable_tile_is_500() {
    let tree = fixture();
    let router = tree.router(RouterConfig::new());
    // 16-bit data cannot be written as JPEG without a rescale
    let (status, _, body) = get(&router, "/tiles/rgb/3/2/1.jpg").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], "encoding_error");
}

#[tokio::test]
async fn test_path_traversal_is_404() {
    let tree = fixture();
    std::fs::write(tree.path().join("secret.npy"), b"nope").unwrap();
    let router = tree.router(RouterConfig::new());

    let (status, _, _) = get(&router, "/tiles/..%2F..%2Fetc/0/0/0.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
