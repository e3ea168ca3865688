//! Pipeline tests through the public library API.
//!
//! Tests verify:
//! - Rescale broadcast, masking and output dtype
//! - Color formula ordering and negative clamping
//! - Encode/decode of raw numeric dumps
//! - Georeference precedence in GeoTIFF output
//! - Fingerprint stability

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use ndarray::Array3;
use serde_json::json;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

use raster_tiler::encode::{decode_npy, TAG_GEO_KEY_DIRECTORY};
use raster_tiler::fingerprint::fingerprint_value;
use raster_tiler::{
    fingerprint, full_mask, postprocess, reformat, Affine, Crs, DataType, Georeference,
    ImageType, PipelineError, TileData,
};

fn ramp(bands: usize, rows: usize, cols: usize) -> TileData {
    let values: Vec<u16> = (0..bands * rows * cols).map(|v| (v * 7 % 120) as u16).collect();
    TileData::from(Array3::from_shape_vec((bands, rows, cols), values).unwrap())
}

// =============================================================================
// Post-processing
// =============================================================================

#[test]
fn test_single_rescale_pair_is_broadcast() {
    let mask = full_mask(4, 4);
    let single = postprocess(ramp(3, 4, 4), &mask, Some("0,100"), None).unwrap();
    let repeated = postprocess(ramp(3, 4, 4), &mask, Some("0,100,0,100,0,100"), None).unwrap();
    assert_eq!(single, repeated);
}

#[test]
fn test_masked_pixels_are_zero_after_rescale() {
    let mut mask = full_mask(4, 4);
    mask[[1, 2]] = 0;
    mask[[3, 0]] = 0;

    let out = postprocess(ramp(3, 4, 4), &mask, Some("0,10"), None).unwrap();
    let TileData::Uint8(arr) = out else {
        panic!("rescale must produce u8");
    };
    for band in 0..3 {
        assert_eq!(arr[[band, 1, 2]], 0);
        assert_eq!(arr[[band, 3, 0]], 0);
    }
    // Unmasked values above the range saturate
    assert_eq!(arr[[0, 0, 2]], 255);
}

#[test]
fn test_rescale_always_yields_u8() {
    let float = TileData::from(Array3::from_elem((1, 2, 2), 0.25f64));
    let out = postprocess(float, &full_mask(2, 2), Some("0,1"), None).unwrap();
    assert_eq!(out.dtype(), DataType::Uint8);
}

#[test]
fn test_noop_passes_through() {
    let input = ramp(2, 3, 3);
    let out = postprocess(input.clone(), &full_mask(3, 3), None, Some("   ")).unwrap();
    assert_eq!(out, input);
    assert_eq!(out.dtype(), DataType::Uint16);
}

#[test]
fn test_formula_is_applied_left_to_right() {
    let values: Vec<u8> = vec![200, 60, 90, 40, 180, 120];
    let rgb = TileData::from(Array3::from_shape_vec((3, 1, 2), values).unwrap());
    let mask = full_mask(1, 2);

    let a = postprocess(rgb.clone(), &mask, None, Some("gamma 1.5, saturation 1.2")).unwrap();
    let b = postprocess(rgb, &mask, None, Some("saturation 1.2, gamma 1.5")).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_negatives_clamped_before_formula() {
    let values = vec![-50i16, 0, -1, 0];
    let tile = TileData::from(Array3::from_shape_vec((1, 2, 2), values).unwrap());
    let out = postprocess(tile, &full_mask(2, 2), None, Some("gamma 1 1.0")).unwrap();

    assert_eq!(out.dtype(), DataType::Uint8);
    let TileData::Uint8(arr) = out else {
        unreachable!()
    };
    assert!(arr.iter().all(|&v| v == 0));
}

#[test]
fn test_formula_errors_are_reported() {
    let tile = ramp(1, 2, 2);
    let result = postprocess(tile, &full_mask(2, 2), None, Some("gamma 4 1.5"));
    assert!(matches!(result, Err(PipelineError::InvalidColorFormula(_))));
}

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn test_npy_round_trip_preserves_dtype() {
    let tiles = [
        TileData::from(Array3::from_elem((2, 3, 3), 41000u16)),
        TileData::from(Array3::from_elem((1, 3, 3), -7i32)),
        TileData::from(Array3::from_elem((3, 3, 3), 0.125f64)),
    ];
    let mut mask = full_mask(3, 3);
    mask[[2, 2]] = 0;

    for tile in tiles {
        let bytes = reformat(&tile, &mask, ImageType::Npy, None, None).unwrap();
        let (data, decoded_mask) = decode_npy(&bytes).unwrap();
        assert_eq!(data.dtype(), tile.dtype());
        assert_eq!(data, tile);
        assert_eq!(decoded_mask, mask);
    }
}

#[test]
fn test_georeference_needs_both_parts() {
    let tile = postprocess(ramp(3, 4, 4), &full_mask(4, 4), Some("0,120"), None).unwrap();
    let mask = full_mask(4, 4);
    let transform = Affine::web_mercator_tile(1, 0, 0, 4);

    let encode = |georef: Option<Georeference>| {
        let bytes = reformat(&tile, &mask, ImageType::Tif, None, georef.as_ref()).unwrap();
        let mut decoder = Decoder::new(Cursor::new(bytes.to_vec())).unwrap();
        let compression = decoder.get_tag_u32(Tag::Compression).unwrap();
        let geokeys = decoder
            .get_tag_u32_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
            .is_ok();
        (compression, geokeys)
    };

    let both = Georeference::from_parts(Some(transform), Some(Crs::WEB_MERCATOR));
    assert_eq!(encode(both), (1, true));

    let transform_only = Georeference::from_parts(Some(transform), None);
    assert!(transform_only.is_none());
    assert_eq!(encode(transform_only), (8, false));

    let crs_only = Georeference::from_parts(None, Some(Crs::WGS84));
    assert_eq!(encode(crs_only), (8, false));
}

#[test]
fn test_full_pipeline_to_every_format() {
    let mask = full_mask(8, 8);
    let tile = postprocess(
        ramp(3, 8, 8),
        &mask,
        Some("0,120"),
        Some("sigmoidal rgb 5 0.5 saturation 0.8"),
    )
    .unwrap();

    for format in ImageType::ALL {
        let a = reformat(&tile, &mask, format, None, None).unwrap();
        let b = reformat(&tile, &mask, format, None, None).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b, "{format:?} is not deterministic");
    }
}

// =============================================================================
// Fingerprint
// =============================================================================

#[test]
fn test_fingerprint_ignores_insertion_order() {
    let keys = ["z", "y", "x", "rescale", "format", "color_formula"];

    let mut reversed = HashMap::new();
    for (i, key) in keys.iter().enumerate().rev() {
        reversed.insert(*key, json!(i));
    }
    let mut forward = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        forward.insert(*key, json!(i));
    }

    let reference = json!({
        "color_formula": 5, "format": 4, "rescale": 3, "x": 2, "y": 1, "z": 0
    });
    assert_eq!(fingerprint(&reversed).unwrap(), fingerprint(&forward).unwrap());
    assert_eq!(
        fingerprint(&reversed).unwrap(),
        fingerprint_value(&reference)
    );
}

#[test]
fn test_fingerprint_changes_with_any_value() {
    let base = json!({"z": 3, "x": 2, "y": 1, "format": "png", "rescale": "0,100"});
    let reference = fingerprint(&base).unwrap();

    for (key, value) in [
        ("z", json!(4)),
        ("x", json!(3)),
        ("y", json!(0)),
        ("format", json!("jpg")),
        ("rescale", json!("0,101")),
    ] {
        let mut changed = base.clone();
        changed[key] = value;
        assert_ne!(fingerprint(&changed).unwrap(), reference, "{key}");
    }
}

#[test]
fn test_fingerprint_rejects_non_finite() {
    let params = BTreeMap::from([("scale", f64::NAN)]);
    assert!(matches!(
        fingerprint(&params),
        Err(PipelineError::SerializationError(_))
    ));
}
