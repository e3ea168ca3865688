//! Affine geotransforms and coordinate reference systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Half the extent of the EPSG:3857 world square, in meters.
pub const WEB_MERCATOR_ORIGIN: f64 = 20037508.342789244;

/// Pixel-to-world affine transform.
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform covering `(west, south, east, north)` with a
    /// `width` x `height` pixel grid.
    pub fn from_bounds(
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        width: usize,
        height: usize,
    ) -> Self {
        Self::new(
            (east - west) / width as f64,
            0.0,
            west,
            0.0,
            -(north - south) / height as f64,
            north,
        )
    }

    /// Transform of XYZ tile `(z, x, y)` in EPSG:3857 at `size` pixels.
    pub fn web_mercator_tile(z: u8, x: u32, y: u32, size: usize) -> Self {
        let tiles = f64::from(1u32 << z.min(31));
        let span = 2.0 * WEB_MERCATOR_ORIGIN / tiles;
        let west = -WEB_MERCATOR_ORIGIN + f64::from(x) * span;
        let north = WEB_MERCATOR_ORIGIN - f64::from(y) * span;
        Self::from_bounds(west, north - span, west + span, north, size, size)
    }

    /// True when there is no rotation or shear.
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    /// GDAL geotransform order: `[c, a, b, f, d, e]`.
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }
}

/// Coordinate reference system identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u16,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    pub const fn from_epsg(epsg: u16) -> Self {
        Self { epsg }
    }

    pub fn epsg(&self) -> u16 {
        self.epsg
    }

    /// Geographic (lat/lon) systems live in the EPSG 4000 block.
    pub fn is_geographic(&self) -> bool {
        (4000..5000).contains(&self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .strip_prefix("EPSG:")
            .or_else(|| s.trim().strip_prefix("epsg:"))
            .ok_or_else(|| format!("'{s}' is not of the form EPSG:<code>"))?;
        code.parse::<u16>()
            .map(Crs::from_epsg)
            .map_err(|_| format!("'{code}' is not a valid EPSG code"))
    }
}

impl TryFrom<String> for Crs {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Transform and CRS that together locate a tile on the ground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Georeference {
    pub transform: Affine,
    pub crs: Crs,
}

impl Georeference {
    pub fn new(transform: Affine, crs: Crs) -> Self {
        Self { transform, crs }
    }

    /// Build from optional parts. Both must be present.
    pub fn from_parts(transform: Option<Affine>, crs: Option<Crs>) -> Option<Self> {
        Some(Self::new(transform?, crs?))
    }
}
