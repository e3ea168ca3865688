//! Output format registry.
//!
//! Each [`ImageType`] resolves to a static [`FormatProfile`]: the driver that
//! writes it, its media type and file extension, the default encoder options,
//! and whether it can carry georeferencing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::georef::Georeference;
use crate::error::PipelineError;

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Pngraw,
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    Webp,
    Tif,
    Npy,
}

impl ImageType {
    pub const ALL: [ImageType; 6] = [
        ImageType::Png,
        ImageType::Pngraw,
        ImageType::Jpeg,
        ImageType::Webp,
        ImageType::Tif,
        ImageType::Npy,
    ];

    pub fn profile(&self) -> &'static FormatProfile {
        match self {
            ImageType::Png => &PNG,
            ImageType::Pngraw => &PNGRAW,
            ImageType::Jpeg => &JPEG,
            ImageType::Webp => &WEBP,
            ImageType::Tif => &TIF,
            ImageType::Npy => &NPY,
        }
    }

    pub fn media_type(&self) -> &'static str {
        self.profile().media_type
    }

    pub fn extension(&self) -> &'static str {
        self.profile().extension
    }

    pub fn driver(&self) -> Driver {
        self.profile().driver
    }

    pub fn supports_georeference(&self) -> bool {
        self.profile().georeferencing
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageType::Png),
            "pngraw" => Ok(ImageType::Pngraw),
            "jpg" | "jpeg" => Ok(ImageType::Jpeg),
            "webp" => Ok(ImageType::Webp),
            "tif" | "tiff" => Ok(ImageType::Tif),
            "npy" => Ok(ImageType::Npy),
            _ => Err(PipelineError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Encoder backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Png,
    Jpeg,
    Webp,
    GTiff,
    Npy,
}

impl Driver {
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Png => "PNG",
            Driver::Jpeg => "JPEG",
            Driver::Webp => "WEBP",
            Driver::GTiff => "GTiff",
            Driver::Npy => "NPY",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TIFF strip compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Deflate,
}

impl Compression {
    /// Value of the TIFF `Compression` tag.
    pub fn tag_value(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Deflate => 8,
        }
    }
}

/// Options handed to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncodeOptions {
    /// Lossy quality, 1-100 (JPEG)
    pub quality: Option<u8>,
    /// Lossless encoding (WEBP)
    pub lossless: bool,
    /// Strip compression (GTiff)
    pub compression: Compression,
    /// Write the mask as an alpha channel
    pub alpha: bool,
    /// Transform and CRS to embed (GTiff)
    pub georeference: Option<Georeference>,
}

impl EncodeOptions {
    /// Option set used when a georeference is embedded. Replaces the format
    /// defaults entirely.
    pub fn georeferenced(georeference: Georeference) -> Self {
        Self {
            alpha: true,
            georeference: Some(georeference),
            ..Self::default()
        }
    }
}

/// Static description of an output format.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatProfile {
    pub driver: Driver,
    pub media_type: &'static str,
    pub extension: &'static str,
    pub defaults: EncodeOptions,
    pub georeferencing: bool,
}

const NO_OPTIONS: EncodeOptions = EncodeOptions {
    quality: None,
    lossless: false,
    compression: Compression::None,
    alpha: false,
    georeference: None,
};

static PNG: FormatProfile = FormatProfile {
    driver: Driver::Png,
    media_type: "image/png",
    extension: "png",
    defaults: EncodeOptions {
        alpha: true,
        ..NO_OPTIONS
    },
    georeferencing: false,
};

static PNGRAW: FormatProfile = FormatProfile {
    driver: Driver::Png,
    media_type: "image/png",
    extension: "png",
    defaults: NO_OPTIONS,
    georeferencing: false,
};

static JPEG: FormatProfile = FormatProfile {
    driver: Driver::Jpeg,
    media_type: "image/jpeg",
    extension: "jpg",
    defaults: EncodeOptions {
        quality: Some(85),
        ..NO_OPTIONS
    },
    georeferencing: false,
};

static WEBP: FormatProfile = FormatProfile {
    driver: Driver::Webp,
    media_type: "image/webp",
    extension: "webp",
    defaults: EncodeOptions {
        lossless: true,
        alpha: true,
        ..NO_OPTIONS
    },
    georeferencing: false,
};

static TIF: FormatProfile = FormatProfile {
    driver: Driver::GTiff,
    media_type: "image/tiff; application=geotiff",
    extension: "tif",
    defaults: EncodeOptions {
        compression: Compression::Deflate,
        alpha: true,
        ..NO_OPTIONS
    },
    georeferencing: true,
};

static NPY: FormatProfile = FormatProfile {
    driver: Driver::Npy,
    media_type: "application/x-binary",
    extension: "npy",
    defaults: NO_OPTIONS,
    georeferencing: false,
};
