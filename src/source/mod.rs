//! Tile sources.
//!
//! A source turns a tile address into decoded pixels. It sits underneath the
//! renderer and knows nothing about output formats or caching:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              TileRenderer               │
//! └────────────────────┬────────────────────┘
//!                      │  TileCoord
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           TileSource Trait              │
//! │   (data + mask + optional georef)       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//!            ┌───────────────────┐
//!            │ NpyDirectorySource│
//!            │ (local .npy tree) │
//!            └───────────────────┘
//! ```

mod local;

pub use local::NpyDirectorySource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::encode::Georeference;
use crate::error::SourceError;
use crate::tile::{Mask, TileData};

/// Address of a tile in a tile matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Dataset identifier
    pub identifier: String,
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(identifier: impl Into<String>, z: u8, x: u32, y: u32) -> Self {
        Self {
            identifier: identifier.into(),
            z,
            x,
            y,
        }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}/{}", self.identifier, self.z, self.x, self.y)
    }
}

/// Pixels handed over by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    pub data: TileData,
    pub mask: Mask,
    /// Placement of the tile, when the source knows it
    pub georeference: Option<Georeference>,
}

/// Supplies decoded tiles by address.
///
/// Implementations must be cheap to share across requests; the renderer
/// holds one instance for the lifetime of the server.
#[async_trait]
pub trait TileSource: Send + Sync + 'static {
    /// Read and decode the tile at `tile`.
    async fn read(&self, tile: &TileCoord) -> Result<DecodedTile, SourceError>;
}
