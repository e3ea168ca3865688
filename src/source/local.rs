//! Directory-backed tile source.
//!
//! Tiles are stored as raw numeric dumps at
//! `{root}/{identifier}/{z}/{x}/{y}.npy`, in the layout produced by the NPY
//! encoder (data record followed by an optional mask record).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{DecodedTile, TileCoord, TileSource};
use crate::encode::{decode_npy, Affine, Crs, Georeference};
use crate::error::SourceError;

/// Reads tiles from a local directory tree.
///
/// Every tile is assumed to be a Web Mercator tile of the standard XYZ grid;
/// its georeference is derived from the address and the tile width.
#[derive(Debug, Clone)]
pub struct NpyDirectorySource {
    root: PathBuf,
}

impl NpyDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory tiles are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a tile, or `None` if the identifier could escape the root.
    pub fn tile_path(&self, tile: &TileCoord) -> Option<PathBuf> {
        if !is_safe_identifier(&tile.identifier) {
            return None;
        }
        Some(
            self.root
                .join(&tile.identifier)
                .join(tile.z.to_string())
                .join(tile.x.to_string())
                .join(format!("{}.npy", tile.y)),
        )
    }
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier != "."
        && !identifier.contains("..")
        && !identifier.contains(['/', '\\', '\0'])
}

#[async_trait]
impl TileSource for NpyDirectorySource {
    async fn read(&self, tile: &TileCoord) -> Result<DecodedTile, SourceError> {
        let path = self
            .tile_path(tile)
            .ok_or_else(|| SourceError::NotFound(tile.to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(tile.to_string()),
            _ => SourceError::Io(format!("{}: {}", path.display(), e)),
        })?;
        debug!(tile = %tile, bytes = bytes.len(), "read tile from disk");

        let (data, mask) = decode_npy(&bytes)?;
        let (_, _, cols) = data.shape();
        let transform = Affine::web_mercator_tile(tile.z, tile.x, tile.y, cols);

        Ok(DecodedTile {
            data,
            mask,
            georeference: Some(Georeference::new(transform, Crs::WEB_MERCATOR)),
        })
    }
}
