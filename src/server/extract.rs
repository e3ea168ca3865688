//! Request extractors.

use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::tile::{get_cache, CacheHandle};

/// Cache handle attached to the request, if caching is enabled.
///
/// The router installs the handle as a request extension; this extractor
/// never rejects. Handlers that see `OptionalCache(None)` render without a
/// cache.
#[derive(Clone)]
pub struct OptionalCache(pub Option<CacheHandle>);

impl OptionalCache {
    pub fn handle(&self) -> Option<&CacheHandle> {
        self.0.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for OptionalCache
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalCache(get_cache(&parts.extensions)))
    }
}
