//! Trait for sources of geocoded SSID sightings (e.g., WiGLE).

use async_trait::async_trait;

use crate::config::BoundingBox;
use crate::error::ProviderError;
use crate::geo::GeoPoint;

/// Abstraction over a wardriving database.
///
/// Implementations must not have side effects visible to the caller: the
/// result cache may call `fetch_points` again for the same SSID at any time.
#[async_trait]
pub trait PointProvider: Send + Sync {
    /// Returns at most `cap` points where `ssid` was observed, optionally
    /// restricted to `bbox`, in the provider's own order.
    async fn fetch_points(
        &self,
        ssid: &str,
        bbox: Option<&BoundingBox>,
        cap: usize,
    ) -> Result<Vec<GeoPoint>, ProviderError>;
}
