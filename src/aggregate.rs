//! Per-device candidate aggregation.
//!
//! Resolves every probed SSID through the result cache, scores each
//! `(ssid, point)` pair against the device-wide point map and ranks the
//! result. A failed lookup removes that SSID from the evidence and is
//! reported alongside the candidates rather than failing the request.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::config::{BoundingBox, ScoringConfig};
use crate::error::ProviderError;
use crate::geo::GeoPoint;
use crate::provider::PointProvider;
use crate::scoring;
use crate::types::{Candidate, CandidateReport, DevicePoints, DeviceProbeSet, SsidFailure};

pub struct CandidateAggregator {
    cache: ResultCache,
    provider: Arc<dyn PointProvider>,
    bbox: Option<BoundingBox>,
    limiter: Arc<Semaphore>,
}

impl CandidateAggregator {
    /// `fetch_concurrency` bounds how many provider calls one aggregator
    /// keeps in flight.
    pub fn new(
        cache: ResultCache,
        provider: Arc<dyn PointProvider>,
        bbox: Option<BoundingBox>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            cache,
            provider,
            bbox,
            limiter: Arc::new(Semaphore::new(fetch_concurrency.max(1))),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Builds the ranked, unfiltered candidate list for one device.
    #[tracing::instrument(skip_all, fields(mac = %device.mac, ssids = device.ssids.len()))]
    pub async fn build_candidates(
        &self,
        device: &DeviceProbeSet,
        base: Option<GeoPoint>,
        cfg: &ScoringConfig,
    ) -> CandidateReport {
        let lookups = device
            .ssids
            .iter()
            .map(|ssid| async move { (ssid, self.lookup(ssid, cfg).await) });

        let mut device_points = DevicePoints::new();
        let mut failures = Vec::new();
        for (ssid, result) in join_all(lookups).await {
            match result {
                Ok(points) => {
                    debug!(ssid = %ssid, points = points.len(), "SSID resolved");
                    device_points.insert(ssid.clone(), points);
                }
                Err(e) => {
                    warn!(ssid = %ssid, error = %e, "SSID lookup failed, excluding from scoring");
                    failures.push(SsidFailure {
                        ssid: ssid.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let candidates = rank_candidates(&device_points, base, cfg);
        info!(
            resolved = device_points.len(),
            failed = failures.len(),
            candidates = candidates.len(),
            "Candidates built"
        );

        CandidateReport {
            mac: device.mac.clone(),
            probed: device.ssids.len(),
            candidates,
            failures,
        }
    }

    async fn lookup(&self, ssid: &str, cfg: &ScoringConfig) -> Result<Vec<GeoPoint>, ProviderError> {
        let provider = self.provider.clone();
        let limiter = self.limiter.clone();
        let bbox = self.bbox;
        let cap = cfg.page_cap;

        let fetch = move |ssid: String| async move {
            let _permit = limiter
                .acquire_owned()
                .await
                .map_err(|e| ProviderError::Aborted(e.to_string()))?;
            provider.fetch_points(&ssid, bbox.as_ref(), cap).await
        };

        let mut points = self.cache.get_or_fetch(ssid, fetch, cfg.ttl()).await?;
        // entries cached under a larger cap still obey the current one
        points.truncate(cap);
        Ok(points)
    }
}

/// Scores every `(ssid, point)` pair and sorts by score descending, then by
/// SSID, then by provider order. Identical points under different SSIDs are
/// kept as separate candidates.
pub fn rank_candidates(
    device_points: &DevicePoints,
    base: Option<GeoPoint>,
    cfg: &ScoringConfig,
) -> Vec<Candidate> {
    let mut ranked: Vec<(usize, Candidate)> = Vec::new();

    for (ssid, points) in device_points {
        for (order, point) in points.iter().enumerate() {
            let f = scoring::factors(*point, ssid, device_points, base, cfg);
            ranked.push((
                order,
                Candidate {
                    ssid: ssid.clone(),
                    point: *point,
                    rarity: f.rarity,
                    proximity: f.proximity,
                    co_probe: f.co_probe,
                    score: f.score,
                },
            ));
        }
    }

    ranked.sort_by(|(ia, a), (ib, b)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.ssid.cmp(&b.ssid))
            .then_with(|| ia.cmp(ib))
    });

    ranked.into_iter().map(|(_, c)| c).collect()
}
