//! Data types passed between the aggregation stages.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::geo::GeoPoint;

/// Points known for each SSID a device probed, in provider order.
pub type DevicePoints = BTreeMap<String, Vec<GeoPoint>>;

/// The SSIDs one device has probed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProbeSet {
    pub mac: String,
    pub ssids: BTreeSet<String>,
}

impl DeviceProbeSet {
    /// Upper-cases the MAC and drops wildcard (empty) SSIDs.
    pub fn new<I, S>(mac: &str, ssids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ssids = ssids
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        Self {
            mac: mac.trim().to_uppercase(),
            ssids,
        }
    }
}

/// A scored location hypothesis for one `(ssid, point)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub ssid: String,
    pub point: GeoPoint,
    pub rarity: f64,
    pub proximity: f64,
    pub co_probe: f64,
    pub score: f64,
}

/// A lookup that failed for one SSID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SsidFailure {
    pub ssid: String,
    pub error: String,
}

/// What a report amounts to, for callers that need to tell empty cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The device probed for no named networks.
    NoProbedSsids,
    /// SSIDs were probed but none resolved to any point.
    NoCandidates,
    Ranked(usize),
}

/// Result of correlating one device, including per-SSID failures.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub mac: String,
    pub probed: usize,
    pub candidates: Vec<Candidate>,
    pub failures: Vec<SsidFailure>,
}

impl CandidateReport {
    pub fn outcome(&self) -> ReportOutcome {
        if self.probed == 0 {
            ReportOutcome::NoProbedSsids
        } else if self.candidates.is_empty() {
            ReportOutcome::NoCandidates
        } else {
            ReportOutcome::Ranked(self.candidates.len())
        }
    }
}
