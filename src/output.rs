//! Presentation-side filtering and persistence of candidate reports.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::types::{Candidate, CandidateReport};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Minimum score for a candidate to count as likely.
pub const LIKELY_THRESHOLD: f64 = 0.5;
pub const LIKELY_LIMIT: usize = 50;
pub const FULL_LIMIT: usize = 500;

/// Trims a ranked list for display. With `likely_only` only candidates
/// scoring at least [`LIKELY_THRESHOLD`] are kept.
pub fn present(candidates: &[Candidate], likely_only: bool) -> &[Candidate] {
    if likely_only {
        // ranked input: the likely ones form a prefix
        let n = candidates
            .iter()
            .take_while(|c| c.score >= LIKELY_THRESHOLD)
            .count();
        &candidates[..n.min(LIKELY_LIMIT)]
    } else {
        &candidates[..candidates.len().min(FULL_LIMIT)]
    }
}

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &CandidateReport) {
    debug!("{:#?}", report);
}

/// Logs a report as pretty-printed JSON.
pub fn print_json(report: &CandidateReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// One CSV row per candidate.
#[derive(Debug, Serialize)]
pub struct CandidateRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub mac: &'a str,
    pub ssid: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub last_seen: Option<DateTime<Utc>>,
    pub rarity: f64,
    pub proximity: f64,
    pub co_probe: f64,
    pub score: f64,
}

impl<'a> CandidateRecord<'a> {
    pub fn new(mac: &'a str, candidate: &'a Candidate) -> Self {
        Self {
            timestamp: Utc::now(),
            mac,
            ssid: &candidate.ssid,
            latitude: candidate.point.latitude,
            longitude: candidate.point.longitude,
            last_seen: candidate.point.last_seen,
            rarity: candidate.rarity,
            proximity: candidate.proximity,
            co_probe: candidate.co_probe,
            score: candidate.score,
        }
    }
}

/// Appends candidates as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &str, mac: &str, candidates: &[Candidate]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = candidates.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for candidate in candidates {
        writer.serialize(CandidateRecord::new(mac, candidate))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn candidate(ssid: &str, score: f64) -> Candidate {
        Candidate {
            ssid: ssid.to_string(),
            point: GeoPoint::new(51.5, -0.1).unwrap(),
            rarity: 0.9,
            proximity: 1.0,
            co_probe: 0.5,
            score,
        }
    }

    fn report() -> CandidateReport {
        CandidateReport {
            mac: "AA:BB".to_string(),
            probed: 1,
            candidates: vec![candidate("Net", 0.7)],
            failures: vec![],
        }
    }

    #[test]
    fn test_present_likely_only() {
        let ranked = vec![candidate("a", 0.9), candidate("b", 0.5), candidate("c", 0.49)];
        let shown = present(&ranked, true);
        assert_eq!(shown.len(), 2);
        assert_eq!(present(&ranked, false).len(), 3);
    }

    #[test]
    fn test_present_limits() {
        let ranked: Vec<_> = (0..600).map(|_| candidate("a", 0.9)).collect();
        assert_eq!(present(&ranked, true).len(), LIKELY_LIMIT);
        assert_eq!(present(&ranked, false).len(), FULL_LIMIT);
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&report());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&report()).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("probe_locator_test_header.csv");
        let _ = fs::remove_file(&path);

        let rows = vec![candidate("Net", 0.7), candidate("Other", 0.2)];
        append_records(&path, "AA:BB", &rows).unwrap();
        append_records(&path, "AA:BB", &rows[..1]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 3 data rows
        assert_eq!(content.lines().count(), 4);
        assert!(content.lines().nth(1).unwrap().contains("AA:BB,Net,51.5,-0.1"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_records_includes_last_seen() {
        let path = temp_path("probe_locator_test_last_seen.csv");
        let _ = fs::remove_file(&path);

        let mut seen = candidate("Net", 0.7);
        seen.point = seen.point.seen_at(Some("2023-06-01T08:30:00Z".parse().unwrap()));
        append_records(&path, "AA:BB", &[seen, candidate("Other", 0.2)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().contains("longitude,last_seen,rarity"));
        assert!(lines.next().unwrap().contains("AA:BB,Net,51.5,-0.1,2023-06-01T08:30:00Z,"));
        assert!(lines.next().unwrap().contains("AA:BB,Other,51.5,-0.1,,"));

        fs::remove_file(&path).unwrap();
    }
}
