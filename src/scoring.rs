//! Composite confidence score for a single candidate point.
//!
//! A candidate's score is the product of three factors:
//!
//! | Factor    | Meaning                                                     |
//! |-----------|-------------------------------------------------------------|
//! | rarity    | fewer known sightings of the SSID make it more telling      |
//! | proximity | Gaussian falloff around the operator's base location        |
//! | co-probe  | share of the device's other SSIDs seen near the same point  |
//!
//! `score = rarity * proximity * (alpha * co_probe + (1 - alpha))`

use crate::config::ScoringConfig;
use crate::geo::{GeoPoint, distance_km};
use crate::types::DevicePoints;

/// Inverse-log frequency weight. `point_count` is capped by the provider, so
/// this estimates commonness rather than measuring it.
pub fn rarity(point_count: usize, cfg: &ScoringConfig) -> f64 {
    cfg.rarity_weight / (2.0 + point_count as f64).ln()
}

pub fn proximity(point: GeoPoint, base: Option<GeoPoint>, cfg: &ScoringConfig) -> f64 {
    match base {
        None => cfg.proximity_weight,
        Some(base) => {
            let d = distance_km(point, base);
            cfg.proximity_weight * (-(d * d) / (2.0 * cfg.sigma_km * cfg.sigma_km)).exp()
        }
    }
}

/// Fraction of the device's other SSIDs with a point within the co-probe radius.
pub fn co_probe(point: GeoPoint, ssid: &str, device_points: &DevicePoints, cfg: &ScoringConfig) -> f64 {
    let radius_km = cfg.coprobe_radius_km();
    let mut others = 0usize;
    let mut matches = 0usize;

    for (other, points) in device_points {
        if other == ssid {
            continue;
        }
        others += 1;
        if points.iter().any(|p| distance_km(point, *p) <= radius_km) {
            matches += 1;
        }
    }

    if others == 0 {
        0.0
    } else {
        matches as f64 / others as f64
    }
}

/// Blends the three factors into the final score.
pub fn combine(rarity: f64, proximity: f64, co_probe: f64, cfg: &ScoringConfig) -> f64 {
    let alpha = cfg.alpha_coprobe;
    rarity * proximity * (alpha * co_probe + (1.0 - alpha))
}

/// Every factor of one candidate alongside the score they combine into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factors {
    pub rarity: f64,
    pub proximity: f64,
    pub co_probe: f64,
    pub score: f64,
}

/// Scores `point` as a sighting of `ssid`, with `device_points` as co-probe
/// context. Rarity counts the points resolved for `ssid`.
pub fn factors(
    point: GeoPoint,
    ssid: &str,
    device_points: &DevicePoints,
    base: Option<GeoPoint>,
    cfg: &ScoringConfig,
) -> Factors {
    let count = device_points.get(ssid).map_or(0, Vec::len);
    let rarity = rarity(count, cfg);
    let proximity = proximity(point, base, cfg);
    let co_probe = co_probe(point, ssid, device_points, cfg);
    Factors {
        rarity,
        proximity,
        co_probe,
        score: combine(rarity, proximity, co_probe, cfg),
    }
}

pub fn score(
    point: GeoPoint,
    ssid: &str,
    device_points: &DevicePoints,
    base: Option<GeoPoint>,
    cfg: &ScoringConfig,
) -> f64 {
    factors(point, ssid, device_points, base, cfg).score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn points(entries: &[(&str, Vec<GeoPoint>)]) -> DevicePoints {
        entries
            .iter()
            .map(|(s, pts)| (s.to_string(), pts.clone()))
            .collect()
    }

    #[test]
    fn test_rarity_strictly_decreasing() {
        let cfg = ScoringConfig::default();
        let mut last = f64::INFINITY;
        for n in [0, 1, 2, 10, 100, 400] {
            let r = rarity(n, &cfg);
            assert!(r < last, "rarity({n}) = {r} not below {last}");
            last = r;
        }
    }

    #[test]
    fn test_rarity_of_unseen_ssid_is_finite() {
        let cfg = ScoringConfig::default();
        let r = rarity(0, &cfg);
        assert!((r - 1.0 / 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_proximity_without_base_is_weight() {
        let cfg = ScoringConfig {
            proximity_weight: 0.8,
            ..Default::default()
        };
        for pt in [p(0.0, 0.0), p(60.0, 20.0), p(-45.0, 170.0)] {
            assert_eq!(proximity(pt, None, &cfg), 0.8);
        }
    }

    #[test]
    fn test_proximity_peaks_at_base_and_decays() {
        let cfg = ScoringConfig::default();
        let base = p(51.5, -0.1);
        assert_eq!(proximity(base, Some(base), &cfg), cfg.proximity_weight);

        let mut last = cfg.proximity_weight;
        for dlat in [0.01, 0.05, 0.1, 0.5, 2.0] {
            let v = proximity(p(51.5 + dlat, -0.1), Some(base), &cfg);
            assert!(v <= last && v >= 0.0);
            last = v;
        }
    }

    #[test]
    fn test_proximity_far_from_base_vanishes() {
        let cfg = ScoringConfig::default();
        // ~1000 km north of the base with sigma 10 km
        let v = proximity(p(60.5, -0.1), Some(p(51.5, -0.1)), &cfg);
        assert!(v < 1e-100);
    }

    #[test]
    fn test_co_probe_single_ssid_is_zero() {
        let cfg = ScoringConfig::default();
        let dp = points(&[("Solo", vec![p(51.5, -0.1), p(51.6, -0.2)])]);
        for pt in &dp["Solo"] {
            assert_eq!(co_probe(*pt, "Solo", &dp, &cfg), 0.0);
        }
    }

    #[test]
    fn test_co_probe_full_agreement() {
        let cfg = ScoringConfig {
            coprobe_radius_m: 500.0,
            ..Default::default()
        };
        let dp = points(&[
            ("A", vec![p(51.5, -0.1), p(51.6, -0.2)]),
            ("B", vec![p(51.5005, -0.1), p(51.6005, -0.2)]),
        ]);
        for pt in &dp["A"] {
            assert_eq!(co_probe(*pt, "A", &dp, &cfg), 1.0);
        }
    }

    #[test]
    fn test_co_probe_partial_and_empty_sets() {
        let cfg = ScoringConfig::default();
        let dp = points(&[
            ("A", vec![p(10.0, 10.0)]),
            ("B", vec![p(10.0, 10.001)]),
            ("C", vec![p(-10.0, -10.0)]),
            ("D", vec![]),
        ]);
        let cp = co_probe(p(10.0, 10.0), "A", &dp, &cfg);
        assert!((cp - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_alpha_zero_ignores_co_probe() {
        let cfg = ScoringConfig {
            alpha_coprobe: 0.0,
            ..Default::default()
        };
        assert_eq!(combine(0.5, 0.9, 0.0, &cfg), combine(0.5, 0.9, 1.0, &cfg));
    }

    #[test]
    fn test_alpha_one_without_co_probe_is_zero() {
        let cfg = ScoringConfig {
            alpha_coprobe: 1.0,
            ..Default::default()
        };
        assert_eq!(combine(0.9, 0.9, 0.0, &cfg), 0.0);
    }

    #[test]
    fn test_combine_increases_in_each_factor() {
        let cfg = ScoringConfig::default();
        let base = combine(0.5, 0.5, 0.5, &cfg);
        assert!(combine(0.6, 0.5, 0.5, &cfg) > base);
        assert!(combine(0.5, 0.6, 0.5, &cfg) > base);
        assert!(combine(0.5, 0.5, 0.6, &cfg) > base);
    }

    #[test]
    fn test_score_within_bounds() {
        let cfg = ScoringConfig {
            rarity_weight: 2.0,
            proximity_weight: 3.0,
            ..Default::default()
        };
        let dp = points(&[
            ("A", vec![p(51.5, -0.1)]),
            ("B", vec![p(51.5, -0.1), p(40.0, 3.0)]),
        ]);
        let base = Some(p(51.4, -0.1));
        for (ssid, pts) in &dp {
            for pt in pts {
                let s = score(*pt, ssid, &dp, base, &cfg);
                assert!(s >= 0.0);
                assert!(s <= cfg.rarity_weight * cfg.proximity_weight);
            }
        }
    }

    #[test]
    fn test_factors_match_individual_functions() {
        let cfg = ScoringConfig::default();
        let dp = points(&[
            ("A", vec![p(10.0, 10.0), p(20.0, 20.0)]),
            ("B", vec![p(10.0, 10.001)]),
        ]);
        let base = Some(p(10.05, 10.0));

        let f = factors(p(10.0, 10.0), "A", &dp, base, &cfg);
        assert_eq!(f.rarity, rarity(2, &cfg));
        assert_eq!(f.proximity, proximity(p(10.0, 10.0), base, &cfg));
        assert_eq!(f.co_probe, 1.0);
        assert_eq!(f.score, combine(f.rarity, f.proximity, f.co_probe, &cfg));
        assert_eq!(f.score, score(p(10.0, 10.0), "A", &dp, base, &cfg));
    }
}
