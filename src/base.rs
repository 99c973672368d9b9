//! Operator-chosen reference point used to bias proximity scoring.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{info, warn};

use crate::geo::GeoPoint;

/// Owns the single active base location.
///
/// Reads return a copy of the whole value, so a concurrent writer is seen
/// either entirely or not at all. When constructed with a path the value is
/// written through to disk on every change and restored on startup.
pub struct BaseLocationStore {
    current: RwLock<Option<GeoPoint>>,
    path: Option<PathBuf>,
}

impl BaseLocationStore {
    /// In-memory only; starts unset.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            path: None,
        }
    }

    /// Restores the base location from `path` if present. An unreadable or
    /// invalid file is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let restored = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Option<GeoPoint>>(&content) {
                Ok(point) => point.and_then(|p| GeoPoint::new(p.latitude, p.longitude)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable base location file");
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            current: RwLock::new(restored),
            path: Some(path),
        }
    }

    pub fn get(&self) -> Option<GeoPoint> {
        match self.current.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set(&self, point: GeoPoint) -> Result<()> {
        self.replace(Some(point))?;
        info!(lat = point.latitude, lon = point.longitude, "Base location set");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.replace(None)?;
        info!("Base location cleared");
        Ok(())
    }

    fn replace(&self, value: Option<GeoPoint>) -> Result<()> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = value;

        // persist while still holding the lock so file order matches write order
        if let Some(path) = &self.path {
            let json = serde_json::to_string(&value)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write base location to {}", path.display()))?;
        }
        Ok(())
    }
}

impl Default for BaseLocationStore {
    fn default() -> Self {
        Self::new()
    }
}
