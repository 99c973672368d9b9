use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use probe_locator::config::BoundingBox;
use probe_locator::error::ProviderError;
use probe_locator::fetch::{BasicClient, HttpClient, auth::BasicAuth, fetch_json};
use probe_locator::geo::GeoPoint;
use probe_locator::provider::PointProvider;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 5;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<NetworkRow>,
    #[serde(rename = "searchAfter", default)]
    search_after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetworkRow {
    trilat: Option<f64>,
    trilong: Option<f64>,
    #[serde(default)]
    lastupdt: Option<String>,
}

/// WiGLE reports `lastupdt` as RFC 3339, older records as a bare
/// `YYYY-MM-DD HH:MM:SS` in UTC.
fn parse_last_update(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()))
        .ok()
}

/// Client for the WiGLE network search API.
pub struct WigleClient<C> {
    http: C,
    base_url: String,
}

impl WigleClient<BasicAuth<BasicClient>> {
    pub fn new(base_url: &str, api_name: String, api_token: String) -> Result<Self> {
        let http = BasicAuth::wrap(BasicClient::new()?, api_name, api_token);
        Ok(Self::with_client(http, base_url))
    }
}

impl<C: HttpClient> WigleClient<C> {
    pub fn with_client(http: C, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(
        &self,
        ssid: &str,
        bbox: Option<&BoundingBox>,
        cursor: Option<&str>,
    ) -> Result<reqwest::Url, ProviderError> {
        let mut url = reqwest::Url::parse(&format!("{}/network/search", self.base_url))
            .map_err(|e| ProviderError::Malformed(format!("bad base url: {e}")))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("ssid", ssid);
            if let Some(b) = bbox {
                q.append_pair("latrange1", &b.lat1.to_string())
                    .append_pair("latrange2", &b.lat2.to_string())
                    .append_pair("longrange1", &b.lon1.to_string())
                    .append_pair("longrange2", &b.lon2.to_string());
            }
            if let Some(c) = cursor {
                q.append_pair("searchAfter", c);
            }
        }
        Ok(url)
    }

    /// Fetches one page, waiting out rate limiting a bounded number of times.
    async fn fetch_page(&self, url: reqwest::Url) -> Result<SearchPage, ProviderError> {
        for attempt in 1..=MAX_ATTEMPTS {
            match fetch_json::<C, SearchPage>(&self.http, url.clone()).await {
                Err(ProviderError::Status { status, .. })
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    warn!(attempt, "WiGLE rate limited, backing off");
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                    }
                }
                Ok(page) if page.success == Some(false) => {
                    return Err(ProviderError::Malformed(
                        page.message.unwrap_or_else(|| "search unsuccessful".to_string()),
                    ));
                }
                other => return other,
            }
        }
        Err(ProviderError::RateLimited {
            attempts: MAX_ATTEMPTS,
        })
    }
}

/// Appends the page's usable coordinates to `out`, stopping at `cap`.
/// Returns `true` once the cap is reached.
fn collect_points(rows: &[NetworkRow], cap: usize, out: &mut Vec<GeoPoint>) -> bool {
    for row in rows {
        if out.len() >= cap {
            return true;
        }
        if let (Some(lat), Some(lon)) = (row.trilat, row.trilong) {
            if let Some(point) = GeoPoint::new(lat, lon) {
                let last_seen = row.lastupdt.as_deref().and_then(parse_last_update);
                out.push(point.seen_at(last_seen));
            }
        }
    }
    out.len() >= cap
}

#[async_trait]
impl<C: HttpClient> PointProvider for WigleClient<C> {
    #[tracing::instrument(skip(self, bbox), fields(bounded = bbox.is_some()))]
    async fn fetch_points(
        &self,
        ssid: &str,
        bbox: Option<&BoundingBox>,
        cap: usize,
    ) -> Result<Vec<GeoPoint>, ProviderError> {
        let mut points = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let url = self.search_url(ssid, bbox, cursor.as_deref())?;
            let page = self.fetch_page(url).await?;
            pages += 1;

            if collect_points(&page.results, cap, &mut points) || page.results.is_empty() {
                break;
            }
            match page.search_after {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(pages, points = points.len(), "WiGLE search complete");
        Ok(points)
    }
}
