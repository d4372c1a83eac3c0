use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::SheetError;
use crate::sheet::Sheet;

/// Sheets published this way refresh slowly; five minutes of staleness is fine.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    sheet: Sheet,
    fetched_at: Instant,
}

/// Read-through cache keyed by sheet name with a fixed time-to-live.
///
/// Owned explicitly by the client instead of living in ambient process
/// state; expiry is the only invalidation.
pub struct SheetCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl SheetCache {
    pub fn new(ttl: Duration) -> SheetCache {
        SheetCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached sheet if it is still within the TTL window.
    pub fn get(&self, name: &str) -> Option<&Sheet> {
        let entry = self.entries.get(name)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(&entry.sheet)
        } else {
            None
        }
    }

    pub fn insert(&mut self, name: &str, sheet: Sheet) {
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                sheet,
                fetched_at: Instant::now(),
            },
        );
    }
}

/// Fetches named tabs of a published spreadsheet as CSV text.
pub struct SheetClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    cache: Mutex<SheetCache>,
}

impl SheetClient {
    pub fn new(spreadsheet_id: impl Into<String>, ttl: Duration) -> SheetClient {
        SheetClient {
            http: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.into(),
            cache: Mutex::new(SheetCache::new(ttl)),
        }
    }

    fn export_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/gviz/tq",
            self.spreadsheet_id
        )
    }

    /// Fetch a sheet by tab name, serving from the cache within the TTL.
    ///
    /// Network failures, non-success statuses and malformed CSV all
    /// propagate; there is no stale-data fallback here.
    pub async fn fetch_sheet(&self, name: &str) -> Result<Sheet, SheetError> {
        {
            let cache = self.cache.lock().await;
            if let Some(sheet) = cache.get(name) {
                debug!(sheet = name, "serving sheet from cache");
                return Ok(sheet.clone());
            }
        }

        info!(sheet = name, "fetching sheet");
        let response = self
            .http
            .get(self.export_url())
            // The sheet name is percent-encoded by the query serializer
            .query(&[("tqx", "out:csv"), ("sheet", name)])
            .send()
            .await
            .map_err(|source| SheetError::Http {
                name: name.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::Status {
                name: name.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| SheetError::Http {
            name: name.to_string(),
            source,
        })?;

        let sheet = Sheet::from_csv(name, &text)?;

        let mut cache = self.cache.lock().await;
        cache.insert(name, sheet.clone());
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sheet() -> Sheet {
        Sheet::from_csv("Stocks Invested", "Name,P&L\nINFY,₹10\n").unwrap()
    }

    #[test]
    fn test_cache_serves_fresh_entries() {
        let mut cache = SheetCache::new(Duration::from_secs(300));
        cache.insert("Stocks Invested", sample_sheet());
        assert_eq!(cache.get("Stocks Invested"), Some(&sample_sheet()));
    }

    #[test]
    fn test_cache_misses_unknown_sheets() {
        let cache = SheetCache::new(Duration::from_secs(300));
        assert_eq!(cache.get("Stocks Invested"), None);
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let mut cache = SheetCache::new(Duration::ZERO);
        cache.insert("Stocks Invested", sample_sheet());
        assert_eq!(cache.get("Stocks Invested"), None);
    }

    #[test]
    fn test_export_url_contains_spreadsheet_id() {
        let client = SheetClient::new("abc123", DEFAULT_TTL);
        assert_eq!(
            client.export_url(),
            "https://docs.google.com/spreadsheets/d/abc123/gviz/tq"
        );
    }
}
