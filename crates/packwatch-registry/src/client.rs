//! Registry listing client.
//!
//! The [`RegistryClient`] trait is the seam the reconcile loop polls
//! through; [`HttpRegistryClient`] is the production implementation,
//! walking a cursor-paginated JSON listing endpoint with `ureq`.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use ureq::{
    http::header::{CACHE_CONTROL, PRAGMA},
    Agent,
};
use url::Url;

use crate::{
    entry::{PackageEntry, RemoteServer},
    error::{RegistryError, Result},
};

/// Number of entries requested per listing page.
const PAGE_LIMIT: usize = 100;

/// Upper bound on pages walked per listing, guarding against a registry
/// that keeps returning cursors.
const MAX_PAGES: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Enumerates the entries a registry currently publishes.
///
/// Implementations are blocking; the watch loop bridges calls onto the
/// blocking pool and races them against shutdown, so a single call should
/// bound its own network time rather than retry internally. A transient
/// failure must surface as an error, never as an empty listing.
pub trait RegistryClient: Send + Sync {
    fn list_entries(&self) -> Result<Vec<PackageEntry>>;
}

/// One page of the listing endpoint's response.
#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    entries: Vec<RemoteServer>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// HTTP client for a cursor-paginated registry listing endpoint.
pub struct HttpRegistryClient {
    agent: Agent,
    base_url: Url,
}

impl HttpRegistryClient {
    /// Creates a client for the given listing endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidUrl`] if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| RegistryError::InvalidUrl(err.to_string()))?;

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .user_agent(concat!("packwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .into();

        Ok(Self { agent, base_url })
    }

    fn page_url(&self, cursor: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &PAGE_LIMIT.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("cursor", cursor);
            }
        }
        url
    }

    fn fetch_page(&self, cursor: Option<&str>) -> Result<ListingPage> {
        let url = self.page_url(cursor);
        debug!("Fetching listing page from {url}");

        let resp = self
            .agent
            .get(url.as_str())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .call()
            .map_err(|err| RegistryError::FailedToFetchRemote(err.to_string()))?;

        if !resp.status().is_success() {
            let msg = format!("{} [{}]", url, resp.status());
            return Err(RegistryError::FailedToFetchRemote(msg));
        }

        let body = resp.into_body().read_to_vec()?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn list_entries(&self) -> Result<Vec<PackageEntry>> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 0.. {
            if page_no == MAX_PAGES {
                warn!("Registry listing truncated after {MAX_PAGES} pages");
                break;
            }

            let page = self.fetch_page(cursor.as_deref())?;
            entries.extend(page.entries.into_iter().flat_map(RemoteServer::into_entries));

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!("Registry returned a repeated cursor, stopping pagination");
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(count = entries.len(), "Registry listing complete");
        Ok(entries)
    }
}
