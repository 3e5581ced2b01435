use std::thread;
use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;
use crate::record::SaleRecord;

const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// Performs one GET against the search service and returns the raw body.
pub trait SearchTransport {
    fn get(&self, url: &Url) -> Result<String, FetchError>;
}

impl<T: SearchTransport + ?Sized> SearchTransport for &T {
    fn get(&self, url: &Url) -> Result<String, FetchError> {
        (**self).get(url)
    }
}

/// Blocking HTTP transport with bearer auth.
pub struct HttpTransport {
    client: Client,
    token: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(HttpTransport {
            client,
            token: config.token.clone(),
        })
    }
}

impl SearchTransport for HttpTransport {
    fn get(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text()?)
    }
}

/// Retries transient failures of the wrapped transport with `2^n` second
/// backoff. `max_retries` of 0 passes every call straight through.
pub struct Retrying<T> {
    inner: T,
    max_retries: u32,
    sleep: Box<dyn Fn(Duration)>,
}

impl<T: SearchTransport> Retrying<T> {
    pub fn new(inner: T, max_retries: u32) -> Self {
        Retrying {
            inner,
            max_retries,
            sleep: Box::new(thread::sleep),
        }
    }

    /// Replaces the blocking sleep used between attempts.
    pub fn with_sleep<F: Fn(Duration) + 'static>(mut self, sleep: F) -> Self {
        self.sleep = Box::new(sleep);
        self
    }
}

impl<T: SearchTransport> SearchTransport for Retrying<T> {
    fn get(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.inner.get(url) {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries && e.is_transient() => {
                    attempt += 1;
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    warn!("{} (attempt {}/{}), retrying in {:?}", e, attempt, self.max_retries + 1, wait);
                    (self.sleep)(wait);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One page of hits plus the pagination verdict.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub records: Vec<SaleRecord>,
    /// Total hits the service reports for the query, when present.
    pub total: Option<u64>,
    pub is_last: bool,
    pub search_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(alias = "hits", default)]
    items: Vec<Value>,
    #[serde(alias = "totalHits", default)]
    total: Option<u64>,
}

/// Builds search URLs and turns responses into [`PageResult`]s.
pub struct PageFetcher<T> {
    transport: T,
    api_url: Url,
    index: String,
}

impl<T: SearchTransport> PageFetcher<T> {
    pub fn new(transport: T, mut api_url: Url, index: impl Into<String>) -> Self {
        // join() replaces the last segment unless the base ends in '/'
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }
        PageFetcher {
            transport,
            api_url,
            index: index.into(),
        }
    }

    /// Request URL for `page_number` (1-based). The service pages by a
    /// zero-based `page` index of `limit` items, sorted newest first.
    pub fn search_url(&self, query: &str, page_number: usize, page_size: usize) -> Result<Url, FetchError> {
        let mut url = self.api_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("index", &self.index)
            .append_pair("query", query)
            .append_pair("page", &(page_number.saturating_sub(1)).to_string())
            .append_pair("limit", &page_size.to_string())
            .append_pair("filters", "")
            .append_pair("sort", "date")
            .append_pair("direction", "desc");
        Ok(url)
    }

    pub fn fetch_page(&self, query: &str, page_number: usize, page_size: usize) -> Result<PageResult, FetchError> {
        if page_number == 0 {
            return Err(FetchError::InvalidPage(page_number));
        }
        let url = self.search_url(query, page_number, page_size)?;
        debug!("GET {}", url);

        let body = self.transport.get(&url)?;
        let response: SearchResponse = serde_json::from_str(&body)?;

        let search_url = url.to_string();
        let records: Vec<SaleRecord> = response
            .items
            .iter()
            .map(|hit| SaleRecord::from_hit(hit, &search_url))
            .collect();

        let offset = (page_number.saturating_sub(1) * page_size) as u64;
        let seen = offset + records.len() as u64;
        let is_last = records.is_empty()
            || records.len() < page_size
            || response.total.map_or(false, |total| seen >= total);

        Ok(PageResult {
            records,
            total: response.total,
            is_last,
            search_url,
        })
    }
}

/// Recovers the query string a search URL was built for.
pub fn query_from_search_url(search_url: &str) -> Option<String> {
    let url = Url::parse(search_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.into_owned())
}
