use log::{info, warn};

use crate::delay_manager::DelayManager;
use crate::error::FetchError;
use crate::record::SaleRecord;
use crate::search_api::{PageFetcher, SearchTransport};

/// Everything fetched for one query.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    /// Records from all pages, in page order.
    pub records: Vec<SaleRecord>,
    pub pages_fetched: usize,
    /// Set when a page failure cut pagination short.
    pub truncated_by: Option<FetchError>,
}

/// Walks every page of a query until the fetcher signals the end.
pub struct QueryRunner<T> {
    fetcher: PageFetcher<T>,
    delay: DelayManager,
    page_size: usize,
}

impl<T: SearchTransport> QueryRunner<T> {
    pub fn new(fetcher: PageFetcher<T>, delay: DelayManager, page_size: usize) -> Self {
        QueryRunner {
            fetcher,
            delay,
            page_size: page_size.max(1),
        }
    }

    /// Fetches all pages for `query`. `position` and `total` only feed the
    /// progress log.
    ///
    /// A failed page ends pagination; records from earlier pages are kept.
    pub fn run_query(&self, query: &str, position: usize, total: usize) -> QueryOutcome {
        let mut outcome = QueryOutcome::default();
        let mut page = 1;

        loop {
            self.delay.before_request();

            match self.fetcher.fetch_page(query, page, self.page_size) {
                Ok(result) => {
                    outcome.pages_fetched += 1;
                    let count = result.records.len();
                    outcome.records.extend(result.records);
                    info!(
                        "Query {}/{} '{}' page {}: {} items ({} so far{})",
                        position,
                        total,
                        query,
                        page,
                        count,
                        outcome.records.len(),
                        result.total.map(|t| format!(" of {}", t)).unwrap_or_default()
                    );
                    if result.is_last {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    warn!(
                        "Query {}/{} '{}' page {} failed: {}. Keeping {} records fetched so far.",
                        position,
                        total,
                        query,
                        page,
                        e,
                        outcome.records.len()
                    );
                    outcome.truncated_by = Some(e);
                    break;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use url::Url;

    /// Serves one scripted body per call; `None` answers with a 500.
    struct Script {
        pages: RefCell<Vec<Option<String>>>,
        calls: RefCell<usize>,
    }

    impl Script {
        fn new(pages: Vec<Option<String>>) -> Self {
            Script { pages: RefCell::new(pages), calls: RefCell::new(0) }
        }
    }

    impl SearchTransport for Script {
        fn get(&self, url: &Url) -> Result<String, FetchError> {
            *self.calls.borrow_mut() += 1;
            let mut pages = self.pages.borrow_mut();
            if pages.is_empty() {
                return Ok(r#"{"hits":[]}"#.to_string());
            }
            pages.remove(0).ok_or(FetchError::Status { status: 500, url: url.to_string() })
        }
    }

    fn page(n: usize, total: Option<u64>) -> Option<String> {
        let items: Vec<String> = (0..n).map(|i| format!(r#"{{"itemId":"{i}"}}"#)).collect();
        Some(match total {
            Some(t) => format!(r#"{{"hits":[{}],"totalHits":{}}}"#, items.join(","), t),
            None => format!(r#"{{"hits":[{}]}}"#, items.join(",")),
        })
    }

    fn runner(script: &Script) -> QueryRunner<&Script> {
        let fetcher = PageFetcher::new(script, Url::parse("https://api.example").unwrap(), "salesarchive");
        QueryRunner::new(fetcher, DelayManager::none(), 50)
    }

    #[test]
    fn concatenates_pages_until_short_page() {
        let script = Script::new(vec![page(50, Some(110)), page(50, Some(110)), page(10, Some(110))]);
        let outcome = runner(&script).run_query("a", 1, 1);
        assert_eq!(outcome.records.len(), 110);
        assert_eq!(outcome.pages_fetched, 3);
        assert!(outcome.truncated_by.is_none());
        assert!(outcome.records[0].search_url.contains("page=0"));
        assert!(outcome.records[109].search_url.contains("page=2"));
    }

    #[test]
    fn exact_multiple_without_total_stops_on_empty_page() {
        let script = Script::new(vec![page(50, None), page(50, None), page(0, None)]);
        let outcome = runner(&script).run_query("a", 1, 1);
        assert_eq!(outcome.records.len(), 100);
        assert_eq!(*script.calls.borrow(), 3);
    }

    #[test]
    fn exact_multiple_with_total_stops_without_extra_request() {
        let script = Script::new(vec![page(50, Some(100)), page(50, Some(100))]);
        let outcome = runner(&script).run_query("a", 1, 1);
        assert_eq!(outcome.records.len(), 100);
        assert_eq!(*script.calls.borrow(), 2);
    }

    #[test]
    fn failure_on_third_page_keeps_earlier_pages() {
        let script = Script::new(vec![page(50, Some(500)), page(50, Some(500)), None, page(50, Some(500))]);
        let outcome = runner(&script).run_query("a", 1, 1);
        assert_eq!(outcome.records.len(), 100);
        assert_eq!(outcome.pages_fetched, 2);
        assert!(matches!(outcome.truncated_by, Some(FetchError::Status { status: 500, .. })));
        assert_eq!(*script.calls.borrow(), 3);
    }

    #[test]
    fn zero_results_is_not_an_error() {
        let script = Script::new(vec![page(0, Some(0))]);
        let outcome = runner(&script).run_query("a", 1, 1);
        assert!(outcome.records.is_empty());
        assert!(outcome.truncated_by.is_none());
        assert_eq!(outcome.pages_fetched, 1);
    }
}
