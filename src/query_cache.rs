//! Per-term result cache and the session state layered over it.
//!
//! The manager never performs I/O itself. Operations that need the network
//! hand back a [`FetchRequest`]; whoever runs the request (see
//! [`crate::worker::Fetcher`]) returns a [`FetchOutcome`] that is fed back in
//! through [`QueryCacheManager::apply`] on the UI thread.
//!
//! Every request is stamped with the manager's generation. Tearing the
//! manager down bumps the generation, so outcomes that land afterwards are
//! dropped on both the success and the failure path.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::config::PageOrdering;
use crate::error::FetchError;
use crate::models::{CacheEntry, Hit, ResultPage, SortKey};
use crate::view;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub term: String,
    pub page: u32,
    pub generation: u64,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub request: FetchRequest,
    pub result: Result<ResultPage, FetchError>,
}

pub struct QueryCacheManager {
    cache: HashMap<String, CacheEntry>,
    // Pages that arrived ahead of their predecessor, sequential ordering only
    staged: HashMap<String, BTreeMap<u32, Vec<Hit>>>,
    active_search_term: String,
    active_cache_key: String,
    sort_key: SortKey,
    sort_reversed: bool,
    in_flight: HashMap<RequestId, (String, u32)>,
    last_error: Option<FetchError>,
    active: bool,
    generation: u64,
    next_request_id: RequestId,
    ordering: PageOrdering,
}

impl QueryCacheManager {
    pub fn new(default_query: impl Into<String>, ordering: PageOrdering) -> Self {
        Self {
            cache: HashMap::new(),
            staged: HashMap::new(),
            active_search_term: default_query.into(),
            active_cache_key: String::new(),
            sort_key: SortKey::None,
            sort_reversed: false,
            in_flight: HashMap::new(),
            last_error: None,
            active: true,
            generation: 0,
            next_request_id: 0,
            ordering,
        }
    }

    /// Runs the initial search for whatever is in the search input.
    pub fn start(&mut self) -> Option<FetchRequest> {
        let term = self.active_search_term.clone();
        self.submit_search(term)
    }

    /// Edits the search input without changing what is displayed.
    pub fn set_search_input(&mut self, text: impl Into<String>) {
        self.active_search_term = text.into();
    }

    /// Activates `term`, fetching its first page unless it is already cached
    /// or already on its way.
    pub fn submit_search(&mut self, term: impl Into<String>) -> Option<FetchRequest> {
        let term = term.into();
        self.active_search_term = term.clone();
        self.active_cache_key = term.clone();

        if self.needs_search(&term) {
            Some(self.fetch_page(term, 0))
        } else {
            debug!(term = %term, "search served from cache");
            None
        }
    }

    fn needs_search(&self, term: &str) -> bool {
        if self.cache.contains_key(term) {
            return false;
        }
        !self
            .in_flight
            .values()
            .any(|(pending, page)| pending == term && *page == 0)
    }

    pub fn fetch_page(&mut self, term: impl Into<String>, page: u32) -> FetchRequest {
        let term = term.into();
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.in_flight.insert(id, (term.clone(), page));

        info!(id, term = %term, page, "fetch issued");
        FetchRequest {
            id,
            term,
            page,
            generation: self.generation,
        }
    }

    /// Fetches the page after the highest one cached for the active key.
    ///
    /// Sequential ordering asks for the first page not yet applied instead,
    /// so a failed first page is retried rather than skipped.
    pub fn request_more(&mut self) -> FetchRequest {
        let next = match self.ordering {
            PageOrdering::Arrival => self.current_page() + 1,
            PageOrdering::Sequential => self.next_contiguous_page(&self.active_cache_key),
        };
        self.fetch_page(self.active_cache_key.clone(), next)
    }

    fn next_contiguous_page(&self, term: &str) -> u32 {
        self.cache.get(term).map_or(0, |entry| entry.page + 1)
    }

    /// Returns whether the outcome changed any state.
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        let FetchOutcome { request, result } = outcome;

        if !self.active || request.generation != self.generation {
            warn!(
                id = request.id,
                term = %request.term,
                page = request.page,
                "discarding fetch result from a torn down session"
            );
            return false;
        }
        if self.in_flight.remove(&request.id).is_none() {
            warn!(id = request.id, "discarding result for an unknown request");
            return false;
        }

        match result {
            Ok(result) => {
                info!(
                    id = request.id,
                    term = %request.term,
                    page = request.page,
                    hits = result.hits.len(),
                    "fetch succeeded"
                );
                self.store_page(request.term, request.page, result.hits);
                self.last_error = None;
            }
            Err(err) => {
                warn!(
                    id = request.id,
                    term = %request.term,
                    page = request.page,
                    error = %err,
                    "fetch failed"
                );
                self.last_error = Some(err);
            }
        }
        true
    }

    fn store_page(&mut self, term: String, page: u32, hits: Vec<Hit>) {
        match self.ordering {
            PageOrdering::Arrival => {
                let entry = self.cache.entry(term).or_default();
                entry.hits.extend(hits);
                entry.page = page;
            }
            PageOrdering::Sequential => self.store_page_in_sequence(term, page, hits),
        }
    }

    fn store_page_in_sequence(&mut self, term: String, page: u32, hits: Vec<Hit>) {
        let expected = self.next_contiguous_page(&term);

        if page < expected {
            debug!(term = %term, page, "dropping page that was already applied");
            return;
        }
        if page > expected {
            debug!(term = %term, page, expected, "staging page until its predecessor arrives");
            self.staged.entry(term).or_default().insert(page, hits);
            return;
        }

        let entry = self.cache.entry(term.clone()).or_default();
        entry.hits.extend(hits);
        entry.page = page;

        if let Some(staged) = self.staged.get_mut(&term) {
            while let Some(hits) = staged.remove(&(entry.page + 1)) {
                entry.hits.extend(hits);
                entry.page += 1;
            }
            if staged.is_empty() {
                self.staged.remove(&term);
            }
        }
    }

    /// Drops the hit with `object_id` from the active entry. No-op when the
    /// active key has nothing cached.
    pub fn dismiss(&mut self, object_id: &str) {
        let Some(entry) = self.cache.get_mut(&self.active_cache_key) else {
            return;
        };
        let before = entry.hits.len();
        entry.hits.retain(|hit| hit.object_id != object_id);
        debug!(object_id, removed = before - entry.hits.len(), "dismissed hit");
    }

    /// Same column flips the direction, another column starts ascending.
    pub fn set_sort(&mut self, sort_key: SortKey) {
        if self.sort_key == sort_key {
            self.sort_reversed = !self.sort_reversed;
        } else {
            self.sort_key = sort_key;
            self.sort_reversed = false;
        }
        debug!(?sort_key, reversed = self.sort_reversed, "sort changed");
    }

    pub fn teardown(&mut self) {
        self.active = false;
        self.generation += 1;
        self.in_flight.clear();
        debug!(generation = self.generation, "query cache torn down");
    }

    pub fn visible_hits(&self) -> Vec<Hit> {
        view::project(
            &self.cache,
            &self.active_cache_key,
            self.sort_key,
            self.sort_reversed,
        )
    }

    pub fn current_page(&self) -> u32 {
        self.cache
            .get(&self.active_cache_key)
            .map_or(0, |entry| entry.page)
    }

    #[cfg(test)]
    pub fn entry(&self, term: &str) -> Option<&CacheEntry> {
        self.cache.get(term)
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn sort_reversed(&self) -> bool {
        self.sort_reversed
    }

    pub fn active_search_term(&self) -> &str {
        &self.active_search_term
    }

    pub fn active_cache_key(&self) -> &str {
        &self.active_cache_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> Hit {
        Hit {
            object_id: id.to_string(),
            title: Some(format!("title {}", id)),
            url: None,
            author: None,
            num_comments: None,
            points: None,
        }
    }

    fn ok(request: FetchRequest, ids: &[&str]) -> FetchOutcome {
        let page = request.page;
        FetchOutcome {
            request,
            result: Ok(ResultPage {
                hits: ids.iter().map(|id| hit(id)).collect(),
                page,
            }),
        }
    }

    fn failed(request: FetchRequest) -> FetchOutcome {
        FetchOutcome {
            request,
            result: Err(FetchError::FetchFailed("connection reset".into())),
        }
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.object_id.as_str()).collect()
    }

    fn manager() -> QueryCacheManager {
        QueryCacheManager::new("redux", PageOrdering::Arrival)
    }

    #[test]
    fn start_searches_the_default_query() {
        let mut qc = manager();
        let request = qc.start().expect("initial fetch");
        assert_eq!(request.term, "redux");
        assert_eq!(request.page, 0);
        assert_eq!(qc.active_cache_key(), "redux");
        assert!(qc.is_loading());

        assert!(qc.apply(ok(request, &["a", "b"])));
        assert!(!qc.is_loading());
        assert_eq!(ids(&qc.visible_hits()), ["a", "b"]);
    }

    #[test]
    fn resubmitting_a_cached_term_does_not_fetch() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        qc.apply(ok(request, &["a"]));

        assert!(qc.submit_search("rust").is_none());
        assert!(qc.submit_search("rust").is_none());
        assert!(!qc.is_loading());
    }

    #[test]
    fn resubmitting_while_first_page_is_pending_does_not_fetch_twice() {
        let mut qc = manager();
        assert!(qc.submit_search("rust").is_some());
        assert!(qc.submit_search("rust").is_none());
    }

    #[test]
    fn search_terms_are_not_normalised() {
        let mut qc = manager();
        let request = qc.submit_search("Rust").unwrap();
        qc.apply(ok(request, &["a"]));
        assert!(qc.submit_search("rust").is_some());
        assert!(qc.submit_search(" Rust").is_some());
    }

    #[test]
    fn empty_term_is_fetched() {
        let mut qc = manager();
        let request = qc.submit_search("").unwrap();
        assert_eq!(request.term, "");
    }

    #[test]
    fn pages_append_in_fetch_order() {
        let mut qc = manager();
        let first = qc.fetch_page("rust", 0);
        qc.apply(ok(first, &["a", "b"]));
        let second = qc.fetch_page("rust", 1);
        qc.apply(ok(second, &["c", "d"]));

        let entry = qc.entry("rust").unwrap();
        assert_eq!(ids(&entry.hits), ["a", "b", "c", "d"]);
        assert_eq!(entry.page, 1);
    }

    #[test]
    fn request_more_asks_for_the_next_page_of_the_active_key() {
        let mut qc = manager();
        let first = qc.submit_search("rust").unwrap();
        qc.apply(ok(first, &["a"]));

        let more = qc.request_more();
        assert_eq!(more.term, "rust");
        assert_eq!(more.page, 1);
        qc.apply(ok(more, &["b"]));
        assert_eq!(qc.current_page(), 1);
        assert_eq!(qc.request_more().page, 2);
    }

    #[test]
    fn request_more_without_entry_starts_at_page_one() {
        let mut qc = manager();
        let first = qc.submit_search("rust").unwrap();
        qc.apply(failed(first));
        assert_eq!(qc.request_more().page, 1);
    }

    #[test]
    fn editing_the_input_keeps_the_displayed_key() {
        let mut qc = manager();
        let first = qc.submit_search("rust").unwrap();
        qc.apply(ok(first, &["a"]));

        qc.set_search_input("golang");
        assert_eq!(qc.active_search_term(), "golang");
        assert_eq!(qc.active_cache_key(), "rust");
        assert_eq!(qc.request_more().term, "rust");
    }

    #[test]
    fn results_land_under_the_requested_term() {
        let mut qc = manager();
        let rust = qc.submit_search("rust").unwrap();
        let go = qc.submit_search("go").unwrap();
        qc.apply(ok(rust, &["r"]));
        qc.apply(ok(go, &["g"]));

        assert_eq!(ids(&qc.entry("rust").unwrap().hits), ["r"]);
        assert_eq!(ids(&qc.visible_hits()), ["g"]);
    }

    #[test]
    fn dismiss_removes_only_the_matching_hit() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        qc.apply(ok(request, &["a", "b", "c"]));

        qc.dismiss("b");
        assert_eq!(ids(&qc.visible_hits()), ["a", "c"]);

        qc.dismiss("missing");
        assert_eq!(ids(&qc.visible_hits()), ["a", "c"]);
        assert_eq!(qc.current_page(), 0);
    }

    #[test]
    fn dismiss_without_entry_is_a_no_op() {
        let mut qc = manager();
        qc.submit_search("rust");
        qc.dismiss("a");
        assert!(qc.entry("rust").is_none());
    }

    #[test]
    fn sort_toggle_cycles_and_resets_on_new_column() {
        let mut qc = manager();
        assert_eq!(qc.sort_key(), SortKey::None);
        assert!(!qc.sort_reversed());

        qc.set_sort(SortKey::Title);
        assert_eq!((qc.sort_key(), qc.sort_reversed()), (SortKey::Title, false));
        qc.set_sort(SortKey::Title);
        assert_eq!((qc.sort_key(), qc.sort_reversed()), (SortKey::Title, true));
        qc.set_sort(SortKey::Author);
        assert_eq!((qc.sort_key(), qc.sort_reversed()), (SortKey::Author, false));
    }

    #[test]
    fn failure_is_sticky_until_the_next_success() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        qc.apply(ok(request, &["a"]));

        let more = qc.request_more();
        qc.apply(failed(more));
        assert!(qc.last_error().is_some());
        assert!(!qc.is_loading());
        assert_eq!(ids(&qc.visible_hits()), ["a"]);

        qc.set_sort(SortKey::Points);
        qc.dismiss("zzz");
        assert!(qc.last_error().is_some());

        let retry = qc.request_more();
        qc.apply(ok(retry, &["b"]));
        assert!(qc.last_error().is_none());
    }

    #[test]
    fn loading_stays_set_until_every_request_completes() {
        let mut qc = manager();
        let first = qc.fetch_page("rust", 0);
        let second = qc.fetch_page("rust", 1);
        qc.apply(ok(first, &["a"]));
        assert!(qc.is_loading());
        qc.apply(failed(second));
        assert!(!qc.is_loading());
    }

    #[test]
    fn failure_after_teardown_is_ignored() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        qc.teardown();

        assert!(!qc.apply(failed(request)));
        assert!(qc.last_error().is_none());
        assert!(!qc.is_active());
    }

    #[test]
    fn success_after_teardown_is_ignored() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        qc.teardown();

        assert!(!qc.apply(ok(request, &["a"])));
        assert!(qc.entry("rust").is_none());
    }

    #[test]
    fn outcome_from_an_older_generation_is_ignored() {
        let mut qc = manager();
        let mut request = qc.submit_search("rust").unwrap();
        request.generation += 7;
        assert!(!qc.apply(ok(request, &["a"])));
        assert!(qc.is_loading());
    }

    #[test]
    fn arrival_ordering_appends_out_of_sequence_pages_as_they_come() {
        let mut qc = manager();
        let first = qc.fetch_page("rust", 0);
        qc.apply(ok(first, &["a"]));
        let p1 = qc.fetch_page("rust", 1);
        let p2 = qc.fetch_page("rust", 2);
        qc.apply(ok(p2, &["c"]));
        qc.apply(ok(p1, &["b"]));

        let entry = qc.entry("rust").unwrap();
        assert_eq!(ids(&entry.hits), ["a", "c", "b"]);
        assert_eq!(entry.page, 1);
    }

    #[test]
    fn sequential_ordering_waits_for_missing_pages() {
        let mut qc = QueryCacheManager::new("rust", PageOrdering::Sequential);
        let first = qc.start().unwrap();
        qc.apply(ok(first, &["a"]));
        let p1 = qc.fetch_page("rust", 1);
        let p2 = qc.fetch_page("rust", 2);
        let p3 = qc.fetch_page("rust", 3);

        qc.apply(ok(p3, &["d"]));
        qc.apply(ok(p2, &["c"]));
        assert_eq!(ids(&qc.visible_hits()), ["a"]);
        assert_eq!(qc.current_page(), 0);

        qc.apply(ok(p1, &["b"]));
        assert_eq!(ids(&qc.visible_hits()), ["a", "b", "c", "d"]);
        assert_eq!(qc.current_page(), 3);
    }

    #[test]
    fn sequential_more_retries_a_failed_first_page() {
        let mut qc = QueryCacheManager::new("rust", PageOrdering::Sequential);
        let first = qc.start().unwrap();
        qc.apply(failed(first));
        assert!(qc.last_error().is_some());

        let retry = qc.request_more();
        assert_eq!(retry.page, 0);
        qc.apply(ok(retry, &["a"]));
        assert_eq!(ids(&qc.visible_hits()), ["a"]);
        assert!(qc.last_error().is_none());

        let more = qc.request_more();
        assert_eq!(more.page, 1);
        qc.apply(ok(more, &["b"]));
        assert_eq!(ids(&qc.visible_hits()), ["a", "b"]);
        assert_eq!(qc.current_page(), 1);
    }

    #[test]
    fn sequential_ordering_drops_repeated_pages() {
        let mut qc = QueryCacheManager::new("rust", PageOrdering::Sequential);
        let first = qc.start().unwrap();
        qc.apply(ok(first, &["a"]));
        let again = qc.fetch_page("rust", 0);
        qc.apply(ok(again, &["a"]));

        assert_eq!(ids(&qc.visible_hits()), ["a"]);
    }

    #[test]
    fn visible_hits_follow_the_sort_selection() {
        let mut qc = manager();
        let request = qc.submit_search("rust").unwrap();
        let page = request.page;
        let mut hits: Vec<Hit> = ["x", "y", "z"].iter().map(|id| hit(id)).collect();
        hits[0].points = Some(1);
        hits[1].points = Some(5);
        hits[2].points = Some(3);
        qc.apply(FetchOutcome {
            request,
            result: Ok(ResultPage { hits, page }),
        });

        qc.set_sort(SortKey::Points);
        assert_eq!(ids(&qc.visible_hits()), ["y", "z", "x"]);
        qc.set_sort(SortKey::Points);
        assert_eq!(ids(&qc.visible_hits()), ["x", "z", "y"]);
    }
}
