//! Key lookup with a paginated usage ledger.
//!
//! Every lookup bumps a generation counter captured at dispatch; a response
//! whose generation is no longer current is dropped without touching the
//! view. The ledger fetch is chained after the summary and carries its own
//! counter so that only the newest page request lands.

use common::display::{QuotaDisplay, UsageRow};
use common::{PageState, QuotaSummary, UsageRecord};
use myerrors::QueryError;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::notice::Notice;
use crate::service::QueryApi;
use crate::settle;

pub const KEY_REQUIRED: &str = "key required";
pub const QUERY_SUCCEEDED: &str = "query succeeded";
pub const QUERY_FAILED: &str = "query failed";
pub const QUERY_NETWORK_FAILURE: &str = "query failed, please check your network connection";
const HISTORY_FAILED: &str = "failed to load usage history";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenQueryView {
    /// The trimmed key of the latest accepted lookup.
    pub key: String,
    pub summary: Option<QuotaSummary>,
    pub records: Vec<UsageRecord>,
    pub page: PageState,
    pub busy: bool,
    pub loading_history: bool,
    pub notice: Option<Notice>,
}

impl TokenQueryView {
    pub fn display(&self) -> Option<QuotaDisplay> {
        self.summary.as_ref().map(QuotaDisplay::from_summary)
    }

    pub fn rows(&self) -> Vec<UsageRow> {
        self.records.iter().map(UsageRow::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Loaded { history: HistoryOutcome },
    /// The same key is already being looked up.
    InFlight,
    /// A newer lookup started before this one resolved.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    Loaded { page: u32, records: usize },
    /// No key has been looked up successfully yet.
    Skipped,
    OutOfRange,
    Superseded,
    /// Logged only; the summary and the current page stay as they were.
    Failed(QueryError),
}

#[derive(Default)]
struct Inner {
    view: TokenQueryView,
    generation: u64,
    history_generation: u64,
}

/// Clears an in-flight marker when the request future is dropped before it
/// settles, so the view can be resubmitted.
struct PendingGuard {
    inner: Arc<Mutex<Inner>>,
    generation: u64,
    release: Option<fn(&mut Inner, u64)>,
}

impl PendingGuard {
    fn new(inner: &Arc<Mutex<Inner>>, generation: u64, release: fn(&mut Inner, u64)) -> Self {
        Self {
            inner: inner.clone(),
            generation,
            release: Some(release),
        }
    }

    fn disarm(mut self) {
        self.release = None;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        let generation = self.generation;
        match self.inner.try_lock() {
            Ok(mut inner) => release(&mut inner, generation),
            Err(_) => {
                let inner = self.inner.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move { release(&mut *inner.lock().await, generation) });
                }
            }
        }
    }
}

fn release_lookup(inner: &mut Inner, generation: u64) {
    if inner.generation == generation && inner.view.busy {
        log::debug!("lookup {generation} dropped before it settled");
        inner.view.busy = false;
    }
}

fn release_history(inner: &mut Inner, history_generation: u64) {
    if inner.history_generation == history_generation {
        inner.view.loading_history = false;
    }
}

#[derive(Clone)]
pub struct TokenQuery {
    api: Arc<dyn QueryApi>,
    inner: Arc<Mutex<Inner>>,
}

impl TokenQuery {
    pub fn new(api: Arc<dyn QueryApi>) -> Self {
        Self {
            api,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub async fn snapshot(&self) -> TokenQueryView {
        self.inner.lock().await.view.clone()
    }

    /// The current view with its notice consumed, under one lock.
    pub async fn take_view(&self) -> TokenQueryView {
        let mut inner = self.inner.lock().await;
        let view = inner.view.clone();
        inner.view.notice = None;
        view
    }

    pub async fn lookup(&self, raw_key: &str) -> Result<LookupOutcome, QueryError> {
        let key = raw_key.trim();
        if key.is_empty() {
            let err = QueryError::validation(KEY_REQUIRED);
            self.inner.lock().await.view.notice = Some(Notice::from(&err));
            return Err(err);
        }

        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.view.busy && inner.view.key == key {
                return Ok(LookupOutcome::InFlight);
            }
            inner.generation += 1;
            inner.view = TokenQueryView {
                key: key.to_string(),
                busy: true,
                ..Default::default()
            };
            inner.generation
        };
        let pending = PendingGuard::new(&self.inner, generation, release_lookup);

        let result = self.api.token_quota(key).await;

        {
            let mut inner = self.inner.lock().await;
            pending.disarm();
            if inner.generation != generation {
                log::debug!("dropping quota summary from superseded lookup {generation}");
                return Ok(LookupOutcome::Superseded);
            }
            inner.view.busy = false;
            match settle(result, QUERY_FAILED, QUERY_NETWORK_FAILURE) {
                Ok(Some(summary)) => {
                    inner.view.summary = Some(summary);
                    inner.view.notice = Some(Notice::success(QUERY_SUCCEEDED));
                }
                Ok(None) => {
                    let err = QueryError::logical(QUERY_FAILED);
                    inner.view.notice = Some(Notice::from(&err));
                    return Err(err);
                }
                Err(err) => {
                    inner.view.notice = Some(Notice::from(&err));
                    return Err(err);
                }
            }
        }

        let history = self.fetch_history(generation, 1).await;
        Ok(LookupOutcome::Loaded { history })
    }

    pub async fn load_history(&self, page: u32) -> HistoryOutcome {
        let generation = {
            let inner = self.inner.lock().await;
            if inner.view.key.is_empty() || inner.view.summary.is_none() {
                return HistoryOutcome::Skipped;
            }
            if !inner.view.page.accepts(page) {
                log::debug!(
                    "rejecting ledger page {page}, {} pages available",
                    inner.view.page.total_pages()
                );
                return HistoryOutcome::OutOfRange;
            }
            inner.generation
        };
        self.fetch_history(generation, page).await
    }

    async fn fetch_history(&self, generation: u64, page: u32) -> HistoryOutcome {
        let (key, page_size, history_generation) = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return HistoryOutcome::Superseded;
            }
            inner.history_generation += 1;
            inner.view.loading_history = true;
            (
                inner.view.key.clone(),
                inner.view.page.page_size,
                inner.history_generation,
            )
        };

        let pending = PendingGuard::new(&self.inner, history_generation, release_history);

        let result = self.api.token_history(&key, page, page_size).await;

        let mut inner = self.inner.lock().await;
        pending.disarm();
        if inner.generation != generation || inner.history_generation != history_generation {
            log::debug!("dropping superseded ledger page {page}");
            return HistoryOutcome::Superseded;
        }
        inner.view.loading_history = false;
        match settle(result, HISTORY_FAILED, HISTORY_FAILED) {
            Ok(data) => {
                let data = data.unwrap_or_default();
                let records = data.items.len();
                inner.view.records = data.items;
                inner.view.page.total_records = data.total;
                inner.view.page.current_page = page;
                HistoryOutcome::Loaded { page, records }
            }
            Err(err) => {
                log::warn!("usage history page {page} unavailable: {err}");
                HistoryOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{Envelope, SyncStatus, UsagePage};
    use remote::OptionMap;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    use crate::notice::NoticeLevel;

    #[derive(Default)]
    struct MockApi {
        calls: StdMutex<Vec<String>>,
        quota: StdMutex<HashMap<String, Result<Envelope<QuotaSummary>, QueryError>>>,
        gates: StdMutex<HashMap<String, oneshot::Receiver<Envelope<QuotaSummary>>>>,
        history_failure: StdMutex<Option<QueryError>>,
        ledger_size: u64,
    }

    impl MockApi {
        fn with_ledger(ledger_size: u64) -> Self {
            Self {
                ledger_size,
                ..Default::default()
            }
        }

        fn answer(&self, key: &str, result: Result<Envelope<QuotaSummary>, QueryError>) {
            self.quota.lock().unwrap().insert(key.to_string(), result);
        }

        fn gate(&self, key: &str) -> oneshot::Sender<Envelope<QuotaSummary>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(key.to_string(), rx);
            tx
        }

        fn fail_history(&self, err: Option<QueryError>) {
            *self.history_failure.lock().unwrap() = err;
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryApi for MockApi {
        async fn token_quota(&self, key: &str) -> Result<Envelope<QuotaSummary>, QueryError> {
            self.calls.lock().unwrap().push(format!("quota:{key}"));
            let gate = self.gates.lock().unwrap().remove(key);
            if let Some(rx) = gate {
                return rx
                    .await
                    .map_err(|_| QueryError::transport("gate dropped"));
            }
            self.quota
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| Ok(Envelope::ok(summary(100))))
        }

        async fn token_history(
            &self,
            key: &str,
            page: u32,
            page_size: u32,
        ) -> Result<Envelope<UsagePage>, QueryError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("history:{key}:{page}:{page_size}"));
            if let Some(err) = self.history_failure.lock().unwrap().clone() {
                return Err(err);
            }
            let skip = u64::from(page - 1) * u64::from(page_size);
            let items = (skip..self.ledger_size)
                .take(page_size as usize)
                .map(|i| UsageRecord {
                    created_at: 1_700_000_000 + i as i64,
                    model_name: key.to_string(),
                    ..Default::default()
                })
                .collect();
            Ok(Envelope::ok(UsagePage {
                items,
                total: self.ledger_size,
            }))
        }

        async fn options(&self) -> Result<Envelope<OptionMap>, QueryError> {
            unreachable!()
        }

        async fn update_option(
            &self,
            _key: &str,
            _value: &str,
        ) -> Result<Envelope<serde_json::Value>, QueryError> {
            unreachable!()
        }

        async fn sync_status(&self) -> Result<Envelope<SyncStatus>, QueryError> {
            unreachable!()
        }

        async fn trigger_sync(&self) -> Result<Envelope<serde_json::Value>, QueryError> {
            unreachable!()
        }
    }

    fn summary(used: i64) -> QuotaSummary {
        QuotaSummary {
            total_quota: Some(1000),
            used_quota: Some(used),
            remain_quota: Some(1000 - used),
            ..Default::default()
        }
    }

    fn setup(ledger_size: u64) -> (Arc<MockApi>, TokenQuery) {
        let api = Arc::new(MockApi::with_ledger(ledger_size));
        let query = TokenQuery::new(api.clone());
        (api, query)
    }

    async fn wait_for_calls(api: &MockApi, n: usize) {
        for _ in 0..1000 {
            if api.calls().len() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} calls, saw {:?}", api.calls());
    }

    #[tokio::test]
    async fn lookup_trims_key_and_chains_history() {
        let (api, query) = setup(25);
        let outcome = query.lookup("  sk-abc \n").await.unwrap();
        assert_eq!(
            outcome,
            LookupOutcome::Loaded {
                history: HistoryOutcome::Loaded {
                    page: 1,
                    records: 10
                }
            }
        );
        assert_eq!(api.calls(), vec!["quota:sk-abc", "history:sk-abc:1:10"]);

        let view = query.snapshot().await;
        assert_eq!(view.key, "sk-abc");
        assert_eq!(view.summary, Some(summary(100)));
        assert_eq!(view.page.total_records, 25);
        assert_eq!(view.page.total_pages(), 3);
        assert!(!view.busy);
        assert_eq!(view.notice, Some(Notice::success(QUERY_SUCCEEDED)));
    }

    #[tokio::test]
    async fn blank_key_is_rejected_without_requests() {
        let (api, query) = setup(25);
        for key in ["", "   ", "\t\n"] {
            let err = query.lookup(key).await.unwrap_err();
            assert_eq!(err, QueryError::validation(KEY_REQUIRED));
        }
        assert!(api.calls().is_empty());
        let view = query.snapshot().await;
        assert_eq!(view.notice.unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn logical_failure_uses_server_message() {
        let (api, query) = setup(25);
        api.answer("sk-bad", Ok(Envelope::failed("token not found")));
        let err = query.lookup("sk-bad").await.unwrap_err();
        assert_eq!(err, QueryError::logical("token not found"));
        assert_eq!(api.calls(), vec!["quota:sk-bad"]);
        let view = query.snapshot().await;
        assert_eq!(view.summary, None);
        assert!(view.records.is_empty());
        assert!(!view.busy);
    }

    #[tokio::test]
    async fn logical_failure_without_message_falls_back() {
        let (api, query) = setup(25);
        api.answer(
            "sk-bad",
            Ok(Envelope {
                success: false,
                message: None,
                data: None,
            }),
        );
        let err = query.lookup("sk-bad").await.unwrap_err();
        assert_eq!(err, QueryError::logical(QUERY_FAILED));
    }

    #[tokio::test]
    async fn transport_failure_is_distinct() {
        let (api, query) = setup(25);
        api.answer("sk-abc", Err(QueryError::transport("connection refused")));
        let err = query.lookup("sk-abc").await.unwrap_err();
        assert_eq!(err, QueryError::transport(QUERY_NETWORK_FAILURE));
        assert_ne!(err.message(), QUERY_FAILED);
        assert!(!query.snapshot().await.busy);
    }

    #[tokio::test]
    async fn newest_lookup_wins_even_when_older_resolves_last() {
        let (api, query) = setup(25);
        let release_a = api.gate("A");
        let release_b = api.gate("B");

        let qa = query.clone();
        let a = tokio::spawn(async move { qa.lookup("A").await });
        wait_for_calls(&api, 1).await;

        let qb = query.clone();
        let b = tokio::spawn(async move { qb.lookup("B").await });
        wait_for_calls(&api, 2).await;

        release_b.send(Envelope::ok(summary(200))).unwrap();
        let b = b.await.unwrap().unwrap();
        assert!(matches!(b, LookupOutcome::Loaded { .. }));

        release_a.send(Envelope::ok(summary(900))).unwrap();
        let a = a.await.unwrap().unwrap();
        assert_eq!(a, LookupOutcome::Superseded);

        let view = query.snapshot().await;
        assert_eq!(view.key, "B");
        assert_eq!(view.summary, Some(summary(200)));
        assert!(view.records.iter().all(|r| r.model_name == "B"));
        assert!(!api.calls().contains(&"history:A:1:10".to_string()));
    }

    #[tokio::test]
    async fn same_key_resubmission_is_ignored_while_in_flight() {
        let (api, query) = setup(25);
        let release = api.gate("A");

        let qa = query.clone();
        let first = tokio::spawn(async move { qa.lookup("A").await });
        wait_for_calls(&api, 1).await;

        assert!(query.snapshot().await.busy);
        assert_eq!(query.lookup(" A ").await.unwrap(), LookupOutcome::InFlight);
        assert_eq!(api.calls(), vec!["quota:A"]);

        release.send(Envelope::ok(summary(1))).unwrap();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            LookupOutcome::Loaded { .. }
        ));
    }

    #[tokio::test]
    async fn paging_moves_window_without_accumulating() {
        let (api, query) = setup(25);
        query.lookup("sk-abc").await.unwrap();

        assert_eq!(
            query.load_history(3).await,
            HistoryOutcome::Loaded {
                page: 3,
                records: 5
            }
        );
        let view = query.snapshot().await;
        assert_eq!(view.page.current_page, 3);
        assert_eq!(view.records.len(), 5);
        assert!(view.page.has_previous());
        assert!(!view.page.has_next());
        assert_eq!(api.calls().last().unwrap(), "history:sk-abc:3:10");
    }

    #[tokio::test]
    async fn out_of_range_pages_are_not_sent() {
        let (api, query) = setup(25);
        query.lookup("sk-abc").await.unwrap();
        let before = api.calls().len();

        assert_eq!(query.load_history(0).await, HistoryOutcome::OutOfRange);
        assert_eq!(query.load_history(4).await, HistoryOutcome::OutOfRange);
        assert_eq!(api.calls().len(), before);
        assert_eq!(query.snapshot().await.page.current_page, 1);
    }

    #[tokio::test]
    async fn history_failure_keeps_summary_and_page() {
        let (api, query) = setup(25);
        query.lookup("sk-abc").await.unwrap();
        query.load_history(2).await;

        api.fail_history(Some(QueryError::transport("timeout")));
        let outcome = query.load_history(3).await;
        assert!(matches!(outcome, HistoryOutcome::Failed(_)));

        let view = query.snapshot().await;
        assert_eq!(view.page.current_page, 2);
        assert_eq!(view.records.len(), 10);
        assert_eq!(view.summary, Some(summary(100)));
        assert!(!view.loading_history);
    }

    #[tokio::test]
    async fn chained_history_failure_does_not_fail_lookup() {
        let (api, query) = setup(25);
        api.fail_history(Some(QueryError::transport("timeout")));
        let outcome = query.lookup("sk-abc").await.unwrap();
        assert!(matches!(
            outcome,
            LookupOutcome::Loaded {
                history: HistoryOutcome::Failed(_)
            }
        ));
        let view = query.snapshot().await;
        assert!(view.summary.is_some());
        assert_eq!(view.page.current_page, 1);
        assert_eq!(view.notice, Some(Notice::success(QUERY_SUCCEEDED)));
    }

    #[tokio::test]
    async fn empty_ledger_first_page() {
        let (_api, query) = setup(0);
        let outcome = query.lookup("sk-new").await.unwrap();
        assert_eq!(
            outcome,
            LookupOutcome::Loaded {
                history: HistoryOutcome::Loaded {
                    page: 1,
                    records: 0
                }
            }
        );
        let view = query.snapshot().await;
        assert!(view.records.is_empty());
        assert!(!view.page.has_previous());
        assert!(!view.page.has_next());
    }

    #[tokio::test]
    async fn history_without_lookup_is_noop() {
        let (api, query) = setup(25);
        assert_eq!(query.load_history(1).await, HistoryOutcome::Skipped);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn new_lookup_resets_page_state() {
        let (_api, query) = setup(25);
        query.lookup("A").await.unwrap();
        query.load_history(3).await;
        assert_eq!(query.snapshot().await.page.current_page, 3);

        query.lookup("B").await.unwrap();
        let view = query.snapshot().await;
        assert_eq!(view.key, "B");
        assert_eq!(view.page.current_page, 1);
        assert!(view.records.iter().all(|r| r.model_name == "B"));
    }

    #[tokio::test]
    async fn take_view_consumes_only_notice() {
        let (_api, query) = setup(25);
        query.lookup("A").await.unwrap();
        let shown = query.take_view().await;
        assert_eq!(shown.notice.unwrap().message, QUERY_SUCCEEDED);
        let view = query.snapshot().await;
        assert_eq!(view.notice, None);
        assert!(view.summary.is_some());
    }

    #[tokio::test]
    async fn notice_set_after_take_view_is_kept() {
        let (_api, query) = setup(25);
        query.lookup("A").await.unwrap();
        query.take_view().await;
        assert!(query.lookup("  ").await.is_err());
        let shown = query.take_view().await;
        assert_eq!(shown.notice.unwrap().message, KEY_REQUIRED);
    }

    #[tokio::test]
    async fn dropped_lookup_can_be_resubmitted() {
        let (api, query) = setup(25);
        let _hold = api.gate("A");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), query.lookup("A")).await;
        assert!(abandoned.is_err());
        assert!(!query.snapshot().await.busy);

        let outcome = query.lookup("A").await.unwrap();
        assert!(matches!(outcome, LookupOutcome::Loaded { .. }));
        assert_eq!(api.calls(), vec!["quota:A", "quota:A", "history:A:1:10"]);
        assert!(query.snapshot().await.summary.is_some());
    }

    #[tokio::test]
    async fn dropped_lookup_does_not_touch_newer_one() {
        let (api, query) = setup(25);
        let _hold = api.gate("A");
        let release_b = api.gate("B");

        let qa = query.clone();
        let first = tokio::spawn(async move { qa.lookup("A").await });
        wait_for_calls(&api, 1).await;
        let qb = query.clone();
        let second = tokio::spawn(async move { qb.lookup("B").await });
        wait_for_calls(&api, 2).await;

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert!(query.snapshot().await.busy);

        release_b.send(Envelope::ok(summary(2))).unwrap();
        assert!(matches!(
            second.await.unwrap().unwrap(),
            LookupOutcome::Loaded { .. }
        ));
        assert!(!query.snapshot().await.busy);
    }
}
