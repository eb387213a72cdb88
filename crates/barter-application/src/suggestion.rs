//! Debounced tag-suggestion search.
//!
//! Each call to [`SuggestionSearchEngine::search`] mints a new sequence
//! number. Only the result carrying the latest sequence number is ever
//! published; cancelling the debounce timer merely saves a network call.
//! Results belong to the user who issued the query and never outlive
//! that user's session.

use crate::session::{SessionProfileCoordinator, WeakCoordinator};
use barter_core::config::SearchSettings;
use barter_core::error::Result;
use barter_core::remote::RemoteStore;
use barter_core::tag::{SuggestionQuery, Tag, TagKind};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Suggestions published for the latest query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuggestionResults {
    /// Query these results answer; `None` before the first search.
    pub query: Option<SuggestionQuery>,
    /// Attachable tags only: already-linked tags are filtered out.
    pub tags: Vec<Tag>,
    /// The remote search failed. `tags` is empty in that case.
    pub error: bool,
}

impl SuggestionResults {
    pub fn sequence(&self) -> u64 {
        self.query.as_ref().map_or(0, |q| q.sequence)
    }

    fn empty(query: SuggestionQuery) -> Self {
        Self {
            query: Some(query),
            tags: Vec::new(),
            error: false,
        }
    }
}

struct SearchInner {
    store: Arc<dyn RemoteStore>,
    coordinator: WeakCoordinator,
    settings: SearchSettings,
    latest: AtomicU64,
    pending: Mutex<Option<CancellationToken>>,
    results_tx: watch::Sender<SuggestionResults>,
}

impl SearchInner {
    fn is_latest(&self, sequence: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == sequence
    }

    fn current_owner(&self) -> Option<String> {
        self.coordinator
            .upgrade()
            .and_then(|c| c.snapshot().user_id().map(str::to_string))
    }

    /// Publishes `results` unless a newer query was issued meanwhile.
    fn publish(&self, results: SuggestionResults) -> bool {
        let sequence = results.sequence();
        self.results_tx.send_if_modified(|slot| {
            if !self.is_latest(sequence) {
                tracing::debug!("[Suggestions] Dropping stale results for query {}", sequence);
                return false;
            }
            *slot = results;
            true
        })
    }

    fn complete(&self, query: SuggestionQuery, owner: Option<String>, result: Result<Vec<Tag>>) {
        if self.current_owner() != owner {
            tracing::debug!(
                "[Suggestions] Dropping results for query {}, session changed",
                query.sequence
            );
            return;
        }
        let results = match result {
            Ok(tags) => SuggestionResults {
                tags: self.attachable(query.kind, tags),
                query: Some(query),
                error: false,
            },
            Err(e) => {
                tracing::warn!("[Suggestions] Tag search for '{}' failed: {}", query.text, e);
                SuggestionResults {
                    error: true,
                    ..SuggestionResults::empty(query)
                }
            }
        };
        self.publish(results);
    }

    /// Drops duplicates, tags of the wrong section and tags already linked.
    fn attachable(&self, kind: TagKind, tags: Vec<Tag>) -> Vec<Tag> {
        let snapshot = self.coordinator.upgrade().map(|c| c.snapshot());
        let mut seen = HashSet::new();
        tags.into_iter()
            .filter(|tag| tag.kind == kind)
            .filter(|tag| !snapshot.as_ref().is_some_and(|s| s.has_tag(&tag.id)))
            .filter(|tag| seen.insert(tag.id.clone()))
            .collect()
    }
}

/// Debounced, staleness-checked tag suggestion search.
#[derive(Clone)]
pub struct SuggestionSearchEngine {
    inner: Arc<SearchInner>,
}

impl SuggestionSearchEngine {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        coordinator: WeakCoordinator,
        settings: SearchSettings,
    ) -> Self {
        let (results_tx, _) = watch::channel(SuggestionResults::default());
        Self {
            inner: Arc::new(SearchInner {
                store,
                coordinator,
                settings,
                latest: AtomicU64::new(0),
                pending: Mutex::new(None),
                results_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionResults> {
        self.inner.results_tx.subscribe()
    }

    pub fn results(&self) -> SuggestionResults {
        self.inner.results_tx.borrow().clone()
    }

    /// Schedules a search for `text` within the `kind` section.
    ///
    /// Blank input publishes an empty result immediately without a network
    /// call. Otherwise the query is sent once no newer call has arrived for
    /// the debounce window. Results are observed through [`subscribe`].
    ///
    /// [`subscribe`]: Self::subscribe
    pub async fn search(&self, kind: TagKind, text: &str) {
        let text = text.trim();

        // Mint and register under one lock so tokens and sequence numbers
        // are handed out in the same order.
        let (query, token) = {
            let mut pending = self.inner.pending.lock().await;
            if let Some(previous) = pending.take() {
                previous.cancel();
            }
            let sequence = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
            let query = SuggestionQuery {
                kind,
                text: text.to_string(),
                sequence,
            };
            if text.is_empty() {
                (query, None)
            } else {
                let token = CancellationToken::new();
                *pending = Some(token.clone());
                (query, Some(token))
            }
        };

        let Some(token) = token else {
            self.inner.publish(SuggestionResults::empty(query));
            return;
        };

        let owner = self.inner.current_owner();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("[Suggestions] Query {} superseded during debounce", query.sequence);
                    return;
                }
                _ = tokio::time::sleep(inner.settings.debounce()) => {}
            }
            if !inner.is_latest(query.sequence) {
                return;
            }

            let result = inner
                .store
                .search_tags(query.kind, &query.text, inner.settings.max_results)
                .await;
            inner.complete(query, owner, result);
        });
    }

    /// Cancels any pending search and publishes an empty result.
    pub async fn clear(&self) {
        let mut pending = self.inner.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.cancel();
        }
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        self.inner.results_tx.send_replace(SuggestionResults::default());
    }

    /// Clears suggestions whenever a signed-in user signs out or is
    /// replaced by another principal. Runs until the coordinator is dropped
    /// or the handle is aborted.
    pub fn follow_session(&self, coordinator: &SessionProfileCoordinator) -> JoinHandle<()> {
        let mut rx = coordinator.subscribe();
        let engine = self.clone();
        tokio::spawn(async move {
            let mut owner = rx.borrow_and_update().user_id().map(str::to_string);
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().user_id().map(str::to_string);
                if current == owner {
                    continue;
                }
                if owner.is_some() {
                    tracing::debug!("[Suggestions] Session changed, clearing suggestions");
                    engine.clear().await;
                }
                owner = current;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionPhase;
    use crate::test_support::{ScriptedRemoteStore, link, principal_session, profile_for};
    use barter_core::profile::ProfileCompletionEvaluator;
    use std::time::Duration;

    fn catalog() -> Vec<Tag> {
        vec![
            Tag::new("t-a", "a", TagKind::Offer),
            Tag::new("t-ab", "ab", TagKind::Offer),
            Tag::new("t-abc", "abc", TagKind::Offer),
            Tag::new("t-abw", "abw", TagKind::Want),
        ]
    }

    fn engine(
        store: &Arc<ScriptedRemoteStore>,
        coordinator: &SessionProfileCoordinator,
    ) -> SuggestionSearchEngine {
        SuggestionSearchEngine::new(
            store.clone(),
            coordinator.downgrade(),
            SearchSettings::default(),
        )
    }

    fn setup() -> (Arc<ScriptedRemoteStore>, SessionProfileCoordinator) {
        let store = Arc::new(ScriptedRemoteStore::new());
        store.add_tags(catalog());
        let coordinator =
            SessionProfileCoordinator::new(store.clone(), ProfileCompletionEvaluator::default());
        (store, coordinator)
    }

    fn tag_ids(results: &SuggestionResults) -> Vec<&str> {
        results.tags.iter().map(|t| t.id.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_yields_empty_without_network() {
        let (store, coordinator) = setup();
        let engine = engine(&store, &coordinator);

        engine.search(TagKind::Offer, "   ").await;

        let results = engine.results();
        assert_eq!(results.sequence(), 1);
        assert!(results.tags.is_empty());
        assert!(!results.error);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.calls("search_tags"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_typing_sends_only_last_query() {
        let (store, coordinator) = setup();
        let engine = engine(&store, &coordinator);
        let mut rx = engine.subscribe();

        engine.search(TagKind::Offer, "a").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.search(TagKind::Offer, "ab").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.search(TagKind::Offer, "abc").await;

        let results = rx.wait_for(|r| r.sequence() == 3).await.unwrap().clone();
        assert_eq!(tag_ids(&results), vec!["t-abc"]);
        assert_eq!(store.searched_texts(), vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_responses_keep_latest() {
        let (store, coordinator) = setup();
        let engine = engine(&store, &coordinator);
        let mut rx = engine.subscribe();
        let release_a = store.gate("search_tags:a");
        let release_ab = store.gate("search_tags:ab");

        // Each query outlives the debounce window and reaches the network.
        engine.search(TagKind::Offer, "a").await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.search(TagKind::Offer, "ab").await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.search(TagKind::Offer, "abc").await;

        let results = rx.wait_for(|r| r.sequence() == 3).await.unwrap().clone();
        assert_eq!(tag_ids(&results), vec!["t-abc"]);

        release_ab.send(()).unwrap();
        release_a.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let results = engine.results();
        assert_eq!(results.sequence(), 3);
        assert_eq!(tag_ids(&results), vec!["t-abc"]);
        assert_eq!(store.calls("search_tags"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_supersedes_in_flight_search() {
        let (store, coordinator) = setup();
        let engine = engine(&store, &coordinator);
        let release = store.gate("search_tags:ab");

        engine.search(TagKind::Offer, "ab").await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.search(TagKind::Offer, "").await;
        release.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let results = engine.results();
        assert_eq!(results.sequence(), 2);
        assert!(results.tags.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_surface_as_flag() {
        let (store, coordinator) = setup();
        store.fail_next(
            "search_tags",
            barter_core::BarterError::network("unreachable"),
        );
        let engine = engine(&store, &coordinator);
        let mut rx = engine.subscribe();

        engine.search(TagKind::Offer, "ab").await;

        let results = rx.wait_for(|r| r.sequence() == 1).await.unwrap().clone();
        assert!(results.error);
        assert!(results.tags.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_linked_and_foreign_kind_tags_are_filtered() {
        let (store, coordinator) = setup();
        let mut profile = profile_for("u1");
        profile.tags.push(link(
            "l1",
            &profile.id,
            Tag::new("t-ab", "ab", TagKind::Offer),
        ));
        store.put_profile(profile);
        coordinator
            .handle_session_change(Some(principal_session("u1")))
            .await;
        coordinator
            .subscribe()
            .wait_for(|s| s.profile.is_some())
            .await
            .unwrap();
        let engine = engine(&store, &coordinator);
        let mut rx = engine.subscribe();

        engine.search(TagKind::Offer, "ab").await;

        let results = rx.wait_for(|r| r.sequence() == 1).await.unwrap().clone();
        assert_eq!(tag_ids(&results), vec!["t-abc"]);
    }

    async fn signed_in(store: &Arc<ScriptedRemoteStore>, coordinator: &SessionProfileCoordinator) {
        store.put_profile(profile_for("u1"));
        coordinator
            .handle_session_change(Some(principal_session("u1")))
            .await;
        coordinator
            .subscribe()
            .wait_for(|s| s.phase == SessionPhase::Ready)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_drops_in_flight_results() {
        let (store, coordinator) = setup();
        signed_in(&store, &coordinator).await;
        let engine = engine(&store, &coordinator);
        let release = store.gate("search_tags:ab");

        engine.search(TagKind::Offer, "ab").await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.calls("search_tags"), 1);
        coordinator.sign_out().await.unwrap();
        release.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let results = engine.results();
        assert!(results.query.is_none());
        assert!(results.tags.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_session_clears_results_on_sign_out() {
        let (store, coordinator) = setup();
        signed_in(&store, &coordinator).await;
        let engine = engine(&store, &coordinator);
        let follower = engine.follow_session(&coordinator);
        let mut rx = engine.subscribe();

        engine.search(TagKind::Offer, "ab").await;
        let results = rx.wait_for(|r| r.sequence() == 1).await.unwrap().clone();
        assert_eq!(tag_ids(&results), vec!["t-ab", "t-abc"]);

        coordinator.sign_out().await.unwrap();
        rx.wait_for(|r| r.query.is_none()).await.unwrap();

        assert!(engine.results().tags.is_empty());
        follower.abort();
    }
}
