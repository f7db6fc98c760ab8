/**
 * VIEW SESSIONS - Per-operator view state and input debouncing
 *
 * ROLE: One ViewSession per connected operator view, holding its ViewState
 * and memoization cache. Input events mutate the state; filter text goes
 * through a 300 ms debounce so the pipeline is not recomputed on every
 * keystroke against a large fleet.
 *
 * LIFECYCLE: each keystroke aborts the pending commit task and schedules a
 * new one; tearing a session down aborts the timer too, so nothing fires
 * against a dropped view.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::TargetKind;
use crate::selection::Selection;
use crate::store::{new_state, Shared, StatusStore};
use crate::view::{FilterField, PageView, SectionGroup, SortDirection, ViewCache, ViewState};

/// Inactivity window before typed filter text is committed to the pipeline.
pub const DEBOUNCE_MS: u64 = 300;

pub struct ViewSession {
    state: Shared<ViewState>,
    cache: Shared<ViewCache>,
    pending_commit: Shared<Option<JoinHandle<()>>>,
}

impl ViewSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: new_state(ViewState::default()),
            cache: new_state(ViewCache::new()),
            pending_commit: new_state(None),
        })
    }

    /// Snapshot of the current view state.
    pub fn state(&self) -> ViewState {
        self.state.lock().clone()
    }

    /// Typing into the filter box. The raw input and the page reset apply
    /// immediately; the pipeline-visible text commits after DEBOUNCE_MS of
    /// inactivity.
    pub fn set_search(&self, text: String) {
        {
            let mut state = self.state.lock();
            state.search_input = text;
            state.page = 1;
        }
        let state = self.state.clone();
        let mut pending = self.pending_commit.lock();
        if let Some(task) = pending.take() {
            task.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
            let mut state = state.lock();
            state.search_text = state.search_input.clone();
        }));
    }

    /// Switching the filter dropdown takes effect immediately; only the
    /// text is debounced.
    pub fn set_filter_field(&self, field: FilterField) {
        self.state.lock().filter_field = field;
    }

    pub fn clear_filter(&self) {
        if let Some(task) = self.pending_commit.lock().take() {
            task.abort();
        }
        self.state.lock().clear_filter();
    }

    /// Explicit sort from a deep link or API call; None clears the sort.
    pub fn set_sort(&self, key: Option<TargetKind>, dir: SortDirection) {
        let mut state = self.state.lock();
        state.sort_key = key;
        state.sort_dir = dir;
    }

    /// Column-header click semantics: select the key, flip the direction.
    pub fn toggle_sort(&self, key: TargetKind) {
        self.state.lock().toggle_sort(key);
    }

    pub fn set_page(&self, page: usize) {
        self.state.lock().page = page.max(1);
    }

    /// Per-section search box of the grouped view; not debounced, matching
    /// the board's behavior there.
    pub fn set_section_filter(&self, section: String, text: String) {
        self.state.lock().section_filters.insert(section, text);
    }

    pub fn select_machine(&self, name: String) {
        self.state.lock().selection.select_machine(name);
    }

    pub fn select_section(&self, name: String) {
        self.state.lock().selection.select_section(name);
    }

    /// Escape / navigate-to-root: back to no selection.
    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    pub fn selection(&self) -> Selection {
        self.state.lock().selection.clone()
    }

    /// Flat page through the memoization cache.
    pub fn page_view(&self, store: &StatusStore) -> PageView {
        let machines = store.machines();
        let fingerprint = store.fingerprint();
        let state = self.state.lock().clone();
        self.cache.lock().page_view(fingerprint, &machines, &state)
    }

    /// Section grouping through the memoization cache.
    pub fn section_view(&self, store: &StatusStore) -> Vec<SectionGroup> {
        let machines = store.machines();
        let fingerprint = store.fingerprint();
        let state = self.state.lock().clone();
        self.cache.lock().section_view(fingerprint, &machines, &state)
    }

    /// Releases the debounce timer. Also runs on drop; explicit teardown
    /// exists so the registry can release a session deterministically.
    pub fn teardown(&self) {
        if let Some(task) = self.pending_commit.lock().take() {
            task.abort();
        }
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// All live operator sessions, keyed by id. Cheap to clone into handlers.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Shared<HashMap<Uuid, Arc<ViewSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { sessions: new_state(HashMap::new()) }
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.lock().insert(id, ViewSession::new());
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<ViewSession>> {
        self.sessions.lock().get(id).cloned()
    }

    /// Removes and tears the session down; true when it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.lock().remove(id) {
            Some(session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Machine, ProbeResults};

    fn plain_machine(name: &str) -> Machine {
        Machine {
            name: name.to_string(),
            uplink: None,
            source_switch: None,
            column: None,
            bay: None,
            section: None,
            results: ProbeResults::default(),
        }
    }

    #[tokio::test]
    async fn search_commits_only_after_the_debounce_window() {
        let session = ViewSession::new();
        session.set_search("booth".into());

        let state = session.state();
        assert_eq!(state.search_input, "booth");
        assert_eq!(state.search_text, "");
        assert_eq!(state.page, 1);

        tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 80)).await;
        assert_eq!(session.state().search_text, "booth");
    }

    #[tokio::test]
    async fn rapid_typing_commits_only_the_last_value() {
        let session = ViewSession::new();
        session.set_search("b".into());
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.set_search("bo".into());
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.set_search("booth".into());

        // the first two timers were aborted; only the last one fires
        tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 120)).await;
        assert_eq!(session.state().search_text, "booth");
    }

    #[tokio::test]
    async fn teardown_cancels_a_pending_commit() {
        let session = ViewSession::new();
        session.set_search("booth".into());
        session.teardown();

        tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 80)).await;
        assert_eq!(session.state().search_text, "");
    }

    #[tokio::test]
    async fn clear_filter_resets_and_cancels() {
        let session = ViewSession::new();
        session.set_filter_field(FilterField::Section);
        session.set_search("B".into());
        session.set_page(3);
        session.clear_filter();

        tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 80)).await;
        let state = session.state();
        assert_eq!(state.search_text, "");
        assert_eq!(state.search_input, "");
        assert_eq!(state.filter_field, FilterField::Name);
        assert_eq!(state.page, 1);
    }

    #[tokio::test]
    async fn registry_creates_resolves_and_removes() {
        let registry = SessionRegistry::new();
        let id = registry.create();
        assert_eq!(registry.count(), 1);
        assert!(registry.get(&id).is_some());

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test]
    async fn session_views_go_through_the_cache() {
        let store = StatusStore::new();
        store.load_initial(vec![plain_machine("a"), plain_machine("b")]);

        let session = ViewSession::new();
        let first = session.page_view(&store);
        let second = session.page_view(&store);
        assert_eq!(first, second);
        assert_eq!(session.cache.lock().recompute_count(), 1);

        session.set_page(2);
        session.page_view(&store);
        assert_eq!(session.cache.lock().recompute_count(), 2);
    }

    #[tokio::test]
    async fn selection_transitions_replace_and_clear() {
        let session = ViewSession::new();
        session.select_section("A".into());
        session.select_machine("booth".into());
        assert_eq!(session.selection(), Selection::Machine("booth".into()));
        session.clear_selection();
        assert_eq!(session.selection(), Selection::None);
    }
}
