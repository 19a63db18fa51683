//! Event loop for a grid.
//!
//! A [`GridRuntime`] serializes everything that happens to one grid: user
//! events arrive through [`GridRuntime::dispatch`], and timer or network
//! completions arrive on an internal channel drained by
//! [`GridRuntime::settle`] or [`GridRuntime::next`]. Sort and filter stages
//! run synchronously inside `dispatch` and never wait for the network.
//!
//! # Search flow
//!
//! ```text
//! typed ──▶ cancel timer ──▶ sleep(debounce) ──▶ fire
//!                                                 │
//!            local? ──▶ substring match ──────────┤
//!            cached? ──▶ cached ids ──────────────┤
//!            else ──▶ request #n ──▶ settled #n ──┴──▶ apply + re-run search stage
//! ```
//!
//! Only the debounce timer is truly cancelled. Requests already sent run
//! to completion; a response is applied only if it belongs to the latest
//! request and its query still equals the current input.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SearchConfig;
use crate::grid::{Grid, Stages};
use crate::models::{GridMarkup, SortKey};
use crate::search::{self, SearchBackend, SearchCache, SearchRequest, SearchState};
use crate::session::{self, Location};

/// User interactions with a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    /// A facet dropdown changed to the given option token (`None` = "All").
    FacetChanged { param: String, token: Option<String> },
    /// The sort selector changed. Unknown values mean `default`.
    SortChanged(String),
    /// The search box now holds this text.
    SearchTyped(String),
    ClearFilters,
    ToggleMobile,
    /// DOM ready or page shown again from the history cache.
    Restore,
}

#[derive(Debug)]
enum Completion {
    DebounceFired {
        seq: u64,
    },
    SearchSettled {
        seq: u64,
        key: String,
        query: String,
        outcome: Result<Vec<String>>,
    },
}

pub struct GridRuntime {
    grid: Grid,
    location: Arc<dyn Location>,
    backend: Option<Arc<dyn SearchBackend>>,
    debounce: Duration,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    timer: Option<(u64, JoinHandle<()>)>,
    timer_seq: u64,
    request_seq: u64,
    /// Sequence number of the request whose answer would be applied.
    awaiting: Option<u64>,
}

impl GridRuntime {
    pub fn new(
        grid: Grid,
        location: Arc<dyn Location>,
        backend: Option<Arc<dyn SearchBackend>>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            grid,
            location,
            backend,
            debounce,
            tx,
            rx,
            timer: None,
            timer_seq: 0,
            request_seq: 0,
            awaiting: None,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// True when no debounce timer is armed and no applicable request is in flight.
    pub fn is_idle(&self) -> bool {
        self.timer.is_none() && self.awaiting.is_none()
    }

    /// Handle one user event. Must be called from within a tokio runtime.
    pub fn dispatch(&mut self, event: GridEvent) {
        tracing::debug!(grid = %self.grid.id(), ?event, "dispatch");
        match event {
            GridEvent::FacetChanged { param, token } => {
                if self.grid.select_facet(&param, token.as_deref()) {
                    self.grid.run(Stages::FACET);
                    self.write_url();
                }
            }
            GridEvent::SortChanged(value) => {
                if self.grid.has_sort() {
                    self.grid.set_sort(SortKey::parse(Some(&value)));
                    self.grid.run(Stages::ALL);
                    self.write_url();
                }
            }
            GridEvent::SearchTyped(text) => {
                if self.grid.has_search() {
                    self.grid.set_query(&text);
                    self.write_url();
                    self.schedule_search();
                }
            }
            GridEvent::ClearFilters => {
                self.cancel_timer();
                self.awaiting = None;
                self.grid.clear_controls();
                self.grid.set_search_state(SearchState::Unconstrained);
                self.grid.run(Stages::ALL);
                self.write_url();
            }
            GridEvent::ToggleMobile => {
                if self.grid.has_mobile_toggle() {
                    self.grid.toggle_panel();
                }
            }
            GridEvent::Restore => self.restore(),
        }
    }

    /// Re-validate against the current URL, e.g. after back/forward.
    fn restore(&mut self) {
        self.cancel_timer();
        self.awaiting = None;
        match session::restore_controls(&mut self.grid, self.location.as_ref()) {
            Some(_) => self.fire_search(),
            None => self.grid.set_search_state(SearchState::Unconstrained),
        }
        self.grid.run(Stages::ALL);
        self.write_url();
    }

    /// Regenerated markup: rebuild controls and cards, keep the search cache.
    pub fn rebind(&mut self, markup: GridMarkup) {
        let cache = std::mem::take(self.grid.cache_mut());
        let state = self.grid.search_state().clone();
        self.grid = Grid::new(markup);
        *self.grid.cache_mut() = cache;
        self.grid.set_search_state(state);
        self.restore();
    }

    fn write_url(&self) {
        session::write_url(&self.grid, self.location.as_ref());
    }

    fn cancel_timer(&mut self) {
        if let Some((_, handle)) = self.timer.take() {
            handle.abort();
        }
    }

    fn schedule_search(&mut self) {
        self.cancel_timer();
        if self.grid.query().is_empty() {
            self.awaiting = None;
            self.grid.set_search_state(SearchState::Unconstrained);
            self.grid.run(Stages::SEARCH);
            return;
        }

        self.timer_seq += 1;
        let seq = self.timer_seq;
        let tx = self.tx.clone();
        let delay = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::DebounceFired { seq });
        });
        self.timer = Some((seq, handle));
    }

    fn fire_search(&mut self) {
        let query = self.grid.query().to_string();
        if query.is_empty() {
            self.awaiting = None;
            self.grid.set_search_state(SearchState::Unconstrained);
            self.grid.run(Stages::SEARCH);
            return;
        }

        let Some(backend) = self.backend.clone() else {
            let ids = search::local_matches(self.grid.cards(), &query);
            tracing::debug!(grid = %self.grid.id(), %query, hits = ids.len(), "local search");
            self.apply(query, ids);
            return;
        };

        let scope = self.grid.search_scope();
        let key = SearchCache::key(&query, scope.as_deref());
        if let Some(ids) = self.grid.cache().get(&key) {
            tracing::debug!(grid = %self.grid.id(), %query, "search cache hit");
            let ids = ids.clone();
            self.awaiting = None;
            self.apply(query, ids);
            return;
        }

        self.request_seq += 1;
        let seq = self.request_seq;
        self.awaiting = Some(seq);
        tracing::debug!(grid = %self.grid.id(), %query, seq, ?scope, "remote search");

        let tx = self.tx.clone();
        let req = SearchRequest {
            query: query.clone(),
            scope,
        };
        tokio::spawn(async move {
            let outcome = backend.search(&req).await;
            let _ = tx.send(Completion::SearchSettled {
                seq,
                key,
                query,
                outcome,
            });
        });
    }

    fn apply(&mut self, query: String, ids: HashSet<String>) {
        self.grid
            .set_search_state(SearchState::Matches { query, ids });
        self.grid.run(Stages::SEARCH);
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::DebounceFired { seq } => {
                if self.timer.as_ref().map(|(s, _)| *s) != Some(seq) {
                    return;
                }
                self.timer = None;
                self.fire_search();
            }
            Completion::SearchSettled {
                seq,
                key,
                query,
                outcome,
            } => {
                if self.awaiting != Some(seq) {
                    tracing::debug!(grid = %self.grid.id(), %query, seq, "dropping superseded response");
                    return;
                }
                self.awaiting = None;
                if self.grid.query() != query {
                    tracing::debug!(grid = %self.grid.id(), %query, seq, "dropping stale response");
                    return;
                }
                match outcome {
                    Ok(ids) => {
                        let ids: HashSet<String> = ids.into_iter().collect();
                        self.grid.cache_mut().insert(key, ids.clone());
                        self.apply(query, ids);
                    }
                    Err(e) => {
                        tracing::warn!(grid = %self.grid.id(), %query, error = %e, "search failed");
                        self.apply(query, HashSet::new());
                    }
                }
            }
        }
    }

    /// Wait for and handle the next timer or network completion.
    ///
    /// Returns false if nothing can arrive anymore.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(completion) => {
                self.complete(completion);
                true
            }
            None => false,
        }
    }

    /// Drive completions until the debounce timer and the latest request settle.
    ///
    /// A request that never resolves keeps this pending.
    pub async fn settle(&mut self) {
        while !self.is_idle() {
            if !self.next().await {
                break;
            }
        }
    }
}

impl Drop for GridRuntime {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Every grid discovered on one page, each with its own runtime.
pub struct Page {
    runtimes: Vec<GridRuntime>,
}

impl Page {
    pub fn new(
        markups: Vec<GridMarkup>,
        location: Arc<dyn Location>,
        config: &SearchConfig,
    ) -> Result<Self> {
        let backend = search::create_backend(config)?;
        Ok(Self::with_backend(
            markups,
            location,
            backend,
            config.debounce(),
        ))
    }

    pub fn with_backend(
        markups: Vec<GridMarkup>,
        location: Arc<dyn Location>,
        backend: Option<Arc<dyn SearchBackend>>,
        debounce: Duration,
    ) -> Self {
        let runtimes = markups
            .into_iter()
            .map(|m| {
                GridRuntime::new(Grid::new(m), location.clone(), backend.clone(), debounce)
            })
            .collect();
        Self { runtimes }
    }

    pub fn grids(&self) -> impl Iterator<Item = &GridRuntime> {
        self.runtimes.iter()
    }

    pub fn grid(&self, id: &str) -> Option<&GridRuntime> {
        self.runtimes.iter().find(|r| r.grid().id() == id)
    }

    /// Route an event to the grid that owns it. Returns false for unknown ids.
    pub fn dispatch(&mut self, grid_id: &str, event: GridEvent) -> bool {
        match self.runtimes.iter_mut().find(|r| r.grid().id() == grid_id) {
            Some(runtime) => {
                runtime.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// DOM ready / history restore for every grid.
    pub fn restore_all(&mut self) {
        for runtime in &mut self.runtimes {
            runtime.dispatch(GridEvent::Restore);
        }
    }

    pub async fn settle(&mut self) {
        for runtime in &mut self.runtimes {
            runtime.settle().await;
        }
    }
}
