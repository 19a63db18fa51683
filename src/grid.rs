//! One grid instance and its re-render pipeline.
//!
//! A [`Grid`] owns its cards, controls, search state and search cache, so
//! several grids on one page never share anything. The pipeline runs the
//! requested stages in the fixed order sort → filter → search and then
//! recomputes the no-results indicator.
//!
//! Each card carries two independent hidden flags: `filtered_out` (facet
//! stage) and `search_hidden` (search stage). A card is visible only when
//! both are clear. Sorting changes container order and nothing else.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::codec::{ControlState, OwnedKeys};
use crate::facet;
use crate::models::{Card, FacetControl, GridMarkup, SortKey};
use crate::search::{SearchCache, SearchState};
use crate::sort;

/// Which pipeline stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stages {
    pub sort: bool,
    pub filters: bool,
    pub search: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        sort: true,
        filters: true,
        search: true,
    };
    /// Facet dropdown change.
    pub const FACET: Stages = Stages {
        sort: false,
        filters: true,
        search: true,
    };
    /// Search input or resolved search.
    pub const SEARCH: Stages = Stages {
        sort: false,
        filters: false,
        search: true,
    };
}

/// Per-card visibility flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardView {
    pub filtered_out: bool,
    pub search_hidden: bool,
}

impl CardView {
    pub fn visible(&self) -> bool {
        !self.filtered_out && !self.search_hidden
    }
}

#[derive(Debug)]
pub struct Grid {
    id: String,
    facets: Vec<FacetControl>,
    has_search: bool,
    has_sort: bool,
    has_clear: bool,
    has_mobile_toggle: bool,
    scope: Option<String>,
    cards: Vec<Card>,
    views: Vec<CardView>,
    /// Container order as positions into `cards`. The no-results
    /// placeholder is kept outside this list.
    order: Vec<usize>,
    no_results: bool,
    panel_open: bool,
    controls: ControlState,
    search: SearchState,
    cache: SearchCache,
}

impl Grid {
    pub fn new(markup: GridMarkup) -> Self {
        let n = markup.cards.len();
        let controls = ControlState::empty(markup.facets.len());
        Self {
            id: markup.id,
            facets: markup.facets,
            has_search: markup.search,
            has_sort: markup.sort,
            has_clear: markup.clear,
            has_mobile_toggle: markup.mobile_toggle,
            scope: markup
                .scope
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            cards: markup.cards,
            views: vec![CardView::default(); n],
            order: (0..n).collect(),
            no_results: n == 0,
            panel_open: false,
            controls,
            search: SearchState::Unconstrained,
            cache: SearchCache::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn facets(&self) -> &[FacetControl] {
        &self.facets
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn has_search(&self) -> bool {
        self.has_search
    }

    pub fn has_sort(&self) -> bool {
        self.has_sort
    }

    pub fn has_clear(&self) -> bool {
        self.has_clear
    }

    pub fn has_mobile_toggle(&self) -> bool {
        self.has_mobile_toggle
    }

    pub fn owned_keys(&self) -> OwnedKeys<'_> {
        OwnedKeys {
            facets: &self.facets,
            search: self.has_search,
            sort: self.has_sort,
        }
    }

    // ── Controls ────────────────────────────────────────────────────

    /// Select a facet value by dropdown parameter key.
    ///
    /// `token` must be one of the dropdown's option tokens; anything else
    /// (including `None` or an empty string) resets the dropdown. Returns
    /// false when no dropdown owns `param`.
    pub fn select_facet(&mut self, param: &str, token: Option<&str>) -> bool {
        let Some(pos) = self.facets.iter().position(|f| f.param == param) else {
            return false;
        };
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        self.controls.facets[pos] = token
            .and_then(|t| self.facets[pos].option_by_token(t))
            .map(|o| o.token.clone());
        true
    }

    pub fn set_sort(&mut self, key: SortKey) {
        if self.has_sort {
            self.controls.sort = key;
        }
    }

    pub fn set_query(&mut self, text: &str) {
        if self.has_search {
            self.controls.query = text.to_string();
        }
    }

    /// Trimmed search box contents.
    pub fn query(&self) -> &str {
        self.controls.query.trim()
    }

    /// Replace every control value, e.g. from the URL.
    pub fn set_controls(&mut self, mut controls: ControlState) {
        controls.facets.resize(self.facets.len(), None);
        if !self.has_search {
            controls.query.clear();
        }
        if !self.has_sort {
            controls.sort = SortKey::Default;
        }
        self.controls = controls;
    }

    /// Reset facets, search text and sort.
    pub fn clear_controls(&mut self) {
        self.controls = ControlState::empty(self.facets.len());
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn toggle_panel(&mut self) {
        self.panel_open = !self.panel_open;
    }

    // ── Search state ────────────────────────────────────────────────

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    pub fn set_search_state(&mut self, state: SearchState) {
        self.search = state;
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SearchCache {
        &mut self.cache
    }

    /// Category scope sent with remote searches: the grid's own scope plus
    /// any active category facets.
    pub fn search_scope(&self) -> Option<String> {
        let mut slugs: BTreeSet<String> = BTreeSet::new();
        if let Some(scope) = &self.scope {
            slugs.extend(
                scope
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        for token in self.controls.facets.iter().flatten() {
            if let Some(slug) = token.strip_prefix("category:") {
                slugs.insert(slug.to_string());
            }
        }
        if slugs.is_empty() {
            None
        } else {
            Some(slugs.into_iter().collect::<Vec<_>>().join(","))
        }
    }

    /// Append a card rendered after load. Run the pipeline afterwards.
    pub fn insert_card(&mut self, mut card: Card) {
        if card.index.is_none() {
            card.index = Some(self.cards.len());
        }
        self.order.push(self.cards.len());
        self.cards.push(card);
        self.views.push(CardView::default());
    }

    // ── Pipeline ────────────────────────────────────────────────────

    /// Run the requested stages, then recompute the no-results indicator.
    pub fn run(&mut self, stages: Stages) {
        if stages.sort {
            self.apply_sort();
        }
        if stages.filters {
            self.apply_filters();
        }
        if stages.search {
            self.apply_search();
        }
        self.no_results = self.visible_count() == 0;
        tracing::debug!(
            grid = %self.id,
            visible = self.visible_count(),
            total = self.cards.len(),
            "pipeline ran"
        );
    }

    fn apply_sort(&mut self) {
        self.order = sort::sort_order(&self.cards, self.controls.sort);
    }

    fn apply_filters(&mut self) {
        let active = facet::active_tokens(self.controls.facets.iter().map(|t| t.as_deref()));
        for (view, card) in self.views.iter_mut().zip(&self.cards) {
            view.filtered_out = !facet::matches(card, &active);
        }
    }

    fn apply_search(&mut self) {
        for (view, card) in self.views.iter_mut().zip(&self.cards) {
            view.search_hidden = !self.search.passes(card);
        }
    }

    pub fn views(&self) -> &[CardView] {
        &self.views
    }

    /// Container order as positions into [`cards`](Grid::cards).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn no_results(&self) -> bool {
        self.no_results
    }

    pub fn visible_count(&self) -> usize {
        self.views.iter().filter(|v| v.visible()).count()
    }

    /// Identifiers of visible cards in container order.
    pub fn visible_ids(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|&&i| self.views[i].visible())
            .map(|&i| self.cards[i].id.as_str())
            .collect()
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            id: self.id.clone(),
            visible: self
                .order
                .iter()
                .filter(|&&i| self.views[i].visible())
                .map(|&i| CardSummary::from(&self.cards[i]))
                .collect(),
            total: self.cards.len(),
            no_results: self.no_results,
            panel_open: self.panel_open,
            query: self.query().to_string(),
            sort: self.controls.sort,
        }
    }
}

/// Serializable view of a grid after a pipeline pass.
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub id: String,
    pub visible: Vec<CardSummary>,
    pub total: usize,
    pub no_results: bool,
    pub panel_open: bool,
    pub query: String,
    pub sort: SortKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardSummary {
    pub id: String,
    pub title: String,
    pub date: i64,
}

impl From<&Card> for CardSummary {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            title: card.title.clone(),
            date: card.date,
        }
    }
}
