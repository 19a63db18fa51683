//! URL query string <-> control state.
//!
//! Each grid owns one parameter per facet dropdown plus the reserved `q`
//! (when it has a search box) and `sort` (when it has a sort selector).
//! Writing only ever touches owned keys; unrelated parameters and the
//! fragment are carried through. An empty query string is dropped
//! entirely so the URL never ends in a bare `?`.

use reqwest::Url;

use crate::models::{FacetControl, SortKey, SEARCH_PARAM, SORT_PARAM};

/// Current value of every control in a grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Selected facet token per dropdown, in dropdown order.
    pub facets: Vec<Option<String>>,
    /// Raw search box contents.
    pub query: String,
    pub sort: SortKey,
}

impl ControlState {
    pub fn empty(facet_count: usize) -> Self {
        Self {
            facets: vec![None; facet_count],
            query: String::new(),
            sort: SortKey::Default,
        }
    }

    /// Whether any control differs from its empty/default state.
    pub fn any_active(&self) -> bool {
        self.facets.iter().flatten().any(|t| !t.trim().is_empty())
            || !self.query.trim().is_empty()
            || self.sort != SortKey::Default
    }
}

/// The keys a grid reads and writes.
#[derive(Debug, Clone)]
pub struct OwnedKeys<'a> {
    pub facets: &'a [FacetControl],
    pub search: bool,
    pub sort: bool,
}

impl OwnedKeys<'_> {
    fn owns(&self, key: &str) -> bool {
        (self.search && key == SEARCH_PARAM)
            || (self.sort && key == SORT_PARAM)
            || self.facets.iter().any(|f| f.param == key)
    }
}

fn first_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Populate control values from the URL.
///
/// A facet parameter whose value is not one of the dropdown's slugs resets
/// that dropdown; an unknown sort value resets to `default`.
pub fn read_from_url(href: &str, keys: &OwnedKeys<'_>) -> ControlState {
    let mut state = ControlState::empty(keys.facets.len());
    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(href, error = %e, "unparsable location, using empty state");
            return state;
        }
    };

    for (slot, facet) in state.facets.iter_mut().zip(keys.facets) {
        *slot = first_value(&url, &facet.param)
            .and_then(|slug| facet.option_by_slug(slug.trim()).map(|o| o.token.clone()));
    }
    if keys.search {
        state.query = first_value(&url, SEARCH_PARAM).unwrap_or_default();
    }
    if keys.sort {
        state.sort = SortKey::parse(first_value(&url, SORT_PARAM).as_deref());
    }
    state
}

/// Rewrite the owned keys of `href` to reflect `state`.
///
/// Only non-empty/non-default values are written. Returns `href`
/// unchanged if it cannot be parsed.
pub fn write_to_url(href: &str, keys: &OwnedKeys<'_>, state: &ControlState) -> String {
    let mut url = match Url::parse(href) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(href, error = %e, "unparsable location, not rewriting");
            return href.to_string();
        }
    };

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !keys.owns(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    for (facet, selected) in keys.facets.iter().zip(&state.facets) {
        let slug = selected
            .as_deref()
            .and_then(|token| facet.option_by_token(token))
            .map(|o| o.slug.clone());
        if let Some(slug) = slug.filter(|s| !s.is_empty()) {
            pairs.push((facet.param.clone(), slug));
        }
    }
    if keys.search {
        let q = state.query.trim();
        if !q.is_empty() {
            pairs.push((SEARCH_PARAM.to_string(), q.to_string()));
        }
    }
    if keys.sort && state.sort != SortKey::Default {
        pairs.push((SORT_PARAM.to_string(), state.sort.as_str().to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}
