//! Local and remote text search.
//!
//! Search resolves a trimmed query to a set of matching card identifiers.
//! Without a configured endpoint the match is a case-insensitive substring
//! check against each card's pre-built search text. With an endpoint, the
//! [`SearchBackend`] is asked once per distinct query and its answer is
//! authoritative: the client never re-filters the returned identifiers.
//!
//! # Response shape
//!
//! ```json
//! { "success": true, "data": { "ids": ["5", 9] } }
//! ```
//!
//! `data` may also be the bare identifier list. Identifiers are coerced to
//! strings. Any other shape is a failure.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::models::Card;

/// Last completed search outcome for one grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchState {
    /// Empty query: every card passes.
    #[default]
    Unconstrained,
    /// Only these identifiers pass. Empty after a failed lookup.
    Matches { query: String, ids: HashSet<String> },
}

impl SearchState {
    pub fn passes(&self, card: &Card) -> bool {
        match self {
            SearchState::Unconstrained => true,
            SearchState::Matches { ids, .. } => ids.contains(&card.id),
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Unconstrained => None,
            SearchState::Matches { query, .. } => Some(query),
        }
    }
}

/// Resolved identifier sets keyed by query and scope.
///
/// Lives as long as the grid; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct SearchCache {
    entries: HashMap<String, HashSet<String>>,
}

impl SearchCache {
    pub fn key(query: &str, scope: Option<&str>) -> String {
        match scope {
            Some(scope) if !scope.is_empty() => format!("{}\u{1f}{}", query, scope),
            _ => query.to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&HashSet<String>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, ids: HashSet<String>) {
        self.entries.insert(key, ids);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Case-insensitive substring match against each card's search text.
pub fn local_matches(cards: &[Card], query: &str) -> HashSet<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return cards.iter().map(|c| c.id.clone()).collect();
    }
    cards
        .iter()
        .filter(|c| c.search_text.to_lowercase().contains(&needle))
        .map(|c| c.id.clone())
        .collect()
}

/// One call to the remote search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    /// Comma-separated category slugs, omitted when unscoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// A remote full-text search capability.
///
/// Implementations return the matching identifiers for a query. Transport
/// failures and malformed responses are errors; the caller degrades them
/// to "no known matches".
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<String>>;
}

/// Calls a form-encoded POST endpoint.
///
/// Sends `action`, `query`, and optionally `nonce` and `cats`.
pub struct RemoteSearch {
    client: reqwest::Client,
    endpoint: String,
    action: String,
    token: Option<String>,
}

impl RemoteSearch {
    pub fn new(endpoint: &str, action: &str, token: Option<String>) -> Result<Self> {
        // No request timeout: a hung request leaves the last known state in place.
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
            action: action.to_string(),
            token,
        })
    }
}

#[async_trait]
impl SearchBackend for RemoteSearch {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<String>> {
        let mut form: Vec<(&str, &str)> = vec![
            ("action", self.action.as_str()),
            ("query", req.query.as_str()),
        ];
        if let Some(token) = self.token.as_deref() {
            form.push(("nonce", token));
        }
        if let Some(scope) = req.scope.as_deref() {
            form.push(("cats", scope));
        }

        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Search endpoint error {}: {}", status, body_text);
        }
        let json: serde_json::Value = response.json().await?;
        parse_response(&json)
    }
}

/// Build the configured backend, or `None` for local search.
pub fn create_backend(config: &SearchConfig) -> Result<Option<Arc<dyn SearchBackend>>> {
    match config.endpoint.as_deref() {
        Some(endpoint) if config.is_remote() => Ok(Some(Arc::new(RemoteSearch::new(
            endpoint,
            &config.action,
            config.token.clone(),
        )?))),
        _ => Ok(None),
    }
}

/// Render a numeric id the way the page would stringify it: integral
/// floats such as `5.0` become `"5"`.
fn number_id(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Validate a search response and extract identifiers as strings.
pub fn parse_response(json: &serde_json::Value) -> Result<Vec<String>> {
    if json.get("success").and_then(|s| s.as_bool()) != Some(true) {
        bail!("Search response not successful");
    }
    let data = json
        .get("data")
        .ok_or_else(|| anyhow!("Invalid search response: missing data"))?;
    let list = match data {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(obj) => obj
            .get("ids")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("Invalid search response: missing ids array"))?,
        _ => bail!("Invalid search response: data is neither a list nor an object"),
    };

    list.iter()
        .map(|v| match v {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Number(n) => Ok(number_id(n)),
            other => Err(anyhow!("Invalid search response: bad id {}", other)),
        })
        .collect()
}
