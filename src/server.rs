//! Reference search endpoint.
//!
//! Answers the remote search calls a grid makes when `[search].endpoint` is
//! configured, over the cards of a markup file. It exists so the remote
//! path can be run and tested end to end; a production site would answer
//! the same calls from its own content store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Form fields `action`, `query`, `nonce`?, `cats`? |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! ```json
//! { "success": true,  "data": { "ids": ["5", "9"] } }
//! { "success": false, "data": { "message": "invalid nonce" } }
//! ```
//!
//! # Matching
//!
//! 1. Coarse: the card's raw title and body must contain the longest query
//!    word (case-insensitive).
//! 2. Precise: the tag-stripped, whitespace-collapsed title and body must
//!    contain the whole query (case-insensitive).
//! 3. `cats` (comma-separated category slugs) keeps cards carrying any of
//!    the listed `category:<slug>` tokens.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::Card;

/// Shared state passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    index: Arc<SearchIndex>,
    action: String,
    token: Option<String>,
}

struct IndexedCard {
    id: String,
    /// Lowercased raw title + body, used for the coarse pass.
    raw: String,
    /// Lowercased stripped title + body, used for the precise pass.
    text: String,
    categories: Vec<String>,
}

/// Searchable view of a set of cards.
pub struct SearchIndex {
    cards: Vec<IndexedCard>,
}

impl SearchIndex {
    pub fn from_cards(cards: &[Card]) -> Self {
        let cards = cards
            .iter()
            .map(|card| {
                let body = card.body.as_deref().unwrap_or(&card.search_text);
                let raw = format!("{} {}", card.title, body);
                let categories = card
                    .tokens()
                    .map(|tokens| {
                        tokens
                            .iter()
                            .filter_map(|t| t.strip_prefix("category:"))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                IndexedCard {
                    id: card.id.clone(),
                    text: strip_tags(&raw).to_lowercase(),
                    raw: raw.to_lowercase(),
                    categories,
                }
            })
            .collect();
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Identifiers of matching cards, in index order.
    pub fn search(&self, query: &str, cats: Option<&str>) -> Vec<String> {
        let needle = collapse_whitespace(query).to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let probe = needle
            .split(' ')
            .max_by_key(|w| w.chars().count())
            .unwrap_or(needle.as_str());
        let scope: Vec<&str> = cats
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        self.cards
            .iter()
            .filter(|c| scope.is_empty() || c.categories.iter().any(|s| scope.contains(&s.as_str())))
            .filter(|c| c.raw.contains(probe))
            .filter(|c| c.text.contains(&needle))
            .map(|c| c.id.clone())
            .collect()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Elements that start a new line of text when rendered.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th",
    "tr", "ul",
];

fn is_block_tag(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
}

/// Remove markup tags, decode common entities, and collapse whitespace.
///
/// Inline tags vanish without a trace, so `met<b>al</b>` reads `metal`.
/// Block-level tags separate the words on either side.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag: Option<String> = None;
    for ch in html.chars() {
        match tag.as_mut() {
            None if ch == '<' => tag = Some(String::new()),
            None => out.push(ch),
            Some(name) if ch == '>' => {
                if is_block_tag(name) {
                    out.push(' ');
                }
                tag = None;
            }
            Some(name) => name.push(ch),
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&");
    collapse_whitespace(&decoded)
}

/// Build the router. Exposed for tests and embedding.
pub fn app(index: SearchIndex, action: &str, token: Option<String>) -> Router {
    let state = AppState {
        index: Arc::new(index),
        action: action.to_string(),
        token: token.filter(|t| !t.is_empty()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve the reference endpoint on `[server].bind` until the process ends.
pub async fn run_server(config: &Config, cards: &[Card]) -> anyhow::Result<()> {
    let index = SearchIndex::from_cards(cards);
    tracing::info!(cards = index.len(), bind = %config.server.bind, "starting search endpoint");
    let router = app(index, &config.search.action, config.server.token.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Search endpoint listening on http://{}/search", config.server.bind);
    axum::serve(listener, router).await?;
    Ok(())
}

// ============ Response bodies ============

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    data: SearchData,
}

#[derive(Serialize)]
#[serde(untagged)]
enum SearchData {
    Ids { ids: Vec<String> },
    Message { message: String },
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body = SearchResponse {
        success: false,
        data: SearchData::Message {
            message: message.to_string(),
        },
    };
    (status, Json(body)).into_response()
}

// ============ POST /search ============

#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    cats: Option<String>,
}

async fn handle_search(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Response {
    if form.action != state.action {
        return failure(StatusCode::BAD_REQUEST, "unknown action");
    }
    if let Some(expected) = state.token.as_deref() {
        if form.nonce.as_deref() != Some(expected) {
            tracing::warn!("search rejected: invalid nonce");
            return failure(StatusCode::FORBIDDEN, "invalid nonce");
        }
    }

    let ids = state.index.search(form.query.trim(), form.cats.as_deref());
    tracing::debug!(query = %form.query, hits = ids.len(), "search");
    Json(SearchResponse {
        success: true,
        data: SearchData::Ids { ids },
    })
    .into_response()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, terms: &str, title: &str, body: &str) -> Card {
        Card {
            id: id.to_string(),
            terms: Some(terms.to_string()),
            title: title.to_string(),
            body: Some(body.to_string()),
            ..Default::default()
        }
    }

    fn index() -> SearchIndex {
        SearchIndex::from_cards(&[
            card("5", "category:music", "Heavy", "<p>A <b>metal</b> night</p>"),
            card("6", "category:music", "Jazz", "<p>smooth &amp; calm</p>"),
            card("9", "category:news", "METAL prices", "markets"),
        ])
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>A <b>metal</b>\n night</p>"), "A metal night");
        assert_eq!(strip_tags("fish &amp; chips&nbsp;today"), "fish & chips today");
        assert_eq!(strip_tags("no tags"), "no tags");
    }

    #[test]
    fn test_strip_tags_inline_tags_add_no_text() {
        assert_eq!(strip_tags("met<b>al</b> night"), "metal night");
        assert_eq!(strip_tags("<p>one</p><p>two</p>"), "one two");
        assert_eq!(strip_tags("a<br/>b<BR>c"), "a b c");
        assert_eq!(strip_tags("<em class=\"x\">he</em>avy"), "heavy");
    }

    #[test]
    fn test_search_matches_across_inline_tags() {
        // The raw text still holds "metal" in the title, so the coarse pass
        // admits the card and the precise pass sees "metal show".
        let idx = SearchIndex::from_cards(&[card(
            "3",
            "category:music",
            "Metal",
            "met<b>al</b> show",
        )]);
        assert_eq!(idx.search("metal show", None), vec!["3"]);
    }

    #[test]
    fn test_search_case_insensitive_on_stripped_text() {
        let idx = index();
        assert_eq!(idx.search("metal", None), vec!["5", "9"]);
        assert_eq!(idx.search("A METAL NIGHT", None), vec!["5"]);
        assert_eq!(idx.search("smooth & calm", None), vec!["6"]);
        assert!(idx.search("metal</b>", None).is_empty());
    }

    #[test]
    fn test_search_scope_and_empty_query() {
        let idx = index();
        assert_eq!(idx.search("metal", Some("news")), vec!["9"]);
        assert_eq!(idx.search("metal", Some(" news , music ")), vec!["5", "9"]);
        assert!(idx.search("metal", Some("sports")).is_empty());
        assert!(idx.search("   ", None).is_empty());
    }
}
