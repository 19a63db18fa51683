//! Core data models for the filter grid.
//!
//! These types describe the server-rendered markup a Grid is built from:
//! the cards, the facet dropdowns, and the optional search, sort, clear
//! and mobile-toggle controls. All of them deserialize from the JSON
//! markup description consumed by [`load_markup`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// URL parameter reserved for the search text.
pub const SEARCH_PARAM: &str = "q";
/// URL parameter reserved for the sort order.
pub const SORT_PARAM: &str = "sort";

/// One content card as rendered into the grid container.
///
/// Attributes are read-only from the pipeline's perspective; only the
/// card's visibility flags and container position ever change.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Card {
    /// Stable identifier, compared as a string against search results.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// Space-separated facet tokens, e.g. `"category:news post_tag:featured"`.
    #[serde(default)]
    pub terms: Option<String>,
    /// Publish timestamp (seconds). Missing dates sort as zero.
    #[serde(default)]
    pub date: i64,
    /// Last-modified timestamp (seconds).
    #[serde(default)]
    pub modified: i64,
    /// Lowercase title used for title sorts.
    #[serde(default)]
    pub title: String,
    /// Original position in the rendered grid.
    #[serde(default)]
    pub index: Option<usize>,
    /// Pre-lowercased text used by the local search fallback.
    #[serde(default)]
    pub search_text: String,
    /// Raw rendered body. Only the reference search endpoint reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Card {
    /// The card's facet tokens, or `None` when the card carries no term data.
    pub fn tokens(&self) -> Option<BTreeSet<&str>> {
        let raw = self.terms.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(raw.split_whitespace().collect())
    }

    /// Whether the card carries `taxonomy:slug` for the given taxonomy and slug.
    pub fn has_term(&self, taxonomy: &str, slug: &str) -> bool {
        let token = format!("{}:{}", taxonomy, slug);
        self.tokens().is_some_and(|t| t.contains(token.as_str()))
    }
}

/// A selectable value inside a facet dropdown.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacetOption {
    pub label: String,
    /// Facet token matched against card terms (`taxonomy:slug`).
    pub token: String,
    /// Slug written to the URL.
    pub slug: String,
}

/// A taxonomy dropdown bound to one URL parameter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FacetControl {
    /// Stable parameter key used for URL encoding.
    pub param: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_taxonomy")]
    pub taxonomy: String,
    #[serde(default)]
    pub options: Vec<FacetOption>,
}

fn default_taxonomy() -> String {
    "category".to_string()
}

impl FacetControl {
    pub fn option_by_slug(&self, slug: &str) -> Option<&FacetOption> {
        self.options.iter().find(|o| o.slug == slug)
    }

    pub fn option_by_token(&self, token: &str) -> Option<&FacetOption> {
        self.options.iter().find(|o| o.token == token)
    }
}

/// Sort orders offered by the sort selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Default,
    Newest,
    Oldest,
    TitleAsc,
    TitleDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Default,
        SortKey::Newest,
        SortKey::Oldest,
        SortKey::TitleAsc,
        SortKey::TitleDesc,
    ];

    /// Parse a selector or URL value. Unknown or missing values map to `Default`.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("newest") => SortKey::Newest,
            Some("oldest") => SortKey::Oldest,
            Some("title-asc") => SortKey::TitleAsc,
            Some("title-desc") => SortKey::TitleDesc,
            _ => SortKey::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Default => "default",
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::TitleAsc => "title-asc",
            SortKey::TitleDesc => "title-desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the server renders for one grid container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GridMarkup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub facets: Vec<FacetControl>,
    /// Whether a search input is present.
    #[serde(default)]
    pub search: bool,
    /// Whether a sort selector is present.
    #[serde(default)]
    pub sort: bool,
    /// Whether a clear-filters trigger is present.
    #[serde(default)]
    pub clear: bool,
    /// Whether a mobile show/hide trigger is present.
    #[serde(default)]
    pub mobile_toggle: bool,
    /// Comma-separated category slugs the grid was rendered for.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MarkupFile {
    Page { grids: Vec<GridMarkup> },
    Single(GridMarkup),
}

/// Parse a markup document: either `{"grids": [...]}` or a single grid.
///
/// Cards without an explicit `index` get their list position, and grids
/// without an `id` get `grid-<n>`.
pub fn parse_markup(json: &str) -> Result<Vec<GridMarkup>> {
    let file: MarkupFile = serde_json::from_str(json).context("Failed to parse grid markup")?;
    let mut grids = match file {
        MarkupFile::Page { grids } => grids,
        MarkupFile::Single(grid) => vec![grid],
    };
    for (n, grid) in grids.iter_mut().enumerate() {
        if grid.id.trim().is_empty() {
            grid.id = format!("grid-{}", n + 1);
        }
        for (pos, card) in grid.cards.iter_mut().enumerate() {
            if card.index.is_none() {
                card.index = Some(pos);
            }
        }
    }
    Ok(grids)
}

pub fn load_markup(path: &Path) -> Result<Vec<GridMarkup>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read markup file: {}", path.display()))?;
    parse_markup(&content)
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "card id must be a string or number, got {}",
            other
        ))),
    }
}
