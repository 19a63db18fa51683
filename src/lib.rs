//! # Post Filter Grid
//!
//! A filterable, searchable, sortable grid of content cards whose visible
//! set stays in sync with facet dropdowns, free-text search, sort order,
//! and the page URL.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │  Events  │──▶│  GridRuntime (per grid)      │──▶│ Location │
//! │ UI/URL   │   │  sort → filter → search      │   │  (URL)   │
//! └──────────┘   └──────────────┬───────────────┘   └──────────┘
//!                               │ debounced, single-flight
//!                               ▼
//!                        ┌──────────────┐
//!                        │ SearchBackend│  local substring or remote POST
//!                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pfg check --grid ./grid.json
//! pfg query --grid ./grid.json --url "https://example.com/?topic=news&sort=newest"
//! pfg serve --grid ./grid.json          # reference search endpoint
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Cards, controls and markup |
//! | [`facet`] | Facet filter (AND across dropdowns) |
//! | [`sort`] | Sort engine with original-order fallback |
//! | [`codec`] | URL query string ↔ control state |
//! | [`search`] | Local and remote search, cache, response parsing |
//! | [`grid`] | Grid instance and pipeline coordinator |
//! | [`session`] | Location, history, restore |
//! | [`runtime`] | Per-grid event loop, debounce and staleness handling |
//! | [`server`] | Reference search endpoint |
//! | [`check`] | Markup validation |
//! | [`logging`] | Tracing subscriber setup |

pub mod check;
pub mod codec;
pub mod config;
pub mod facet;
pub mod grid;
pub mod logging;
pub mod models;
pub mod runtime;
pub mod search;
pub mod server;
pub mod session;
pub mod sort;
