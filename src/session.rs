//! Page location and history restore.
//!
//! The [`Location`] trait is the only way grids touch the URL. Ordinary
//! interaction always uses [`Location::replace`] so no history entries are
//! added. [`MemoryLocation`] keeps a history stack so back/forward
//! navigation can be simulated and then re-validated with
//! [`restore_controls`].

use std::sync::Mutex;

use crate::codec;
use crate::grid::Grid;

/// The page URL as seen by grids.
pub trait Location: Send + Sync {
    fn href(&self) -> String;
    /// Replace the current history entry.
    fn replace(&self, href: &str);
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    cursor: usize,
}

/// In-memory location with a browser-like history stack.
#[derive(Debug)]
pub struct MemoryLocation {
    history: Mutex<History>,
}

impl MemoryLocation {
    pub fn new(href: &str) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![href.to_string()],
                cursor: 0,
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut History) -> R) -> R {
        let mut guard = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Navigate to a new entry, dropping any forward entries.
    pub fn push(&self, href: &str) {
        self.with(|h| {
            h.entries.truncate(h.cursor + 1);
            h.entries.push(href.to_string());
            h.cursor = h.entries.len() - 1;
        });
    }

    /// Step back in history. Returns false at the first entry.
    pub fn back(&self) -> bool {
        self.with(|h| {
            if h.cursor == 0 {
                return false;
            }
            h.cursor -= 1;
            true
        })
    }

    pub fn forward(&self) -> bool {
        self.with(|h| {
            if h.cursor + 1 >= h.entries.len() {
                return false;
            }
            h.cursor += 1;
            true
        })
    }

    pub fn history_len(&self) -> usize {
        self.with(|h| h.entries.len())
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        self.with(|h| h.entries[h.cursor].clone())
    }

    fn replace(&self, href: &str) {
        self.with(|h| {
            let cursor = h.cursor;
            h.entries[cursor] = href.to_string();
        });
    }
}

/// Re-read the URL into the grid's controls and size the mobile panel.
///
/// The panel opens iff any control is active. Returns the trimmed query
/// that needs a search pass, if any.
pub fn restore_controls(grid: &mut Grid, location: &dyn Location) -> Option<String> {
    let state = codec::read_from_url(&location.href(), &grid.owned_keys());
    grid.set_controls(state);
    let active = grid.controls().any_active();
    grid.set_panel_open(active);
    tracing::debug!(grid = %grid.id(), active, "restored controls from url");
    let query = grid.query();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

/// Write the grid's owned keys back to the location, if anything changed.
pub fn write_url(grid: &Grid, location: &dyn Location) {
    let href = location.href();
    let next = codec::write_to_url(&href, &grid.owned_keys(), grid.controls());
    if next != href {
        location.replace(&next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FacetControl, FacetOption, GridMarkup, SortKey};

    fn grid() -> Grid {
        Grid::new(GridMarkup {
            id: "g".to_string(),
            facets: vec![FacetControl {
                param: "topic".to_string(),
                label: String::new(),
                taxonomy: "category".to_string(),
                options: vec![FacetOption {
                    label: "News".to_string(),
                    token: "category:news".to_string(),
                    slug: "news".to_string(),
                }],
            }],
            search: true,
            sort: true,
            mobile_toggle: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_history_navigation() {
        let loc = MemoryLocation::new("https://example.com/a");
        loc.push("https://example.com/b");
        loc.push("https://example.com/c");
        assert!(loc.back());
        assert_eq!(loc.href(), "https://example.com/b");
        loc.replace("https://example.com/b2");
        assert_eq!(loc.history_len(), 3);
        assert!(loc.forward());
        assert_eq!(loc.href(), "https://example.com/c");
        assert!(!loc.forward());
        assert!(loc.back() && loc.back());
        assert!(!loc.back());
        loc.push("https://example.com/d");
        assert_eq!(loc.history_len(), 2);
    }

    #[test]
    fn test_restore_opens_panel_when_active() {
        let mut g = grid();
        let loc = MemoryLocation::new("https://example.com/?sort=oldest");
        assert_eq!(restore_controls(&mut g, &loc), None);
        assert!(g.panel_open());
        assert_eq!(g.controls().sort, SortKey::Oldest);

        let loc = MemoryLocation::new("https://example.com/?q=+metal+");
        assert_eq!(restore_controls(&mut g, &loc).as_deref(), Some("metal"));

        let loc = MemoryLocation::new("https://example.com/");
        assert_eq!(restore_controls(&mut g, &loc), None);
        assert!(!g.panel_open());
    }

    #[test]
    fn test_write_url_replaces_without_history() {
        let mut g = grid();
        let loc = MemoryLocation::new("https://example.com/?topic=news&ref=x");
        restore_controls(&mut g, &loc);
        g.select_facet("topic", None);
        write_url(&g, &loc);
        assert_eq!(loc.href(), "https://example.com/?ref=x");
        assert_eq!(loc.history_len(), 1);
    }
}
