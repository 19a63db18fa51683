//! Facet filtering with AND semantics across dropdowns.
//!
//! A card passes when its token set is a superset of every active token.
//! A dropdown with no selection imposes no constraint. Cards without term
//! data match nothing once any filter is active.

use crate::models::Card;

/// Collect the active facet tokens, skipping empty selections.
pub fn active_tokens<'a, I>(selections: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    selections
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether a single card passes the active facet tokens.
pub fn matches(card: &Card, active: &[&str]) -> bool {
    if active.is_empty() {
        return true;
    }
    match card.tokens() {
        Some(tokens) => active.iter().all(|t| tokens.contains(t)),
        None => false,
    }
}

/// Compute the "filtered out" flag for every card, in card order.
pub fn filtered_out(cards: &[Card], active: &[&str]) -> Vec<bool> {
    cards.iter().map(|c| !matches(c, active)).collect()
}
