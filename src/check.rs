//! Markup validation.
//!
//! Finds markup that would make URL state ambiguous or cards unreachable.
//! None of these are fatal at runtime; the pipeline degrades instead.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{GridMarkup, SEARCH_PARAM, SORT_PARAM};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub grid: String,
    pub message: String,
}

pub fn check_markup(grids: &[GridMarkup]) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut grid_ids = HashSet::new();

    for grid in grids {
        let mut push = |message: String| {
            findings.push(Finding {
                grid: grid.id.clone(),
                message,
            })
        };

        if !grid_ids.insert(grid.id.as_str()) {
            push("duplicate grid id".to_string());
        }

        let mut params = HashSet::new();
        for facet in &grid.facets {
            if facet.param.trim().is_empty() {
                push("facet with empty parameter key".to_string());
            }
            if facet.param == SEARCH_PARAM || facet.param == SORT_PARAM {
                push(format!("facet uses reserved parameter '{}'", facet.param));
            }
            if !params.insert(facet.param.as_str()) {
                push(format!("duplicate facet parameter '{}'", facet.param));
            }
            let prefix = format!("{}:", facet.taxonomy);
            let mut slugs = HashSet::new();
            for option in &facet.options {
                if !option.token.starts_with(&prefix) {
                    push(format!(
                        "option '{}' in '{}' has token '{}' outside taxonomy '{}'",
                        option.label, facet.param, option.token, facet.taxonomy
                    ));
                }
                if option.slug.trim().is_empty() {
                    push(format!("option '{}' in '{}' has no slug", option.label, facet.param));
                } else if !slugs.insert(option.slug.as_str()) {
                    push(format!("duplicate slug '{}' in '{}'", option.slug, facet.param));
                }
            }
        }

        let mut card_ids = HashSet::new();
        for (pos, card) in grid.cards.iter().enumerate() {
            if card.id.trim().is_empty() {
                push(format!("card at position {} has no id", pos));
            } else if !card_ids.insert(card.id.as_str()) {
                push(format!("duplicate card id '{}'", card.id));
            }
            if !grid.facets.is_empty() && card.tokens().is_none() {
                push(format!(
                    "card '{}' has no terms and is hidden by every facet",
                    card.id
                ));
            }
        }
    }

    findings
}
