//! Card ordering.
//!
//! Every key falls back to the original-order index, which is the only
//! deterministic tie-break. Sorting affects container position only and
//! never visibility.

use feruca::{Collator, Tailoring};
use std::cmp::Ordering;

use crate::models::{Card, SortKey};

fn original_index(cards: &[Card], i: usize) -> usize {
    cards[i].index.unwrap_or(i)
}

/// Locale-aware title comparison over the CLDR root collation.
///
/// Titles are trimmed and lowercased first so case never decides the
/// order. Punctuation and spaces stay significant (non-ignorable), which
/// matches a browser's default `localeCompare`.
pub struct TitleCollator {
    collator: Collator,
}

impl TitleCollator {
    pub fn new() -> Self {
        Self {
            collator: Collator::new(Tailoring::default(), false, true),
        }
    }

    /// Ties are left to the caller's fallback.
    pub fn compare(&mut self, a: &str, b: &str) -> Ordering {
        let la = a.trim().to_lowercase();
        let lb = b.trim().to_lowercase();
        self.collator.collate(la.as_str(), lb.as_str())
    }
}

impl Default for TitleCollator {
    fn default() -> Self {
        Self::new()
    }
}

fn compare_dates(a: &Card, b: &Card) -> Ordering {
    a.date.cmp(&b.date).then(a.modified.cmp(&b.modified))
}

fn compare(
    titles: &mut TitleCollator,
    cards: &[Card],
    key: SortKey,
    a: usize,
    b: usize,
) -> Ordering {
    let (ca, cb) = (&cards[a], &cards[b]);
    let primary = match key {
        SortKey::Default => Ordering::Equal,
        SortKey::Newest => compare_dates(cb, ca),
        SortKey::Oldest => compare_dates(ca, cb),
        SortKey::TitleAsc => titles.compare(&ca.title, &cb.title),
        SortKey::TitleDesc => titles.compare(&cb.title, &ca.title),
    };
    primary.then_with(|| original_index(cards, a).cmp(&original_index(cards, b)))
}

/// Produce the container order (positions into `cards`) for a sort key.
pub fn sort_order(cards: &[Card], key: SortKey) -> Vec<usize> {
    let mut titles = TitleCollator::new();
    let mut order: Vec<usize> = (0..cards.len()).collect();
    order.sort_by(|&a, &b| compare(&mut titles, cards, key, a, b));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(dates: &[i64]) -> Vec<Card> {
        dates
            .iter()
            .enumerate()
            .map(|(i, d)| Card {
                id: format!("c{}", i),
                date: *d,
                index: Some(i),
                ..Default::default()
            })
            .collect()
    }

    fn dates_in(cards: &[Card], order: &[usize]) -> Vec<i64> {
        order.iter().map(|&i| cards[i].date).collect()
    }

    #[test]
    fn test_newest_then_default_restores() {
        let cards = dated(&[100, 300, 200]);
        let newest = sort_order(&cards, SortKey::Newest);
        assert_eq!(dates_in(&cards, &newest), vec![300, 200, 100]);
        let oldest = sort_order(&cards, SortKey::Oldest);
        assert_eq!(dates_in(&cards, &oldest), vec![100, 200, 300]);
        let default = sort_order(&cards, SortKey::Default);
        assert_eq!(dates_in(&cards, &default), vec![100, 300, 200]);
    }

    #[test]
    fn test_ties_fall_back_to_original_index() {
        let mut cards = dated(&[50, 50, 50]);
        cards[0].index = Some(2);
        cards[2].index = Some(0);
        let order = sort_order(&cards, SortKey::Newest);
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_modified_breaks_date_ties() {
        let mut cards = dated(&[10, 10]);
        cards[0].modified = 1;
        cards[1].modified = 5;
        assert_eq!(sort_order(&cards, SortKey::Newest), vec![1, 0]);
    }

    #[test]
    fn test_title_sorts_case_insensitive() {
        let cards = titled(&["banana", "Apple", "cherry", "apple"]);
        assert_eq!(sort_order(&cards, SortKey::TitleAsc), vec![1, 3, 0, 2]);
        assert_eq!(sort_order(&cards, SortKey::TitleDesc), vec![2, 0, 1, 3]);
    }

    fn titled(titles: &[&str]) -> Vec<Card> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Card {
                title: t.to_string(),
                index: Some(i),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_title_sorts_collate_accented_letters() {
        let cards = titled(&["zebra", "éclair", "apple", "Eclair"]);
        assert_eq!(sort_order(&cards, SortKey::TitleAsc), vec![2, 3, 1, 0]);
        assert_eq!(sort_order(&cards, SortKey::TitleDesc), vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_title_collator_places_accents_among_letters() {
        let mut titles = TitleCollator::new();
        assert_eq!(titles.compare("éclair", "zebra"), Ordering::Less);
        assert_eq!(titles.compare("Ångström", "beta"), Ordering::Less);
        assert_eq!(titles.compare("  Apple ", "apple"), Ordering::Equal);
    }

    #[test]
    fn test_sort_is_idempotent_and_default_restores() {
        let cards = dated(&[7, 3, 9, 3, 1]);
        for key in SortKey::ALL {
            let once = sort_order(&cards, key);
            let reordered: Vec<Card> = once.iter().map(|&i| cards[i].clone()).collect();
            let twice = sort_order(&reordered, key);
            let twice_ids: Vec<&str> = twice.iter().map(|&i| reordered[i].id.as_str()).collect();
            let once_ids: Vec<&str> = once.iter().map(|&i| cards[i].id.as_str()).collect();
            assert_eq!(once_ids, twice_ids, "{} not idempotent", key);

            let restored = sort_order(&reordered, SortKey::Default);
            let indices: Vec<usize> = restored
                .iter()
                .map(|&i| reordered[i].index.unwrap())
                .collect();
            assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_missing_dates_sort_as_zero() {
        let mut cards = dated(&[5, 0]);
        cards[1].date = 0;
        assert_eq!(sort_order(&cards, SortKey::Oldest), vec![1, 0]);
    }
}
