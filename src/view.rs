use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{CacheEntry, Hit, SortKey};

/// How one sortable column orders hits.
///
/// `compare` is always an ascending comparison. Columns with
/// `default_descending` are reversed once after sorting, before the user's
/// reverse toggle is applied on top.
#[derive(Clone, Copy)]
pub struct ColumnSort {
    pub compare: fn(&Hit, &Hit) -> Ordering,
    pub default_descending: bool,
}

pub fn column_sort(key: SortKey) -> Option<ColumnSort> {
    match key {
        SortKey::None => None,
        SortKey::Title => Some(ColumnSort {
            compare: |a, b| missing_last(&a.title, &b.title),
            default_descending: false,
        }),
        SortKey::Author => Some(ColumnSort {
            compare: |a, b| missing_last(&a.author, &b.author),
            default_descending: false,
        }),
        SortKey::Comments => Some(ColumnSort {
            compare: |a, b| missing_last(&a.num_comments, &b.num_comments),
            default_descending: true,
        }),
        SortKey::Points => Some(ColumnSort {
            compare: |a, b| missing_last(&a.points, &b.points),
            default_descending: true,
        }),
    }
}

// Present values ascend; absent ones trail them
fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Derive the rows to display for `active_key`.
///
/// Pure: the cache is only read, and identical inputs give identical output.
pub fn project(
    cache: &HashMap<String, CacheEntry>,
    active_key: &str,
    sort_key: SortKey,
    sort_reversed: bool,
) -> Vec<Hit> {
    let Some(entry) = cache.get(active_key) else {
        return Vec::new();
    };

    let mut hits = entry.hits.clone();
    if let Some(column) = column_sort(sort_key) {
        // Stable, so ties keep fetch order before any reversal
        hits.sort_by(column.compare);
        if column.default_descending {
            hits.reverse();
        }
    }
    if sort_reversed {
        hits.reverse();
    }
    hits
}
