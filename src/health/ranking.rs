use std::cmp::Ordering;

use crate::registry::EndpointRow;

/// Candidate order: status rank (`Ok` < `Slow` < `Down`), then latency ascending with unknown
/// latency last, then priority ascending.
#[must_use]
pub fn compare_rows(a: &EndpointRow, b: &EndpointRow) -> Ordering {
    a.status
        .rank()
        .cmp(&b.status.rank())
        .then_with(|| match (a.latency_ms, b.latency_ms) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.priority.cmp(&b.priority))
}

/// Sorts `rows` by [`compare_rows`]. Ties keep their storage order.
pub fn rank_rows(rows: &mut [EndpointRow]) {
    rows.sort_by(compare_rows);
}
