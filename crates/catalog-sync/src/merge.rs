//! Last-write-wins merge for pulled products.
//!
//! The local copy is matched by barcode. A remote copy replaces it only when
//! its `updated_at` is strictly later; ties keep the local row.

use catalog_core::Product;

/// Outcome of comparing a pulled product with the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local product with that barcode.
    Insert,
    /// Remote is newer; overwrite the local row with this id.
    Overwrite { local_id: i64 },
    /// Local is as new or newer.
    KeepLocal,
}

pub fn decide(local: Option<&Product>, remote: &Product) -> MergeDecision {
    match local {
        None => MergeDecision::Insert,
        Some(local) => match local.id {
            Some(local_id) if remote.updated_at > local.updated_at => {
                MergeDecision::Overwrite { local_id }
            }
            Some(_) => MergeDecision::KeepLocal,
            // Unsaved copies can't be targeted; treat as absent
            None => MergeDecision::Insert,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{timestamp, Money};

    fn product(id: Option<i64>, updated: &str) -> Product {
        let mut p = Product::new("Widget", Money::from_cents(1999), "B1");
        p.id = id;
        p.updated_at = timestamp::parse_utc(updated).unwrap();
        p
    }

    #[test]
    fn test_missing_local_inserts() {
        let remote = product(None, "2024-01-02T00:00:00Z");
        assert_eq!(decide(None, &remote), MergeDecision::Insert);
    }

    #[test]
    fn test_older_remote_keeps_local() {
        let local = product(Some(1), "2024-01-01T00:00:00Z");
        let remote = product(None, "2023-12-31T00:00:00Z");
        assert_eq!(decide(Some(&local), &remote), MergeDecision::KeepLocal);
    }

    #[test]
    fn test_equal_timestamps_keep_local() {
        let local = product(Some(1), "2024-01-01T00:00:00Z");
        let remote = product(None, "2024-01-01T00:00:00.000Z");
        assert_eq!(decide(Some(&local), &remote), MergeDecision::KeepLocal);
    }

    #[test]
    fn test_newer_remote_overwrites_across_offsets() {
        let local = product(Some(7), "2024-01-01T12:00:00Z");
        // 13:30 at +01:00 is 12:30 UTC
        let remote = product(None, "2024-01-01T13:30:00+01:00");
        assert_eq!(
            decide(Some(&local), &remote),
            MergeDecision::Overwrite { local_id: 7 }
        );
    }
}
