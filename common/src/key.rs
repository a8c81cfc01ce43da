//! Key extraction contract for keyed communication.

use crate::element::Element;
use std::fmt;

/// Derives the grouping key of an element on a keyed edge.
///
/// `key_hash` must be stable across processes and runs; the skew statistics
/// collected from a sampled execution are only meaningful if the real
/// execution buckets keys the same way.
pub trait KeyExtractor: fmt::Debug + Send + Sync {
    fn extract_key(&self, element: &Element) -> Element;

    fn key_hash(&self, key: &Element) -> u64;
}
