//! Task-level collection of key-size statistics for skew handling.

use crate::ir::{EdgePropertyKind, IrEdge, OperatorVertex};
use crate::transform::{OutputCollector, Transform};
use remora_common::codec::EncoderFactory;
use remora_common::element::{element, Element, Pair};
use remora_common::error::{IrError, Result};
use remora_common::key::KeyExtractor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Buckets incoming elements by hashed key, and on close reports the actual
/// serialised byte size of every bucket to the aggregation vertex.
///
/// The byte size, not the element count, is the statistic: the downstream
/// repartitioning decision weighs partitions by the data volume they move.
#[derive(Debug, Clone)]
pub struct MetricCollectTransform {
    aggregator_id: String,
    hash_range: usize,
    key_extractor: Arc<dyn KeyExtractor>,
    encoder: Arc<dyn EncoderFactory>,
}

/// Mutable per-task state of [`MetricCollectTransform`].
#[derive(Debug, Default)]
pub struct MetricCollectState {
    buckets: BTreeMap<i32, Vec<Element>>,
}

impl MetricCollectTransform {
    /// Configures a collector for the given shuffle edge. The key extractor
    /// and encoder are taken from the edge; the hash range is the destination
    /// parallelism scaled by `hash_range_multiplier`.
    pub fn from_edge(
        edge: &IrEdge,
        aggregator_id: impl Into<String>,
        dst_parallelism: usize,
        hash_range_multiplier: usize,
    ) -> Result<Self> {
        let key_extractor = edge.key_extractor().ok_or_else(|| {
            IrError::missing_property(edge.id(), EdgePropertyKind::KeyExtractor.to_string())
        })?;
        let encoder = edge.encoder().ok_or_else(|| {
            IrError::missing_property(edge.id(), EdgePropertyKind::Encoder.to_string())
        })?;
        Ok(Self {
            aggregator_id: aggregator_id.into(),
            hash_range: dst_parallelism * hash_range_multiplier,
            key_extractor,
            encoder,
        })
    }

    pub fn aggregator_id(&self) -> &str {
        &self.aggregator_id
    }

    pub fn hash_range(&self) -> usize {
        self.hash_range
    }

    pub fn new_state(&self) -> MetricCollectState {
        MetricCollectState::default()
    }

    /// Appends the element to the bucket of its hashed key.
    pub fn on_element(&self, state: &mut MetricCollectState, element: Element) {
        let key = self.key_extractor.extract_key(&element);
        let partition_key = (self.key_extractor.key_hash(&key) % self.hash_range as u64) as i32;
        state
            .buckets
            .entry(partition_key)
            .or_default()
            .push(element);
    }

    /// Serialises each bucket with the edge's encoder and emits one
    /// `(partition key, byte size)` pair per bucket, routed to the
    /// aggregation vertex.
    pub fn close(
        &self,
        state: MetricCollectState,
        collector: &mut dyn OutputCollector,
    ) -> Result<()> {
        for (partition_key, bucket) in state.buckets {
            let mut scratch = Vec::new();
            let mut encoder = self.encoder.create(&mut scratch);
            for item in &bucket {
                encoder.encode(item)?;
            }
            drop(encoder);

            let size = scratch.len() as i64;
            collector.emit_to(
                &self.aggregator_id,
                element(Pair::of(element(partition_key), element(size))),
            );
        }
        Ok(())
    }
}

/// Produces a collector operator vertex for the given shuffle edge, wired to
/// report to `aggregator_id`.
pub fn metric_collect_vertex(
    edge: &IrEdge,
    aggregator_id: &str,
    dst_parallelism: usize,
    hash_range_multiplier: usize,
) -> Result<OperatorVertex> {
    let transform =
        MetricCollectTransform::from_edge(edge, aggregator_id, dst_parallelism, hash_range_multiplier)?;
    Ok(OperatorVertex::new(Transform::MetricCollect(transform)))
}
