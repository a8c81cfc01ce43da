//! Stage-level aggregation of collected skew statistics.

use crate::ir::OperatorVertex;
use crate::transform::{OutputCollector, Transform};
use remora_common::element::{downcast_ref, element, DynPair, Element};
use remora_common::error::{IrError, Result};
use std::collections::BTreeMap;

/// Combines `(partition key, byte count)` pairs from every collector into a
/// destination-wide histogram. Runs at parallelism 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateMetricTransform;

/// Mutable per-task state of [`AggregateMetricTransform`].
#[derive(Debug, Default)]
pub struct AggregateMetricState {
    counts: BTreeMap<i32, i64>,
}

impl AggregateMetricState {
    pub fn counts(&self) -> &BTreeMap<i32, i64> {
        &self.counts
    }
}

impl AggregateMetricTransform {
    pub fn new_state(&self) -> AggregateMetricState {
        AggregateMetricState::default()
    }

    /// Folds one `(partition key, byte count)` pair into the histogram:
    /// existing keys accumulate, new keys are inserted.
    pub fn on_element(&self, state: &mut AggregateMetricState, element: &Element) -> Result<()> {
        let pair = downcast_ref::<DynPair>(element)
            .ok_or_else(|| IrError::coding("aggregation input is not a pair"))?;
        let key = *downcast_ref::<i32>(&pair.left)
            .ok_or_else(|| IrError::coding("aggregation key is not an i32"))?;
        let count = *downcast_ref::<i64>(&pair.right)
            .ok_or_else(|| IrError::coding("aggregation count is not an i64"))?;

        state
            .counts
            .entry(key)
            .and_modify(|c| *c += count)
            .or_insert(count);
        Ok(())
    }

    /// Emits the final histogram as a single element.
    pub fn close(&self, state: AggregateMetricState, collector: &mut dyn OutputCollector) {
        collector.emit(element(state.counts));
    }
}

/// Produces the aggregation operator vertex with a fresh id.
pub fn metric_aggregation_vertex() -> OperatorVertex {
    OperatorVertex::new(Transform::AggregateMetric(AggregateMetricTransform))
}
