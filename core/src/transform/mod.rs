//! Operator transforms.
//!
//! Transforms are named variants carrying their configuration as plain data;
//! the runtime dispatches on the variant tag. All mutable state is created
//! when a task starts, never at construction.

pub mod aggregate_metric;
pub mod metric_collect;

pub use aggregate_metric::{
    metric_aggregation_vertex, AggregateMetricState, AggregateMetricTransform,
};
pub use metric_collect::{metric_collect_vertex, MetricCollectState, MetricCollectTransform};

use remora_common::element::Element;

/// The transform applied by an operator vertex.
#[derive(Debug, Clone)]
pub enum Transform {
    /// Forwards nothing; used for control-only barrier vertices.
    Empty,
    /// Collects per-task serialised-size statistics bucketed by hashed key.
    MetricCollect(MetricCollectTransform),
    /// Aggregates bucket statistics from all collectors of a destination.
    AggregateMetric(AggregateMetricTransform),
    /// A user-defined transform the compiler treats as a black box.
    Custom { name: String },
}

/// Receives the elements a transform emits.
pub trait OutputCollector {
    /// Emits to the main output.
    fn emit(&mut self, element: Element);

    /// Emits to the additional output routed to the given vertex.
    fn emit_to(&mut self, dst_vertex_id: &str, element: Element);
}

/// An [`OutputCollector`] that buffers everything it receives.
#[derive(Default)]
pub struct VecCollector {
    pub main: Vec<Element>,
    pub tagged: Vec<(String, Element)>,
}

impl OutputCollector for VecCollector {
    fn emit(&mut self, element: Element) {
        self.main.push(element);
    }

    fn emit_to(&mut self, dst_vertex_id: &str, element: Element) {
        self.tagged.push((dst_vertex_id.to_string(), element));
    }
}
