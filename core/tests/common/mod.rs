//! Shared fixtures for the pass integration tests.

#![allow(dead_code)]

use remora_common::codec::{I32DecoderFactory, I32EncoderFactory};
use remora_common::element::{downcast_ref, Element};
use remora_common::key::KeyExtractor;
use remora_core::dag::{Dag, DagBuilder};
use remora_core::ir::{
    CommunicationPattern, DataStore, EdgeProperty, IrEdge, IrVertex, OperatorVertex, SourceReader,
    SourceVertex, VertexProperty,
};
use remora_core::pass::{SamplingConfig, SamplingSkewReshapingPass};
use remora_core::transform::Transform;
use std::sync::Arc;

/// A source of `splits` integer partitions.
#[derive(Debug, Clone)]
pub struct RangeReader {
    pub splits: usize,
}

/// A [`RangeReader`] restricted to a subset of its splits.
#[derive(Debug, Clone)]
pub struct SampledRangeReader {
    pub indices: Vec<usize>,
    pub original_parallelism: usize,
}

impl SourceReader for RangeReader {
    fn sampled(&self, indices: &[usize], original_parallelism: usize) -> Box<dyn SourceReader> {
        Box::new(SampledRangeReader {
            indices: indices.to_vec(),
            original_parallelism,
        })
    }
}

impl SourceReader for SampledRangeReader {
    fn sampled(&self, indices: &[usize], original_parallelism: usize) -> Box<dyn SourceReader> {
        Box::new(SampledRangeReader {
            indices: indices.to_vec(),
            original_parallelism,
        })
    }
}

/// Treats the element itself as the key; hashes i32 elements by value.
#[derive(Debug)]
pub struct IdentityExtractor;

impl KeyExtractor for IdentityExtractor {
    fn extract_key(&self, element: &Element) -> Element {
        element.clone()
    }

    fn key_hash(&self, key: &Element) -> u64 {
        *downcast_ref::<i32>(key).unwrap_or(&0) as u64
    }
}

pub fn source(id: &str, parallelism: usize) -> IrVertex {
    let mut vertex = SourceVertex::with_id(id, Box::new(RangeReader { splits: parallelism }));
    vertex
        .properties_mut()
        .set(VertexProperty::Parallelism(parallelism))
        .expect("set parallelism");
    IrVertex::Source(vertex)
}

pub fn source_without_parallelism(id: &str, splits: usize) -> IrVertex {
    IrVertex::Source(SourceVertex::with_id(id, Box::new(RangeReader { splits })))
}

pub fn operator(id: &str, parallelism: usize) -> IrVertex {
    let mut vertex = OperatorVertex::with_id(
        id,
        Transform::Custom {
            name: id.to_string(),
        },
    );
    vertex
        .properties_mut()
        .set(VertexProperty::Parallelism(parallelism))
        .expect("set parallelism");
    IrVertex::Operator(vertex)
}

/// A keyed shuffle edge with the extractor and codecs the pass requires.
pub fn shuffle_edge(src: &str, dst: &str) -> IrEdge {
    let mut edge = IrEdge::new(CommunicationPattern::Shuffle, src, dst);
    edge.properties_mut()
        .set(EdgeProperty::KeyExtractor(Arc::new(IdentityExtractor)))
        .expect("set extractor");
    edge.properties_mut()
        .set(EdgeProperty::Encoder(Arc::new(I32EncoderFactory)))
        .expect("set encoder");
    edge.properties_mut()
        .set(EdgeProperty::Decoder(Arc::new(I32DecoderFactory)))
        .expect("set decoder");
    edge
}

pub fn one_to_one_edge(src: &str, dst: &str, store: DataStore) -> IrEdge {
    let mut edge = IrEdge::new(CommunicationPattern::OneToOne, src, dst);
    edge.properties_mut()
        .set(EdgeProperty::DataStore(store))
        .expect("set store");
    edge
}

pub fn broadcast_edge(src: &str, dst: &str) -> IrEdge {
    IrEdge::new(CommunicationPattern::BroadCast, src, dst)
}

pub fn build_dag(vertices: Vec<IrVertex>, edges: Vec<IrEdge>) -> Dag {
    let mut builder = DagBuilder::new();
    for vertex in vertices {
        builder.add_vertex(vertex);
    }
    for edge in edges {
        builder.connect_vertices(edge);
    }
    builder.build().expect("input DAG builds")
}

pub fn seeded_pass(sample_rate: f64, seed: u64) -> SamplingSkewReshapingPass {
    SamplingSkewReshapingPass::new(SamplingConfig {
        sample_rate,
        hash_range_multiplier: 10,
        rng_seed: Some(seed),
    })
    .expect("valid config")
}

// --- output inspection helpers ---

pub fn parallelism_of(op: &OperatorVertex) -> Option<usize> {
    match op
        .properties()
        .get(remora_core::ir::VertexPropertyKind::Parallelism)
    {
        Some(VertexProperty::Parallelism(p)) => Some(*p),
        _ => None,
    }
}

pub fn metric_collectors(dag: &Dag) -> Vec<&OperatorVertex> {
    operators_matching(dag, |t| matches!(t, Transform::MetricCollect(_)))
}

pub fn aggregators(dag: &Dag) -> Vec<&OperatorVertex> {
    operators_matching(dag, |t| matches!(t, Transform::AggregateMetric(_)))
}

pub fn dummies(dag: &Dag) -> Vec<&OperatorVertex> {
    operators_matching(dag, |t| matches!(t, Transform::Empty))
}

fn operators_matching<'a>(
    dag: &'a Dag,
    pred: impl Fn(&Transform) -> bool,
) -> Vec<&'a OperatorVertex> {
    dag.vertices()
        .filter_map(|v| v.as_operator())
        .filter(|op| pred(op.transform()))
        .collect()
}

/// Operator clones created by the mirror step: same custom transform name,
/// different id.
pub fn mirrored_operators<'a>(dag: &'a Dag, name: &str) -> Vec<&'a OperatorVertex> {
    dag.vertices()
        .filter_map(|v| v.as_operator())
        .filter(|op| {
            matches!(op.transform(), Transform::Custom { name: n } if n == name) && op.id() != name
        })
        .collect()
}

pub fn sampled_sources(dag: &Dag) -> Vec<&IrVertex> {
    dag.vertices()
        .filter(|v| matches!(v, IrVertex::Source(_)))
        .filter(|v| v.id().starts_with("vertex-"))
        .collect()
}

pub fn edges_between<'a>(dag: &'a Dag, src: &str, dst: &str) -> Vec<&'a IrEdge> {
    dag.edges()
        .filter(|e| e.src() == src && e.dst() == dst)
        .collect()
}

pub fn single_edge_between<'a>(dag: &'a Dag, src: &str, dst: &str) -> &'a IrEdge {
    let edges = edges_between(dag, src, dst);
    assert_eq!(
        edges.len(),
        1,
        "expected exactly one edge {} -> {}, found {}",
        src,
        dst,
        edges.len()
    );
    edges[0]
}
