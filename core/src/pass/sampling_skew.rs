//! The sampling skew-reshaping pass.
//!
//! For every operator vertex fed by a shuffle on its main input, this pass
//! synthesises a reduced-parallelism mirror of the upstream region, inserts a
//! [`MetricCollectTransform`] vertex per shuffle edge and one
//! [`AggregateMetricTransform`] vertex per destination, and wires a control
//! edge so the original region waits until the aggregated key-size statistic
//! is committed. The rewritten shuffle edge and its statistic edge share a
//! metric collection id that the runtime uses to drive skew-aware
//! repartitioning.
//!
//! [`MetricCollectTransform`]: crate::transform::MetricCollectTransform
//! [`AggregateMetricTransform`]: crate::transform::AggregateMetricTransform

use crate::dag::{Dag, DagBuilder};
use crate::ir::{
    CommunicationPattern, DataFlow, DataPersistence, DataStore, EdgeProperty, EdgePropertyKind,
    IrEdge, IrVertex, OperatorVertex, ShuffleDistribution, VertexProperty,
};
use crate::pass::CompileTimePass;
use crate::transform::{metric_aggregation_vertex, metric_collect_vertex, Transform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use remora_common::codec::{
    I32DecoderFactory, I32EncoderFactory, I64DecoderFactory, I64EncoderFactory,
    PairDecoderFactory, PairEncoderFactory,
};
use remora_common::error::{IrError, Result};
use remora_common::range::KeyRange;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Default fraction of source tasks mirrored for sampling.
pub const DEFAULT_SAMPLE_RATE: f64 = 0.1;

/// Default multiplier applied to the destination parallelism to form the
/// statistic bucket space.
pub const DEFAULT_HASH_RANGE_MULTIPLIER: usize = 10;

/// Side-output tag carried by every statistic edge.
pub const DYN_OPT_DATA_TAG: &str = "DynOptData";

const SAMPLING_GROUP_PREFIX: &str = "Sampling-";

/// Options of the sampling policy.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Fraction of source tasks to sample, in `(0, 1]`.
    pub sample_rate: f64,
    /// Positive multiplier producing the statistic hash range.
    pub hash_range_multiplier: usize,
    /// Fixes the task-index shuffle for reproducible output. When absent the
    /// indices are drawn from entropy, which is only suitable for demos.
    pub rng_seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            hash_range_multiplier: DEFAULT_HASH_RANGE_MULTIPLIER,
            rng_seed: None,
        }
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<()> {
        if !(self.sample_rate > 0.0 && self.sample_rate <= 1.0) {
            return Err(IrError::InvalidConfiguration {
                message: format!("sample_rate must be in (0, 1], got {}", self.sample_rate),
            });
        }
        if self.hash_range_multiplier == 0 {
            return Err(IrError::InvalidConfiguration {
                message: "hash_range_multiplier must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Reshapes the IR DAG for skew handling; see the module docs.
#[derive(Debug, Clone)]
pub struct SamplingSkewReshapingPass {
    config: SamplingConfig,
}

impl SamplingSkewReshapingPass {
    pub fn new(config: SamplingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: SamplingConfig::default(),
        }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }
}

impl CompileTimePass for SamplingSkewReshapingPass {
    fn name(&self) -> &'static str {
        "SamplingSkewReshaping"
    }

    fn prerequisites(&self) -> Vec<EdgePropertyKind> {
        vec![EdgePropertyKind::CommunicationPattern]
    }

    fn annotates(&self) -> Vec<EdgePropertyKind> {
        vec![EdgePropertyKind::MetricCollection]
    }

    fn apply(&self, dag: &Dag) -> Result<Dag> {
        let mut reshaper = Reshaper {
            config: &self.config,
            dag,
            builder: DagBuilder::new(),
            rng: match self.config.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            metric_collection_count: 0,
            duplicate_group_count: 0,
            fixtures: HashMap::new(),
            assigned_groups: HashMap::new(),
        };

        for vertex in dag.topological_order() {
            reshaper.builder.add_vertex(vertex.clone());
            if reshaper.is_candidate(vertex)? {
                for edge in dag.incoming_edges_of(vertex.id()) {
                    if edge.require_comm_pattern()? == CommunicationPattern::Shuffle {
                        reshaper.rewrite_shuffle_edge(vertex, edge)?;
                    } else {
                        reshaper.builder.connect_vertices(edge.clone());
                    }
                }
            } else {
                for edge in dag.incoming_edges_of(vertex.id()) {
                    reshaper.builder.connect_vertices(edge.clone());
                }
            }
        }
        reshaper.builder.build()
    }
}

/// The aggregation vertices shared by every shuffle edge entering one
/// destination.
#[derive(Debug, Clone)]
struct AggregationFixture {
    aggregator_id: String,
    dummy_id: String,
    metric_collection_id: i32,
}

/// Working state of a single pass invocation.
struct Reshaper<'a> {
    config: &'a SamplingConfig,
    dag: &'a Dag,
    builder: DagBuilder,
    rng: StdRng,
    metric_collection_count: i32,
    duplicate_group_count: u64,
    /// Aggregation fixtures keyed by destination vertex id.
    fixtures: HashMap<String, AggregationFixture>,
    /// Duplicate-group ids assigned to input edges during this invocation,
    /// keyed by the input edge's id.
    assigned_groups: HashMap<String, String>,
}

impl<'a> Reshaper<'a> {
    /// A vertex is rewritten iff it is an operator, at least one incoming
    /// edge is a shuffle, and no incoming edge targets a side output.
    fn is_candidate(&self, vertex: &IrVertex) -> Result<bool> {
        if vertex.as_operator().is_none() {
            return Ok(false);
        }
        let mut has_shuffle = false;
        for edge in self.dag.incoming_edges_of(vertex.id()) {
            if edge.additional_output_tag().is_some() {
                return Ok(false);
            }
            if edge.require_comm_pattern()? == CommunicationPattern::Shuffle {
                has_shuffle = true;
            }
        }
        Ok(has_shuffle)
    }

    fn rewrite_shuffle_edge(&mut self, dst: &IrVertex, edge: &'a IrEdge) -> Result<()> {
        let dag = self.dag;
        let src = dag.vertex(edge.src()).ok_or_else(|| IrError::UnknownEndpoint {
            edge: edge.id().to_string(),
            vertex: edge.src().to_string(),
        })?;
        let original_parallelism = src.require_parallelism()?;
        let dst_parallelism = dst.require_parallelism()?;
        let sampled_parallelism =
            ((original_parallelism as f64 * self.config.sample_rate).round() as usize).max(1);

        let mut indices: Vec<usize> = (0..original_parallelism).collect();
        indices.shuffle(&mut self.rng);
        indices.truncate(sampled_parallelism);
        info!(
            source = edge.src(),
            ?indices,
            "sampling shuffle source at reduced parallelism"
        );

        let (last_sampled, start) =
            self.append_sampled_dag(edge.src(), &indices, original_parallelism)?;

        let fixture = self.fixture_for(dst.id())?;

        // Control-only edge: the original region must not run before the
        // aggregated statistic for this destination is committed.
        self.builder.connect_vertices(IrEdge::new(
            CommunicationPattern::BroadCast,
            fixture.dummy_id.clone(),
            start,
        ));

        let mut mcv = metric_collect_vertex(
            edge,
            &fixture.aggregator_id,
            dst_parallelism,
            self.config.hash_range_multiplier,
        )?;
        mcv.properties_mut()
            .set_permanent(VertexProperty::Parallelism(sampled_parallelism))?;
        let mcv_id = mcv.id().to_string();
        self.builder.add_vertex(IrVertex::Operator(mcv));

        let encoder = edge.encoder().ok_or_else(|| {
            IrError::missing_property(edge.id(), EdgePropertyKind::Encoder.to_string())
        })?;
        let decoder = edge.decoder().ok_or_else(|| {
            IrError::missing_property(edge.id(), EdgePropertyKind::Decoder.to_string())
        })?;
        let key_extractor = edge.key_extractor().ok_or_else(|| {
            IrError::missing_property(edge.id(), EdgePropertyKind::KeyExtractor.to_string())
        })?;

        // Sampled region output feeds the collector element-for-element,
        // using the original edge's codecs.
        let mut to_mcv = IrEdge::new(CommunicationPattern::OneToOne, last_sampled, mcv_id.clone());
        to_mcv
            .properties_mut()
            .set(EdgeProperty::Encoder(encoder.clone()))?;
        to_mcv.properties_mut().set(EdgeProperty::Decoder(decoder))?;
        self.builder.connect_vertices(to_mcv);

        // Statistic edge to the aggregator. The pair codec matches the
        // integer partition key the collector emits.
        let mut to_abv = IrEdge::new(
            CommunicationPattern::Shuffle,
            mcv_id,
            fixture.aggregator_id.clone(),
        );
        to_abv
            .properties_mut()
            .set_permanent(EdgeProperty::DataStore(DataStore::SerializedMemory))?;
        to_abv
            .properties_mut()
            .set_permanent(EdgeProperty::DataPersistence(DataPersistence::Discard))?;
        to_abv
            .properties_mut()
            .set_permanent(EdgeProperty::DataFlow(DataFlow::Push))?;
        to_abv
            .properties_mut()
            .set(EdgeProperty::KeyExtractor(key_extractor))?;
        to_abv
            .properties_mut()
            .set(EdgeProperty::AdditionalOutputTag(DYN_OPT_DATA_TAG.to_string()))?;
        to_abv
            .properties_mut()
            .set(EdgeProperty::Encoder(Arc::new(PairEncoderFactory::of(
                Arc::new(I32EncoderFactory),
                Arc::new(I64EncoderFactory),
            ))))?;
        to_abv
            .properties_mut()
            .set(EdgeProperty::Decoder(Arc::new(PairDecoderFactory::of(
                Arc::new(I32DecoderFactory),
                Arc::new(I64DecoderFactory),
            ))))?;
        to_abv
            .properties_mut()
            .set_permanent(EdgeProperty::MetricCollection(fixture.metric_collection_id))?;
        self.builder.connect_vertices(to_abv);

        // Replacement for the original shuffle edge, annotated with the id
        // the runtime uses to look up the statistic. The codec the statistic
        // was computed against is pinned.
        let mut replacement = IrEdge::new(
            edge.require_comm_pattern()?,
            edge.src().to_string(),
            dst.id().to_string(),
        );
        edge.copy_execution_properties_to(&mut replacement)?;
        replacement
            .properties_mut()
            .set_permanent(EdgeProperty::Encoder(encoder))?;
        replacement
            .properties_mut()
            .set_permanent(EdgeProperty::MetricCollection(fixture.metric_collection_id))?;
        self.builder.connect_vertices(replacement);
        Ok(())
    }

    /// Mirrors `vertex_id` (and, where required, its upstream region) at the
    /// sampled parallelism. Returns the sampled analogue of the vertex and
    /// the original entry vertex the control edge must target.
    fn append_sampled_dag(
        &mut self,
        vertex_id: &str,
        indices: &[usize],
        original_parallelism: usize,
    ) -> Result<(String, String)> {
        let dag = self.dag;
        let vertex = dag.vertex(vertex_id).ok_or_else(|| IrError::UnknownEndpoint {
            edge: "<sampling>".to_string(),
            vertex: vertex_id.to_string(),
        })?;
        let sampled_parallelism = indices.len();

        let mut sampled = match vertex {
            IrVertex::Source(source) => {
                IrVertex::Source(source.sampled_clone(indices, original_parallelism))
            }
            IrVertex::Operator(operator) => IrVertex::Operator(operator.fresh_clone()),
        };
        vertex.copy_execution_properties_to(&mut sampled)?;
        sampled
            .properties_mut()
            .set_permanent(VertexProperty::Parallelism(sampled_parallelism))?;
        let sampled_id = sampled.id().to_string();
        debug!(original = vertex_id, sampled = %sampled_id, "mirrored vertex");
        self.builder.add_vertex(sampled);

        let incoming = dag.incoming_edges_of(vertex_id);
        let mut start: Option<String> = None;

        for ein in &incoming {
            match ein.require_comm_pattern()? {
                CommunicationPattern::Shuffle => {
                    let group = self.duplicate_group_for(ein, "")?;
                    let mut mirror =
                        IrEdge::new(CommunicationPattern::Shuffle, ein.src().to_string(), sampled_id.clone());
                    ein.copy_execution_properties_to(&mut mirror)?;
                    mirror
                        .properties_mut()
                        .set_permanent(EdgeProperty::DuplicateEdgeGroup(group))?;

                    // Each sampled task reads exactly one original partition.
                    let mut ranges = BTreeMap::new();
                    for (task, &index) in indices.iter().enumerate() {
                        ranges.insert(task, KeyRange::single(index));
                    }
                    debug!(edge = ein.id(), ?ranges, "shuffle read window");
                    mirror.properties_mut().set_permanent(
                        EdgeProperty::ShuffleDistribution(ShuffleDistribution {
                            original_parallelism,
                            ranges,
                        }),
                    )?;
                    self.builder.connect_vertices(mirror);
                }
                CommunicationPattern::BroadCast => {
                    let group = self.duplicate_group_for(ein, "")?;
                    let mut mirror =
                        IrEdge::new(CommunicationPattern::BroadCast, ein.src().to_string(), sampled_id.clone());
                    ein.copy_execution_properties_to(&mut mirror)?;
                    mirror
                        .properties_mut()
                        .set_permanent(EdgeProperty::DuplicateEdgeGroup(group))?;
                    self.builder.connect_vertices(mirror);
                }
                CommunicationPattern::OneToOne => {
                    let store = ein.data_store().ok_or_else(|| {
                        IrError::missing_property(ein.id(), EdgePropertyKind::DataStore.to_string())
                    })?;
                    if store == DataStore::Memory && incoming.len() == 1 {
                        // An in-memory producer cannot be replayed from a
                        // shared store, so the mirror extends upstream.
                        let (last_sampled, upstream_start) =
                            self.append_sampled_dag(ein.src(), indices, original_parallelism)?;
                        start = Some(upstream_start);

                        let mut mirror = IrEdge::new(
                            CommunicationPattern::OneToOne,
                            last_sampled,
                            sampled_id.clone(),
                        );
                        ein.copy_execution_properties_to(&mut mirror)?;
                        self.builder.connect_vertices(mirror);
                    } else {
                        let group = self.duplicate_group_for(ein, SAMPLING_GROUP_PREFIX)?;
                        let mut mirror = IrEdge::new(
                            CommunicationPattern::OneToOne,
                            ein.src().to_string(),
                            sampled_id.clone(),
                        );
                        ein.copy_execution_properties_to(&mut mirror)?;
                        mirror
                            .properties_mut()
                            .set_permanent(EdgeProperty::DuplicateEdgeGroup(group))?;

                        // Each sampled task reads its chosen upstream partition.
                        let distribution: BTreeMap<usize, usize> =
                            indices.iter().copied().enumerate().collect();
                        debug!(edge = ein.id(), ?distribution, "one-to-one read mapping");
                        mirror
                            .properties_mut()
                            .set_permanent(EdgeProperty::OneToOneDistribution(distribution))?;
                        self.builder.connect_vertices(mirror);
                    }
                }
            }
        }

        Ok((sampled_id, start.unwrap_or_else(|| vertex_id.to_string())))
    }

    /// Returns the aggregation fixture of a destination, creating it on first
    /// use. All shuffle edges entering the same destination share one
    /// aggregator and one metric collection id.
    fn fixture_for(&mut self, dst_id: &str) -> Result<AggregationFixture> {
        if let Some(fixture) = self.fixtures.get(dst_id) {
            return Ok(fixture.clone());
        }

        let mut aggregator = metric_aggregation_vertex();
        aggregator
            .properties_mut()
            .set_permanent(VertexProperty::Parallelism(1))?;

        self.metric_collection_count += 1;
        let metric_collection_id = self.metric_collection_count;

        let mut dummy = OperatorVertex::new(Transform::Empty);
        dummy
            .properties_mut()
            .set_permanent(VertexProperty::Parallelism(1))?;
        aggregator.properties().copy_to(dummy.properties_mut())?;

        aggregator
            .properties_mut()
            .set_permanent(VertexProperty::ResourceSlot(false))?;
        dummy
            .properties_mut()
            .set_permanent(VertexProperty::ResourceSlot(false))?;

        let aggregator_id = aggregator.id().to_string();
        let dummy_id = dummy.id().to_string();
        self.builder.add_vertex(IrVertex::Operator(aggregator));
        self.builder.add_vertex(IrVertex::Operator(dummy));
        self.builder.connect_vertices(IrEdge::new(
            CommunicationPattern::OneToOne,
            aggregator_id.clone(),
            dummy_id.clone(),
        ));

        let fixture = AggregationFixture {
            aggregator_id,
            dummy_id,
            metric_collection_id,
        };
        self.fixtures.insert(dst_id.to_string(), fixture.clone());
        Ok(fixture)
    }

    /// The duplicate-group id of an input edge, assigning and stamping a
    /// fresh one if the edge has none. The stamp lands on the copy of the
    /// edge already accumulated in the builder, so the runtime can share
    /// bytes between the original read and the sampled read.
    fn duplicate_group_for(&mut self, ein: &IrEdge, prefix: &str) -> Result<String> {
        if let Some(group) = ein.duplicate_edge_group() {
            return Ok(group.to_string());
        }
        if let Some(group) = self.assigned_groups.get(ein.id()) {
            return Ok(group.clone());
        }

        let group = format!("{}{}", prefix, self.duplicate_group_count);
        self.duplicate_group_count += 1;
        self.assigned_groups
            .insert(ein.id().to_string(), group.clone());
        if let Some(copy) = self.builder.edge_mut(ein.id()) {
            copy.properties_mut()
                .set_permanent(EdgeProperty::DuplicateEdgeGroup(group.clone()))?;
        }
        Ok(group)
    }
}
