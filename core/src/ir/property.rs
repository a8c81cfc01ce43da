//! Execution properties attached to IR vertices and edges.
//!
//! Properties are typed variants with closed value domains. Each vertex and
//! edge carries a [`PropertyMap`] keyed by property kind; a property may be
//! set *permanently*, after which a plain set is ignored and a conflicting
//! permanent set fails.

use remora_common::codec::{DecoderFactory, EncoderFactory};
use remora_common::error::{IrError, Result};
use remora_common::key::KeyExtractor;
use remora_common::range::KeyRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

/// How elements travel over an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommunicationPattern {
    OneToOne,
    BroadCast,
    Shuffle,
}

impl FromStr for CommunicationPattern {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OneToOne" => Ok(Self::OneToOne),
            "BroadCast" => Ok(Self::BroadCast),
            "Shuffle" => Ok(Self::Shuffle),
            other => Err(IrError::UnsupportedCommunicationPattern {
                element: "<pattern literal>".to_string(),
                pattern: other.to_string(),
            }),
        }
    }
}

/// Where an edge's intermediate data is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataStore {
    Memory,
    SerializedMemory,
    LocalFile,
    RemoteFile,
}

/// Whether intermediate data is retained after consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataPersistence {
    Keep,
    Discard,
}

/// Transport direction of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFlow {
    Push,
    Pull,
}

/// Partition read window for a sampled shuffle edge: each sampled task index
/// maps to the range of original partitions it reads, out of
/// `original_parallelism`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleDistribution {
    pub original_parallelism: usize,
    pub ranges: BTreeMap<usize, KeyRange>,
}

impl ShuffleDistribution {
    fn validate(&self) -> std::result::Result<(), String> {
        for (task, range) in &self.ranges {
            if range.is_empty() {
                return Err(format!("empty range {} for task {}", range, task));
            }
            if range.end() > self.original_parallelism {
                return Err(format!(
                    "range {} for task {} exceeds original parallelism {}",
                    range, task, self.original_parallelism
                ));
            }
        }
        Ok(())
    }
}

/// Execution properties a vertex may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexProperty {
    /// Task fan-out of the vertex. Must be positive.
    Parallelism(usize),
    /// Whether the vertex occupies a normal executor slot.
    ResourceSlot(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexPropertyKind {
    Parallelism,
    ResourceSlot,
}

impl fmt::Display for VertexPropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Property for VertexProperty {
    type Kind = VertexPropertyKind;

    fn kind(&self) -> VertexPropertyKind {
        match self {
            VertexProperty::Parallelism(_) => VertexPropertyKind::Parallelism,
            VertexProperty::ResourceSlot(_) => VertexPropertyKind::ResourceSlot,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            VertexProperty::Parallelism(0) => Err("parallelism must be positive".to_string()),
            _ => Ok(()),
        }
    }
}

/// Execution properties an edge may carry.
#[derive(Debug, Clone)]
pub enum EdgeProperty {
    CommunicationPattern(CommunicationPattern),
    DataStore(DataStore),
    DataPersistence(DataPersistence),
    DataFlow(DataFlow),
    KeyExtractor(Arc<dyn KeyExtractor>),
    Encoder(Arc<dyn EncoderFactory>),
    Decoder(Arc<dyn DecoderFactory>),
    KeyEncoder(Arc<dyn EncoderFactory>),
    KeyDecoder(Arc<dyn DecoderFactory>),
    /// Routes the edge to a named side output instead of the main input.
    AdditionalOutputTag(String),
    /// Pairs a rewritten shuffle edge with its statistic edge.
    MetricCollection(i32),
    ShuffleDistribution(ShuffleDistribution),
    /// Sampled task index -> original partition index to read.
    OneToOneDistribution(BTreeMap<usize, usize>),
    /// Edges in the same group read the same materialised bytes.
    DuplicateEdgeGroup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgePropertyKind {
    CommunicationPattern,
    DataStore,
    DataPersistence,
    DataFlow,
    KeyExtractor,
    Encoder,
    Decoder,
    KeyEncoder,
    KeyDecoder,
    AdditionalOutputTag,
    MetricCollection,
    ShuffleDistribution,
    OneToOneDistribution,
    DuplicateEdgeGroup,
}

impl fmt::Display for EdgePropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl PartialEq for EdgeProperty {
    fn eq(&self, other: &Self) -> bool {
        use EdgeProperty::*;
        match (self, other) {
            (CommunicationPattern(a), CommunicationPattern(b)) => a == b,
            (DataStore(a), DataStore(b)) => a == b,
            (DataPersistence(a), DataPersistence(b)) => a == b,
            (DataFlow(a), DataFlow(b)) => a == b,
            (KeyExtractor(a), KeyExtractor(b)) => same_instance(a, b),
            (Encoder(a), Encoder(b)) => same_instance(a, b),
            (Decoder(a), Decoder(b)) => same_instance(a, b),
            (KeyEncoder(a), KeyEncoder(b)) => same_instance(a, b),
            (KeyDecoder(a), KeyDecoder(b)) => same_instance(a, b),
            (AdditionalOutputTag(a), AdditionalOutputTag(b)) => a == b,
            (MetricCollection(a), MetricCollection(b)) => a == b,
            (ShuffleDistribution(a), ShuffleDistribution(b)) => a == b,
            (OneToOneDistribution(a), OneToOneDistribution(b)) => a == b,
            (DuplicateEdgeGroup(a), DuplicateEdgeGroup(b)) => a == b,
            _ => false,
        }
    }
}

impl Property for EdgeProperty {
    type Kind = EdgePropertyKind;

    fn kind(&self) -> EdgePropertyKind {
        match self {
            EdgeProperty::CommunicationPattern(_) => EdgePropertyKind::CommunicationPattern,
            EdgeProperty::DataStore(_) => EdgePropertyKind::DataStore,
            EdgeProperty::DataPersistence(_) => EdgePropertyKind::DataPersistence,
            EdgeProperty::DataFlow(_) => EdgePropertyKind::DataFlow,
            EdgeProperty::KeyExtractor(_) => EdgePropertyKind::KeyExtractor,
            EdgeProperty::Encoder(_) => EdgePropertyKind::Encoder,
            EdgeProperty::Decoder(_) => EdgePropertyKind::Decoder,
            EdgeProperty::KeyEncoder(_) => EdgePropertyKind::KeyEncoder,
            EdgeProperty::KeyDecoder(_) => EdgePropertyKind::KeyDecoder,
            EdgeProperty::AdditionalOutputTag(_) => EdgePropertyKind::AdditionalOutputTag,
            EdgeProperty::MetricCollection(_) => EdgePropertyKind::MetricCollection,
            EdgeProperty::ShuffleDistribution(_) => EdgePropertyKind::ShuffleDistribution,
            EdgeProperty::OneToOneDistribution(_) => EdgePropertyKind::OneToOneDistribution,
            EdgeProperty::DuplicateEdgeGroup(_) => EdgePropertyKind::DuplicateEdgeGroup,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            EdgeProperty::MetricCollection(id) if *id < 1 => {
                Err(format!("metric collection id must be >= 1, got {}", id))
            }
            EdgeProperty::ShuffleDistribution(dist) => dist.validate(),
            _ => Ok(()),
        }
    }
}

/// A strongly typed execution property.
pub trait Property: Clone + fmt::Debug + PartialEq {
    type Kind: Copy + Ord + Hash + fmt::Display;

    fn kind(&self) -> Self::Kind;

    /// Checks the value against the kind's closed domain.
    fn validate(&self) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, PartialEq)]
struct Entry<P> {
    value: P,
    permanent: bool,
}

/// Property bag of one vertex or edge. Remembers the owning element's id so
/// failures can name it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap<P: Property> {
    owner: String,
    entries: BTreeMap<P::Kind, Entry<P>>,
}

impl<P: Property> PropertyMap<P> {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: P::Kind) -> Option<&P> {
        self.entries.get(&kind).map(|e| &e.value)
    }

    pub fn contains(&self, kind: P::Kind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn is_permanent(&self, kind: P::Kind) -> bool {
        self.entries.get(&kind).is_some_and(|e| e.permanent)
    }

    /// Sets a property. A permanent entry of the same kind wins silently; the
    /// value must lie inside the kind's domain.
    pub fn set(&mut self, value: P) -> Result<()> {
        self.check_domain(&value)?;
        let kind = value.kind();
        match self.entries.get(&kind) {
            Some(entry) if entry.permanent => Ok(()),
            _ => {
                self.entries.insert(
                    kind,
                    Entry {
                        value,
                        permanent: false,
                    },
                );
                Ok(())
            }
        }
    }

    /// Sets a property permanently. Re-setting the same value is idempotent;
    /// a different value fails with `PermanentConflict`.
    pub fn set_permanent(&mut self, value: P) -> Result<()> {
        self.check_domain(&value)?;
        let kind = value.kind();
        if let Some(entry) = self.entries.get(&kind) {
            if entry.permanent && entry.value != value {
                return Err(IrError::PermanentConflict {
                    element: self.owner.clone(),
                    kind: kind.to_string(),
                });
            }
        }
        self.entries.insert(
            kind,
            Entry {
                value,
                permanent: true,
            },
        );
        Ok(())
    }

    /// Copies every property into `other`, preserving permanent markers.
    pub fn copy_to(&self, other: &mut PropertyMap<P>) -> Result<()> {
        for entry in self.entries.values() {
            if entry.permanent {
                other.set_permanent(entry.value.clone())?;
            } else {
                other.set(entry.value.clone())?;
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.entries.values().map(|e| &e.value)
    }

    fn check_domain(&self, value: &P) -> Result<()> {
        value
            .validate()
            .map_err(|reason| IrError::InvalidPropertyValue {
                element: self.owner.clone(),
                kind: value.kind().to_string(),
                reason,
            })
    }

    /// Constructor-only insertion path for values that are valid by type.
    pub(crate) fn insert_unchecked(&mut self, value: P) {
        self.entries.insert(
            value.kind(),
            Entry {
                value,
                permanent: false,
            },
        );
    }
}

pub type VertexPropertyMap = PropertyMap<VertexProperty>;
pub type EdgePropertyMap = PropertyMap<EdgeProperty>;
