//! IR edges connecting vertices, with their execution properties.

use crate::ids::fresh_edge_id;
use crate::ir::property::{
    CommunicationPattern, DataStore, EdgeProperty, EdgePropertyKind, EdgePropertyMap,
    ShuffleDistribution,
};
use remora_common::codec::{DecoderFactory, EncoderFactory};
use remora_common::error::{IrError, Result};
use remora_common::key::KeyExtractor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A directed edge of the IR DAG.
///
/// The communication pattern is set at construction; everything else lives in
/// the property bag.
#[derive(Debug, Clone)]
pub struct IrEdge {
    id: String,
    src: String,
    dst: String,
    properties: EdgePropertyMap,
}

impl IrEdge {
    pub fn new(
        pattern: CommunicationPattern,
        src: impl Into<String>,
        dst: impl Into<String>,
    ) -> Self {
        let id = fresh_edge_id();
        let mut properties = EdgePropertyMap::new(id.clone());
        properties.insert_unchecked(EdgeProperty::CommunicationPattern(pattern));
        Self {
            id,
            src: src.into(),
            dst: dst.into(),
            properties,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> &str {
        &self.dst
    }

    pub fn properties(&self) -> &EdgePropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut EdgePropertyMap {
        &mut self.properties
    }

    pub fn comm_pattern(&self) -> Option<CommunicationPattern> {
        match self.properties.get(EdgePropertyKind::CommunicationPattern) {
            Some(EdgeProperty::CommunicationPattern(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn require_comm_pattern(&self) -> Result<CommunicationPattern> {
        self.comm_pattern().ok_or_else(|| {
            IrError::missing_property(&self.id, EdgePropertyKind::CommunicationPattern.to_string())
        })
    }

    pub fn data_store(&self) -> Option<DataStore> {
        match self.properties.get(EdgePropertyKind::DataStore) {
            Some(EdgeProperty::DataStore(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn key_extractor(&self) -> Option<Arc<dyn KeyExtractor>> {
        match self.properties.get(EdgePropertyKind::KeyExtractor) {
            Some(EdgeProperty::KeyExtractor(k)) => Some(k.clone()),
            _ => None,
        }
    }

    pub fn encoder(&self) -> Option<Arc<dyn EncoderFactory>> {
        match self.properties.get(EdgePropertyKind::Encoder) {
            Some(EdgeProperty::Encoder(e)) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn decoder(&self) -> Option<Arc<dyn DecoderFactory>> {
        match self.properties.get(EdgePropertyKind::Decoder) {
            Some(EdgeProperty::Decoder(d)) => Some(d.clone()),
            _ => None,
        }
    }

    pub fn additional_output_tag(&self) -> Option<&str> {
        match self.properties.get(EdgePropertyKind::AdditionalOutputTag) {
            Some(EdgeProperty::AdditionalOutputTag(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn metric_collection(&self) -> Option<i32> {
        match self.properties.get(EdgePropertyKind::MetricCollection) {
            Some(EdgeProperty::MetricCollection(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn duplicate_edge_group(&self) -> Option<&str> {
        match self.properties.get(EdgePropertyKind::DuplicateEdgeGroup) {
            Some(EdgeProperty::DuplicateEdgeGroup(g)) => Some(g.as_str()),
            _ => None,
        }
    }

    pub fn shuffle_distribution(&self) -> Option<&ShuffleDistribution> {
        match self.properties.get(EdgePropertyKind::ShuffleDistribution) {
            Some(EdgeProperty::ShuffleDistribution(d)) => Some(d),
            _ => None,
        }
    }

    pub fn one_to_one_distribution(&self) -> Option<&BTreeMap<usize, usize>> {
        match self.properties.get(EdgePropertyKind::OneToOneDistribution) {
            Some(EdgeProperty::OneToOneDistribution(d)) => Some(d),
            _ => None,
        }
    }

    pub fn copy_execution_properties_to(&self, other: &mut IrEdge) -> Result<()> {
        self.properties.copy_to(&mut other.properties)
    }
}
