//! IR vertices: data sources and operators.

use crate::ids::fresh_vertex_id;
use crate::ir::property::{
    VertexProperty, VertexPropertyKind, VertexPropertyMap,
};
use crate::transform::Transform;
use dyn_clone::DynClone;
use remora_common::error::{IrError, Result};
use std::fmt;

/// Produces the input data of a [`SourceVertex`], one split per task index.
///
/// `sampled` restricts the reader to a subset of its task indices; the
/// returned reader's output equals the union of this reader's outputs at
/// those indices out of `original_parallelism`.
pub trait SourceReader: fmt::Debug + DynClone + Send + Sync {
    fn sampled(&self, indices: &[usize], original_parallelism: usize) -> Box<dyn SourceReader>;
}

dyn_clone::clone_trait_object!(SourceReader);

/// A vertex that reads external data.
#[derive(Debug, Clone)]
pub struct SourceVertex {
    id: String,
    properties: VertexPropertyMap,
    reader: Box<dyn SourceReader>,
}

impl SourceVertex {
    pub fn new(reader: Box<dyn SourceReader>) -> Self {
        Self::with_id(fresh_vertex_id(), reader)
    }

    pub fn with_id(id: impl Into<String>, reader: Box<dyn SourceReader>) -> Self {
        let id = id.into();
        let properties = VertexPropertyMap::new(id.clone());
        Self {
            id,
            properties,
            reader,
        }
    }

    /// A fresh-id clone restricted to reading only `indices` out of
    /// `original_parallelism` source splits. Execution properties are not
    /// carried over.
    pub fn sampled_clone(&self, indices: &[usize], original_parallelism: usize) -> SourceVertex {
        SourceVertex::new(self.reader.sampled(indices, original_parallelism))
    }

    pub fn reader(&self) -> &dyn SourceReader {
        self.reader.as_ref()
    }
}

/// A vertex that applies a transform to its inputs.
#[derive(Debug, Clone)]
pub struct OperatorVertex {
    id: String,
    properties: VertexPropertyMap,
    transform: Transform,
}

impl OperatorVertex {
    pub fn new(transform: Transform) -> Self {
        Self::with_id(fresh_vertex_id(), transform)
    }

    pub fn with_id(id: impl Into<String>, transform: Transform) -> Self {
        let id = id.into();
        let properties = VertexPropertyMap::new(id.clone());
        Self {
            id,
            properties,
            transform,
        }
    }

    /// A structural copy with a fresh id and the same transform. Execution
    /// properties are not carried over.
    pub fn fresh_clone(&self) -> OperatorVertex {
        OperatorVertex::new(self.transform.clone())
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }
}

/// A vertex of the IR DAG.
#[derive(Debug, Clone)]
pub enum IrVertex {
    Source(SourceVertex),
    Operator(OperatorVertex),
}

impl IrVertex {
    pub fn id(&self) -> &str {
        match self {
            IrVertex::Source(v) => &v.id,
            IrVertex::Operator(v) => &v.id,
        }
    }

    pub fn properties(&self) -> &VertexPropertyMap {
        match self {
            IrVertex::Source(v) => &v.properties,
            IrVertex::Operator(v) => &v.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut VertexPropertyMap {
        match self {
            IrVertex::Source(v) => &mut v.properties,
            IrVertex::Operator(v) => &mut v.properties,
        }
    }

    pub fn parallelism(&self) -> Option<usize> {
        match self.properties().get(VertexPropertyKind::Parallelism) {
            Some(VertexProperty::Parallelism(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn require_parallelism(&self) -> Result<usize> {
        self.parallelism().ok_or_else(|| {
            IrError::missing_property(self.id(), VertexPropertyKind::Parallelism.to_string())
        })
    }

    pub fn copy_execution_properties_to(&self, other: &mut IrVertex) -> Result<()> {
        self.properties().copy_to(other.properties_mut())
    }

    pub fn as_operator(&self) -> Option<&OperatorVertex> {
        match self {
            IrVertex::Operator(v) => Some(v),
            IrVertex::Source(_) => None,
        }
    }
}

impl SourceVertex {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn properties(&self) -> &VertexPropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut VertexPropertyMap {
        &mut self.properties
    }
}

impl OperatorVertex {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn properties(&self) -> &VertexPropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut VertexPropertyMap {
        &mut self.properties
    }
}
