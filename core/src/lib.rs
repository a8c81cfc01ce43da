//! Remora core module
//!
//! This module provides the core of the Remora dataflow compiler: the IR
//! DAG with typed execution properties, the statistic transforms, and the
//! compile-time sampling skew-reshaping pass.

mod ids;

pub mod dag;
pub mod ir;
pub mod pass;
pub mod transform;

pub use dag::{Dag, DagBuilder};
pub use ir::{
    CommunicationPattern, DataFlow, DataPersistence, DataStore, EdgeProperty, EdgePropertyKind,
    IrEdge, IrVertex, OperatorVertex, ShuffleDistribution, SourceReader, SourceVertex,
    VertexProperty, VertexPropertyKind,
};
pub use pass::{CompileTimePass, SamplingConfig, SamplingSkewReshapingPass};
pub use transform::Transform;
