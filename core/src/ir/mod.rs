//! The intermediate representation: vertices, edges, and their execution
//! properties.

pub mod edge;
pub mod property;
pub mod vertex;

pub use edge::IrEdge;
pub use property::{
    CommunicationPattern, DataFlow, DataPersistence, DataStore, EdgeProperty, EdgePropertyKind,
    EdgePropertyMap, Property, PropertyMap, ShuffleDistribution, VertexProperty,
    VertexPropertyKind, VertexPropertyMap,
};
pub use vertex::{IrVertex, OperatorVertex, SourceReader, SourceVertex};
