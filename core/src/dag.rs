//! The immutable IR DAG and its builder.

use crate::ir::{IrEdge, IrVertex};
use remora_common::error::{IrError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A validated, immutable DAG of IR vertices and edges.
///
/// Adjacency and a deterministic topological order are precomputed at build
/// time; ties in the order are broken lexicographically on vertex id.
#[derive(Debug, Clone)]
pub struct Dag {
    vertices: BTreeMap<String, IrVertex>,
    edges: Vec<IrEdge>,
    incoming: HashMap<String, Vec<usize>>,
    outgoing: HashMap<String, Vec<usize>>,
    topological: Vec<String>,
}

impl Dag {
    pub fn vertex(&self, id: &str) -> Option<&IrVertex> {
        self.vertices.get(id)
    }

    /// Vertices in lexicographic id order.
    pub fn vertices(&self) -> impl Iterator<Item = &IrVertex> {
        self.vertices.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &IrEdge> {
        self.edges.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Incoming edges of a vertex, in insertion order.
    pub fn incoming_edges_of(&self, id: &str) -> Vec<&IrEdge> {
        self.incoming
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Outgoing edges of a vertex, in insertion order.
    pub fn outgoing_edges_of(&self, id: &str) -> Vec<&IrEdge> {
        self.outgoing
            .get(id)
            .map(|idxs| idxs.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Vertices in topological order; every vertex appears after all of its
    /// predecessors. Deterministic for identical inputs.
    pub fn topological_order(&self) -> impl Iterator<Item = &IrVertex> {
        self.topological.iter().map(|id| &self.vertices[id])
    }
}

/// Accumulates vertices and edges in any order and validates on `build`.
#[derive(Debug, Default)]
pub struct DagBuilder {
    vertices: BTreeMap<String, IrVertex>,
    edges: Vec<IrEdge>,
    edge_index: HashMap<String, usize>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex. Re-adding a vertex with a known id is a no-op.
    pub fn add_vertex(&mut self, vertex: IrVertex) -> &mut Self {
        self.vertices.entry(vertex.id().to_string()).or_insert(vertex);
        self
    }

    /// Connects two vertices. Endpoint existence is checked at `build` time,
    /// so edges may be connected before their vertices are added. Re-adding
    /// an edge with a known id is a no-op.
    pub fn connect_vertices(&mut self, edge: IrEdge) -> &mut Self {
        if !self.edge_index.contains_key(edge.id()) {
            self.edge_index.insert(edge.id().to_string(), self.edges.len());
            self.edges.push(edge);
        }
        self
    }

    pub fn contains_vertex(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    /// The accumulated edge with the given id, if any. Lets a pass annotate
    /// an edge it already copied through.
    pub fn edge_mut(&mut self, id: &str) -> Option<&mut IrEdge> {
        self.edge_index.get(id).map(|&i| &mut self.edges[i])
    }

    /// Validates endpoints and acyclicity and produces the final DAG.
    pub fn build(self) -> Result<Dag> {
        for edge in &self.edges {
            for endpoint in [edge.src(), edge.dst()] {
                if !self.vertices.contains_key(endpoint) {
                    return Err(IrError::UnknownEndpoint {
                        edge: edge.id().to_string(),
                        vertex: endpoint.to_string(),
                    });
                }
            }
        }

        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in self.edges.iter().enumerate() {
            incoming.entry(edge.dst().to_string()).or_default().push(i);
            outgoing.entry(edge.src().to_string()).or_default().push(i);
        }

        let topological = kahn_order(&self.vertices, &self.edges, &outgoing)?;

        Ok(Dag {
            vertices: self.vertices,
            edges: self.edges,
            incoming,
            outgoing,
            topological,
        })
    }
}

/// Kahn's algorithm over a lexicographically ordered ready set.
fn kahn_order(
    vertices: &BTreeMap<String, IrVertex>,
    edges: &[IrEdge],
    outgoing: &HashMap<String, Vec<usize>>,
) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> =
        vertices.keys().map(|id| (id.as_str(), 0)).collect();
    for edge in edges {
        if let Some(d) = in_degree.get_mut(edge.dst()) {
            *d += 1;
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(vertices.len());

    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id.to_string());
        if let Some(idxs) = outgoing.get(id) {
            for &i in idxs {
                let dst = edges[i].dst();
                if let Some(d) = in_degree.get_mut(dst) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dst);
                    }
                }
            }
        }
    }

    if order.len() != vertices.len() {
        let stuck = in_degree
            .iter()
            .find(|(_, &d)| d > 0)
            .map(|(&id, _)| id.to_string())
            .unwrap_or_default();
        return Err(IrError::CycleDetected { vertex: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CommunicationPattern, OperatorVertex};
    use crate::transform::Transform;

    fn op(id: &str) -> IrVertex {
        IrVertex::Operator(OperatorVertex::with_id(
            id,
            Transform::Custom {
                name: id.to_string(),
            },
        ))
    }

    #[test]
    fn test_duplicate_vertex_addition_is_idempotent() {
        let mut builder = DagBuilder::new();
        builder.add_vertex(op("a"));
        builder.add_vertex(op("a"));
        let dag = builder.build().expect("build");
        assert_eq!(dag.vertex_count(), 1);
    }

    #[test]
    fn test_unknown_endpoint() {
        let mut builder = DagBuilder::new();
        builder.add_vertex(op("a"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::OneToOne, "a", "ghost"));
        let err = builder.build().unwrap_err();
        match err {
            IrError::UnknownEndpoint { vertex, .. } => assert_eq!(vertex, "ghost"),
            other => panic!("expected UnknownEndpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_detected() {
        let mut builder = DagBuilder::new();
        builder.add_vertex(op("a"));
        builder.add_vertex(op("b"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::OneToOne, "a", "b"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::OneToOne, "b", "a"));
        let err = builder.build().unwrap_err();
        assert!(matches!(err, IrError::CycleDetected { .. }));
    }

    #[test]
    fn test_topological_order_is_lexicographic_on_ties() {
        let mut builder = DagBuilder::new();
        // c and b are both roots feeding a; ties break on id.
        builder.add_vertex(op("c"));
        builder.add_vertex(op("b"));
        builder.add_vertex(op("a"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::OneToOne, "b", "a"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::OneToOne, "c", "a"));
        let dag = builder.build().expect("build");
        let order: Vec<&str> = dag.topological_order().map(|v| v.id()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_adjacency_maps() {
        let mut builder = DagBuilder::new();
        builder.add_vertex(op("a"));
        builder.add_vertex(op("b"));
        builder.add_vertex(op("c"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::Shuffle, "a", "c"));
        builder.connect_vertices(IrEdge::new(CommunicationPattern::Shuffle, "b", "c"));
        let dag = builder.build().expect("build");

        assert_eq!(dag.incoming_edges_of("c").len(), 2);
        assert_eq!(dag.outgoing_edges_of("a").len(), 1);
        assert!(dag.incoming_edges_of("a").is_empty());
    }
}
