//! The undirected-graph contract the block-cut algorithm consumes.
//!
//! `Vertex` identity and adjacency storage are an external collaborator
//! (see the crate's module docs): `block_cut::compute` only needs vertex
//! iteration and per-vertex adjacency, never a concrete storage type. This
//! module defines that minimal contract plus two concrete implementations
//! used throughout this crate's tests and examples.

use hashbrown::HashMap;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::IntoNodeReferences;
use std::hash::Hash;

/// An undirected, simple graph exposing vertex identity and adjacency.
///
/// Equality among vertices is identity (`Copy + Eq + Hash`), matching the
/// spec's "Vertex: identity only". Implementors are expected to represent
/// a *connected* component when passed to [`crate::block_cut::compute`];
/// behavior is otherwise undefined (see that function's docs).
pub trait Graph {
    /// Vertex handle type. Cheap to copy (an index, a slotmap key, ...).
    type Vertex: Copy + Eq + Hash;

    /// All vertices of the graph (or of the caller's chosen component).
    fn vertices(&self) -> Vec<Self::Vertex>;

    /// Vertices adjacent to `v`, in some deterministic order. Adjacency is
    /// symmetric: `u` appears in `adjacent(v)` iff `v` appears in
    /// `adjacent(u)`.
    fn adjacent(&self, v: Self::Vertex) -> Vec<Self::Vertex>;
}

/// A plain adjacency-set graph — the "generic graph primitive" spec.md
/// treats as external, provided here as the default concrete type for
/// callers that don't already have their own `Vertex` representation.
///
/// Insertion order of a vertex's neighbors is preserved, giving
/// deterministic adjacency iteration without needing to sort on every
/// lookup.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph<V: Copy + Eq + Hash> {
    adjacency: HashMap<V, Vec<V>>,
}

impl<V: Copy + Eq + Hash> AdjacencyGraph<V> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            adjacency: HashMap::new(),
        }
    }

    /// Registers `v` with no neighbors if it isn't already present.
    pub fn add_vertex(&mut self, v: V) {
        self.adjacency.entry(v).or_default();
    }

    /// Adds an undirected edge between `u` and `v`. Self-loops are not
    /// part of the block-cut input domain (see spec's Non-goals) and are
    /// rejected in debug builds.
    pub fn add_edge(&mut self, u: V, v: V) {
        debug_assert!(u != v, "self-loops are not supported");
        if !self.adjacency.entry(u).or_default().contains(&v) {
            self.adjacency.entry(u).or_default().push(v);
        }
        if !self.adjacency.entry(v).or_default().contains(&u) {
            self.adjacency.entry(v).or_default().push(u);
        }
    }

    /// Number of registered vertices.
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }
}

impl<V: Copy + Eq + Hash> Graph for AdjacencyGraph<V> {
    type Vertex = V;

    fn vertices(&self) -> Vec<V> {
        self.adjacency.keys().copied().collect()
    }

    fn adjacent(&self, v: V) -> Vec<V> {
        self.adjacency.get(&v).cloned().unwrap_or_default()
    }
}

/// Adapter over petgraph's `UnGraph`, matching the representation used
/// throughout the rest of this crate's test graphs.
pub struct PetgraphGraph<'a, N, E> {
    inner: &'a UnGraph<N, E>,
}

impl<'a, N, E> PetgraphGraph<'a, N, E> {
    /// Wraps a petgraph undirected graph as a [`Graph`].
    pub fn new(inner: &'a UnGraph<N, E>) -> Self {
        Self { inner }
    }
}

impl<N, E> Graph for PetgraphGraph<'_, N, E> {
    type Vertex = NodeIndex;

    fn vertices(&self) -> Vec<NodeIndex> {
        self.inner.node_references().map(|(idx, _)| idx).collect()
    }

    fn adjacent(&self, v: NodeIndex) -> Vec<NodeIndex> {
        self.inner.neighbors(v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_graph_is_symmetric() {
        let mut g = AdjacencyGraph::new();
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        assert_eq!(g.adjacent(1), vec![2]);
        assert_eq!(g.adjacent(2), vec![1, 3]);
        assert_eq!(g.adjacent(3), vec![2]);
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn adjacency_graph_dedups_repeated_edges() {
        let mut g = AdjacencyGraph::new();
        g.add_edge(1, 2);
        g.add_edge(1, 2);
        assert_eq!(g.adjacent(1), vec![2]);
        assert_eq!(g.adjacent(2), vec![1]);
    }

    #[test]
    fn adjacency_graph_isolated_vertex() {
        let mut g: AdjacencyGraph<u32> = AdjacencyGraph::new();
        g.add_vertex(0);
        assert!(g.adjacent(0).is_empty());
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn petgraph_adapter_reports_neighbors() {
        let mut pg = UnGraph::<u32, ()>::new_undirected();
        let a = pg.add_node(0);
        let b = pg.add_node(1);
        pg.add_edge(a, b, ());
        let adapter = PetgraphGraph::new(&pg);
        assert_eq!(adapter.adjacent(a), vec![b]);
        assert_eq!(adapter.vertices().len(), 2);
    }
}
