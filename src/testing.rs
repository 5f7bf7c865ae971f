//! Random graph generation for property-style tests.

use crate::graph::{AdjacencyGraph, Graph};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Builds a connected graph on `n` vertices (`0..n`) with `m` edges
/// (`m >= n - 1`), deterministic for a given `seed`.
///
/// A random spanning tree is grown first (vertex `i` attaches to a
/// uniformly chosen earlier vertex `j < i`), guaranteeing connectivity;
/// the remaining `m - (n - 1)` edges are added between uniformly chosen
/// endpoints, which may coincide with existing edges or create
/// self-loops the caller's `Graph` consumer is expected to tolerate or
/// this function is expected to avoid — see `add_edge`'s self-loop
/// rejection in debug builds.
pub fn random_connected_graph(n: usize, m: usize, seed: u64) -> AdjacencyGraph<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = AdjacencyGraph::new();

    for i in 0..n {
        graph.add_vertex(i);
        if i > 0 {
            let j = rng.random_range(0..i);
            graph.add_edge(i, j);
        }
    }

    let mut extra = m.saturating_sub(n.saturating_sub(1));
    while extra > 0 && n > 1 {
        let s = rng.random_range(0..n);
        let t = rng.random_range(0..n);
        if s != t {
            graph.add_edge(s, t);
            extra -= 1;
        }
    }

    graph
}
