//! DOT-format visualization of a [`BlockCutTree`], for feeding to
//! `neato`/`dot` while developing or debugging a decomposition. Built on
//! the `dot` crate's `Labeller`/`GraphWalk` traits, matching the teacher
//! repo's own `draw`/`Labeller` split (`src/debugging.rs`).

use crate::block_cut::BlockCutTree;
use dot::{Edges, GraphWalk, Id, LabelText, Labeller, Nodes};
use std::fmt::Display;
use std::hash::Hash;

/// A node of the rendered skeleton: either a block (by [`BlockId`]) or a
/// cut vertex (by [`CutId`]).
///
/// [`BlockId`]: crate::block_cut::BlockId
/// [`CutId`]: crate::block_cut::CutId
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Block(usize),
    Cut(usize),
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Node,
    to: Node,
}

struct Skeleton<'a, V> {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    tree: &'a BlockCutTree<V>,
}

impl<'a, V: Copy + Eq + Hash + Display> Labeller<'a, Node, Edge> for Skeleton<'a, V> {
    fn graph_id(&self) -> Id<'_> {
        Id::new("block_cut_tree").unwrap()
    }

    fn node_id(&self, n: &Node) -> Id<'_> {
        match n {
            Node::Block(i) => Id::new(format!("block{i}")).unwrap(),
            Node::Cut(i) => Id::new(format!("cut{i}")).unwrap(),
        }
    }

    fn node_label(&self, n: &Node) -> LabelText<'a> {
        match n {
            Node::Block(i) => {
                let block = self.tree.block(*i);
                LabelText::label(format!(
                    "B{i}\n{} vertices, {} edges",
                    block.graph().vertex_count(),
                    block.graph().edge_count()
                ))
            }
            Node::Cut(i) => LabelText::label(format!("{}", self.tree.cut(*i).vertex())),
        }
    }
}

impl<'a, V: Copy + Eq + Hash> GraphWalk<'a, Node, Edge> for Skeleton<'a, V> {
    fn nodes(&self) -> Nodes<'_, Node> {
        self.nodes.iter().cloned().collect()
    }

    fn edges(&self) -> Edges<'_, Edge> {
        self.edges.as_slice().into()
    }

    fn source(&self, e: &Edge) -> Node {
        e.from
    }

    fn target(&self, e: &Edge) -> Node {
        e.to
    }
}

/// Renders `tree`'s skeleton as a DOT graph: blocks as boxes labeled
/// `B<i>`, cut vertices as circles labeled with the source vertex,
/// one edge per parent/child link in the tree.
pub fn to_dot<V: Copy + Eq + Hash + Display>(tree: &BlockCutTree<V>) -> String {
    let mut nodes: Vec<Node> = (0..tree.blocks().len()).map(Node::Block).collect();
    nodes.extend((0..tree.cuts().len()).map(Node::Cut));

    let mut edges = Vec::new();
    for (block_id, block) in tree.blocks().iter().enumerate() {
        if let Some(parent_cut) = block.parent() {
            edges.push(Edge {
                from: Node::Cut(parent_cut),
                to: Node::Block(block_id),
            });
        }
    }

    let skeleton = Skeleton {
        nodes,
        edges,
        tree,
    };

    let mut buffer = std::io::Cursor::new(Vec::new());
    dot::render(&skeleton, &mut buffer).expect("skeleton renders to valid DOT");
    String::from_utf8(buffer.into_inner()).expect("dot::render emits UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_cut::compute;
    use crate::graph::AdjacencyGraph;

    #[test]
    fn dot_output_mentions_every_block_and_cut() {
        let mut g: AdjacencyGraph<u32> = AdjacencyGraph::new();
        g.add_edge(1, 2);
        g.add_edge(2, 3);
        let tree = compute(&g, 1);
        let dot = to_dot(&tree);
        assert!(dot.starts_with("digraph"));
        for i in 0..tree.blocks().len() {
            assert!(dot.contains(&format!("block{i}")));
        }
        for (i, cut) in tree.cuts().iter().enumerate() {
            assert!(dot.contains(&format!("cut{i}")));
            assert!(dot.contains(&cut.vertex().to_string()));
        }
    }
}
