//! Block-cut tree decomposition (spec.md §3.1/§4.1).
//!
//! Computes the bipartite tree whose nodes alternate between *blocks*
//! (maximal biconnected subgraphs) and *cut vertices* (articulation
//! points), rooted at a caller-chosen vertex. Based on the classical
//! Hopcroft-Tarjan decomposition, implemented with an iterative DFS (no
//! recursion — see the design notes on resumable adjacency iteration)
//! plus a top-down pass that materializes the tree from the DFS's
//! lowpoints.

use crate::graph::Graph;
use hashbrown::{HashMap, HashSet};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::VecDeque;
use std::hash::Hash;

/// Index of a [`BlockNode`] within a [`BlockCutTree`].
pub type BlockId = usize;
/// Index of a [`CutNode`] within a [`BlockCutTree`].
pub type CutId = usize;

/// A maximal biconnected subgraph, with vertex identities distinct from
/// the source graph's (spec.md §3.1: block-local vertices are indices
/// into this block's own skeleton, mapped back via `source_vertex`).
#[derive(Debug, Clone)]
pub struct BlockGraph<V: Copy + Eq + Hash> {
    skeleton: UnGraph<(), ()>,
    block_vertex_to_vertex: Vec<V>,
}

impl<V: Copy + Eq + Hash> BlockGraph<V> {
    fn with_capacity(vertices: usize, edges: usize) -> Self {
        Self {
            skeleton: UnGraph::with_capacity(vertices, edges),
            block_vertex_to_vertex: Vec::with_capacity(vertices),
        }
    }

    fn add_block_vertex(&mut self, source: V) -> NodeIndex {
        let idx = self.skeleton.add_node(());
        debug_assert_eq!(idx.index(), self.block_vertex_to_vertex.len());
        self.block_vertex_to_vertex.push(source);
        idx
    }

    /// Number of block-local vertices (source vertices this block touches).
    pub fn vertex_count(&self) -> usize {
        self.skeleton.node_count()
    }

    /// Number of edges within the block.
    pub fn edge_count(&self) -> usize {
        self.skeleton.edge_count()
    }

    /// Maps a block-local vertex back to the source graph's vertex.
    pub fn source_vertex(&self, block_vertex: NodeIndex) -> V {
        self.block_vertex_to_vertex[block_vertex.index()]
    }

    /// Source vertices touched by this block, in block-vertex order.
    pub fn vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.block_vertex_to_vertex.iter().copied()
    }

    /// Edges of the block, translated to source-graph vertex pairs.
    pub fn edges(&self) -> impl Iterator<Item = (V, V)> + '_ {
        self.skeleton.edge_references().map(move |e| {
            (
                self.source_vertex(e.source()),
                self.source_vertex(e.target()),
            )
        })
    }
}

/// A block node: owns a [`BlockGraph`] and a back-reference to its parent
/// cut vertex (if any) plus the cut vertices hanging below it.
#[derive(Debug, Clone)]
pub struct BlockNode<V: Copy + Eq + Hash> {
    graph: BlockGraph<V>,
    parent: Option<CutId>,
    children: Vec<CutId>,
}

impl<V: Copy + Eq + Hash> BlockNode<V> {
    /// The biconnected subgraph this node represents.
    pub fn graph(&self) -> &BlockGraph<V> {
        &self.graph
    }

    /// The cut vertex this block hangs off of, unless this is the tree root.
    pub fn parent(&self) -> Option<CutId> {
        self.parent
    }

    /// Cut vertices belonging to this block that have further blocks below them.
    pub fn children(&self) -> &[CutId] {
        &self.children
    }
}

/// A cut-vertex node: references one source vertex; owns no graph data.
#[derive(Debug, Clone)]
pub struct CutNode<V: Copy + Eq + Hash> {
    vertex: V,
    parent: Option<BlockId>,
    children: Vec<BlockId>,
}

impl<V: Copy + Eq + Hash> CutNode<V> {
    /// The articulation point this node represents.
    pub fn vertex(&self) -> V {
        self.vertex
    }

    /// The block this cut vertex was first discovered in.
    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// Blocks hanging below this cut vertex.
    pub fn children(&self) -> &[BlockId] {
        &self.children
    }
}

/// The block-cut tree of one connected component, rooted at the vertex
/// passed to [`compute`].
#[derive(Debug, Clone)]
pub struct BlockCutTree<V: Copy + Eq + Hash> {
    blocks: Vec<BlockNode<V>>,
    cuts: Vec<CutNode<V>>,
    root: BlockId,
}

impl<V: Copy + Eq + Hash> BlockCutTree<V> {
    /// The tree's root block. Every block-cut tree has one, even for an
    /// isolated vertex (invariant (d)).
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// All blocks, indexable by [`BlockId`].
    pub fn blocks(&self) -> &[BlockNode<V>] {
        &self.blocks
    }

    /// All cut nodes, indexable by [`CutId`].
    pub fn cuts(&self) -> &[CutNode<V>] {
        &self.cuts
    }

    /// Looks up a block by id.
    pub fn block(&self, id: BlockId) -> &BlockNode<V> {
        &self.blocks[id]
    }

    /// Looks up a cut node by id.
    pub fn cut(&self, id: CutId) -> &CutNode<V> {
        &self.cuts[id]
    }

    /// Source vertices appearing as some [`CutNode::vertex`] — the
    /// articulation points of the input (property P2).
    pub fn cut_vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.cuts.iter().map(|c| c.vertex)
    }

    fn single_vertex(root: V) -> Self {
        let mut graph = BlockGraph::with_capacity(1, 0);
        graph.add_block_vertex(root);
        Self {
            blocks: vec![BlockNode {
                graph,
                parent: None,
                children: Vec::new(),
            }],
            cuts: Vec::new(),
            root: 0,
        }
    }
}

/// Per-vertex DFS bookkeeping accumulated by [`dfs`].
struct DfsResult<V: Copy + Eq + Hash> {
    depths: HashMap<V, usize>,
    children: HashMap<V, Vec<V>>,
    back_edges: HashMap<V, Vec<V>>,
    lowpoints: HashMap<V, usize>,
    /// Non-root cut vertices, in the order they were popped (post-order).
    cut_vertices_postorder: Vec<V>,
}

/// Phase 1: iterative DFS computing depths, the DFS tree, back edges and
/// lowpoints (spec.md §4.1 Phase 1/2). No recursion: the DFS stack is
/// modeled explicitly as a list of `(vertex, adjacency cursor)` frames so
/// arbitrarily deep graphs don't blow the call stack.
///
/// Resolves the back-edge/parent Open Question by tracking the DFS
/// parent explicitly and skipping that adjacency entry by identity,
/// rather than by the depth arithmetic the spec notes is fragile under
/// multi-edges.
fn dfs<G: Graph>(graph: &G, root: G::Vertex) -> DfsResult<G::Vertex> {
    let mut depths = HashMap::new();
    let mut parent_of: HashMap<G::Vertex, G::Vertex> = HashMap::new();
    let mut parent_edge_used: HashMap<G::Vertex, bool> = HashMap::new();
    let mut children: HashMap<G::Vertex, Vec<G::Vertex>> = HashMap::new();
    let mut back_edges: HashMap<G::Vertex, Vec<G::Vertex>> = HashMap::new();
    let mut lowpoints = HashMap::new();
    let mut cut_vertices_postorder = Vec::new();

    struct Frame<V> {
        vertex: V,
        adjacency: std::vec::IntoIter<V>,
    }

    depths.insert(root, 0usize);
    children.insert(root, Vec::new());
    back_edges.insert(root, Vec::new());

    let mut stack = vec![Frame {
        vertex: root,
        adjacency: graph.adjacent(root).into_iter(),
    }];

    while let Some(frame) = stack.last_mut() {
        let v = frame.vertex;
        match frame.adjacency.next() {
            Some(w) => {
                if !depths.contains_key(&w) {
                    // Tree edge: descend.
                    let child_depth = depths[&v] + 1;
                    depths.insert(w, child_depth);
                    parent_of.insert(w, v);
                    parent_edge_used.insert(w, false);
                    children.entry(v).or_default().push(w);
                    children.insert(w, Vec::new());
                    back_edges.insert(w, Vec::new());
                    stack.push(Frame {
                        vertex: w,
                        adjacency: graph.adjacent(w).into_iter(),
                    });
                } else if parent_of.get(&v).copied() == Some(w)
                    && !parent_edge_used.get(&v).copied().unwrap_or(false)
                {
                    // First adjacency entry pointing back at the DFS
                    // parent is the tree edge seen from the child side;
                    // consume it without treating it as a back edge, even
                    // if `w` has other parallel edges to `v`.
                    parent_edge_used.insert(v, true);
                } else if depths[&w] < depths[&v] {
                    back_edges.entry(v).or_default().push(w);
                }
            }
            None => {
                stack.pop();
                let depth_v = depths[&v];
                let mut low = depth_v;
                for &w in &back_edges[&v] {
                    low = low.min(depths[&w]);
                }
                let mut is_cut = false;
                for &c in &children[&v] {
                    let low_c = lowpoints[&c];
                    low = low.min(low_c);
                    if low_c >= depth_v {
                        is_cut = true;
                    }
                }
                lowpoints.insert(v, low);

                if parent_of.contains_key(&v) && is_cut {
                    cut_vertices_postorder.push(v);
                }
            }
        }
    }

    DfsResult {
        depths,
        children,
        back_edges,
        lowpoints,
        cut_vertices_postorder,
    }
}

/// Phase 3 helper (spec.md §4.1 "`blockNodes(parent, start, ...)` helper"):
/// builds every block whose top vertex is `start`, attaching each to
/// `parent` (or, for the call made with `parent = None`, establishing the
/// tree's root per the root special case).
fn build_blocks_for<V: Copy + Eq + Hash>(
    tree: &mut BlockCutTree<V>,
    cut_node_of: &mut HashMap<V, CutId>,
    root_block: &mut Option<BlockId>,
    parent: Option<CutId>,
    start: V,
    dfs: &DfsResult<V>,
) {
    let depth_start = dfs.depths[&start];
    let mut first_block_at_root_level = parent.is_none() && root_block.is_none();

    for &c in &dfs.children[&start] {
        if dfs.lowpoints[&c] < depth_start {
            // `c`'s subtree reaches above `start`; it belongs to a block
            // already under construction higher up, not a new one here.
            continue;
        }

        let mut local_map: HashMap<V, NodeIndex> = HashMap::new();
        let mut block_graph = BlockGraph::with_capacity(4, 4);
        let bv_start = block_graph.add_block_vertex(start);
        local_map.insert(start, bv_start);
        let bv_c = block_graph.add_block_vertex(c);
        local_map.insert(c, bv_c);
        block_graph.skeleton.add_edge(bv_start, bv_c, ());

        let mut queue: VecDeque<V> = VecDeque::new();
        queue.push_back(c);
        let mut cut_marks = Vec::new();
        let mut cut_marks_seen = HashSet::new();

        while let Some(u) = queue.pop_front() {
            let bv_u = local_map[&u];
            for &w in &dfs.back_edges[&u] {
                let bv_w = local_map[&w];
                block_graph.skeleton.add_edge(bv_u, bv_w, ());
            }
            for &d in &dfs.children[&u] {
                if dfs.lowpoints[&d] >= dfs.depths[&u] {
                    if cut_marks_seen.insert(u) {
                        cut_marks.push(u);
                    }
                } else {
                    let bv_d = block_graph.add_block_vertex(d);
                    local_map.insert(d, bv_d);
                    block_graph.skeleton.add_edge(bv_u, bv_d, ());
                    queue.push_back(d);
                }
            }
        }

        let block_id = tree.blocks.len();
        tree.blocks.push(BlockNode {
            graph: block_graph,
            parent: None,
            children: Vec::new(),
        });

        match parent {
            Some(parent_cut) => {
                tree.blocks[block_id].parent = Some(parent_cut);
                tree.cuts[parent_cut].children.push(block_id);
            }
            None if first_block_at_root_level => {
                *root_block = Some(block_id);
            }
            None => {
                // Root has a second (or later) tree child: root is itself a
                // cut vertex, shared by all these sibling blocks.
                let root_cut = match cut_node_of.get(&start) {
                    Some(&id) => id,
                    None => {
                        let id = tree.cuts.len();
                        tree.cuts.push(CutNode {
                            vertex: start,
                            parent: *root_block,
                            children: Vec::new(),
                        });
                        cut_node_of.insert(start, id);
                        let root_block_id = root_block
                            .expect("root block is built before root can become a cut vertex");
                        tree.blocks[root_block_id].children.push(id);
                        id
                    }
                };
                tree.blocks[block_id].parent = Some(root_cut);
                tree.cuts[root_cut].children.push(block_id);
            }
        }
        first_block_at_root_level = false;

        for u in cut_marks {
            let cut_id = *cut_node_of.entry(u).or_insert_with(|| {
                let id = tree.cuts.len();
                tree.cuts.push(CutNode {
                    vertex: u,
                    parent: Some(block_id),
                    children: Vec::new(),
                });
                id
            });
            tree.blocks[block_id].children.push(cut_id);
        }
    }
}

/// Computes the block-cut tree of `root`'s connected component.
///
/// # Preconditions
///
/// `graph` must be simple (no self-loops) and `root` must belong to it.
/// These are precondition violations per spec.md §7: this function does
/// not validate them and its behavior is unspecified if they don't hold.
pub fn compute<G: Graph>(graph: &G, root: G::Vertex) -> BlockCutTree<G::Vertex> {
    let root_adjacent = graph.adjacent(root);
    if root_adjacent.is_empty() {
        return BlockCutTree::single_vertex(root);
    }

    let dfs_result = dfs(graph, root);

    let mut tree = BlockCutTree {
        blocks: Vec::new(),
        cuts: Vec::new(),
        root: 0,
    };
    let mut cut_node_of = HashMap::new();
    let mut root_block = None;

    build_blocks_for(&mut tree, &mut cut_node_of, &mut root_block, None, root, &dfs_result);

    for &cv in dfs_result.cut_vertices_postorder.iter().rev() {
        let parent_cut = cut_node_of[&cv];
        build_blocks_for(
            &mut tree,
            &mut cut_node_of,
            &mut root_block,
            Some(parent_cut),
            cv,
            &dfs_result,
        );
    }

    tree.root = root_block.expect("a root with an adjacency always yields a root block");
    tree
}
