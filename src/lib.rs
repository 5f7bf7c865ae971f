#![warn(missing_docs)]

//! # canvas_graph_core
//!
//! Two independent, composable pieces of a larger canvas/diagramming
//! application's algorithmic core:
//!
//! - [`block_cut`]: block-cut tree decomposition (biconnected components
//!   and articulation points) of an undirected graph, computed with an
//!   iterative depth-first search.
//! - [`tile_cache`] and [`scheduler`]: a bounded, pixel-area-budgeted LRU
//!   cache of rendered tiles, and a scheduler that keeps a visible set of
//!   tiles in exactly one of `{cached, in-flight, absent}`.
//!
//! Both are pure coordination logic: rendering, planar layout, and the
//! UI surface that consumes these trees and tiles are external
//! collaborators, represented here only by the [`graph::Graph`] trait and
//! the [`scheduler::Renderer`]/[`scheduler::WorkSubmitter`] contracts.

pub mod block_cut;
pub mod debugging;
pub mod error;
pub mod graph;
pub mod region;
pub mod scheduler;
pub mod testing;
pub mod tile_cache;

pub use block_cut::{BlockCutTree, BlockGraph, BlockNode, CutNode};
pub use error::RegionError;
pub use graph::{AdjacencyGraph, Graph, PetgraphGraph};
pub use region::Region;
pub use scheduler::{CancelToken, TileScheduler, ViewportSource};
pub use tile_cache::{Tile, TileCache};
