//! Memory Module
//!
//! The node model, the graph-backed store and time-window queries over it.

mod graph;
mod node;
mod temporal;

pub use graph::MemoryStore;
pub(crate) use graph::GraphFile;
pub use node::{
    GraphEdge, MemoryNode, NewNode, NodeType, NodeUpdate, PERMANENT_KEY, REFERENCE_EDGE,
    SEARCH_HITS_KEY,
};
pub(crate) use node::dedup_tags;
pub use temporal::{TemporalError, TemporalIndex, TimeWindow};
