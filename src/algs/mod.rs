//! Algorithms built on top of a derived topology.

pub mod graph_partition;

pub use graph_partition::compute_graph_partition;
