//! Helpers built on top of the public API. Nothing in here needs access to backend internals.

pub mod render_graph;
pub mod resource_loader;
