//! Concurrent TCP service for collaboratively building one shared weighted
//! undirected graph and computing Minimum Spanning Trees over it.
//!
//! The interesting part is the resource discipline, not the algorithms: a
//! fixed-size Leader–Follower worker pool admits connections without a
//! dedicated listener thread, and a single coarse lock with a non-blocking
//! reject-and-retry policy serializes every graph operation across
//! connections.

pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod mst;
pub mod server;

pub use config::ServerConfig;
pub use graph::{Edge, Graph};
pub use server::Server;
