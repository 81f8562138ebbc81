//! Declarative REST resource graphs.
//!
//! A [`graph::ResourceGraph`] declares resources, their filterable scopes,
//! associations and remote endpoints. From it, [`routes`] synthesizes the
//! route table, [`server`] serves it through one generic controller, and
//! [`client`] mirrors it as lazily fetching record handles.

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod query;
pub mod routes;
pub mod server;

/// Version injected at compile time via TRELLIS_VERSION env var, or "dev"
/// for local builds.
pub const VERSION: &str = match option_env!("TRELLIS_VERSION") {
    Some(v) => v,
    None => "dev",
};
