//! Remote endpoint handlers
//!
//! A remote is declared in the graph but computed by application code. The
//! controller looks up the bound handler per (resource, remote) pair; a
//! declared remote without a handler answers 501.

use crate::error::ApiError;
use crate::graph::{RemoteDescriptor, ResourceDescriptor};
use crate::query::{Record, Store};

/// Everything a remote computation may read
pub struct RemoteContext<'a> {
    pub store: &'a dyn Store,
    pub resource: &'a ResourceDescriptor,
    pub target: &'a ResourceDescriptor,
    pub remote: &'a RemoteDescriptor,
    /// Owning record for member remotes
    pub owner: Option<&'a Record>,
}

pub trait RemoteHandler: Send + Sync {
    fn call(&self, ctx: &RemoteContext<'_>) -> Result<Vec<Record>, ApiError>;
}

impl<F> RemoteHandler for F
where
    F: Fn(&RemoteContext<'_>) -> Result<Vec<Record>, ApiError> + Send + Sync,
{
    fn call(&self, ctx: &RemoteContext<'_>) -> Result<Vec<Record>, ApiError> {
        self(ctx)
    }
}
