//! Hot-swappable routing state
//!
//! Readers take an `Arc` snapshot of graph + table for the whole request;
//! a reload synthesizes a complete new table first and then swaps it in with
//! a single atomic store. A failed reload leaves the live table untouched.

use super::{synthesize, RouteTable};
use crate::error::DeclarationError;
use crate::graph::ResourceGraph;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A graph and the table synthesized from it
#[derive(Debug)]
pub struct Routing {
    pub graph: Arc<ResourceGraph>,
    pub table: RouteTable,
}

impl Routing {
    pub fn new(graph: ResourceGraph) -> Result<Self, DeclarationError> {
        let table = synthesize(&graph)?;
        Ok(Self {
            graph: Arc::new(graph),
            table,
        })
    }
}

pub struct RoutingHandle {
    generation: AtomicU64,
    current: ArcSwap<Routing>,
}

impl RoutingHandle {
    pub fn new(graph: ResourceGraph) -> Result<Self, DeclarationError> {
        let routing = Routing::new(graph)?;
        tracing::info!("routing ready: {} routes", routing.table.len());
        Ok(Self {
            generation: AtomicU64::new(0),
            current: ArcSwap::new(Arc::new(routing)),
        })
    }

    /// Current snapshot; stays valid even if a reload happens meanwhile
    pub fn snapshot(&self) -> Arc<Routing> {
        self.current.load_full()
    }

    /// Number of successful reloads since start
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Re-synthesize from `graph` and swap the whole table in
    pub fn reload(&self, graph: ResourceGraph) -> Result<(), DeclarationError> {
        let routing = match Routing::new(graph) {
            Ok(routing) => routing,
            Err(err) => {
                tracing::error!("route reload rejected, keeping current table: {}", err);
                return Err(err);
            },
        };

        let routes = routing.table.len();
        self.current.store(Arc::new(routing));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("routing reloaded (generation {}): {} routes", generation, routes);
        Ok(())
    }
}
