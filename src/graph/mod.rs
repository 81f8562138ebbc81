//! Resource graph declaration
//!
//! The graph is pure data: every route, filter vocabulary and client accessor
//! is derived from it. It is assembled once through [`GraphBuilder`] (or
//! loaded from a graph file, see [`registry`]) and never mutated afterwards.
//!
//! # Example
//!
//! ```
//! use trellis::graph::{ResourceDescriptor, ResourceGraph, ScopeDescriptor};
//!
//! let graph = ResourceGraph::builder()
//!     .resource(
//!         ResourceDescriptor::new("post")
//!             .permit(&["title", "author_id"])
//!             .scope(ScopeDescriptor::flag("published", "published", true))
//!             .belongs_to("author", "user"),
//!     )
//!     .resource(ResourceDescriptor::new("user").permit(&["name"]))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(graph.len(), 2);
//! ```

mod descriptor;
mod inflect;
pub mod registry;

pub use descriptor::{
    Action, ActionSet, AssociationDescriptor, AssociationKind, Cardinality, RemoteDescriptor,
    RemoteOn, ResourceDescriptor, ScopeDescriptor, ScopeRule, Through,
};
pub use inflect::pluralize;

use crate::error::DeclarationError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One step of a join path: follow `association` declared on `resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub resource: String,
    pub association: String,
}

/// Immutable set of resource descriptors, in declaration order
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    resources: Vec<Arc<ResourceDescriptor>>,
    index: HashMap<String, usize>,
}

impl ResourceGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ResourceDescriptor>> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<ResourceDescriptor>> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Builder seeded with this graph's declarations
    pub fn to_builder(&self) -> GraphBuilder {
        GraphBuilder {
            resources: self.resources.iter().map(|r| (**r).clone()).collect(),
        }
    }

    /// Expand an association into the ordered hops that reach its target.
    ///
    /// Direct associations are a single hop. Through associations expand the
    /// `through` association on the owner, then the `source` association on
    /// whatever that reaches, recursively.
    pub fn join_path(
        &self,
        owner: &ResourceDescriptor,
        association: &AssociationDescriptor,
    ) -> Result<Vec<Hop>, DeclarationError> {
        let mut stack = Vec::new();
        self.expand(owner, association, &mut stack).map(|(hops, _)| hops)
    }

    fn expand(
        &self,
        owner: &ResourceDescriptor,
        association: &AssociationDescriptor,
        stack: &mut Vec<(String, String)>,
    ) -> Result<(Vec<Hop>, String), DeclarationError> {
        let invalid = || DeclarationError::InvalidJoinPath {
            resource: owner.name.clone(),
            association: association.name.clone(),
        };

        let key = (owner.name.clone(), association.name.clone());
        if stack.contains(&key) {
            return Err(invalid());
        }

        if self.get(&association.target).is_none() {
            return Err(DeclarationError::UnknownAssociationTarget {
                resource: owner.name.clone(),
                association: association.name.clone(),
                target: association.target.clone(),
            });
        }

        let through = match (&association.through, association.kind.is_through()) {
            (None, false) => {
                let hop = Hop {
                    resource: owner.name.clone(),
                    association: association.name.clone(),
                };
                return Ok((vec![hop], association.target.clone()));
            },
            (Some(through), true) => through,
            _ => return Err(invalid()),
        };

        stack.push(key);

        let via = owner.association_named(&through.through).ok_or_else(|| {
            DeclarationError::UnknownThrough {
                resource: owner.name.clone(),
                association: association.name.clone(),
                through: through.through.clone(),
            }
        })?;
        let (mut hops, intermediate) = self.expand(owner, via, stack)?;

        let intermediate = self.get(&intermediate).ok_or_else(invalid)?;
        let source_name = association.source_name().unwrap_or(&association.name);
        let source = intermediate.association_named(source_name).ok_or_else(|| {
            DeclarationError::UnknownSource {
                resource: owner.name.clone(),
                association: association.name.clone(),
                source_name: source_name.to_string(),
                on: intermediate.name.clone(),
            }
        })?;
        let (tail, reached) = self.expand(intermediate, source, stack)?;

        stack.pop();

        if reached != association.target {
            return Err(DeclarationError::ThroughTargetMismatch {
                resource: owner.name.clone(),
                association: association.name.clone(),
                declared: association.target.clone(),
                actual: reached,
            });
        }

        hops.extend(tail);
        Ok((hops, reached))
    }
}

/// Collects declarations and checks their structural uniqueness.
///
/// Target resolution is checked by route synthesis: a client-side graph may
/// legitimately describe associations the serving side does not have.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    resources: Vec<ResourceDescriptor>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    /// Rework an already declared resource. Unknown names are left alone.
    pub fn update(
        mut self,
        name: &str,
        f: impl FnOnce(ResourceDescriptor) -> ResourceDescriptor,
    ) -> Self {
        if let Some(pos) = self.resources.iter().position(|r| r.name == name) {
            let current = self.resources.remove(pos);
            self.resources.insert(pos, f(current));
        }
        self
    }

    pub fn build(self) -> Result<ResourceGraph, DeclarationError> {
        let mut index = HashMap::new();

        for (i, resource) in self.resources.iter().enumerate() {
            if index.insert(resource.name.clone(), i).is_some() {
                return Err(DeclarationError::DuplicateResource(resource.name.clone()));
            }

            let mut scopes = HashSet::new();
            for scope in &resource.scopes {
                if !scopes.insert(scope.name.as_str()) {
                    return Err(DeclarationError::DuplicateScope {
                        resource: resource.name.clone(),
                        name: scope.name.clone(),
                    });
                }
            }

            // Associations and remotes share one accessor namespace
            let mut members = HashSet::new();
            let names = resource
                .associations
                .iter()
                .map(|a| a.name.as_str())
                .chain(resource.remotes.iter().map(|r| r.name.as_str()));
            for name in names {
                if !members.insert(name) {
                    return Err(DeclarationError::DuplicateMember {
                        resource: resource.name.clone(),
                        name: name.to_string(),
                    });
                }
            }
        }

        tracing::debug!("resource graph built with {} resources", self.resources.len());

        Ok(ResourceGraph {
            resources: self.resources.into_iter().map(Arc::new).collect(),
            index,
        })
    }
}
