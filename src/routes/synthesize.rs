//! Route synthesis
//!
//! Per resource (in declaration order) routes are emitted most specific
//! first: nested association routes, member remotes, collection remotes,
//! member CRUD routes, then collection routes. Within each group declaration
//! order breaks ties.

use super::{RouteEntry, RouteKind, RouteTable, Verb, ID_PARAM};
use crate::error::DeclarationError;
use crate::graph::{Action, AssociationKind, RemoteOn, ResourceDescriptor, ResourceGraph};

/// Check every cross-resource reference in the graph.
///
/// Runs the full set of checks synthesis depends on: association and remote
/// targets resolve, through associations have a valid join path, creatable
/// nested routes sit on a direct `has_many`, default includes exist.
pub fn validate(graph: &ResourceGraph) -> Result<(), DeclarationError> {
    for resource in graph.resources() {
        for association in &resource.associations {
            if graph.get(&association.target).is_none() {
                return Err(DeclarationError::UnknownAssociationTarget {
                    resource: resource.name.clone(),
                    association: association.name.clone(),
                    target: association.target.clone(),
                });
            }

            graph.join_path(resource, association)?;

            if association.creatable
                && (association.kind != AssociationKind::HasMany || !association.associated)
            {
                return Err(DeclarationError::NotCreatable {
                    resource: resource.name.clone(),
                    association: association.name.clone(),
                });
            }
        }

        for remote in &resource.remotes {
            if graph.get(&remote.target).is_none() {
                return Err(DeclarationError::UnknownRemoteTarget {
                    resource: resource.name.clone(),
                    remote: remote.name.clone(),
                    target: remote.target.clone(),
                });
            }
        }

        for include in &resource.default_includes {
            if resource.association_named(include).is_none() {
                return Err(DeclarationError::UnknownDefaultInclude {
                    resource: resource.name.clone(),
                    association: include.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Build the ordered route table for a graph
pub fn synthesize(graph: &ResourceGraph) -> Result<RouteTable, DeclarationError> {
    validate(graph)?;

    let mut entries = Vec::new();
    for resource in graph.resources() {
        emit_resource(graph, resource, &mut entries);
    }

    tracing::debug!(
        "synthesized {} routes for {} resources",
        entries.len(),
        graph.len()
    );

    Ok(RouteTable::new(entries))
}

fn emit_resource(graph: &ResourceGraph, resource: &ResourceDescriptor, out: &mut Vec<RouteEntry>) {
    let collection = format!("/{}", resource.path_segment());
    let member = format!("{collection}/{ID_PARAM}");
    let own_filters = resource.scope_names();

    let filters_of = |target: &str| {
        graph
            .get(target)
            .map(|t| t.scope_names())
            .unwrap_or_default()
    };

    let route = |verb, path: String, target: &str, action, kind, filters: Vec<String>| RouteEntry {
        verb,
        path,
        resource: resource.name.clone(),
        target: target.to_string(),
        action,
        kind,
        filters,
    };

    if resource.permits(Action::Associated) {
        for association in resource.associations.iter().filter(|a| a.associated) {
            let path = format!("{member}/{}", association.name);
            let kind = RouteKind::Nested {
                association: association.name.clone(),
            };
            let filters = if association.kind.is_singular() {
                Vec::new()
            } else {
                filters_of(&association.target)
            };

            out.push(route(
                Verb::Get,
                path.clone(),
                &association.target,
                Action::Associated,
                kind.clone(),
                filters,
            ));

            let target_creates = graph
                .get(&association.target)
                .is_some_and(|t| t.permits(Action::Create));
            if association.creatable && target_creates {
                out.push(route(
                    Verb::Post,
                    path,
                    &association.target,
                    Action::Create,
                    kind,
                    Vec::new(),
                ));
            }
        }
    }

    if resource.permits(Action::Remoted) {
        let (member_remotes, collection_remotes): (Vec<_>, Vec<_>) = resource
            .remotes
            .iter()
            .partition(|r| r.on == RemoteOn::Member);

        for remote in member_remotes {
            out.push(route(
                Verb::Get,
                format!("{member}/{}", remote.name),
                &remote.target,
                Action::Remoted,
                RouteKind::RemoteMember {
                    remote: remote.name.clone(),
                },
                Vec::new(),
            ));
        }
        for remote in collection_remotes {
            out.push(route(
                Verb::Get,
                format!("{collection}/{}", remote.name),
                &remote.target,
                Action::Remoted,
                RouteKind::RemoteCollection {
                    remote: remote.name.clone(),
                },
                Vec::new(),
            ));
        }
    }

    let member_routes = [
        (Verb::Get, Action::Show),
        (Verb::Patch, Action::Update),
        (Verb::Put, Action::Update),
        (Verb::Delete, Action::Destroy),
    ];
    for (verb, action) in member_routes {
        if resource.permits(action) {
            out.push(route(
                verb,
                member.clone(),
                &resource.name,
                action,
                RouteKind::Member,
                Vec::new(),
            ));
        }
    }

    let collection_routes = [(Verb::Get, Action::Index), (Verb::Post, Action::Create)];
    for (verb, action) in collection_routes {
        if resource.permits(action) {
            let filters = if action == Action::Index {
                own_filters.clone()
            } else {
                Vec::new()
            };
            out.push(route(
                verb,
                collection.clone(),
                &resource.name,
                action,
                RouteKind::Collection,
                filters,
            ));
        }
    }
}
