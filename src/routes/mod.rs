//! Route table
//!
//! Routes are derived from the resource graph, never hand-authored. The
//! table is ordered by specificity so that a first-match router (the host
//! framework's, or [`RouteTable::recognize`]) never shadows a nested or
//! remote path with a member path.
//!
//! - [`synthesize`] - Builds the table from a graph
//! - [`RoutingHandle`] - Atomically swappable graph + table snapshot

mod reload;
mod synthesize;

pub use reload::{Routing, RoutingHandle};
pub use synthesize::{synthesize, validate};

use crate::error::ApiError;
use crate::graph::Action;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for the member key in path templates
pub const ID_PARAM: &str = "{id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PATCH" => Some(Self::Patch),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for reqwest::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

/// What a route addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteKind {
    Collection,
    Member,
    Nested { association: String },
    RemoteMember { remote: String },
    RemoteCollection { remote: String },
}

impl RouteKind {
    /// Whether the path carries the owner's key
    pub fn has_member_key(&self) -> bool {
        matches!(
            self,
            Self::Member | Self::Nested { .. } | Self::RemoteMember { .. }
        )
    }
}

/// One synthesized route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub verb: Verb,
    pub path: String,
    /// Resource owning the path
    pub resource: String,
    /// Resource whose records the route returns
    pub target: String,
    pub action: Action,
    #[serde(flatten)]
    pub kind: RouteKind,
    /// Declared filter vocabulary of `target`
    pub filters: Vec<String>,
}

impl RouteEntry {
    /// Match a concrete path, returning the captured member key if any
    fn capture(&self, path: &str) -> Option<Option<String>> {
        let template = self.path.trim_matches('/').split('/');
        let mut actual = path.trim_matches('/').split('/');
        let mut id = None;

        for expected in template {
            let segment = actual.next()?;
            if expected == ID_PARAM {
                if segment.is_empty() {
                    return None;
                }
                let decoded = urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string());
                id = Some(decoded);
            } else if expected != segment {
                return None;
            }
        }

        if actual.next().is_some() {
            return None;
        }
        Some(id)
    }
}

/// A route recognized for a concrete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub entry: RouteEntry,
    pub id: Option<String>,
}

/// Ordered, immutable route table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub(crate) fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first route whose verb and template match.
    ///
    /// A path that matches only under other verbs is reported as
    /// [`ApiError::ActionNotHandled`], not as a missing route.
    pub fn recognize(&self, verb: Verb, path: &str) -> Result<RouteMatch, ApiError> {
        let mut path_known_as: Option<&RouteEntry> = None;

        for entry in &self.entries {
            let Some(id) = entry.capture(path) else {
                continue;
            };
            if entry.verb == verb {
                tracing::debug!("{} {} -> {} {}", verb, path, entry.verb, entry.path);
                return Ok(RouteMatch {
                    entry: entry.clone(),
                    id,
                });
            }
            path_known_as.get_or_insert(entry);
        }

        match path_known_as {
            Some(entry) => Err(ApiError::ActionNotHandled {
                resource: entry.resource.clone(),
                action: verb.to_string(),
            }),
            None => Err(ApiError::RouteNotFound {
                verb: verb.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// Human-readable listing, one route per line
    pub fn render(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|e| e.path.len())
            .max()
            .unwrap_or(0);

        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{:<6} {:<width$}  {}#{}",
                    e.verb.as_str(),
                    e.path,
                    e.resource,
                    e.action,
                    width = width
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
