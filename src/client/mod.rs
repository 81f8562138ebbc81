//! Client association proxy
//!
//! Mirrors a resource graph on the consuming side. [`ApiClient::resource`]
//! starts a [`ResourceQuery`]; fetched records come back as
//! [`ClientRecord`] handles whose associations, scopes and remotes are
//! resolved lazily over a [`Transport`] and cached per handle.
//!
//! The client graph may declare more than the server serves. Such accessors
//! fail with a typed [`FetchError`] instead of returning empty results.

mod http;
mod local;
mod record;

pub use http::{HttpTransport, Transport, TransportResponse};
pub use local::LocalTransport;
pub use record::{ClientRecord, Loaded};

use crate::error::FetchError;
use crate::graph::{Cardinality, RemoteOn, ResourceDescriptor, ResourceGraph};
use crate::query::Record;
use crate::routes::Verb;
use crate::server::{member_path, Params};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

struct ClientInner<T> {
    transport: T,
    graph: Arc<ResourceGraph>,
}

/// Entry point of the client proxy; cheap to clone
pub struct ApiClient<T: Transport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// One page of a collection
pub struct Collection<T: Transport> {
    pub records: Vec<Arc<ClientRecord<T>>>,
    /// Total matches on the server, ignoring paging
    pub total: usize,
}

impl<T: Transport> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("records", &self.records)
            .field("total", &self.total)
            .finish()
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(graph: impl Into<Arc<ResourceGraph>>, transport: T) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                graph: graph.into(),
            }),
        }
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.inner.graph
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Start a query against a declared resource
    pub fn resource(&self, name: &str) -> Result<ResourceQuery<T>, FetchError> {
        Ok(ResourceQuery {
            client: self.clone(),
            descriptor: self.descriptor(name)?,
            params: Params::default(),
        })
    }

    pub(crate) fn descriptor(&self, name: &str) -> Result<Arc<ResourceDescriptor>, FetchError> {
        self.inner
            .graph
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::Undeclared {
                resource: "graph".to_string(),
                name: name.to_string(),
            })
    }

    /// Send one request; non-success statuses become typed errors
    pub(crate) async fn send(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> Result<TransportResponse, FetchError> {
        tracing::debug!("fetch {} {}", verb, path);
        let response = self.inner.transport.request(verb, path, params, body).await?;

        if !response.status.is_success() {
            let err = FetchError::from_response(response.status, &response.body, path);
            tracing::debug!("fetch {} {} failed: {}", verb, path, err);
            return Err(err);
        }
        Ok(response)
    }

    /// Mutation bodies travel wrapped in the member key
    pub(crate) fn wrap(&self, descriptor: &ResourceDescriptor, attrs: Value) -> Value {
        let mut body = Map::new();
        body.insert(descriptor.member_key().to_string(), attrs);
        Value::Object(body)
    }

    pub(crate) async fn fetch(
        &self,
        target: &Arc<ResourceDescriptor>,
        path: &str,
        params: &Params,
        singular: bool,
    ) -> Result<Loaded<T>, FetchError> {
        if singular {
            let response = self.send(Verb::Get, path, params, None).await?;
            Ok(Loaded::One(self.decode_member(target, &response.body, params)?))
        } else {
            Ok(Loaded::Many(self.fetch_every(target, path, params).await?.into()))
        }
    }

    /// Every record a collection route reaches, following `meta.total`
    /// across pages
    pub(crate) async fn fetch_every(
        &self,
        target: &Arc<ResourceDescriptor>,
        path: &str,
        params: &Params,
    ) -> Result<Vec<Arc<ClientRecord<T>>>, FetchError> {
        let mut records = self.fetch_collection(target, path, params).await?;
        while records.records.len() < records.total {
            let page_params = params.clone().offset(records.records.len());
            let page = self.fetch_collection(target, path, &page_params).await?;
            if page.records.is_empty() {
                tracing::warn!(
                    "{} reported {} records but stopped after {}",
                    path,
                    records.total,
                    records.records.len()
                );
                break;
            }
            records.records.extend(page.records);
        }
        Ok(records.records)
    }

    pub(crate) async fn fetch_collection(
        &self,
        target: &Arc<ResourceDescriptor>,
        path: &str,
        params: &Params,
    ) -> Result<Collection<T>, FetchError> {
        let response = self.send(Verb::Get, path, params, None).await?;
        self.decode_collection(target, &response.body, params)
    }

    /// Decode a member envelope; `params` is the request that produced it,
    /// so only the associations it asked for are read as nested data
    pub(crate) fn decode_member(
        &self,
        descriptor: &Arc<ResourceDescriptor>,
        body: &Value,
        params: &Params,
    ) -> Result<Option<Arc<ClientRecord<T>>>, FetchError> {
        let key = descriptor.member_key();
        match body.get(key) {
            Some(Value::Object(record)) => Ok(Some(self.record(descriptor, record.clone(), params))),
            Some(Value::Null) => Ok(None),
            _ => Err(FetchError::Decode(format!("response has no `{key}` envelope"))),
        }
    }

    pub(crate) fn decode_collection(
        &self,
        descriptor: &Arc<ResourceDescriptor>,
        body: &Value,
        params: &Params,
    ) -> Result<Collection<T>, FetchError> {
        let key = descriptor.collection_key();
        let Some(Value::Array(items)) = body.get(&key) else {
            return Err(FetchError::Decode(format!("response has no `{key}` envelope")));
        };

        let records = items
            .iter()
            .map(|item| match item {
                Value::Object(record) => Ok(self.record(descriptor, record.clone(), params)),
                other => Err(FetchError::Decode(format!("expected a record, got {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = body
            .pointer("/meta/total")
            .and_then(Value::as_u64)
            .map(|t| t as usize)
            .unwrap_or(records.len());

        Ok(Collection { records, total })
    }

    fn record(&self, descriptor: &Arc<ResourceDescriptor>, attributes: Record, params: &Params) -> Arc<ClientRecord<T>> {
        let included: Vec<&str> = params
            .include
            .iter()
            .chain(&descriptor.default_includes)
            .map(String::as_str)
            .collect();
        Arc::new(ClientRecord::hydrate(self, Arc::clone(descriptor), attributes, &included))
    }
}

/// Collection request under construction
pub struct ResourceQuery<T: Transport> {
    client: ApiClient<T>,
    descriptor: Arc<ResourceDescriptor>,
    params: Params,
}

impl<T: Transport> ResourceQuery<T> {
    /// Narrow by a declared scope; the key sent is the scope name itself
    pub fn filter(mut self, scope: &str, value: impl Into<Value>) -> Self {
        self.params = self.params.filter(scope, value);
        self
    }

    /// Apply a parameterless scope
    pub fn scope(mut self, scope: &str) -> Self {
        self.params = self.params.scope(scope);
        self
    }

    pub fn order(mut self, clause: &str) -> Self {
        self.params = self.params.order(clause);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params = self.params.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.params = self.params.offset(offset);
        self
    }

    /// Ask the server to nest an association in the response
    pub fn include(mut self, association: &str) -> Self {
        self.params = self.params.include(association);
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    fn check_declared(&self) -> Result<(), FetchError> {
        let undeclared = self
            .params
            .filters
            .iter()
            .map(|(name, _)| name)
            .chain(&self.params.scopes)
            .find(|name| self.descriptor.scope_named(name).is_none());

        match undeclared {
            Some(name) => Err(FetchError::Undeclared {
                resource: self.descriptor.name.clone(),
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn collection_path(&self) -> String {
        format!("/{}", self.descriptor.path_segment())
    }

    pub async fn all(&self) -> Result<Collection<T>, FetchError> {
        self.check_declared()?;
        self.client
            .fetch_collection(&self.descriptor, &self.collection_path(), &self.params)
            .await
    }

    pub async fn first(&self) -> Result<Option<Arc<ClientRecord<T>>>, FetchError> {
        self.check_declared()?;
        let params = self.params.clone().limit(1);
        let collection = self
            .client
            .fetch_collection(&self.descriptor, &self.collection_path(), &params)
            .await?;
        Ok(collection.records.into_iter().next())
    }

    /// Fetch one record through its member route
    pub async fn find(&self, id: impl Into<Value>) -> Result<Arc<ClientRecord<T>>, FetchError> {
        let path = member_path(&self.descriptor, &id.into());
        let response = self.client.send(Verb::Get, &path, &self.params, None).await?;
        self.client
            .decode_member(&self.descriptor, &response.body, &self.params)?
            .ok_or_else(|| FetchError::NotFound(path))
    }

    pub async fn create(&self, attrs: Value) -> Result<Arc<ClientRecord<T>>, FetchError> {
        let body = self.client.wrap(&self.descriptor, attrs);
        let response = self
            .client
            .send(Verb::Post, &self.collection_path(), &Params::default(), Some(&body))
            .await?;
        if let Some(location) = &response.location {
            tracing::debug!("created {} at {}", self.descriptor.name, location);
        }
        self.client
            .decode_member(&self.descriptor, &response.body, &Params::default())?
            .ok_or_else(|| FetchError::Decode(format!("empty `{}` envelope", self.descriptor.member_key())))
    }

    /// Call a collection-level remote
    pub async fn remote(&self, name: &str) -> Result<Loaded<T>, FetchError> {
        let remote = self
            .descriptor
            .remote_named(name)
            .filter(|r| r.on == RemoteOn::Collection)
            .ok_or_else(|| FetchError::Undeclared {
                resource: self.descriptor.name.clone(),
                name: name.to_string(),
            })?;
        let target = self.client.descriptor(&remote.target)?;
        let path = format!("{}/{}", self.collection_path(), remote.name);
        self.client
            .fetch(&target, &path, &Params::default(), remote.returns == Cardinality::One)
            .await
    }
}
