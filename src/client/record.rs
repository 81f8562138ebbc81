//! Client-side record handles and their association cache

use super::{ApiClient, Transport};
use crate::error::FetchError;
use crate::graph::{
    AssociationDescriptor, AssociationKind, Cardinality, RemoteDescriptor, RemoteOn, ResourceDescriptor,
};
use crate::query::Record;
use crate::routes::Verb;
use crate::server::{member_path, Params};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A resolved association or remote
pub enum Loaded<T: Transport> {
    One(Option<Arc<ClientRecord<T>>>),
    Many(Arc<[Arc<ClientRecord<T>>]>),
}

impl<T: Transport> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        match self {
            Self::One(record) => Self::One(record.clone()),
            Self::Many(records) => Self::Many(Arc::clone(records)),
        }
    }
}

impl<T: Transport> fmt::Debug for Loaded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(record) => f.debug_tuple("One").field(record).finish(),
            Self::Many(records) => f.debug_tuple("Many").field(&records.len()).finish(),
        }
    }
}

impl<T: Transport> Loaded<T> {
    pub fn one(&self) -> Option<&Arc<ClientRecord<T>>> {
        match self {
            Self::One(record) => record.as_ref(),
            Self::Many(records) => records.first(),
        }
    }

    pub fn many(&self) -> &[Arc<ClientRecord<T>>] {
        match self {
            Self::One(Some(record)) => std::slice::from_ref(record),
            Self::One(None) => &[],
            Self::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.many().len()
    }

    pub fn is_empty(&self) -> bool {
        self.many().is_empty()
    }
}

/// One fetched record plus the associations resolved from it so far.
///
/// Associations are fetched on first access and cached on the handle; later
/// accesses return the cached records until [`ClientRecord::reload`].
pub struct ClientRecord<T: Transport> {
    client: ApiClient<T>,
    descriptor: Arc<ResourceDescriptor>,
    attributes: Record,
    cache: RwLock<HashMap<String, Loaded<T>>>,
}

impl<T: Transport> fmt::Debug for ClientRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRecord")
            .field("resource", &self.descriptor.name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl<T: Transport> ClientRecord<T> {
    /// Build a handle from an envelope record, moving the nested data of the
    /// `included` associations into the cache. Other attributes stay as sent,
    /// even when they share an association's name.
    pub(crate) fn hydrate(
        client: &ApiClient<T>,
        descriptor: Arc<ResourceDescriptor>,
        mut attributes: Record,
        included: &[&str],
    ) -> Self {
        let mut cache = HashMap::new();

        for association in descriptor
            .associations
            .iter()
            .filter(|a| included.contains(&a.name.as_str()))
        {
            let Some(nested) = attributes.get(&association.name) else {
                continue;
            };
            if !matches!(nested, Value::Object(_) | Value::Array(_) | Value::Null) {
                continue;
            }
            let Some(target) = client.graph().get(&association.target).cloned() else {
                continue;
            };
            let Some(nested) = attributes.remove(&association.name) else {
                continue;
            };

            let loaded = match nested {
                Value::Array(items) => Loaded::Many(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(record) => {
                                Some(Arc::new(Self::hydrate(client, Arc::clone(&target), record, &[])))
                            },
                            _ => None,
                        })
                        .collect(),
                ),
                Value::Object(record) => Loaded::One(Some(Arc::new(Self::hydrate(client, target, record, &[])))),
                _ => Loaded::One(None),
            };
            cache.insert(association.name.clone(), loaded);
        }

        Self {
            client: client.clone(),
            descriptor,
            attributes,
            cache: RwLock::new(cache),
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn attributes(&self) -> &Record {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Primary key value, if the server sent one
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(&self.descriptor.primary_key)
            .filter(|v| !v.is_null())
    }

    fn path(&self) -> Result<String, FetchError> {
        let id = self
            .id()
            .ok_or_else(|| FetchError::MissingKey(self.descriptor.name.clone()))?;
        Ok(member_path(&self.descriptor, id))
    }

    pub async fn is_loaded(&self, name: &str) -> bool {
        self.cache.read().await.contains_key(name)
    }

    /// Resolve an association or remote by name, fetching on first access
    pub fn association<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Loaded<T>, FetchError>> {
        async move {
            if let Some(cached) = self.cache.read().await.get(name) {
                return Ok(cached.clone());
            }

            let fetched = if let Some(association) = self.descriptor.association_named(name) {
                self.fetch_association(association).await?
            } else if let Some(remote) = self.descriptor.remote_named(name) {
                self.fetch_remote(remote).await?
            } else {
                return Err(FetchError::Undeclared {
                    resource: self.descriptor.name.clone(),
                    name: name.to_string(),
                });
            };

            // A concurrent fetch may have won; keep whichever landed first
            let mut cache = self.cache.write().await;
            Ok(cache.entry(name.to_string()).or_insert(fetched).clone())
        }
        .boxed()
    }

    /// Resolve a remote endpoint; remotes share the association namespace
    pub async fn remote(&self, name: &str) -> Result<Loaded<T>, FetchError> {
        if self.descriptor.remote_named(name).is_none() {
            return Err(FetchError::Undeclared {
                resource: self.descriptor.name.clone(),
                name: name.to_string(),
            });
        }
        self.association(name).await
    }

    /// Drop the cached value and fetch again
    pub async fn reload(&self, name: &str) -> Result<Loaded<T>, FetchError> {
        self.cache.write().await.remove(name);
        self.association(name).await
    }

    /// Eager-load several associations concurrently. Each one succeeds or
    /// fails on its own; results come back in `names` order.
    pub async fn load(&self, names: &[&str]) -> Vec<Result<Loaded<T>, FetchError>> {
        join_all(names.iter().map(|name| self.association(name))).await
    }

    /// PATCH the given attributes and return the updated record
    pub async fn update(&self, attrs: Value) -> Result<Arc<ClientRecord<T>>, FetchError> {
        let path = self.path()?;
        let body = self.client.wrap(&self.descriptor, attrs);
        let response = self
            .client
            .send(Verb::Patch, &path, &Params::default(), Some(&body))
            .await?;
        self.client
            .decode_member(&self.descriptor, &response.body, &Params::default())?
            .ok_or_else(|| FetchError::Decode(format!("empty `{}` envelope", self.descriptor.member_key())))
    }

    pub async fn destroy(&self) -> Result<(), FetchError> {
        let path = self.path()?;
        self.client
            .send(Verb::Delete, &path, &Params::default(), None)
            .await?;
        Ok(())
    }

    async fn fetch_association(&self, association: &AssociationDescriptor) -> Result<Loaded<T>, FetchError> {
        let target = self.client.descriptor(&association.target)?;

        if association.associated {
            let path = format!("{}/{}", self.path()?, association.name);
            return self
                .client
                .fetch(&target, &path, &Params::default(), association.kind.is_singular())
                .await;
        }

        match association.kind {
            AssociationKind::HasManyThrough | AssociationKind::HasOneThrough => {
                self.fetch_through(association).await
            },
            AssociationKind::BelongsTo => {
                let foreign_key = association.foreign_key_for(&self.descriptor);
                match self.attributes.get(&foreign_key) {
                    None | Some(Value::Null) => Ok(Loaded::One(None)),
                    Some(key) => {
                        let path = member_path(&target, key);
                        self.client.fetch(&target, &path, &Params::default(), true).await
                    },
                }
            },
            AssociationKind::HasMany | AssociationKind::HasOne => {
                let id = self
                    .id()
                    .ok_or_else(|| FetchError::MissingKey(self.descriptor.name.clone()))?;
                let mut params = Params::new().filter(&association.foreign_key_for(&self.descriptor), id.clone());
                let singular = association.kind.is_singular();
                if singular {
                    params = params.limit(1);
                }

                let path = format!("/{}", target.path_segment());
                if singular {
                    let collection = self.client.fetch_collection(&target, &path, &params).await?;
                    Ok(Loaded::One(collection.records.into_iter().next()))
                } else {
                    Ok(Loaded::Many(self.client.fetch_every(&target, &path, &params).await?.into()))
                }
            },
        }
    }

    /// Walk the join path: resolve the intermediate association, then the
    /// source association on each intermediate record, reusing their caches
    async fn fetch_through(&self, association: &AssociationDescriptor) -> Result<Loaded<T>, FetchError> {
        let through = association
            .through
            .as_ref()
            .ok_or_else(|| FetchError::Undeclared {
                resource: self.descriptor.name.clone(),
                name: association.name.clone(),
            })?;
        let source = association.source_name().unwrap_or(&association.name).to_string();

        let via = self.association(&through.through).await?;

        let mut reached: Vec<Arc<ClientRecord<T>>> = Vec::new();
        for intermediate in via.many() {
            let loaded = intermediate.association(&source).await?;
            for record in loaded.many() {
                if !reached.iter().any(|r| r.id().is_some() && r.id() == record.id()) {
                    reached.push(Arc::clone(record));
                }
            }
        }

        Ok(if association.kind.is_singular() {
            Loaded::One(reached.into_iter().next())
        } else {
            Loaded::Many(reached.into())
        })
    }

    async fn fetch_remote(&self, remote: &RemoteDescriptor) -> Result<Loaded<T>, FetchError> {
        if remote.on == RemoteOn::Collection {
            return Err(FetchError::Undeclared {
                resource: self.descriptor.name.clone(),
                name: remote.name.clone(),
            });
        }
        let target = self.client.descriptor(&remote.target)?;
        let path = format!("{}/{}", self.path()?, remote.name);
        self.client
            .fetch(&target, &path, &Params::default(), remote.returns == Cardinality::One)
            .await
    }
}
