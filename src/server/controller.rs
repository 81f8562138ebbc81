//! Generic resource controller
//!
//! One controller serves every resource in the graph. Each request walks
//! `RouteMatched -> ModelResolved -> QueryRefined -> ActionExecuted ->
//! ResponseSerialized`; any step may fail, and every failure is turned into
//! the error envelope here. Nothing propagates past [`Controller::dispatch`].

use super::envelope::{self, Meta};
use super::params::Params;
use super::remote::{RemoteContext, RemoteHandler};
use crate::error::{ApiError, DeclarationError, FieldErrors, RefineError};
use crate::graph::{Action, AssociationDescriptor, AssociationKind, Cardinality, ResourceDescriptor, ResourceGraph};
use crate::query::{key_to_string, refine_request, PageLimits, Predicate, Query, Record, Store};
use crate::routes::{RouteKind, RouteMatch, Routing, RoutingHandle, Verb};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Controller tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    pub page: PageLimits,
}

/// An inbound request, already split into verb, path and parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub verb: Verb,
    pub path: String,
    pub params: Params,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(verb: Verb, path: &str) -> Self {
        Self {
            verb,
            path: path.to_string(),
            params: Params::default(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Verb::Get, path)
    }

    pub fn post(path: &str, body: Value) -> Self {
        Self::new(Verb::Post, path).body(body)
    }

    pub fn patch(path: &str, body: Value) -> Self {
        Self::new(Verb::Patch, path).body(body)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Verb::Delete, path)
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Member path of a newly created record
    pub location: Option<String>,
    pub body: Value,
}

/// Last request phase reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    RouteMatched,
    ModelResolved,
    QueryRefined,
    ActionExecuted,
    ResponseSerialized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::RouteMatched => "ROUTE_MATCHED",
            Self::ModelResolved => "MODEL_RESOLVED",
            Self::QueryRefined => "QUERY_REFINED",
            Self::ActionExecuted => "ACTION_EXECUTED",
            Self::ResponseSerialized => "RESPONSE_SERIALIZED",
        };
        f.write_str(name)
    }
}

struct Failure {
    phase: Phase,
    error: ApiError,
}

trait AtPhase<T> {
    fn at(self, phase: Phase) -> Result<T, Failure>;
}

impl<T, E: Into<ApiError>> AtPhase<T> for Result<T, E> {
    fn at(self, phase: Phase) -> Result<T, Failure> {
        self.map_err(|e| Failure {
            phase,
            error: e.into(),
        })
    }
}

enum Outcome<'g> {
    Collection {
        descriptor: &'g ResourceDescriptor,
        records: Vec<Record>,
        meta: Meta,
    },
    Member {
        descriptor: &'g ResourceDescriptor,
        record: Option<Record>,
        status: StatusCode,
        location: Option<String>,
    },
}

pub struct Controller {
    routing: RoutingHandle,
    store: Arc<dyn Store>,
    remotes: HashMap<(String, String), Arc<dyn RemoteHandler>>,
    config: ControllerConfig,
}

impl Controller {
    /// Synthesize routes for `graph`; an invalid graph never serves
    pub fn new(
        graph: ResourceGraph,
        store: Arc<dyn Store>,
        config: ControllerConfig,
    ) -> Result<Self, DeclarationError> {
        Ok(Self {
            routing: RoutingHandle::new(graph)?,
            store,
            remotes: HashMap::new(),
            config,
        })
    }

    /// Bind the computation behind a declared remote endpoint
    pub fn bind_remote(
        mut self,
        resource: &str,
        remote: &str,
        handler: impl RemoteHandler + 'static,
    ) -> Self {
        self.remotes
            .insert((resource.to_string(), remote.to_string()), Arc::new(handler));
        self
    }

    pub fn routing(&self) -> Arc<Routing> {
        self.routing.snapshot()
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Swap in a new graph; in-flight requests finish on the old one
    pub fn reload(&self, graph: ResourceGraph) -> Result<(), DeclarationError> {
        self.routing.reload(graph)
    }

    /// Route and handle one request
    pub fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %request_id, verb = %request.verb, path = %request.path);
        let _enter = span.enter();

        let routing = self.routing.snapshot();
        match routing.table.recognize(request.verb, &request.path) {
            Ok(route) => self.run(&routing, &route, request),
            Err(error) => self.fail(Failure {
                phase: Phase::Received,
                error,
            }),
        }
    }

    /// Handle a request the host router already matched
    pub fn handle(&self, route: &RouteMatch, request: ApiRequest) -> ApiResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %request_id, verb = %request.verb, path = %request.path);
        let _enter = span.enter();

        let routing = self.routing.snapshot();
        self.run(&routing, route, request)
    }

    fn run(&self, routing: &Routing, route: &RouteMatch, request: ApiRequest) -> ApiResponse {
        match self.execute(&routing.graph, route, request) {
            Ok(response) => {
                tracing::debug!("{} -> {}", Phase::ResponseSerialized, response.status);
                response
            },
            Err(failure) => self.fail(failure),
        }
    }

    fn fail(&self, failure: Failure) -> ApiResponse {
        let Failure { phase, error } = failure;
        if error.is_server_fault() {
            tracing::error!("request failed after {}: {}", phase, error);
        } else {
            tracing::debug!("request rejected after {}: {}", phase, error);
        }

        ApiResponse {
            status: error.status(),
            location: None,
            body: error.envelope(),
        }
    }

    fn execute(&self, graph: &ResourceGraph, route: &RouteMatch, request: ApiRequest) -> Result<ApiResponse, Failure> {
        let entry = &route.entry;

        // ROUTE_MATCHED -> MODEL_RESOLVED
        let owner = self.resolve(graph, &entry.resource).at(Phase::RouteMatched)?;
        let target = self.resolve(graph, &entry.target).at(Phase::RouteMatched)?;
        self.gate(owner, target, route).at(Phase::RouteMatched)?;
        tracing::debug!("{}: {} -> {}", Phase::ModelResolved, owner.model_name(), target.model_name());

        // MODEL_RESOLVED -> QUERY_REFINED
        check_vocabulary(route, &request.params).at(Phase::ModelResolved)?;
        let includes = self.includes(target, &request.params).at(Phase::ModelResolved)?;
        let refined = refine_request(
            Query::new(target.model_name()),
            target,
            &request.params.refinement(),
            self.config.page,
        )
        .at(Phase::ModelResolved)?;
        tracing::debug!("{}: {} predicates", Phase::QueryRefined, refined.predicates.len());

        // QUERY_REFINED -> ACTION_EXECUTED
        let outcome = self
            .act(graph, owner, target, route, refined, request.body)
            .at(Phase::QueryRefined)?;

        // ACTION_EXECUTED -> RESPONSE_SERIALIZED
        self.serialize(graph, outcome, &includes).at(Phase::ActionExecuted)
    }

    fn resolve<'g>(&self, graph: &'g ResourceGraph, name: &str) -> Result<&'g ResourceDescriptor, ApiError> {
        let descriptor = graph
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| ApiError::ResourceNotConfigured(name.to_string()))?;
        if !self.store.has_model(descriptor.model_name()) {
            return Err(ApiError::ResourceNotConfigured(descriptor.model_name().to_string()));
        }
        Ok(descriptor)
    }

    /// The owner must handle the route's action family; nested creates also
    /// need the target to accept creates
    fn gate(&self, owner: &ResourceDescriptor, target: &ResourceDescriptor, route: &RouteMatch) -> Result<(), ApiError> {
        let entry = &route.entry;
        let required = match entry.kind {
            RouteKind::Nested { .. } => Action::Associated,
            RouteKind::RemoteMember { .. } | RouteKind::RemoteCollection { .. } => Action::Remoted,
            RouteKind::Collection | RouteKind::Member => entry.action,
        };

        let nested_create = matches!(entry.kind, RouteKind::Nested { .. }) && entry.action == Action::Create;
        if !owner.permits(required) || (nested_create && !target.permits(Action::Create)) {
            return Err(ApiError::ActionNotHandled {
                resource: owner.name.clone(),
                action: entry.action.to_string(),
            });
        }

        if entry.kind.has_member_key() && route.id.is_none() {
            return Err(ApiError::BadRequest("missing record key".to_string()));
        }
        Ok(())
    }

    fn includes<'d>(&self, target: &'d ResourceDescriptor, params: &Params) -> Result<Vec<&'d AssociationDescriptor>, ApiError> {
        let mut names: Vec<&str> = Vec::new();
        for name in params.include.iter().chain(&target.default_includes) {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }

        names
            .into_iter()
            .map(|name| {
                target
                    .association_named(name)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown include `{name}`")))
            })
            .collect()
    }

    fn act<'g>(
        &self,
        graph: &'g ResourceGraph,
        owner: &'g ResourceDescriptor,
        target: &'g ResourceDescriptor,
        route: &RouteMatch,
        refined: Query,
        body: Option<Value>,
    ) -> Result<Outcome<'g>, ApiError> {
        let entry = &route.entry;
        let id = route.id.as_deref().unwrap_or_default();

        match (&entry.kind, entry.action) {
            (RouteKind::Collection, Action::Index) => self.list(target, refined),

            (RouteKind::Collection, Action::Create) => {
                let attrs = permitted_attrs(target, body.as_ref())?;
                self.create(target, attrs)
            },

            (RouteKind::Member, Action::Show) => Ok(Outcome::Member {
                descriptor: target,
                record: Some(self.find(target, id)?),
                status: StatusCode::OK,
                location: None,
            }),

            (RouteKind::Member, Action::Update) => {
                let existing = self.find(target, id)?;
                let mut attrs = permitted_attrs(target, body.as_ref())?;

                let mut merged = existing.clone();
                merged.extend(attrs.clone());
                validate_presence(target, &merged)?;

                if target.timestamps {
                    attrs.insert("updated_at".to_string(), Value::String(now()));
                }
                let key = existing.get(&target.primary_key).cloned().unwrap_or(Value::Null);
                let record = self
                    .store
                    .update(target.model_name(), &target.primary_key, &key, attrs)?;
                Ok(Outcome::Member {
                    descriptor: target,
                    record: Some(record),
                    status: StatusCode::OK,
                    location: None,
                })
            },

            (RouteKind::Member, Action::Destroy) => {
                let existing = self.find(target, id)?;
                let key = existing.get(&target.primary_key).cloned().unwrap_or(Value::Null);
                let record = self
                    .store
                    .delete(target.model_name(), &target.primary_key, &key)?;
                Ok(Outcome::Member {
                    descriptor: target,
                    record: Some(record),
                    status: StatusCode::OK,
                    location: None,
                })
            },

            (RouteKind::Nested { association }, Action::Associated) => {
                let assoc = association_of(owner, association)?;
                let owner_record = self.find(owner, id)?;
                let base = self.association_query(graph, owner, &[owner_record], assoc)?;

                if assoc.kind.is_singular() {
                    let query = refined.order.into_iter().fold(base, Query::order_by).limit(1);
                    let record = self.store.execute(&query)?.into_iter().next();
                    return Ok(Outcome::Member {
                        descriptor: target,
                        record,
                        status: StatusCode::OK,
                        location: None,
                    });
                }

                let mut query = refined;
                let mut predicates = base.predicates;
                predicates.append(&mut query.predicates);
                query.predicates = predicates;
                self.list(target, query)
            },

            (RouteKind::Nested { association }, Action::Create) => {
                let assoc = association_of(owner, association)?;
                let owner_record = self.find(owner, id)?;
                let mut attrs = permitted_attrs(target, body.as_ref())?;
                let owner_key = owner_record
                    .get(&owner.primary_key)
                    .cloned()
                    .unwrap_or(Value::Null);
                attrs.insert(assoc.foreign_key_for(owner), owner_key);
                self.create(target, attrs)
            },

            (RouteKind::RemoteMember { remote } | RouteKind::RemoteCollection { remote }, Action::Remoted) => {
                let owner_record = match entry.kind {
                    RouteKind::RemoteMember { .. } => Some(self.find(owner, id)?),
                    _ => None,
                };
                self.remote(owner, target, remote, owner_record.as_ref())
            },

            (_, action) => Err(ApiError::ActionNotHandled {
                resource: owner.name.clone(),
                action: action.to_string(),
            }),
        }
    }

    fn list<'g>(&self, descriptor: &'g ResourceDescriptor, query: Query) -> Result<Outcome<'g>, ApiError> {
        let total = self.store.count(&query)?;
        let records = self.store.execute(&query)?;
        Ok(Outcome::Collection {
            descriptor,
            records,
            meta: Meta {
                total,
                limit: query.limit,
                offset: query.offset,
            },
        })
    }

    fn create<'g>(&self, descriptor: &'g ResourceDescriptor, mut attrs: Record) -> Result<Outcome<'g>, ApiError> {
        validate_presence(descriptor, &attrs)?;

        if descriptor.timestamps {
            let stamp = Value::String(now());
            attrs.insert("created_at".to_string(), stamp.clone());
            attrs.insert("updated_at".to_string(), stamp);
        }

        let record = self
            .store
            .insert(descriptor.model_name(), &descriptor.primary_key, attrs)?;
        let location = record
            .get(&descriptor.primary_key)
            .map(|key| member_path(descriptor, key));

        tracing::info!("created {} at {:?}", descriptor.name, location);

        Ok(Outcome::Member {
            descriptor,
            record: Some(record),
            status: StatusCode::CREATED,
            location,
        })
    }

    fn remote<'g>(
        &self,
        owner: &'g ResourceDescriptor,
        target: &'g ResourceDescriptor,
        name: &str,
        owner_record: Option<&Record>,
    ) -> Result<Outcome<'g>, ApiError> {
        let declared = owner.remote_named(name).ok_or_else(|| ApiError::RemoteNotImplemented {
            resource: owner.name.clone(),
            remote: name.to_string(),
        })?;
        let handler = self
            .remotes
            .get(&(owner.name.clone(), name.to_string()))
            .ok_or_else(|| ApiError::RemoteNotImplemented {
                resource: owner.name.clone(),
                remote: name.to_string(),
            })?;

        let ctx = RemoteContext {
            store: self.store.as_ref(),
            resource: owner,
            target,
            remote: declared,
            owner: owner_record,
        };
        let records = handler.call(&ctx)?;

        Ok(match declared.returns {
            Cardinality::One => Outcome::Member {
                descriptor: target,
                record: records.into_iter().next(),
                status: StatusCode::OK,
                location: None,
            },
            Cardinality::Many => Outcome::Collection {
                descriptor: target,
                meta: Meta {
                    total: records.len(),
                    limit: None,
                    offset: 0,
                },
                records,
            },
        })
    }

    fn find(&self, descriptor: &ResourceDescriptor, id: &str) -> Result<Record, ApiError> {
        let query = Query::new(descriptor.model_name())
            .apply(Predicate::eq(&descriptor.primary_key, id))
            .limit(1);
        self.store
            .execute(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound {
                resource: descriptor.name.clone(),
                id: id.to_string(),
            })
    }

    /// Query for the records `association` reaches from `owners`, following
    /// the association's join path one hop at a time
    fn association_query(
        &self,
        graph: &ResourceGraph,
        owner: &ResourceDescriptor,
        owners: &[Record],
        association: &AssociationDescriptor,
    ) -> Result<Query, ApiError> {
        let hops = graph
            .join_path(owner, association)
            .map_err(|e| ApiError::Unclassified(e.to_string()))?;

        let mut current: Vec<Record> = owners.to_vec();
        let mut query = None;
        for hop in &hops {
            if let Some(previous) = query.take() {
                current = self.store.execute(&previous)?;
            }
            let hop_owner = graph
                .get(&hop.resource)
                .ok_or_else(|| ApiError::ResourceNotConfigured(hop.resource.clone()))?;
            let hop_assoc = association_of(hop_owner, &hop.association)?;
            let hop_target = graph
                .get(&hop_assoc.target)
                .ok_or_else(|| ApiError::ResourceNotConfigured(hop_assoc.target.clone()))?;
            query = Some(hop_query(hop_owner, hop_assoc, hop_target, &current));
        }

        query.ok_or_else(|| ApiError::Unclassified(format!("empty join path for `{}`", association.name)))
    }

    fn serialize(
        &self,
        graph: &ResourceGraph,
        outcome: Outcome<'_>,
        includes: &[&AssociationDescriptor],
    ) -> Result<ApiResponse, ApiError> {
        match outcome {
            Outcome::Collection {
                descriptor,
                records,
                meta,
            } => {
                let records = records
                    .into_iter()
                    .map(|r| self.nest(graph, descriptor, r, includes))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ApiResponse {
                    status: StatusCode::OK,
                    location: None,
                    body: envelope::collection(descriptor, records, meta),
                })
            },
            Outcome::Member {
                descriptor,
                record,
                status,
                location,
            } => {
                let record = record
                    .map(|r| self.nest(graph, descriptor, r, includes))
                    .transpose()?;
                Ok(ApiResponse {
                    status,
                    location,
                    body: envelope::member(descriptor, record),
                })
            },
        }
    }

    /// Embed included associations under the owning record
    fn nest(
        &self,
        graph: &ResourceGraph,
        descriptor: &ResourceDescriptor,
        mut record: Record,
        includes: &[&AssociationDescriptor],
    ) -> Result<Record, ApiError> {
        for association in includes {
            let query = self.association_query(graph, descriptor, std::slice::from_ref(&record), association)?;
            let related = self.store.execute(&query)?;
            let value = if association.kind.is_singular() {
                related.into_iter().next().map(Value::Object).unwrap_or(Value::Null)
            } else {
                Value::Array(related.into_iter().map(Value::Object).collect())
            };
            record.insert(association.name.clone(), value);
        }
        Ok(record)
    }
}

/// Filters and scopes must come from the route's own vocabulary, which is
/// empty for member, remote and singular nested routes. Ordering needs a
/// route that returns a query result.
fn check_vocabulary(route: &RouteMatch, params: &Params) -> Result<(), ApiError> {
    let entry = &route.entry;
    let unknown = params
        .filters
        .iter()
        .map(|(name, _)| name)
        .chain(&params.scopes)
        .find(|name| !entry.filters.contains(name));
    if let Some(name) = unknown {
        return Err(RefineError::UnknownFilter(name.clone()).into());
    }

    let ordered = matches!(
        (&entry.kind, entry.action),
        (RouteKind::Collection, Action::Index) | (RouteKind::Nested { .. }, Action::Associated)
    );
    if params.order.is_some() && !ordered {
        return Err(ApiError::BadRequest(format!("`order` is not supported on {}", entry.path)));
    }
    Ok(())
}

fn association_of<'d>(owner: &'d ResourceDescriptor, name: &str) -> Result<&'d AssociationDescriptor, ApiError> {
    owner
        .association_named(name)
        .ok_or_else(|| ApiError::Unclassified(format!("`{}` has no association `{}`", owner.name, name)))
}

/// Single-hop query from a set of owner records
fn hop_query(
    owner: &ResourceDescriptor,
    association: &AssociationDescriptor,
    target: &ResourceDescriptor,
    owners: &[Record],
) -> Query {
    let foreign_key = association.foreign_key_for(owner);
    let (field, key_field) = match association.kind {
        AssociationKind::BelongsTo => (target.primary_key.as_str(), foreign_key.as_str()),
        _ => (foreign_key.as_str(), owner.primary_key.as_str()),
    };

    let mut keys: Vec<Value> = Vec::new();
    for key in owners.iter().filter_map(|r| r.get(key_field)).filter(|k| !k.is_null()) {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    Query::new(target.model_name()).apply(Predicate::one_of(field, keys))
}

/// Mutation body, unwrapped from its member key and cut down to the writable
/// allow-list
fn permitted_attrs(descriptor: &ResourceDescriptor, body: Option<&Value>) -> Result<Record, ApiError> {
    let key = descriptor.member_key();
    let fields = body
        .and_then(|b| b.get(key))
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::BadRequest(format!("param is missing or the value is empty: {key}")))?;

    let mut attrs = Record::new();
    let mut dropped = Vec::new();
    for (field, value) in fields {
        if descriptor.is_writable(field) {
            attrs.insert(field.clone(), value.clone());
        } else {
            dropped.push(field.as_str());
        }
    }

    if !dropped.is_empty() {
        tracing::warn!("unpermitted fields for {} dropped: {}", descriptor.name, dropped.join(", "));
    }
    Ok(attrs)
}

fn validate_presence(descriptor: &ResourceDescriptor, record: &Record) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();
    for field in &descriptor.required {
        let blank = match record.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if blank {
            errors
                .entry(field.clone())
                .or_default()
                .push("can't be blank".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Member path of a record, as the route table spells it
pub fn member_path(descriptor: &ResourceDescriptor, key: &Value) -> String {
    format!(
        "/{}/{}",
        descriptor.path_segment(),
        urlencoding::encode(&key_to_string(key))
    )
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ScopeDescriptor;
    use crate::query::MemoryStore;
    use serde_json::json;

    fn controller() -> Controller {
        let graph = ResourceGraph::builder()
            .resource(
                ResourceDescriptor::new("suite")
                    .permit(&["name", "switch"])
                    .require(&["name"])
                    .scope(ScopeDescriptor::attribute("switch")),
            )
            .build()
            .unwrap();
        let store = MemoryStore::new().with_model("suite");
        Controller::new(graph, Arc::new(store), ControllerConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_model_binding_is_not_configured() {
        let graph = ResourceGraph::builder()
            .resource(ResourceDescriptor::new("suite"))
            .build()
            .unwrap();
        let controller =
            Controller::new(graph, Arc::new(MemoryStore::new()), ControllerConfig::default()).unwrap();

        let response = controller.dispatch(ApiRequest::get("/suites"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body, json!({ "errors": crate::error::GENERIC_FAILURE }));
    }

    #[test]
    fn test_missing_wrapper_is_bad_request() {
        let response = controller().dispatch(ApiRequest::post("/suites", json!({"name": "x"})));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["errors"], "param is missing or the value is empty: suite");
    }

    #[test]
    fn test_blank_required_field_is_unprocessable() {
        let response = controller().dispatch(ApiRequest::post("/suites", json!({"suite": {"name": "  "}})));
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.body["errors"]["name"], json!(["can't be blank"]));
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let response = controller().dispatch(ApiRequest::get("/suites/999"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.body["errors"].is_string());
    }

    #[test]
    fn test_unknown_include_is_bad_request() {
        let response = controller().dispatch(ApiRequest::get("/suites").params(Params::new().include("cases")));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_member_path_encodes_keys() {
        let suite = ResourceDescriptor::new("suite");
        assert_eq!(member_path(&suite, &json!(3)), "/suites/3");
        assert_eq!(member_path(&suite, &json!("a b")), "/suites/a%20b");
    }
}
