//! In-process transport
//!
//! Serves client requests straight from a [`Controller`], encoding parameters
//! through the same query pairs an HTTP hop would use. Every request is
//! counted and logged so tests can assert on fetch behavior.

use super::http::{Transport, TransportResponse};
use crate::error::FetchError;
use crate::routes::Verb;
use crate::server::{ApiRequest, Controller, Params};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct LocalTransport {
    controller: Arc<Controller>,
    count: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl LocalTransport {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self {
            controller,
            count: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Requests served so far
    pub fn request_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// `VERB path` of every request served, oldest first
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl Transport for LocalTransport {
    async fn request(
        &self,
        verb: Verb,
        path: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> Result<TransportResponse, FetchError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{verb} {path}"));
        }

        let params = Params::from_query_pairs(params.to_query_pairs())
            .map_err(|e| FetchError::BadRequest(e.to_string()))?;
        let mut request = ApiRequest::new(verb, path).params(params);
        request.body = body.cloned();

        let response = self.controller.dispatch(request);
        Ok(TransportResponse {
            status: response.status,
            body: response.body,
            location: response.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ResourceDescriptor, ResourceGraph};
    use crate::query::MemoryStore;
    use crate::server::ControllerConfig;
    use reqwest::StatusCode;

    fn transport() -> LocalTransport {
        let graph = ResourceGraph::builder()
            .resource(ResourceDescriptor::new("suite").permit(&["name"]))
            .build()
            .unwrap();
        let store = MemoryStore::new().with_model("suite");
        let controller = Controller::new(graph, Arc::new(store), ControllerConfig::default()).unwrap();
        LocalTransport::new(Arc::new(controller))
    }

    #[test]
    fn test_counts_and_logs_requests() {
        let transport = transport();

        let response = tokio_test::block_on(transport.request(Verb::Get, "/suites", &Params::default(), None)).unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let missing = tokio_test::block_on(transport.request(Verb::Get, "/suites/9", &Params::default(), None)).unwrap();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.requests(), vec!["GET /suites", "GET /suites/9"]);
    }

    #[test]
    fn test_passes_location_through() {
        let transport = transport();
        let body = serde_json::json!({"suite": {"name": "x"}});

        let response =
            tokio_test::block_on(transport.request(Verb::Post, "/suites", &Params::default(), Some(&body))).unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.location.as_deref(), Some("/suites/1"));
    }
}
