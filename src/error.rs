//! Error taxonomy
//!
//! One error type per layer. Declaration errors are fatal at boot, refinement
//! and store errors fold into [`ApiError`] at the controller boundary, and
//! [`FetchError`] is what the client side surfaces to callers.

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name -> ordered validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message surfaced for failures we refuse to describe to callers
pub const GENERIC_FAILURE: &str = "Internal server error";

/// Invalid resource graph. The process must not start serving with one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("resource `{0}` is declared more than once")]
    DuplicateResource(String),

    #[error("resource `{resource}` declares scope `{name}` more than once")]
    DuplicateScope { resource: String, name: String },

    #[error("resource `{resource}` declares `{name}` more than once")]
    DuplicateMember { resource: String, name: String },

    #[error("association `{resource}.{association}` targets unknown resource `{target}`")]
    UnknownAssociationTarget {
        resource: String,
        association: String,
        target: String,
    },

    #[error("remote `{resource}.{remote}` targets unknown resource `{target}`")]
    UnknownRemoteTarget {
        resource: String,
        remote: String,
        target: String,
    },

    #[error("association `{resource}.{association}` goes through undeclared `{through}`")]
    UnknownThrough {
        resource: String,
        association: String,
        through: String,
    },

    #[error("association `{resource}.{association}` needs source `{source_name}` on `{on}`")]
    UnknownSource {
        resource: String,
        association: String,
        source_name: String,
        on: String,
    },

    #[error("association `{resource}.{association}` joins to `{actual}` but declares `{declared}`")]
    ThroughTargetMismatch {
        resource: String,
        association: String,
        declared: String,
        actual: String,
    },

    #[error("association `{resource}.{association}` has no join path (cyclic or missing through)")]
    InvalidJoinPath { resource: String, association: String },

    #[error("association `{resource}.{association}` cannot be created through its nested route")]
    NotCreatable { resource: String, association: String },

    #[error("resource `{resource}` includes undeclared association `{association}` by default")]
    UnknownDefaultInclude { resource: String, association: String },

    #[error("failed to parse resource graph: {0}")]
    Parse(String),
}

/// Caller-supplied refinement that cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefineError {
    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("invalid value for filter `{name}`: {reason}")]
    InvalidFilterValue { name: String, reason: String },

    #[error("filter `{0}` requires an argument")]
    MissingArgument(String),

    #[error("cannot order by unknown field `{0}`")]
    UnknownOrderField(String),

    #[error("invalid order clause `{0}`")]
    InvalidOrder(String),
}

/// Failures reported by a [`crate::query::Store`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no `{model}` record with key {id}")]
    NotFound { model: String, id: String },

    #[error("no model bound for `{0}`")]
    UnknownModel(String),

    #[error("record is invalid")]
    Invalid(FieldErrors),

    #[error("store failure: {0}")]
    Backend(String),
}

/// Every per-request failure the controller can produce
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("no route matches {verb} {path}")]
    RouteNotFound { verb: String, path: String },

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("`{action}` is not handled by `{resource}`")]
    ActionNotHandled { resource: String, action: String },

    #[error("remote `{resource}.{remote}` has no handler")]
    RemoteNotImplemented { resource: String, remote: String },

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Refine(#[from] RefineError),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("resource `{0}` is not configured")]
    ResourceNotConfigured(String),

    #[error("{0}")]
    Unclassified(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ActionNotHandled { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RemoteNotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::BadRequest(_) | Self::Refine(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ResourceNotConfigured(_) | Self::Unclassified(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Whether the failure is ours rather than the caller's
    pub fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
    }

    /// The `{"errors": ...}` body for this failure
    pub fn envelope(&self) -> Value {
        match self {
            Self::Validation(fields) => json!({ "errors": fields }),
            Self::ResourceNotConfigured(_) | Self::Unclassified(_) => {
                json!({ "errors": GENERIC_FAILURE })
            },
            other => json!({ "errors": other.to_string() }),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { model, id } => Self::NotFound {
                resource: model,
                id,
            },
            StoreError::UnknownModel(model) => Self::ResourceNotConfigured(model),
            StoreError::Invalid(fields) => Self::Validation(fields),
            StoreError::Backend(message) => Self::Unclassified(message),
        }
    }
}

/// Client-side fetch failure, typed per failure class.
///
/// An empty association is never an error; these only describe fetches that
/// did not produce a result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unprocessable: {0:?}")]
    Unprocessable(FieldErrors),

    #[error("method not handled: {0}")]
    MethodNotHandled(String),

    #[error("request failed with {status}: {message}")]
    Unclassified { status: u16, message: String },

    #[error("`{name}` is not declared on `{resource}`")]
    Undeclared { resource: String, name: String },

    #[error("record of `{0}` has no primary key value")]
    MissingKey(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify a non-success response
    pub fn from_response(status: StatusCode, body: &Value, path: &str) -> Self {
        let message = error_message(body);
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(path.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(message),
            StatusCode::BAD_REQUEST => Self::BadRequest(message),
            StatusCode::UNPROCESSABLE_ENTITY => Self::Unprocessable(field_errors(body)),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                Self::MethodNotHandled(path.to_string())
            },
            other => Self::Unclassified {
                status: other.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

fn error_message(body: &Value) -> String {
    match body.get("errors") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}

fn field_errors(body: &Value) -> FieldErrors {
    let Some(Value::Object(fields)) = body.get("errors") else {
        return FieldErrors::new();
    };

    fields
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items
                    .iter()
                    .map(|m| m.as_str().map(String::from).unwrap_or_else(|| m.to_string()))
                    .collect(),
                Value::String(single) => vec![single.clone()],
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect()
}
