//! The relay endpoint.
//!
//! Thin wiring over the resolver, controller and normalizer: parses the
//! caller's intent from the inbound request, runs the candidate
//! pipeline, and emits the canonical envelope with CORS headers.

use crate::candidates;
use crate::config::{BASE_URL_ENV, BackendConfig};
use crate::errors::RelayError;
use crate::fallback::{self, RelayBudget};
use crate::metrics_defs::OPERATION_DURATION;
use crate::normalize::{self, RelayResult};
use crate::operation::{Operation, OperationKind, StatusUpdate};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue,
};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use shared::histogram;
use std::pin::Pin;

pub type HandlerBody = BoxBody<Bytes, RelayError>;

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

/// Façade endpoint in front of the portal backend.
///
/// Holds the backend configuration (or the fact that there is none) and
/// a shared HTTP client; per-request state never outlives the request.
#[derive(Clone)]
pub struct RelayService {
    config: Option<BackendConfig>,
    client: reqwest::Client,
}

impl RelayService {
    pub fn new(config: Option<BackendConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<HandlerBody>, RelayError>
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let started = std::time::Instant::now();

        // Browsers pre-flight the mutating endpoints; answered outside
        // the relay pipeline with a fixed allow-list.
        if req.method() == Method::OPTIONS {
            return Ok(preflight_response());
        }

        let bearer = extract_bearer(req.headers());
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| RelayError::RequestBodyError(e.to_string()))?
            .to_bytes();

        let kind = match parse_operation(&parts.method, &parts.uri, &body) {
            Ok(kind) => kind,
            Err(OperationParseError::UnknownRoute) => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    &format!("unknown operation: {} {}", parts.method, parts.uri.path()),
                );
            }
            Err(OperationParseError::InvalidBody(detail)) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid request body: {detail}"),
                );
            }
        };

        let Some(config) = &self.config else {
            tracing::error!(operation = kind.name(), "backend base URL not configured");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Missing {BASE_URL_ENV} on server"),
            );
        };

        let operation = Operation::new(kind, bearer);
        let candidate_list = candidates::resolve(&operation, config);
        let attempts =
            fallback::run_candidates(&self.client, &candidate_list, &RelayBudget::from(config))
                .await;
        let result = normalize::normalize(&attempts);

        histogram!(OPERATION_DURATION).record(started.elapsed().as_secs_f64());
        tracing::debug!(
            operation = operation.kind.name(),
            status = %result.status,
            ok = result.ok,
            tried = result.tried.len(),
            "relay operation finished"
        );

        emit(&result)
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<HandlerBody>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.handle(req).await })
    }
}

#[derive(Debug)]
enum OperationParseError {
    UnknownRoute,
    InvalidBody(String),
}

/// Maps an inbound method + path + query onto a logical operation.
fn parse_operation(
    method: &Method,
    uri: &Uri,
    body: &Bytes,
) -> Result<OperationKind, OperationParseError> {
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    let query = uri.query();

    match (method, segments.as_slice()) {
        (&Method::GET, ["api", "users"]) => Ok(OperationKind::ListUsers {
            page: query_param(query, "page"),
            limit: query_param(query, "limit"),
        }),
        (&Method::GET, ["api", "users", "pending"]) => Ok(OperationKind::GetPendingUsers {
            year: query_param(query, "year"),
        }),
        (&Method::GET, ["api", "users", id]) => Ok(OperationKind::GetUser {
            id: (*id).to_string(),
        }),
        (&Method::PATCH, ["api", "users", id, "status"]) => {
            let update: StatusUpdate = serde_json::from_slice(body)
                .map_err(|e| OperationParseError::InvalidBody(e.to_string()))?;
            Ok(OperationKind::UpdateUserStatus {
                id: (*id).to_string(),
                update,
            })
        }
        _ => Err(OperationParseError::UnknownRoute),
    }
}

/// Parses one query parameter, ignoring values that fail to parse.
fn query_param<T: std::str::FromStr>(query: Option<&str>, name: &str) -> Option<T> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.parse().ok())
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn full(bytes: Bytes) -> HandlerBody {
    Full::new(bytes).map_err(|e| match e {}).boxed()
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
}

fn preflight_response() -> Response<HandlerBody> {
    let mut response = Response::new(full(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
    );
    response
}

/// Caller-facing error outside the relay pipeline (unknown operation,
/// bad body, missing configuration). Same envelope shape as relay
/// failures.
fn error_response(
    status: StatusCode,
    message: &str,
) -> Result<Response<HandlerBody>, RelayError> {
    let body = serde_json::to_vec(&serde_json::json!({
        "status": "error",
        "message": message,
    }))?;

    let mut response = Response::new(full(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(response.headers_mut());
    Ok(response)
}

/// Emits a RelayResult onto the wire: success payloads byte-for-byte
/// with the backend's content type, failures as the error envelope.
fn emit(result: &RelayResult) -> Result<Response<HandlerBody>, RelayError> {
    let mut response = if result.ok {
        let mut response = Response::new(full(result.raw_body.clone().unwrap_or_default()));
        let content_type = result
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        response.headers_mut().insert(CONTENT_TYPE, content_type);
        response
    } else {
        let body = serde_json::to_vec(&result.error_envelope())?;
        let mut response = Response::new(full(Bytes::from(body)));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    };

    *response.status_mut() = result.status;
    apply_cors(response.headers_mut());
    Ok(response)
}
