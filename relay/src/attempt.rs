//! Attempt execution.
//!
//! One candidate, one bounded HTTP call, one classified outcome. The
//! timeout covers the whole request/response cycle including body
//! collection, the same way `tokio::time::timeout` bounds the upstream
//! call elsewhere in this workspace.

use crate::candidates::{Candidate, redacted_url};
use http::StatusCode;
use http::header::ACCEPT;
use hyper::body::Bytes;
use std::time::Duration;
use tokio::time::timeout;

/// Why the backend could not be reached at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCause {
    /// Per-attempt timer fired; the in-flight call was cancelled
    Timeout,
    /// DNS failure, connection refused, broken transfer, ...
    Connect(String),
}

/// Classified result of executing one candidate.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    /// 2xx without a route-mismatch body; the backend answered the operation
    Success {
        status: StatusCode,
        body: Bytes,
        content_type: Option<String>,
    },
    /// This candidate's route shape is wrong; the next one may be right
    SoftFail { status: StatusCode, body: Bytes },
    /// Backend reached and it rejected the operation; authoritative
    HardFail { status: StatusCode, body: Bytes },
    /// Could not reach the backend at all
    TransportError(TransportCause),
}

impl AttemptOutcome {
    pub const fn class(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "success",
            AttemptOutcome::SoftFail { .. } => "soft_fail",
            AttemptOutcome::HardFail { .. } => "hard_fail",
            AttemptOutcome::TransportError(_) => "transport_error",
        }
    }
}

/// Body signatures some backend variants return for unknown routes,
/// occasionally under a 2xx status. Matched case-insensitively as
/// substrings.
pub const ROUTE_MISMATCH_SIGNATURES: &[&str] = &[
    "cannot get",
    "cannot post",
    "cannot put",
    "cannot patch",
    "method not allowed",
    "not found",
];

/// Route-error pages are short; larger bodies are real payloads and are
/// exempt from the signature scan so a legitimate response containing
/// e.g. "not found" in its data is not misclassified.
const SIGNATURE_SCAN_LIMIT: usize = 512;

/// Returns true when the body textually matches a known
/// "wrong route" signature.
pub fn is_route_mismatch_body(body: &[u8]) -> bool {
    if body.is_empty() || body.len() > SIGNATURE_SCAN_LIMIT {
        return false;
    }

    let text = String::from_utf8_lossy(body).to_lowercase();
    ROUTE_MISMATCH_SIGNATURES
        .iter()
        .any(|signature| text.contains(signature))
}

/// Executes one candidate with a hard per-attempt budget.
///
/// Logs transport metadata only; the URL is redacted and neither the
/// bearer token nor response payloads reach the log.
pub async fn execute(
    client: &reqwest::Client,
    candidate: &Candidate,
    attempt_timeout: Duration,
) -> AttemptOutcome {
    let call = async {
        let mut request = client
            .request(candidate.method.clone(), candidate.url.clone())
            .header(ACCEPT, "application/json");

        if let Some(token) = &candidate.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &candidate.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok::<_, reqwest::Error>((status, content_type, body))
    };

    let outcome = match timeout(attempt_timeout, call).await {
        Err(_) => AttemptOutcome::TransportError(TransportCause::Timeout),
        Ok(Err(e)) => {
            AttemptOutcome::TransportError(TransportCause::Connect(e.without_url().to_string()))
        }
        Ok(Ok((status, content_type, body))) => classify(status, content_type, body),
    };

    tracing::debug!(
        method = %candidate.method,
        url = %redacted_url(&candidate.url),
        outcome = outcome.class(),
        "candidate attempt finished"
    );

    outcome
}

/// Maps a completed HTTP exchange to an outcome.
///
/// The signature check runs regardless of status because some backend
/// variants answer unknown routes with non-standard codes.
fn classify(status: StatusCode, content_type: Option<String>, body: Bytes) -> AttemptOutcome {
    if is_route_mismatch_body(&body)
        || status == StatusCode::NOT_FOUND
        || status == StatusCode::METHOD_NOT_ALLOWED
    {
        AttemptOutcome::SoftFail { status, body }
    } else if status.is_success() {
        AttemptOutcome::Success {
            status,
            body,
            content_type,
        }
    } else {
        AttemptOutcome::HardFail { status, body }
    }
}
