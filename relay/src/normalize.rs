//! Response normalization.
//!
//! Whatever shape the chosen backend variant answered with, the caller
//! sees exactly one envelope. Success payloads pass through untouched;
//! error payloads get a best-effort human-readable message extracted
//! from the varying backend error shapes.

use crate::fallback::{FinalState, RelayAttempts};
use http::StatusCode;
use hyper::body::Bytes;
use serde::Serialize;
use serde_json::Value;

const GENERIC_FAILURE: &str = "request failed";
const NO_RESPONSE: &str = "no response from backend";
const GLOBAL_TIMEOUT: &str = "global timeout exceeded";

/// Canonical outcome of one relay operation. The only shape the caller
/// ever sees; `ok == true` implies a 2xx status and `data` holding the
/// backend's payload untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayResult {
    pub ok: bool,
    pub status: StatusCode,
    pub message: Option<String>,
    pub data: Option<Value>,
    /// Redacted URLs of every candidate attempted, for diagnostics
    pub tried: Vec<String>,
    /// Raw success payload, emitted to the caller byte-for-byte
    pub raw_body: Option<Bytes>,
    pub content_type: Option<String>,
}

/// Wire shape of a failure response.
#[derive(Serialize)]
pub struct ErrorEnvelope<'a> {
    pub status: &'static str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<&'a [String]>,
}

impl RelayResult {
    /// Failure envelope for this result. Only meaningful when `ok` is
    /// false.
    pub fn error_envelope(&self) -> ErrorEnvelope<'_> {
        ErrorEnvelope {
            status: "error",
            message: self.message.as_deref().unwrap_or(GENERIC_FAILURE),
            data: self.data.as_ref(),
            tried: if self.tried.is_empty() {
                None
            } else {
                Some(&self.tried)
            },
        }
    }
}

/// Converts a terminal fallback state into the canonical result.
///
/// Pure function of its input; normalizing the same state twice yields
/// identical results.
pub fn normalize(attempts: &RelayAttempts) -> RelayResult {
    let tried = attempts.tried.clone();

    match &attempts.state {
        FinalState::Succeeded {
            status,
            body,
            content_type,
        } => RelayResult {
            ok: true,
            status: *status,
            message: None,
            data: Some(parse_body(body)),
            tried,
            raw_body: Some(body.clone()),
            content_type: content_type.clone(),
        },
        FinalState::StoppedOnHardFail { status, body } => RelayResult {
            ok: false,
            status: *status,
            message: Some(extract_message(body)),
            data: Some(parse_body(body)),
            tried,
            raw_body: None,
            content_type: None,
        },
        FinalState::ExhaustedCandidates => RelayResult {
            ok: false,
            status: StatusCode::BAD_GATEWAY,
            message: Some(NO_RESPONSE.to_string()),
            data: None,
            tried,
            raw_body: None,
            content_type: None,
        },
        FinalState::DeadlineExceeded => RelayResult {
            ok: false,
            status: StatusCode::BAD_GATEWAY,
            message: Some(GLOBAL_TIMEOUT.to_string()),
            data: None,
            tried,
            raw_body: None,
            content_type: None,
        },
    }
}

/// Parses a body as JSON, degrading to the raw text on parse failure
/// rather than surfacing a half-parsed value.
fn parse_body(body: &Bytes) -> Value {
    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(body).into_owned()),
    }
}

/// Pulls a human-readable message out of a backend error body.
///
/// JSON bodies are probed for a `message` or `error` string field;
/// plain text bodies are used verbatim; anything else falls back to a
/// generic message.
fn extract_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
        return GENERIC_FAILURE.to_string();
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn succeeded(body: &'static [u8]) -> RelayAttempts {
        RelayAttempts {
            state: FinalState::Succeeded {
                status: StatusCode::OK,
                body: Bytes::from_static(body),
                content_type: Some("application/json".to_string()),
            },
            tried: vec!["http://backend/users".to_string()],
        }
    }

    #[test]
    fn test_success_json_passes_through_unchanged() {
        let result = normalize(&succeeded(br#"{"data":[{"id":1}]}"#));

        assert!(result.ok);
        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.data, Some(json!({"data": [{"id": 1}]})));
        assert_eq!(result.raw_body.as_deref(), Some(br#"{"data":[{"id":1}]}"#.as_ref()));
        assert_eq!(result.message, None);
    }

    #[test]
    fn test_success_invalid_json_degrades_to_text() {
        let result = normalize(&succeeded(b"{\"data\": [truncated"));

        assert!(result.ok);
        assert_eq!(
            result.data,
            Some(Value::String("{\"data\": [truncated".to_string()))
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let attempts = succeeded(br#"{"data":[]}"#);
        assert_eq!(normalize(&attempts), normalize(&attempts));
    }

    #[test]
    fn test_hard_fail_message_extraction() {
        let cases: &[(&[u8], &str)] = &[
            (br#"{"message":"forbidden"}"#, "forbidden"),
            (br#"{"error":"no such user"}"#, "no such user"),
            (b"backend exploded", "backend exploded"),
            (br#"{"code":17}"#, "request failed"),
            (b"", "request failed"),
        ];

        for (body, expected) in cases {
            let attempts = RelayAttempts {
                state: FinalState::StoppedOnHardFail {
                    status: StatusCode::FORBIDDEN,
                    body: Bytes::copy_from_slice(body),
                },
                tried: vec![],
            };
            let result = normalize(&attempts);

            assert!(!result.ok);
            assert_eq!(result.status, StatusCode::FORBIDDEN);
            assert_eq!(result.message.as_deref(), Some(*expected), "body {body:?}");
        }
    }

    #[test]
    fn test_exhausted_candidates() {
        let attempts = RelayAttempts {
            state: FinalState::ExhaustedCandidates,
            tried: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        let result = normalize(&attempts);

        assert!(!result.ok);
        assert_eq!(result.status, StatusCode::BAD_GATEWAY);
        assert_eq!(result.message.as_deref(), Some("no response from backend"));
        assert_eq!(result.tried.len(), 3);
    }

    #[test]
    fn test_deadline_exceeded() {
        let attempts = RelayAttempts {
            state: FinalState::DeadlineExceeded,
            tried: vec!["a".to_string()],
        };
        let result = normalize(&attempts);

        assert!(!result.ok);
        assert_eq!(result.status, StatusCode::BAD_GATEWAY);
        assert_eq!(result.message.as_deref(), Some("global timeout exceeded"));
    }

    #[test]
    fn test_error_envelope_wire_shape() {
        let attempts = RelayAttempts {
            state: FinalState::StoppedOnHardFail {
                status: StatusCode::FORBIDDEN,
                body: Bytes::from_static(br#"{"message":"forbidden"}"#),
            },
            tried: vec!["http://backend/users".to_string()],
        };
        let result = normalize(&attempts);
        let envelope = serde_json::to_value(result.error_envelope()).unwrap();

        assert_eq!(
            envelope,
            json!({
                "status": "error",
                "message": "forbidden",
                "data": {"message": "forbidden"},
                "tried": ["http://backend/users"],
            })
        );
    }

    #[test]
    fn test_error_envelope_omits_empty_fields() {
        let attempts = RelayAttempts {
            state: FinalState::ExhaustedCandidates,
            tried: vec![],
        };
        let result = normalize(&attempts);
        let envelope = serde_json::to_value(result.error_envelope()).unwrap();

        assert_eq!(
            envelope,
            json!({"status": "error", "message": "no response from backend"})
        );
    }
}
