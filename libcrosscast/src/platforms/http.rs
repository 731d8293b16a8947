//! HTTP plumbing shared by the REST adapters
//!
//! Status mapping: transport failures and 5xx are `Network`, 401/403 are
//! `Authentication`, 400/422 are `Validation`, 429 is `RateLimit`, anything
//! else non-2xx is `Posting`.

use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::PlatformError;

const USER_AGENT: &str = concat!("crosscast/", env!("CARGO_PKG_VERSION"));

/// Client used by every adapter
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Map a `reqwest` failure that never produced a response
pub fn transport_error(step: &str, err: reqwest::Error) -> PlatformError {
    PlatformError::Network(format!("{}: {}", step, err))
}

/// Map a non-success status to a typed error
pub fn status_error(step: &str, status: StatusCode, body: &str) -> PlatformError {
    let detail = error_detail(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    });
    let message = format!("{} ({}): {}", step, status.as_u16(), detail);

    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(message),
        400 | 422 => PlatformError::Validation(message),
        429 => PlatformError::RateLimit(message),
        500..=599 => PlatformError::Network(message),
        _ => PlatformError::Posting(message),
    }
}

/// Pull a human-readable message out of common JSON error shapes
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    // {"message": "..."} (atproto), {"error": "..."} (Mastodon),
    // {"error": {"message": "..."}} (Graph), {"meta": {"msg": "..."}} (Tumblr)
    let candidates = [
        value.get("message"),
        value.get("error_description"),
        value.get("error").and_then(|e| e.get("message")),
        value.get("error"),
        value.get("meta").and_then(|m| m.get("msg")),
    ];

    let detail = candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::to_string))
        .filter(|s| !s.is_empty());
    detail
}

/// Read a JSON body, failing on non-2xx statuses
pub async fn json_response(step: &str, response: Response) -> Result<Value, PlatformError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(step, e))?;

    if !status.is_success() {
        tracing::debug!(step, status = status.as_u16(), "Request rejected");
        return Err(status_error(step, status, &body));
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .map_err(|e| PlatformError::Posting(format!("{}: unreadable response: {}", step, e)))
}

/// Fetch a required string field from a JSON response
pub fn required_str(step: &str, value: &Value, field: &str) -> Result<String, PlatformError> {
    value
        .get(field)
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| PlatformError::Posting(format!("{}: response missing '{}'", step, field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_mapping() {
        let auth = status_error("login", StatusCode::UNAUTHORIZED, "");
        let forbidden = status_error("login", StatusCode::FORBIDDEN, "");
        let invalid = status_error("post", StatusCode::UNPROCESSABLE_ENTITY, "");
        let limited = status_error("post", StatusCode::TOO_MANY_REQUESTS, "");
        let server = status_error("post", StatusCode::BAD_GATEWAY, "");
        let other = status_error("post", StatusCode::NOT_FOUND, "");

        assert!(matches!(auth, PlatformError::Authentication(_)));
        assert!(matches!(forbidden, PlatformError::Authentication(_)));
        assert!(matches!(invalid, PlatformError::Validation(_)));
        assert!(matches!(limited, PlatformError::RateLimit(_)));
        assert!(matches!(server, PlatformError::Network(_)));
        assert!(matches!(other, PlatformError::Posting(_)));
    }

    #[test]
    fn test_status_error_uses_body_message() {
        let err = status_error(
            "createSession",
            StatusCode::UNAUTHORIZED,
            r#"{"error":"AuthenticationRequired","message":"Invalid identifier or password"}"#,
        );
        assert_eq!(
            err.to_string(),
            "Authentication failed: createSession (401): Invalid identifier or password"
        );
    }

    #[test]
    fn test_status_error_falls_back_to_reason() {
        let err = status_error("statuses", StatusCode::SERVICE_UNAVAILABLE, "<html>");
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_error_detail_nested_shapes() {
        assert_eq!(
            error_detail(r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#)
                .as_deref(),
            Some("Invalid OAuth access token")
        );
        assert_eq!(
            error_detail(r#"{"meta":{"status":401,"msg":"Unauthorized"}}"#).as_deref(),
            Some("Unauthorized")
        );
        assert_eq!(error_detail(r#"{"message":""}"#), None);
        assert_eq!(error_detail("not json"), None);
    }

    #[test]
    fn test_required_str_accepts_numbers() {
        let value = json!({"id": 1234, "name": "x"});
        assert_eq!(required_str("step", &value, "id").unwrap(), "1234");
        assert_eq!(required_str("step", &value, "name").unwrap(), "x");
        assert!(required_str("step", &value, "missing").is_err());
    }
}
