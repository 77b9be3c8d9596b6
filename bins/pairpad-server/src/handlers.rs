// HTTP route handlers for the pairpad API

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pairpad_common::types::{SourceCode, MAX_CONTENT_BYTES, MAX_INPUT_BYTES};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::engine::Executors;

pub struct AppState {
    pub executors: Executors,
}

/// POST /submit - run a snippet and return its verdict.
///
/// User-code faults (compile errors, crashes, timeouts) are 200s with a
/// populated verdict; only client faults earn a 400 here.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SourceCode>, JsonRejection>,
) -> Response {
    let Json(source) = match payload {
        Ok(payload) => payload,
        Err(e) => return bad_request(format!("invalid request: {}", e)),
    };

    if let Err(reason) = validate(&source) {
        return bad_request(reason);
    }

    let Some(executor) = state.executors.for_language(source.language) else {
        return bad_request(format!("unsupported language: {}", u8::from(source.language)));
    };

    info!(
        name = %source.name,
        language = %source.language,
        content_bytes = source.content.len(),
        input_bytes = source.input.len(),
        "submission received"
    );

    let verdict = executor.execute(&source).await;

    info!(
        status = ?verdict.status,
        exit_code = verdict.exit_code,
        run_time_ms = verdict.run_time,
        "submission finished"
    );

    (StatusCode::OK, Json(verdict)).into_response()
}

/// GET /healthz - liveness probe
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Request validation, split out so the limits are testable without a
/// running server. Lengths are byte lengths.
fn validate(source: &SourceCode) -> Result<(), String> {
    if source.content.is_empty() {
        return Err("content is required".to_string());
    }
    if source.content.len() > MAX_CONTENT_BYTES {
        return Err("content exceeds 8192 character limit".to_string());
    }
    if source.input.len() > MAX_INPUT_BYTES {
        return Err("input exceeds 8192 character limit".to_string());
    }
    Ok(())
}

fn bad_request(reason: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": reason.into() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairpad_common::types::Language;

    fn submission(content: String, input: String) -> SourceCode {
        SourceCode {
            name: "solution".to_string(),
            language: Language::Python3,
            content,
            input,
        }
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let result = validate(&submission(String::new(), String::new()));
        assert_eq!(result.unwrap_err(), "content is required");
    }

    #[test]
    fn test_content_at_the_limit_passes() {
        let source = submission("a".repeat(MAX_CONTENT_BYTES), String::new());
        assert!(validate(&source).is_ok());
    }

    #[test]
    fn test_content_one_byte_over_is_rejected() {
        let source = submission("a".repeat(MAX_CONTENT_BYTES + 1), String::new());
        assert_eq!(
            validate(&source).unwrap_err(),
            "content exceeds 8192 character limit"
        );
    }

    #[test]
    fn test_input_at_the_limit_passes() {
        let source = submission("print(1)".to_string(), "k=1,".repeat(MAX_INPUT_BYTES / 4));
        assert!(validate(&source).is_ok());
    }

    #[test]
    fn test_input_one_byte_over_is_rejected() {
        let source = submission("print(1)".to_string(), "a".repeat(MAX_INPUT_BYTES + 1));
        assert_eq!(
            validate(&source).unwrap_err(),
            "input exceeds 8192 character limit"
        );
    }

    #[test]
    fn test_empty_input_is_fine() {
        assert!(validate(&submission("print(1)".to_string(), String::new())).is_ok());
    }
}
