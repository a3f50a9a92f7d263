//! Maps `EngineError` onto the gateway's HTTP status contract: 400
//! malformed, 401 auth failure, 403 policy violation, 409 state conflict,
//! 500 internal. One `IntoResponse` match arm per variant, never a blanket
//! 500.

use crate::error::{ConflictError, EngineError, FatalError, InsufficiencyError, TransientError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            EngineError::Validation(v) => (StatusCode::BAD_REQUEST, validation_message(v)),
            EngineError::Insufficiency(i) => (StatusCode::BAD_REQUEST, insufficiency_message(i)),
            EngineError::Conflict(c) => (StatusCode::CONFLICT, conflict_message(c)),
            EngineError::Transient(t) => (StatusCode::SERVICE_UNAVAILABLE, transient_message(t)),
            EngineError::Fatal(f) => (StatusCode::INTERNAL_SERVER_ERROR, fatal_message(f)),
        };
        let status = reclassify_auth_and_policy(&self, status);
        (status, Json(ErrorBody { error: self.kind().to_string(), message })).into_response()
    }
}

/// `ValidationError::InvalidSignature` is an auth failure (401), not a
/// generic malformed request (400); method/market allowlist violations are
/// policy failures (403). Every other validation error is 400.
fn reclassify_auth_and_policy(err: &EngineError, default: StatusCode) -> StatusCode {
    match err {
        EngineError::Validation(ValidationError::InvalidSignature) => StatusCode::UNAUTHORIZED,
        EngineError::Validation(ValidationError::MethodNotAllowed(_))
        | EngineError::Validation(ValidationError::MarketNotAllowed(_)) => StatusCode::FORBIDDEN,
        // nonce/sequence mismatches are a state conflict, not a malformed request.
        EngineError::Validation(ValidationError::BadNonce { .. }) => StatusCode::CONFLICT,
        EngineError::Conflict(ConflictError::SessionRevoked(_))
        | EngineError::Conflict(ConflictError::SessionBudgetExhausted(_)) => StatusCode::FORBIDDEN,
        _ => default,
    }
}

fn validation_message(e: &ValidationError) -> String {
    e.to_string()
}

fn insufficiency_message(e: &InsufficiencyError) -> String {
    e.to_string()
}

fn conflict_message(e: &ConflictError) -> String {
    e.to_string()
}

fn transient_message(e: &TransientError) -> String {
    e.to_string()
}

fn fatal_message(e: &FatalError) -> String {
    e.to_string()
}
