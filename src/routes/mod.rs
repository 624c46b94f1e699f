//! HTTP routes for timewarden

pub mod clients;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod team;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::auth::{extract_token_from_header, required_role, Claims, JwtValidator, Role};
use crate::server::AppState;
use crate::types::WardenError;

pub use clients::handle_clients_request;
pub use health::{health_check, readiness_check, version_info};
pub use projects::handle_projects_request;
pub use tasks::handle_tasks_request;
pub use team::handle_team_request;

pub(crate) type FullBody = Full<Bytes>;

/// Shared conflict/error response shape. `details` is a list the UI renders
/// line by line; a single error string is not enough for callers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub(crate) fn error_response(status: StatusCode, error: &str) -> Response<FullBody> {
    json_response(
        status,
        &ErrorBody {
            error: error.to_string(),
            details: None,
            suggestion: None,
        },
    )
}

pub(crate) fn conflict_response(
    status: StatusCode,
    error: &str,
    details: Vec<String>,
    suggestion: Option<String>,
) -> Response<FullBody> {
    json_response(
        status,
        &ErrorBody {
            error: error.to_string(),
            details: if details.is_empty() { None } else { Some(details) },
            suggestion,
        },
    )
}

/// Map an engine error to a response. Scan and store failures surface as
/// 500 - by that point the engine has guaranteed no writes happened on
/// incomplete information.
pub(crate) fn engine_error_response(e: WardenError) -> Response<FullBody> {
    warn!("Cascade engine error: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
}

fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

#[allow(clippy::result_large_err)]
fn get_jwt_validator(state: &AppState) -> Result<JwtValidator, Response<FullBody>> {
    if state.args.dev_mode {
        Ok(JwtValidator::new_dev())
    } else {
        match &state.args.jwt_secret {
            Some(secret) => JwtValidator::new(secret.clone()).map_err(|e| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("JWT config error: {e}"),
                )
            }),
            None => Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT secret not configured",
            )),
        }
    }
}

/// Validate the request's token and authorize it for a named gateway
/// operation. Runs before any scan; an unauthorized call never touches
/// the store.
#[allow(clippy::result_large_err)]
pub(crate) fn require_operation(
    req: &Request<Incoming>,
    state: &AppState,
    operation: &str,
) -> Result<Claims, Response<FullBody>> {
    let Some(min_role) = required_role(operation) else {
        // Unknown operations are blocked outright
        return Err(error_response(StatusCode::FORBIDDEN, "Operation not permitted"));
    };
    require_role(req, state, min_role)
}

#[allow(clippy::result_large_err)]
fn require_role(
    req: &Request<Incoming>,
    state: &AppState,
    min_role: Role,
) -> Result<Claims, Response<FullBody>> {
    let token = match extract_token_from_header(get_auth_header(req)) {
        Some(t) => t,
        None => return Err(error_response(StatusCode::UNAUTHORIZED, "No token provided")),
    };

    let jwt = get_jwt_validator(state)?;
    let result = jwt.verify_token(token);

    if !result.valid {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            result.error.as_deref().unwrap_or("Invalid token"),
        ));
    }

    let claims = result.claims.expect("valid token carries claims");

    if claims.role < min_role {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            &format!("{} role required", min_role),
        ));
    }

    Ok(claims)
}
