//! Team member removal endpoints
//!
//! ## Endpoints
//!
//! - `DELETE /team/members/{id}` - Remove an active team member
//! - `DELETE /team/archived/{userId}/delete` - Remove an archived person
//!
//! Both run the full person cascade: pending timesheets block with a 400,
//! an unresolved store reference after cleanup surfaces as a 409, and a
//! successful cascade deletes the person's own timesheets while preserving
//! approved sheets they merely approved.
//!
//! ## Authentication
//!
//! Admin role required.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cascade::{CascadeOrchestrator, CascadeOutcome, CascadeResult, DeletionRequest, EntityKind};
use crate::routes::{
    conflict_response, engine_error_response, error_response, json_response, require_operation,
    FullBody,
};
use crate::server::AppState;

/// Success response for member removal
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalResponse {
    pub success: bool,
    pub message: String,
    pub action: &'static str,
    /// Cleanup batch indices that failed; present so admins can tell a
    /// clean removal from one that left stale references behind
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batch_failures: Vec<usize>,
}

/// Main handler for /team/* routes
pub async fn handle_team_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    let method = req.method().clone();
    let subpath = path.strip_prefix("/team").unwrap_or("");

    match (method, subpath) {
        // DELETE /team/members/{id}
        (Method::DELETE, p) if p.starts_with("/members/") => {
            let id = p.trim_start_matches("/members/");
            if id.is_empty() || id.contains('/') {
                return error_response(StatusCode::NOT_FOUND, "Not found");
            }
            handle_delete_member(req, state, id, false).await
        }

        // DELETE /team/archived/{userId}/delete
        (Method::DELETE, p) if p.starts_with("/archived/") && p.ends_with("/delete") => {
            let id = p
                .strip_prefix("/archived/")
                .and_then(|s| s.strip_suffix("/delete"))
                .unwrap_or("");
            if id.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "Missing user id");
            }
            handle_delete_member(req, state, id, true).await
        }

        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn handle_delete_member(
    req: Request<Incoming>,
    state: Arc<AppState>,
    user_id: &str,
    archived: bool,
) -> Response<FullBody> {
    let operation = if archived {
        "delete_archived_person"
    } else {
        "delete_person"
    };
    let claims = match require_operation(&req, &state, operation) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let orchestrator = CascadeOrchestrator::new(state.store.as_ref());
    let request = DeletionRequest {
        target_id: user_id.to_string(),
        target_kind: EntityKind::Person,
        actor_role: claims.role,
    };

    let outcome = match orchestrator.cascade(&request).await {
        Ok(outcome) => outcome,
        Err(e) => return engine_error_response(e),
    };

    match outcome {
        CascadeOutcome::Completed(result) => {
            info!(
                target = user_id,
                archived,
                admin = %claims.identifier,
                "Person removed"
            );
            json_response(StatusCode::OK, &removal_response(user_id, result))
        }
        CascadeOutcome::Blocked(report) => conflict_response(
            StatusCode::BAD_REQUEST,
            "Person has unsubmitted or submitted timesheets with logged hours",
            report.details(),
            report.suggestion,
        ),
        CascadeOutcome::DeleteConflict(conflict) => conflict_response(
            StatusCode::CONFLICT,
            "Person is still referenced by other documents",
            conflict.details(),
            Some("Resolve the remaining references, then retry the removal.".to_string()),
        ),
        CascadeOutcome::NotFound => error_response(StatusCode::NOT_FOUND, "Person not found"),
    }
}

fn removal_response(user_id: &str, result: CascadeResult) -> RemovalResponse {
    let message = if result.partial() {
        format!(
            "Team member {} removed; {} cleanup batch(es) failed and may have left stale references",
            user_id,
            result.batch_failures.len()
        )
    } else {
        format!("Team member {} removed", user_id)
    };
    RemovalResponse {
        success: true,
        message,
        action: "deleted",
        batch_failures: result.batch_failures,
    }
}
