//! Project deletion endpoint
//!
//! ## Endpoints
//!
//! - `DELETE /projects/{id}` - Hard-delete a project
//!
//! Deletion is refused while any task or non-approved timesheet still
//! references the project. Deleting an id that no longer exists is
//! idempotent: a 200 "already deleted" rather than an error, so double
//! submits from the admin UI are harmless.
//!
//! ## Authentication
//!
//! Admin role required.

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cascade::{CascadeOrchestrator, CascadeOutcome, DeletionRequest, EntityKind};
use crate::routes::{
    conflict_response, engine_error_response, error_response, json_response, require_operation,
    FullBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub message: String,
    pub deleted: bool,
}

/// Conflict response: which kinds still reference the project, plus the
/// rendered detail lines
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConflictResponse {
    pub error: String,
    pub details: Vec<String>,
    pub suggestion: Option<String>,
    pub referenced_in: Vec<String>,
}

/// Main handler for /projects/* routes
pub async fn handle_projects_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    match (req.method().clone(), path.strip_prefix("/projects/")) {
        (Method::DELETE, Some(id)) if !id.is_empty() && !id.contains('/') => {
            handle_delete_project(req, state, id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn handle_delete_project(
    req: Request<Incoming>,
    state: Arc<AppState>,
    project_id: &str,
) -> Response<FullBody> {
    let claims = match require_operation(&req, &state, "delete_project") {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let orchestrator = CascadeOrchestrator::new(state.store.as_ref());
    let request = DeletionRequest {
        target_id: project_id.to_string(),
        target_kind: EntityKind::Project,
        actor_role: claims.role,
    };

    let outcome = match orchestrator.cascade(&request).await {
        Ok(outcome) => outcome,
        Err(e) => return engine_error_response(e),
    };

    match outcome {
        CascadeOutcome::Completed(_) => {
            info!(project = project_id, admin = %claims.identifier, "Project deleted");
            json_response(
                StatusCode::OK,
                &DeleteProjectResponse {
                    message: format!("Project {} deleted", project_id),
                    deleted: true,
                },
            )
        }
        CascadeOutcome::Blocked(report) => {
            let referenced_in = report.reasons.iter().map(|r| r.kind.clone()).collect();
            json_response(
                StatusCode::CONFLICT,
                &ProjectConflictResponse {
                    error: "Project is still in use".to_string(),
                    details: report.details(),
                    suggestion: report.suggestion,
                    referenced_in,
                },
            )
        }
        CascadeOutcome::DeleteConflict(conflict) => conflict_response(
            StatusCode::CONFLICT,
            "Project is still referenced by other documents",
            conflict.details(),
            Some("Resolve the remaining references, then retry the deletion.".to_string()),
        ),
        // Idempotent: a second delete of the same id is not an error
        CascadeOutcome::NotFound => json_response(
            StatusCode::OK,
            &DeleteProjectResponse {
                message: format!("Project {} already deleted", project_id),
                deleted: false,
            },
        ),
    }
}
