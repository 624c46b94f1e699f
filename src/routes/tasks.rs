//! Bulk task operations
//!
//! ## Endpoints
//!
//! - `POST /tasks/bulk` - body `{taskIds: [...], operation: "delete"|"archive"}`
//!
//! Mixed partial success is a 200: every id lands in either `results` or
//! `errors`, and `successCount + errorCount` always equals the number of
//! ids submitted. Blocked deletions carry the same suggestion the single
//! delete endpoints use - archive instead.
//!
//! ## Authentication
//!
//! Manager role or above.

use bson::doc;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Role;
use crate::cascade::{CascadeOrchestrator, CascadeOutcome, DeletionRequest, EntityKind};
use crate::routes::{error_response, json_response, require_operation, FullBody};
use crate::store::DocumentStore;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTasksRequest {
    pub task_ids: Vec<String>,
    pub operation: String,
}

#[derive(Debug, Serialize)]
pub struct BulkResultEntry {
    pub id: String,
    pub action: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BulkErrorEntry {
    pub id: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTasksResponse {
    pub message: String,
    pub results: Vec<BulkResultEntry>,
    pub errors: Vec<BulkErrorEntry>,
    pub success_count: usize,
    pub error_count: usize,
}

/// Main handler for /tasks/* routes
pub async fn handle_tasks_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    match (req.method().clone(), path) {
        (Method::POST, "/tasks/bulk") => handle_bulk(req, state).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn handle_bulk(req: Request<Incoming>, state: Arc<AppState>) -> Response<FullBody> {
    let claims = match require_operation(&req, &state, "bulk_tasks") {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let body_bytes = match req.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid body"),
    };

    let request: BulkTasksRequest = match serde_json::from_slice(&body_bytes) {
        Ok(r) => r,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid JSON"),
    };

    if request.task_ids.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "taskIds must not be empty");
    }
    if request.operation != "delete" && request.operation != "archive" {
        return error_response(
            StatusCode::BAD_REQUEST,
            "operation must be \"delete\" or \"archive\"",
        );
    }

    let response = run_bulk_operation(state.store.as_ref(), claims.role, &request).await;

    info!(
        operation = request.operation,
        requested = request.task_ids.len(),
        succeeded = response.success_count,
        failed = response.error_count,
        actor = %claims.identifier,
        "Bulk task operation finished"
    );

    json_response(StatusCode::OK, &response)
}

/// Run the bulk operation itself. Every submitted id ends up in exactly one
/// of `results` or `errors`; ids are processed in order and one task's
/// failure never stops the rest.
pub async fn run_bulk_operation(
    store: &dyn DocumentStore,
    actor_role: Role,
    request: &BulkTasksRequest,
) -> BulkTasksResponse {
    let mut results = Vec::new();
    let mut errors = Vec::new();

    for task_id in &request.task_ids {
        match request.operation.as_str() {
            "archive" => archive_task(store, task_id, &mut results, &mut errors).await,
            _ => delete_task(store, actor_role, task_id, &mut results, &mut errors).await,
        }
    }

    BulkTasksResponse {
        message: format!(
            "{} of {} task(s) {}d",
            results.len(),
            request.task_ids.len(),
            request.operation
        ),
        success_count: results.len(),
        error_count: errors.len(),
        results,
        errors,
    }
}

async fn archive_task(
    store: &dyn DocumentStore,
    task_id: &str,
    results: &mut Vec<BulkResultEntry>,
    errors: &mut Vec<BulkErrorEntry>,
) {
    let update = doc! { "$set": { "isArchived": true, "updatedAt": bson::DateTime::now() } };
    match store.patch_one("tasks", task_id, update).await {
        Ok(true) => results.push(BulkResultEntry {
            id: task_id.to_string(),
            action: "archived",
        }),
        Ok(false) => errors.push(BulkErrorEntry {
            id: task_id.to_string(),
            error: "Task not found".to_string(),
            suggestion: None,
        }),
        Err(e) => errors.push(BulkErrorEntry {
            id: task_id.to_string(),
            error: format!("Archive failed: {e}"),
            suggestion: None,
        }),
    }
}

async fn delete_task(
    store: &dyn DocumentStore,
    actor_role: Role,
    task_id: &str,
    results: &mut Vec<BulkResultEntry>,
    errors: &mut Vec<BulkErrorEntry>,
) {
    let orchestrator = CascadeOrchestrator::new(store);
    let request = DeletionRequest {
        target_id: task_id.to_string(),
        target_kind: EntityKind::Task,
        actor_role,
    };

    match orchestrator.cascade(&request).await {
        Ok(CascadeOutcome::Completed(_)) => results.push(BulkResultEntry {
            id: task_id.to_string(),
            action: "deleted",
        }),
        Ok(CascadeOutcome::Blocked(report)) => errors.push(BulkErrorEntry {
            id: task_id.to_string(),
            error: report.details().join("; "),
            suggestion: report.suggestion,
        }),
        Ok(CascadeOutcome::DeleteConflict(conflict)) => errors.push(BulkErrorEntry {
            id: task_id.to_string(),
            error: conflict.details().join("; "),
            suggestion: None,
        }),
        Ok(CascadeOutcome::NotFound) => errors.push(BulkErrorEntry {
            id: task_id.to_string(),
            error: "Task not found or already deleted".to_string(),
            suggestion: None,
        }),
        Err(e) => {
            // Per-task store failure stays inside this task's error entry;
            // the remaining ids are still processed
            warn!(task = task_id, error = %e, "Task cascade failed");
            errors.push(BulkErrorEntry {
                id: task_id.to_string(),
                error: "Database error".to_string(),
                suggestion: None,
            });
        }
    }
}
