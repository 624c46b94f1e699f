//! Client archiving endpoint
//!
//! ## Endpoints
//!
//! - `DELETE /clients/{id}` - Soft-archive a client
//!
//! Client removal is the gentlest cascade: the document is never hard
//! deleted, only marked archived, and the operation is refused while the
//! client still has active projects. Historical projects keep their client
//! reference intact.
//!
//! ## Authentication
//!
//! Manager role or above.

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cascade::{policy, EntityKind, ReferenceScanner};
use crate::db::schemas::{ClientDoc, CLIENT_COLLECTION};
use crate::routes::{
    engine_error_response, error_response, json_response, require_operation, FullBody,
};
use crate::server::AppState;

/// Success response: the archived client plus a confirmation message
#[derive(Debug, Serialize)]
pub struct ArchiveClientResponse {
    pub client: ClientDoc,
    pub message: String,
}

/// Conflict response carries the active-project count for the UI's banner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConflictResponse {
    pub error: String,
    pub details: Vec<String>,
    pub suggestion: Option<String>,
    pub active_projects_count: usize,
}

/// Main handler for /clients/* routes
pub async fn handle_clients_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    path: &str,
) -> Response<FullBody> {
    match (req.method().clone(), path.strip_prefix("/clients/")) {
        (Method::DELETE, Some(id)) if !id.is_empty() && !id.contains('/') => {
            handle_archive_client(req, state, id).await
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn handle_archive_client(
    req: Request<Incoming>,
    state: Arc<AppState>,
    client_id: &str,
) -> Response<FullBody> {
    let claims = match require_operation(&req, &state, "archive_client") {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state.store.find_by_id(CLIENT_COLLECTION, client_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Client not found"),
        Err(e) => return engine_error_response(e),
    }

    // Scan + policy check only - the archive write below is the entire
    // "cascade" for clients
    let scanner = ReferenceScanner::new(state.store.as_ref());
    let hit_set = match scanner.scan(client_id, EntityKind::Client).await {
        Ok(h) => h,
        Err(e) => return engine_error_response(e),
    };

    let report = policy::evaluate(EntityKind::Client, &hit_set);
    if report.blocking {
        let active_projects_count = report.reasons.first().map(|r| r.count).unwrap_or(0);
        return json_response(
            StatusCode::BAD_REQUEST,
            &ClientConflictResponse {
                error: "Client has active projects".to_string(),
                details: report.details(),
                suggestion: report.suggestion,
                active_projects_count,
            },
        );
    }

    let update = doc! { "$set": { "isArchived": true, "updatedAt": bson::DateTime::now() } };
    if let Err(e) = state.store.patch_one(CLIENT_COLLECTION, client_id, update).await {
        return engine_error_response(e);
    }

    let client = match state.store.find_by_id(CLIENT_COLLECTION, client_id).await {
        Ok(Some(doc)) => match bson::from_document::<ClientDoc>(doc) {
            Ok(client) => client,
            Err(e) => return engine_error_response(e.into()),
        },
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Client not found"),
        Err(e) => return engine_error_response(e),
    };

    info!(client = client_id, actor = %claims.identifier, "Client archived");

    json_response(
        StatusCode::OK,
        &ArchiveClientResponse {
            message: format!("Client {} archived", client.name),
            client,
        },
    )
}
