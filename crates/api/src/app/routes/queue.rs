//! Tenant-scoped queue endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{sse::Event as SseEvent, IntoResponse, Sse},
    Json,
};

use payforge_auth::Permission;
use payforge_infra::queue::{CreateQueue, PageRequest};

use crate::app::dto::{self, CreateQueueRequest, QueueInfoQuery, QueueTableQuery, ReinitializeQueueRequest};
use crate::app::errors;
use crate::app::services::{self, AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

/// POST /queue
pub async fn create_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateQueueRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&tenant, &principal, &Permission::QUEUE_WRITE) {
        return errors::forbidden(e);
    }
    let job_type = match dto::parse_job_type(&body.job_type) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let input = CreateQueue {
        name: body.name,
        job_type,
        settings: body.settings,
    };
    match services.queue.create_queue(tenant.tenant_id(), input).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// POST /queue/reinitialize
///
/// Responds with the queue as it was before the override.
pub async fn reinitialize_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ReinitializeQueueRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&tenant, &principal, &Permission::QUEUE_WRITE) {
        return errors::forbidden(e);
    }
    let id = match dto::parse_queue_id(Some(&body.queue_id)) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let status = match dto::parse_queue_status(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.queue.reinitialize_queue(tenant.tenant_id(), id, status).await {
        Ok(Some(before)) => (StatusCode::OK, Json(before)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("queue {id} not found")),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// GET /queue/info?id=
pub async fn get_queue_info(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<QueueInfoQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&tenant, &principal, &Permission::QUEUE_READ) {
        return errors::forbidden(e);
    }
    let id = match dto::parse_queue_id(query.id.as_deref()) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.queue.get_queue_info(tenant.tenant_id(), id, true).await {
        Ok(Some(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("queue {id} not found")),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// GET /queue/table?page=&limit=
pub async fn get_queue_table(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<QueueTableQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&tenant, &principal, &Permission::QUEUE_READ) {
        return errors::forbidden(e);
    }
    let page = PageRequest::parse(query.page.as_deref(), query.limit.as_deref());

    match services.queue.get_queue_table(tenant.tenant_id(), page).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// GET /queue/stream
pub async fn stream_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, axum::response::Response> {
    authz::require(&tenant, &principal, &Permission::QUEUE_READ).map_err(errors::forbidden)?;
    Ok(services::tenant_sse_stream(services, tenant.tenant_id()))
}
