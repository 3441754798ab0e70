use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use payforge_auth::Permission;

use crate::app::dto::{UploadFileRequest, UploadedFileResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

/// POST /files
///
/// Registers already-parsed rows so an employee importation can reference
/// them through `settings.fileId`.
pub async fn upload_file(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<UploadFileRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&tenant, &principal, &Permission::QUEUE_WRITE) {
        return errors::forbidden(e);
    }
    if body.name.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "name must not be empty");
    }

    match services.files.upload(tenant.tenant_id(), body.name.trim(), body.rows) {
        Ok(file) => {
            tracing::info!(file_id = %file.id, tenant_id = %tenant.tenant_id(), rows = file.rows.len(), "file uploaded");
            (StatusCode::CREATED, Json(UploadedFileResponse::from(file))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "file upload failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
    }
}
