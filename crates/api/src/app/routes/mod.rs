use axum::{
    routing::{get, post},
    Router,
};

pub mod files;
pub mod queue;
pub mod system;

/// Authenticated routes. The caller adds services and the auth layer.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/queue", post(queue::create_queue))
        .route("/queue/reinitialize", post(queue::reinitialize_queue))
        .route("/queue/info", get(queue::get_queue_info))
        .route("/queue/table", get(queue::get_queue_table))
        .route("/queue/stream", get(queue::stream_progress))
        .route("/files", post(files::upload_file))
}
