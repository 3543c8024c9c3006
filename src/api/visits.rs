//! Blog visit endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::visit::PendingVisits,
    AppState,
};

/// Record a page view of a blog.
///
/// The visit itself is counted by the tracking middleware after this response is sent.
#[utoipa::path(
    post,
    path = "/blogs/{blogId}/visit",
    tag = "visits",
    params(("blogId" = String, Path, description = "Blog ID")),
    responses(
        (status = 204, description = "Visit accepted")
    )
)]
pub async fn record_visit(Path(_blog_id): Path<String>) -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Get the unique visits of a blog not yet flushed to durable statistics
#[utoipa::path(
    get,
    path = "/blogs/{blogId}/visits/pending",
    tag = "visits",
    params(("blogId" = String, Path, description = "Blog ID")),
    responses(
        (status = 200, description = "Pending visit count", body = PendingVisits),
        (status = 503, description = "Visit store unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_pending_visits(
    State(state): State<AppState>,
    Path(blog_id): Path<String>,
) -> AppResult<Json<PendingVisits>> {
    if blog_id.trim().is_empty() {
        return Err(AppError::BadRequest("blogId must not be empty".to_string()));
    }

    let pending = state.services.visits.pending(&blog_id).await?;
    Ok(Json(PendingVisits { blog_id, pending }))
}
