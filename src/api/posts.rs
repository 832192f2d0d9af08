use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::CurrentAccount;
use super::{ApiError, ApiResponse, AppState, CreatePostRequest, ListPostsQuery};
use crate::db::Post;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

/// GET /posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<ApiResponse<Vec<Post>>>, ApiError> {
    let posts = match query.author_id {
        Some(author_id) => state.posts.list_by_author(author_id).await?,
        None => {
            let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
            state.posts.list(limit).await?
        }
    };

    Ok(Json(ApiResponse::success(posts)))
}

/// POST /posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(author)): Extension<CurrentAccount>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    let post = state.posts.create(&author, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(post))))
}
