use axum::{
    Extension, Json,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;

use super::auth::CurrentAccount;
use super::{ApiError, ApiResponse, AppState};
use crate::admin::{AdminError, ChangeListRow};
use crate::forms::{ChangeInput, CreationInput};
use crate::identity::{Account, PasswordPolicy};

fn label(app: &str, model: &str) -> String {
    format!("{app}.{model}")
}

/// Rejects non-privileged accounts before the path or body is parsed.
/// Runs inside `require_login`.
pub async fn require_privileged(
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let privileged = request
        .extensions()
        .get::<CurrentAccount>()
        .is_some_and(|CurrentAccount(account)| account.is_privileged());

    if !privileged {
        tracing::warn!("Unprivileged request to the administration site");
        return Err(AdminError::PermissionDenied.into());
    }

    Ok(next.run(request).await)
}

/// GET /admin
pub async fn index(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(requester)): Extension<CurrentAccount>,
) -> Result<Json<ApiResponse<Vec<&'static str>>>, ApiError> {
    Ok(Json(ApiResponse::success(state.admin.index(&requester)?)))
}

/// GET /admin/{app}/{model}
pub async fn changelist(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(requester)): Extension<CurrentAccount>,
    Path((app, model)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<ChangeListRow>>>, ApiError> {
    let rows = state
        .admin
        .changelist(&state.store, &requester, &label(&app, &model))
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// POST /admin/{app}/{model}
pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(requester)): Extension<CurrentAccount>,
    Path((app, model)): Path<(String, String)>,
    Json(payload): Json<CreationInput>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    let policy = PasswordPolicy::new(state.config.security.password_policy.clone());
    let account = state
        .admin
        .add(&requester, &label(&app, &model), policy, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

/// GET /admin/{app}/{model}/{id}
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(requester)): Extension<CurrentAccount>,
    Path((app, model, id)): Path<(String, String, i32)>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    let account = state
        .admin
        .detail(&state.store, &requester, &label(&app, &model), id)
        .await?;
    Ok(Json(ApiResponse::success(account)))
}

/// PUT /admin/{app}/{model}/{id}
pub async fn change(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(requester)): Extension<CurrentAccount>,
    Path((app, model, id)): Path<(String, String, i32)>,
    Json(payload): Json<ChangeInput>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    let account = state
        .admin
        .change(&state.store, &requester, &label(&app, &model), id, payload)
        .await?;
    Ok(Json(ApiResponse::success(account)))
}
