use axum::{
    Extension, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::{
    ApiError, ApiResponse, AppState, LoginRequest, MessageResponse, PasswordResetConfirmRequest,
    PasswordResetRequest,
};
use crate::forms::{ChangeInput, CreationInput, PasswordChangeInput, SetPasswordInput};
use crate::identity::Account;

pub const SESSION_ACCOUNT_KEY: &str = "account_id";

/// The logged-in account, re-read from storage for every request.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session to an active account or rejects with 401.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = session
        .get::<i32>(SESSION_ACCOUNT_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(ApiError::unauthenticated)?;

    let Some(account) = state.auth.active_account(account_id).await? else {
        let _ = session.flush().await;
        return Err(ApiError::unauthenticated());
    };

    tracing::Span::current().record("account_id", account.id);
    request.extensions_mut().insert(CurrentAccount(account));
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreationInput>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    let account = state.auth.signup(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let account = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?;

    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to rotate session: {e}")))?;
    session
        .insert(SESSION_ACCOUNT_KEY, account.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    tracing::info!(account_id = account.id, "Logged in");
    Ok(Json(ApiResponse::success(account)))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> Json<ApiResponse<MessageResponse>> {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /auth/me
pub async fn me(
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Json<ApiResponse<Account>> {
    Json(ApiResponse::success(account))
}

/// PUT /auth/me
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(payload): Json<ChangeInput>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    let updated = state.auth.update_profile(account.id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(payload): Json<PasswordChangeInput>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.auth.change_password(account.id, payload).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

/// POST /auth/password-reset
///
/// Answers the same way whether or not the address is known.
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.auth.request_password_reset(&payload.email).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "If an account exists for that address, a password reset link has been sent.",
    ))))
}

/// POST /auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let input = SetPasswordInput {
        new_password1: payload.new_password1,
        new_password2: payload.new_password2,
    };
    state
        .auth
        .confirm_password_reset(&payload.token, input)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Your password has been set. You may go ahead and log in now.",
    ))))
}
