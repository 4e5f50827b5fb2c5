//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use shared::{ApiResponse, CreateUserInput, LoginInput, User, UserRole};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::{require_role, CurrentUser};
use crate::services::auth::AuthTokens;
use crate::services::AuthService;
use crate::AppState;

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginInput>,
) -> AppResult<Json<ApiResponse<AuthTokens>>> {
    let service = AuthService::new(state.store.clone(), &state.config.jwt);
    let tokens = service.login(body).await?;
    Ok(Json(ApiResponse::with_message("เข้าสู่ระบบสำเร็จ", tokens)))
}

/// Profile of the authenticated caller
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let service = AuthService::new(state.store.clone(), &state.config.jwt);
    let user = service.current_user(current_user.0.user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(body): AppJson<CreateUserInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    require_role(&current_user.0, &[UserRole::Admin, UserRole::Manager])?;

    let service = AuthService::new(state.store.clone(), &state.config.jwt);
    let user = service.create_user(&current_user.0, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างผู้ใช้สำเร็จ", user)),
    ))
}
