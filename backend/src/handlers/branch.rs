use axum::{extract::State, http::StatusCode, Json};
use shared::{ApiResponse, Branch, CreateBranchInput, UpdateBranchInput, UserRole};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::middleware::{require_role, CurrentUser};
use crate::services::BranchService;
use crate::AppState;

pub async fn list_branches(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Branch>>>> {
    let branches = BranchService::new(state.store).list_branches().await?;
    Ok(Json(ApiResponse::success(branches)))
}

pub async fn create_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateBranchInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Branch>>)> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let branch = BranchService::new(state.store).create_branch(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างสาขาสำเร็จ", branch)),
    ))
}

pub async fn update_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateBranchInput>,
) -> AppResult<Json<ApiResponse<Branch>>> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let branch = BranchService::new(state.store).update_branch(id, input).await?;
    Ok(Json(ApiResponse::with_message("แก้ไขสาขาสำเร็จ", branch)))
}
