//! Staff account listings

use axum::{extract::State, Json};
use shared::{ApiResponse, User, UserRole};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::AppPath;
use crate::middleware::{require_branch_access, require_role, CurrentUser};
use crate::services::UserService;
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let users = UserService::new(state.store).list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = UserService::new(state.store).get_user(id).await?;
    if user.id != current_user.0.user_id {
        require_role(&current_user.0, &[UserRole::Admin, UserRole::Manager])?;
        if let Some(branch_id) = user.branch_id {
            require_branch_access(&current_user.0, branch_id)?;
        } else {
            require_role(&current_user.0, &[UserRole::Admin])?;
        }
    }
    Ok(Json(ApiResponse::success(user)))
}

pub async fn list_users_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    require_role(&current_user.0, &[UserRole::Admin, UserRole::Manager])?;
    require_branch_access(&current_user.0, branch_id)?;

    let users = UserService::new(state.store)
        .list_users_by_branch(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}
