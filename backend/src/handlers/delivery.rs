//! HTTP handlers for deliveries

use axum::{extract::State, http::StatusCode, Json};
use shared::{
    AddDriversInput, ApiResponse, CompleteDeliveryInput, CreateDeliveryInput, DeliveryFilter,
    DeliveryWithDrivers, User, UserRole,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_branch_access, require_role, AuthUser, CurrentUser};
use crate::services::{guards, DeliveryService};
use crate::AppState;

fn delivery_service(state: &AppState) -> DeliveryService {
    DeliveryService::new(
        state.store.clone(),
        state.storage.clone(),
        state.config.storage.max_slip_bytes,
    )
}

/// The caller must reach the branch of the order being shipped
async fn require_order_branch(state: &AppState, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
    let order = guards::require_order(state.store.as_ref(), order_id).await?;
    require_branch_access(user, order.branch_id)
}

pub async fn create_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(order_id): AppPath<Uuid>,
    AppJson(input): AppJson<CreateDeliveryInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<DeliveryWithDrivers>>)> {
    require_role(
        &current_user.0,
        &[
            UserRole::Admin,
            UserRole::Manager,
            UserRole::Staff,
            UserRole::Cashier,
        ],
    )?;
    require_order_branch(&state, &current_user.0, order_id).await?;

    let delivery = delivery_service(&state)
        .create_delivery(order_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("บันทึกการขนส่งสำเร็จ", delivery)),
    ))
}

pub async fn add_drivers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(order_id): AppPath<Uuid>,
    AppJson(input): AppJson<AddDriversInput>,
) -> AppResult<Json<ApiResponse<DeliveryWithDrivers>>> {
    require_role(&current_user.0, &[UserRole::Admin, UserRole::Manager])?;
    require_order_branch(&state, &current_user.0, order_id).await?;

    let delivery = delivery_service(&state).add_drivers(order_id, input).await?;
    Ok(Json(ApiResponse::with_message("เพิ่มคนขนส่งสำเร็จ", delivery)))
}

pub async fn complete_delivery(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(order_id): AppPath<Uuid>,
    AppJson(input): AppJson<CompleteDeliveryInput>,
) -> AppResult<Json<ApiResponse<DeliveryWithDrivers>>> {
    require_role(
        &current_user.0,
        &[UserRole::Transporter, UserRole::Admin, UserRole::Manager],
    )?;
    require_order_branch(&state, &current_user.0, order_id).await?;

    let delivery = delivery_service(&state)
        .complete_delivery(order_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("จัดส่งสำเร็จ", delivery)))
}

pub async fn list_deliveries_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
    AppQuery(filter): AppQuery<DeliveryFilter>,
) -> AppResult<Json<ApiResponse<Vec<DeliveryWithDrivers>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let deliveries = delivery_service(&state)
        .list_deliveries_by_branch(branch_id, filter, current_user.0.user_id)
        .await?;
    Ok(Json(ApiResponse::success(deliveries)))
}

pub async fn list_available_drivers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<User>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let drivers = delivery_service(&state)
        .list_available_drivers(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(drivers)))
}
