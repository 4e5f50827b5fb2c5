//! HTTP handlers for the order lifecycle

use axum::{extract::State, http::StatusCode, Json};
use shared::{
    ApiResponse, ConfirmOrderInput, CreateOrderInput, Order, OrderDetail, OrderFilter, UserRole,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_branch_access, require_role, CurrentUser};
use crate::services::{guards, OrderService};
use crate::AppState;

const ORDER_CLERKS: [UserRole; 4] = [
    UserRole::Admin,
    UserRole::Manager,
    UserRole::Cashier,
    UserRole::Staff,
];

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(
        state.store.clone(),
        state.storage.clone(),
        state.config.storage.max_slip_bytes,
    )
}

/// Open a PENDING order
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    require_branch_access(&current_user.0, input.branch_id)?;

    let order = order_service(&state)
        .create_order(current_user.0.user_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างรายการสำเร็จ", order)),
    ))
}

/// Confirm a PENDING order with its items and payment
pub async fn confirm_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<ConfirmOrderInput>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    require_role(&current_user.0, &ORDER_CLERKS)?;
    let order = guards::require_order(state.store.as_ref(), input.order_id).await?;
    require_branch_access(&current_user.0, order.branch_id)?;

    let detail = order_service(&state).confirm_order(input).await?;
    Ok(Json(ApiResponse::with_message("ปิดรายการเรียบร้อย", detail)))
}

/// Delete a PENDING order
pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Uuid>>> {
    require_role(&current_user.0, &ORDER_CLERKS)?;
    let order = guards::require_order(state.store.as_ref(), id).await?;
    require_branch_access(&current_user.0, order.branch_id)?;

    order_service(&state).cancel_order(id).await?;
    Ok(Json(ApiResponse::with_message("ยกเลิกรายการสำเร็จ", id)))
}

pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let detail = order_service(&state).get_order(id).await?;
    require_branch_access(&current_user.0, detail.order.branch_id)?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn list_orders_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
    AppQuery(filter): AppQuery<OrderFilter>,
) -> AppResult<Json<ApiResponse<Vec<OrderDetail>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let orders = order_service(&state)
        .list_orders_by_branch(branch_id, filter)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Orders opened by a user; callers see their own, managers everyone's
pub async fn list_orders_by_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(user_id): AppPath<Uuid>,
    AppQuery(filter): AppQuery<OrderFilter>,
) -> AppResult<Json<ApiResponse<Vec<OrderDetail>>>> {
    let caller = &current_user.0;
    if caller.user_id != user_id && !caller.has_role(&[UserRole::Admin, UserRole::Manager]) {
        return Err(AppError::InsufficientPermissions);
    }

    let mut orders = order_service(&state)
        .list_orders_by_user(user_id, filter)
        .await?;
    if !caller.is_admin() && caller.user_id != user_id {
        orders.retain(|o| caller.branch_id == Some(o.order.branch_id));
    }
    Ok(Json(ApiResponse::success(orders)))
}
