//! HTTP handlers for the stock ledger

use axum::{extract::State, http::StatusCode, Json};
use shared::{
    ApiResponse, CancelStockInInput, RecordStockInInput, StockInFilter, StockInHistory,
    StockOutHistory, StockWithProduct, UserRole,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_branch_access, require_role, CurrentUser};
use crate::services::StockService;
use crate::AppState;

/// Record an inbound receipt
pub async fn record_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<RecordStockInInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<StockInHistory>>)> {
    require_role(
        &current_user.0,
        &[UserRole::Admin, UserRole::Manager, UserRole::Staff],
    )?;
    require_branch_access(&current_user.0, input.branch_id)?;

    let history = StockService::new(state.store)
        .record_stock_in(current_user.0.user_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("นำเข้าสินค้าสำเร็จ", history)),
    ))
}

pub async fn list_stocks_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<StockWithProduct>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let stocks = StockService::new(state.store)
        .list_stocks_by_branch(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(stocks)))
}

pub async fn list_stock_in_histories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
    AppQuery(filter): AppQuery<StockInFilter>,
) -> AppResult<Json<ApiResponse<Vec<StockInHistory>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let histories = StockService::new(state.store)
        .list_stock_in_histories(branch_id, filter)
        .await?;
    Ok(Json(ApiResponse::success(histories)))
}

pub async fn list_stock_out_histories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<StockOutHistory>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let histories = StockService::new(state.store)
        .list_stock_out_histories(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(histories)))
}

/// Reverse a receipt of the branch
pub async fn cancel_stock_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath((branch_id, stock_in_id)): AppPath<(Uuid, Uuid)>,
    AppJson(input): AppJson<CancelStockInInput>,
) -> AppResult<Json<ApiResponse<StockInHistory>>> {
    require_role(&current_user.0, &[UserRole::Admin, UserRole::Manager])?;
    require_branch_access(&current_user.0, branch_id)?;

    let history = StockService::new(state.store)
        .cancel_stock_in(branch_id, stock_in_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("ยกเลิกบิลนำเข้าสำเร็จ", history)))
}
