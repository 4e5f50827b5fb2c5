use axum::{extract::State, http::StatusCode, Json};
use shared::{
    ApiResponse, CreateCustomerInput, Customer, CustomerFilter, CustomerGroup, CustomerGroupInput,
    UpdateCustomerInput, UserRole,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_branch_access, require_role, CurrentUser};
use crate::services::{CustomerGroupService, CustomerService};
use crate::AppState;

pub async fn list_customers_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
    AppQuery(filter): AppQuery<CustomerFilter>,
) -> AppResult<Json<ApiResponse<Vec<Customer>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let customers = CustomerService::new(state.store)
        .list_customers_by_branch(branch_id, filter)
        .await?;
    Ok(Json(ApiResponse::success(customers)))
}

pub async fn list_customers_by_branch_and_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath((branch_id, user_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Vec<Customer>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let customers = CustomerService::new(state.store)
        .list_customers_by_branch_and_user(branch_id, user_id)
        .await?;
    Ok(Json(ApiResponse::success(customers)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let customer = CustomerService::new(state.store).get_customer(id).await?;
    require_branch_access(&current_user.0, customer.branch_id)?;
    Ok(Json(ApiResponse::success(customer)))
}

pub async fn create_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateCustomerInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Customer>>)> {
    require_branch_access(&current_user.0, input.branch_id)?;

    let customer = CustomerService::new(state.store)
        .create_customer(current_user.0.user_id, input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างลูกค้าสำเร็จ", customer)),
    ))
}

pub async fn update_customer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateCustomerInput>,
) -> AppResult<Json<ApiResponse<Customer>>> {
    let service = CustomerService::new(state.store);
    let existing = service.get_customer(id).await?;
    require_branch_access(&current_user.0, existing.branch_id)?;

    let customer = service.update_customer(id, input).await?;
    Ok(Json(ApiResponse::with_message("แก้ไขข้อมูลลูกค้าสำเร็จ", customer)))
}

pub async fn list_customer_groups(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<CustomerGroup>>>> {
    let groups = CustomerGroupService::new(state.store)
        .list_customer_groups()
        .await?;
    Ok(Json(ApiResponse::success(groups)))
}

pub async fn create_customer_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CustomerGroupInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<CustomerGroup>>)> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let group = CustomerGroupService::new(state.store)
        .create_customer_group(input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างกลุ่มลูกค้าสำเร็จ", group)),
    ))
}

pub async fn update_customer_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<CustomerGroupInput>,
) -> AppResult<Json<ApiResponse<CustomerGroup>>> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let group = CustomerGroupService::new(state.store)
        .update_customer_group(id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("แก้ไขกลุ่มลูกค้าสำเร็จ", group)))
}
