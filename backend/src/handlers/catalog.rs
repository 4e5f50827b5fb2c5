//! Catalog handlers: categories, products, branch prices and payment methods

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use shared::{
    ApiResponse, BranchProduct, Category, CreateCategoryInput, CreatePaymentMethodInput,
    CreateProductInput, PaymentMethod, Product, ProductSaleBranch, SetSellPriceInput,
    UpdateCategoryInput, UpdatePaymentMethodInput, UpdateProductInput, UserRole,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_branch_access, require_role, CurrentUser};
use crate::services::{PaymentMethodService, ProductService};
use crate::AppState;

const CATALOG_EDITORS: [UserRole; 2] = [UserRole::Admin, UserRole::Manager];

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    #[serde(default)]
    pub include_retired: bool,
}

pub async fn list_categories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    let categories = ProductService::new(state.store).list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let category = ProductService::new(state.store).create_category(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างหมวดหมู่สำเร็จ", category)),
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateCategoryInput>,
) -> AppResult<Json<ApiResponse<Category>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let category = ProductService::new(state.store)
        .update_category(id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("แก้ไขหมวดหมู่สำเร็จ", category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Uuid>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    ProductService::new(state.store).delete_category(id).await?;
    Ok(Json(ApiResponse::with_message("ลบหมวดหมู่สำเร็จ", id)))
}

pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppQuery(query): AppQuery<ProductListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    let products = ProductService::new(state.store)
        .list_products(query.include_retired)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreateProductInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let product = ProductService::new(state.store).create_product(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างสินค้าสำเร็จ", product)),
    ))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = ProductService::new(state.store).get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateProductInput>,
) -> AppResult<Json<ApiResponse<Product>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let product = ProductService::new(state.store)
        .update_product(id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("แก้ไขสินค้าสำเร็จ", product)))
}

pub async fn retire_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let product = ProductService::new(state.store).retire_product(id).await?;
    Ok(Json(ApiResponse::with_message("ลบสินค้าสำเร็จ", product)))
}

pub async fn restore_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;

    let product = ProductService::new(state.store).restore_product(id).await?;
    Ok(Json(ApiResponse::with_message("กู้คืนสินค้าสำเร็จ", product)))
}

pub async fn list_products_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<BranchProduct>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let products = ProductService::new(state.store)
        .list_products_by_branch(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Active products that still have no sell price in the branch
pub async fn list_unpriced_products_by_branch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(branch_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    require_branch_access(&current_user.0, branch_id)?;

    let products = ProductService::new(state.store)
        .list_unpriced_products_by_branch(branch_id)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn set_sell_price(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<SetSellPriceInput>,
) -> AppResult<Json<ApiResponse<ProductSaleBranch>>> {
    require_role(&current_user.0, &CATALOG_EDITORS)?;
    require_branch_access(&current_user.0, input.branch_id)?;

    let price = ProductService::new(state.store).set_sell_price(input).await?;
    Ok(Json(ApiResponse::with_message("กำหนดราคาขายสำเร็จ", price)))
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<PaymentMethod>>>> {
    let methods = PaymentMethodService::new(state.store)
        .list_payment_methods()
        .await?;
    Ok(Json(ApiResponse::success(methods)))
}

pub async fn create_payment_method(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppJson(input): AppJson<CreatePaymentMethodInput>,
) -> AppResult<(StatusCode, Json<ApiResponse<PaymentMethod>>)> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let method = PaymentMethodService::new(state.store)
        .create_payment_method(input)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("สร้างประเภทการชำระเงินสำเร็จ", method)),
    ))
}

pub async fn update_payment_method(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdatePaymentMethodInput>,
) -> AppResult<Json<ApiResponse<PaymentMethod>>> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    let method = PaymentMethodService::new(state.store)
        .update_payment_method(id, input)
        .await?;
    Ok(Json(ApiResponse::with_message("แก้ไขประเภทการชำระเงินสำเร็จ", method)))
}

pub async fn remove_payment_method(
    State(state): State<AppState>,
    current_user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Uuid>>> {
    require_role(&current_user.0, &[UserRole::Admin])?;

    PaymentMethodService::new(state.store)
        .remove_payment_method(id)
        .await?;
    Ok(Json(ApiResponse::with_message("ลบประเภทการชำระเงินสำเร็จ", id)))
}
