//! PostgreSQL store
//!
//! Enums are persisted as VARCHAR using their `as_str` names; rows are read
//! into private `FromRow` structs and mapped onto the shared models.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Branch, BranchProduct, Category, Customer, CustomerFilter, CustomerGroup, Delivery,
    DeliveryDriver, DeliveryFilter, DeliveryStatus, DeliveryType, DeliveryWithDrivers, GpsCoordinates, Order,
    OrderFilter, OrderStatus, OrderType, PaymentMethod, PaymentOrder, PaymentOrderSlip, Product,
    ProductSaleBranch, ProductState, ProductUnit, Stock, StockInCancellation, StockInFilter,
    StockInHistory, StockInItem, StockOutHistory, StockOutType, StockWithProduct, User,
    UserRole, UserStatus,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    BranchRepository, CatalogRepository, CustomerRepository, DeliveryRepository,
    DeliverySettlement, NewStockIn, OrderConfirmation, OrderRepository, OrderScope,
    StockRepository, Store, UserCredentials, UserRepository,
};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn parse_column<T>(value: &str, column: &str, parse: fn(&str) -> Option<T>) -> AppResult<T> {
    parse(value).ok_or_else(|| AppError::Internal(format!("Unknown {} value: {}", column, value)))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: Uuid,
    code: String,
    name: String,
    phone: String,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            code: row.code,
            name: row.name,
            phone: row.phone,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    code: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            code: row.code,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.code, p.barcode, p.name, p.unit, p.category_id, \
     p.description, p.image_url, p.deleted_at, p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    barcode: String,
    name: String,
    unit: String,
    category_id: Uuid,
    description: Option<String>,
    image_url: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> AppResult<Product> {
        Ok(Product {
            id: self.id,
            code: self.code,
            barcode: self.barcode,
            name: self.name,
            unit: parse_column(&self.unit, "unit", ProductUnit::parse)?,
            category_id: self.category_id,
            description: self.description,
            image_url: self.image_url,
            state: ProductState::from_retired_at(self.deleted_at),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BranchProductRow {
    id: Uuid,
    code: String,
    barcode: String,
    name: String,
    unit: String,
    category_id: Uuid,
    description: Option<String>,
    image_url: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sell_price: Option<Decimal>,
    quantity: Option<i32>,
}

impl BranchProductRow {
    fn into_branch_product(self) -> AppResult<BranchProduct> {
        let sell_price = self.sell_price;
        let quantity = self.quantity;
        let product = ProductRow {
            id: self.id,
            code: self.code,
            barcode: self.barcode,
            name: self.name,
            unit: self.unit,
            category_id: self.category_id,
            description: self.description,
            image_url: self.image_url,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_product()?;
        Ok(BranchProduct {
            product,
            sell_price,
            quantity,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SellPriceRow {
    product_id: Uuid,
    branch_id: Uuid,
    sell_price: Decimal,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentMethodRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

const CUSTOMER_COLUMNS: &str =
    "id, branch_id, user_id, customer_group_id, name, phone, address, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    branch_id: Uuid,
    user_id: Uuid,
    customer_group_id: Option<Uuid>,
    name: String,
    phone: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            branch_id: row.branch_id,
            user_id: row.user_id,
            customer_group_id: row.customer_group_id,
            name: row.name,
            phone: row.phone,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerGroupRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerGroupRow> for CustomerGroup {
    fn from(row: CustomerGroupRow) -> Self {
        CustomerGroup {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, name, phone, role, branch_id, status, created_at, password_hash";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    name: String,
    phone: Option<String>,
    role: String,
    branch_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl UserRow {
    fn into_credentials(self) -> AppResult<UserCredentials> {
        Ok(UserCredentials {
            user: User {
                id: self.id,
                username: self.username,
                email: self.email,
                name: self.name,
                phone: self.phone,
                role: parse_column(&self.role, "role", UserRole::parse)?,
                branch_id: self.branch_id,
                status: parse_column(&self.status, "status", UserStatus::parse)?,
                created_at: self.created_at,
            },
            password_hash: self.password_hash,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, user_id, branch_id, order_code, status, \
     order_type, total_price, note, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    user_id: Uuid,
    branch_id: Uuid,
    order_code: String,
    status: String,
    order_type: Option<String>,
    total_price: Option<Decimal>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> AppResult<Order> {
        let order_type = match self.order_type.as_deref() {
            Some(value) => Some(parse_column(value, "order_type", OrderType::parse)?),
            None => None,
        };
        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            user_id: self.user_id,
            branch_id: self.branch_id,
            order_code: self.order_code,
            status: parse_column(&self.status, "status", OrderStatus::parse)?,
            order_type,
            total_price: self.total_price,
            note: self.note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    order_id: Uuid,
    payment_method_id: Uuid,
    amount_received: Option<Decimal>,
    change: Option<Decimal>,
    credit_days: Option<i32>,
    deposit: Option<Decimal>,
    discount: Option<Decimal>,
    paid_at: Option<DateTime<Utc>>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentOrder {
    fn from(row: PaymentRow) -> Self {
        PaymentOrder {
            order_id: row.order_id,
            payment_method_id: row.payment_method_id,
            amount_received: row.amount_received,
            change: row.change,
            credit_days: row.credit_days,
            deposit: row.deposit,
            discount: row.discount,
            paid_at: row.paid_at,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SlipRow {
    id: Uuid,
    order_id: Uuid,
    image_url: String,
    created_at: DateTime<Utc>,
}

impl From<SlipRow> for PaymentOrderSlip {
    fn from(row: SlipRow) -> Self {
        PaymentOrderSlip {
            id: row.id,
            order_id: row.order_id,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

const STOCK_OUT_COLUMNS: &str = "so.id, so.order_id, so.stock_id, so.product_id, so.quantity, \
     so.sell_price, so.kind, so.note, so.created_at";

#[derive(Debug, sqlx::FromRow)]
struct StockOutRow {
    id: Uuid,
    order_id: Uuid,
    stock_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    sell_price: Decimal,
    kind: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl StockOutRow {
    fn into_stock_out(self) -> AppResult<StockOutHistory> {
        Ok(StockOutHistory {
            id: self.id,
            order_id: self.order_id,
            stock_id: self.stock_id,
            product_id: self.product_id,
            quantity: self.quantity,
            sell_price: self.sell_price,
            kind: parse_column(&self.kind, "kind", StockOutType::parse)?,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: Uuid,
    product_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Stock {
            id: row.id,
            product_id: row.product_id,
            branch_id: row.branch_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockWithProductRow {
    id: Uuid,
    product_id: Uuid,
    branch_id: Uuid,
    quantity: i32,
    updated_at: DateTime<Utc>,
    product_code: String,
    product_name: String,
}

const STOCK_IN_COLUMNS: &str = "id, branch_id, user_id, ref_code, distributor, total_price, \
     note, canceled_by, canceled_at, cancel_note, created_at";

#[derive(Debug, sqlx::FromRow)]
struct StockInRow {
    id: Uuid,
    branch_id: Uuid,
    user_id: Uuid,
    ref_code: String,
    distributor: String,
    total_price: Decimal,
    note: Option<String>,
    canceled_by: Option<Uuid>,
    canceled_at: Option<DateTime<Utc>>,
    cancel_note: Option<String>,
    created_at: DateTime<Utc>,
}

impl StockInRow {
    fn into_history(self, items: Vec<StockInItem>) -> StockInHistory {
        let cancellation = match (self.canceled_by, self.canceled_at) {
            (Some(canceled_by), Some(canceled_at)) => Some(StockInCancellation {
                canceled_by,
                canceled_at,
                cancel_note: self.cancel_note.unwrap_or_default(),
            }),
            _ => None,
        };
        StockInHistory {
            id: self.id,
            branch_id: self.branch_id,
            user_id: self.user_id,
            ref_code: self.ref_code,
            distributor: self.distributor,
            total_price: self.total_price,
            note: self.note,
            cancellation,
            items,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockInItemRow {
    id: Uuid,
    stock_in_history_id: Uuid,
    stock_id: Uuid,
    product_id: Uuid,
    cost_price: Decimal,
    quantity: i32,
}

impl From<StockInItemRow> for StockInItem {
    fn from(row: StockInItemRow) -> Self {
        StockInItem {
            id: row.id,
            stock_in_history_id: row.stock_in_history_id,
            stock_id: row.stock_id,
            product_id: row.product_id,
            cost_price: row.cost_price,
            quantity: row.quantity,
        }
    }
}

const DELIVERY_COLUMNS: &str = "d.order_id, d.track_number, d.distance, d.address, d.kind, \
     d.latitude, d.longitude, d.note, d.send_date, d.fee, d.status, d.delivered_at, d.created_at";

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    order_id: Uuid,
    track_number: String,
    distance: Decimal,
    address: String,
    kind: String,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    note: Option<String>,
    send_date: DateTime<Utc>,
    fee: Decimal,
    status: String,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> AppResult<Delivery> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GpsCoordinates::new(latitude, longitude)),
            _ => None,
        };
        Ok(Delivery {
            order_id: self.order_id,
            track_number: self.track_number,
            distance: self.distance,
            address: self.address,
            kind: parse_column(&self.kind, "kind", DeliveryType::parse)?,
            location,
            note: self.note,
            send_date: self.send_date,
            fee: self.fee,
            status: parse_column(&self.status, "status", DeliveryStatus::parse)?,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DriverRow {
    order_id: Uuid,
    user_id: Uuid,
    assigned_at: DateTime<Utc>,
}

impl From<DriverRow> for DeliveryDriver {
    fn from(row: DriverRow) -> Self {
        DeliveryDriver {
            order_id: row.order_id,
            user_id: row.user_id,
            assigned_at: row.assigned_at,
        }
    }
}

impl PgStore {
    async fn load_stock_in_items(
        &self,
        history_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<StockInItem>>> {
        let rows = sqlx::query_as::<_, StockInItemRow>(
            r#"
            SELECT id, stock_in_history_id, stock_id, product_id, cost_price, quantity
            FROM stock_in_items
            WHERE stock_in_history_id = ANY($1)
            ORDER BY position
            "#,
        )
        .bind(history_ids)
        .fetch_all(&self.db)
        .await?;

        let mut items: HashMap<Uuid, Vec<StockInItem>> = HashMap::new();
        for row in rows {
            items
                .entry(row.stock_in_history_id)
                .or_default()
                .push(row.into());
        }
        Ok(items)
    }

    async fn attach_drivers(&self, rows: Vec<DeliveryRow>) -> AppResult<Vec<DeliveryWithDrivers>> {
        let order_ids: Vec<Uuid> = rows.iter().map(|r| r.order_id).collect();
        let driver_rows = sqlx::query_as::<_, DriverRow>(
            r#"
            SELECT order_id, user_id, assigned_at
            FROM delivery_drivers
            WHERE order_id = ANY($1)
            ORDER BY assigned_at
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.db)
        .await?;

        let mut drivers: HashMap<Uuid, Vec<DeliveryDriver>> = HashMap::new();
        for row in driver_rows {
            drivers.entry(row.order_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let order_id = row.order_id;
                Ok(DeliveryWithDrivers {
                    delivery: row.into_delivery()?,
                    drivers: drivers.remove(&order_id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

// ============================================================================
// Repository implementations
// ============================================================================

#[async_trait]
impl BranchRepository for PgStore {
    async fn insert_branch(&self, branch: &Branch) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO branches (id, code, name, phone, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(branch.id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(&branch.phone)
        .bind(&branch.address)
        .bind(branch.created_at)
        .bind(branch.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_branch(&self, id: Uuid) -> AppResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>(
            "SELECT id, code, name, phone, address, created_at, updated_at FROM branches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn branch_code_exists(&self, code: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn branch_name_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>(
            "SELECT id, code, name, phone, address, created_at, updated_at FROM branches ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_branch(&self, branch: &Branch) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE branches
            SET name = $2, phone = $3, address = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.phone)
        .bind(&branch.address)
        .bind(branch.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Branch", "ไม่พบสาขาที่ระบุ"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        sqlx::query("INSERT INTO categories (id, code, name, created_at) VALUES ($1, $2, $3, $4)")
            .bind(category.id)
            .bind(&category.code)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, code, name, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn category_exists(
        &self,
        code: &str,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM categories
                WHERE (code = $1 OR name = $2) AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, code, name, created_at FROM categories ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_category(&self, category: &Category) -> AppResult<()> {
        let result = sqlx::query("UPDATE categories SET code = $2, name = $3 WHERE id = $1")
            .bind(category.id)
            .bind(&category.code)
            .bind(&category.name)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Category", "ไม่พบหมวดหมู่นี้"));
        }
        Ok(())
    }

    async fn category_has_products(&self, id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Category", "ไม่พบหมวดหมู่นี้"));
        }
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, code, barcode, name, unit, category_id, description, image_url,
                 deleted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.unit.as_str())
        .bind(product.category_id)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(product.state.retired_at())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products p WHERE p.id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(ProductRow::into_product).transpose()
    }

    async fn product_exists(
        &self,
        code: &str,
        barcode: &str,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM products
                WHERE (code = $1 OR barcode = $2 OR name = $3)
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(code)
        .bind(barcode)
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_products(&self, include_retired: bool) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products p WHERE $1 OR p.deleted_at IS NULL ORDER BY p.code",
            PRODUCT_COLUMNS
        ))
        .bind(include_retired)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn update_product(&self, product: &Product) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET code = $2, barcode = $3, name = $4, unit = $5, category_id = $6,
                description = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.unit.as_str())
        .bind(product.category_id)
        .bind(&product.description)
        .bind(product.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Product", "ไม่พบสินค้าในระบบ"));
        }
        Ok(())
    }

    async fn update_product_state(
        &self,
        id: Uuid,
        state: ProductState,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE products SET deleted_at = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(state.retired_at())
            .bind(updated_at)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Product", "ไม่พบสินค้าในระบบ"));
        }
        Ok(())
    }

    async fn list_branch_products(&self, branch_id: Uuid) -> AppResult<Vec<BranchProduct>> {
        let rows = sqlx::query_as::<_, BranchProductRow>(&format!(
            r#"
            SELECT {}, psb.sell_price, s.quantity
            FROM products p
            LEFT JOIN product_sale_branches psb
                ON psb.product_id = p.id AND psb.branch_id = $1
            LEFT JOIN stocks s
                ON s.product_id = p.id AND s.branch_id = $1
            WHERE p.deleted_at IS NULL
            ORDER BY p.code
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(BranchProductRow::into_branch_product)
            .collect()
    }

    async fn list_unpriced_products(&self, branch_id: Uuid) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {}
            FROM products p
            WHERE p.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM product_sale_branches psb
                  WHERE psb.product_id = p.id AND psb.branch_id = $1
              )
            ORDER BY p.code
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn upsert_sell_price(&self, price: &ProductSaleBranch) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_sale_branches (product_id, branch_id, sell_price, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, branch_id)
            DO UPDATE SET sell_price = EXCLUDED.sell_price, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(price.product_id)
        .bind(price.branch_id)
        .bind(price.sell_price)
        .bind(price.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_sell_price(
        &self,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Option<ProductSaleBranch>> {
        let row = sqlx::query_as::<_, SellPriceRow>(
            r#"
            SELECT product_id, branch_id, sell_price, updated_at
            FROM product_sale_branches
            WHERE product_id = $1 AND branch_id = $2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| ProductSaleBranch {
            product_id: r.product_id,
            branch_id: r.branch_id,
            sell_price: r.sell_price,
            updated_at: r.updated_at,
        }))
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> AppResult<()> {
        sqlx::query("INSERT INTO payment_methods (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(method.id)
            .bind(&method.name)
            .bind(method.created_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn find_payment_method(&self, id: Uuid) -> AppResult<Option<PaymentMethod>> {
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            "SELECT id, name, created_at FROM payment_methods WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn payment_method_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payment_methods
                WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_payment_methods(&self) -> AppResult<Vec<PaymentMethod>> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(
            "SELECT id, name, created_at FROM payment_methods ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_payment_method(&self, method: &PaymentMethod) -> AppResult<()> {
        let result = sqlx::query("UPDATE payment_methods SET name = $2 WHERE id = $1")
            .bind(method.id)
            .bind(&method.name)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("PaymentMethod", "ไม่พบประเภทการชำระเงิน"));
        }
        Ok(())
    }

    async fn payment_method_in_use(&self, id: Uuid) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM payment_orders WHERE payment_method_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn delete_payment_method(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("PaymentMethod", "ไม่พบประเภทการชำระเงิน"));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for PgStore {
    async fn insert_customer(&self, customer: &Customer) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customers
                (id, branch_id, user_id, customer_group_id, name, phone, address,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(customer.id)
        .bind(customer.branch_id)
        .bind(customer.user_id)
        .bind(customer.customer_group_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_customers(
        &self,
        branch_id: Uuid,
        filter: &CustomerFilter,
    ) -> AppResult<Vec<Customer>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM customers WHERE branch_id = ",
            CUSTOMER_COLUMNS
        ));
        query.push_bind(branch_id);
        if let Some(name) = &filter.name {
            query.push(" AND position(").push_bind(name.clone()).push(" in name) > 0");
        }
        if let Some(phone) = &filter.phone {
            query
                .push(" AND position(")
                .push_bind(phone.clone())
                .push(" in coalesce(phone, '')) > 0");
        }
        if let Some(group) = filter.customer_group_id {
            query.push(" AND customer_group_id = ").push_bind(group);
        }
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<CustomerRow>()
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_customer(&self, customer: &Customer) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET customer_group_id = $2, name = $3, phone = $4, address = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(customer.id)
        .bind(customer.customer_group_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Customer", "ไม่พบลูกค้า"));
        }
        Ok(())
    }

    async fn insert_customer_group(&self, group: &CustomerGroup) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO customer_groups (id, name, created_at, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_customer_group(&self, id: Uuid) -> AppResult<Option<CustomerGroup>> {
        let row = sqlx::query_as::<_, CustomerGroupRow>(
            "SELECT id, name, created_at, updated_at FROM customer_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn customer_group_name_exists(
        &self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM customer_groups
                WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn list_customer_groups(&self) -> AppResult<Vec<CustomerGroup>> {
        let rows = sqlx::query_as::<_, CustomerGroupRow>(
            "SELECT id, name, created_at, updated_at FROM customer_groups ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_customer_group(&self, group: &CustomerGroup) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE customer_groups SET name = $2, updated_at = $3 WHERE id = $1")
                .bind(group.id)
                .bind(&group.name)
                .bind(group.updated_at)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("CustomerGroup", "ไม่พบกลุ่มลูกค้านี้ในระบบ"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, name, phone, role, branch_id, status, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.branch_id)
        .bind(user.status.as_str())
        .bind(password_hash)
        .bind(user.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row
            .map(UserRow::into_credentials)
            .transpose()?
            .map(|c| c.user))
    }

    async fn find_credentials(&self, username: &str) -> AppResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        row.map(UserRow::into_credentials).transpose()
    }

    async fn user_exists(&self, username: &str, email: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|r| r.into_credentials().map(|c| c.user))
            .collect()
    }

    async fn list_users_by_role(&self, branch_id: Uuid, role: UserRole) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE branch_id = $1 AND role = $2 AND status = 'ACTIVE' ORDER BY name",
            USER_COLUMNS
        ))
        .bind(branch_id)
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|r| r.into_credentials().map(|c| c.user))
            .collect()
    }

    async fn list_users(&self, branch_id: Option<Uuid>) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE $1::uuid IS NULL OR branch_id = $1 ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|r| r.into_credentials().map(|c| c.user))
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, customer_id, user_id, branch_id, order_code, status, order_type,
                 total_price, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.user_id)
        .bind(order.branch_id)
        .bind(&order.order_code)
        .bind(order.status.as_str())
        .bind(order.order_type.map(|t| t.as_str()))
        .bind(order.total_price)
        .bind(&order.note)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(OrderRow::into_order).transpose()
    }

    async fn order_exists(
        &self,
        customer_id: Uuid,
        user_id: Uuid,
        branch_id: Uuid,
        order_code: &str,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM orders
                WHERE customer_id = $1 AND user_id = $2 AND branch_id = $3 AND order_code = $4
            )
            "#,
        )
        .bind(customer_id)
        .bind(user_id)
        .bind(branch_id)
        .bind(order_code)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn delete_pending_order(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<()> {
        // Dropping the transaction without commit rolls back every step
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, order_type = $3, total_price = $4, updated_at = $5
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(confirmation.order_id)
        .bind(confirmation.status.as_str())
        .bind(confirmation.order_type.as_str())
        .bind(confirmation.total_price)
        .bind(confirmation.confirmed_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Order", "ไม่พบรายการนี้"));
        }

        let payment = &confirmation.payment;
        sqlx::query(
            r#"
            INSERT INTO payment_orders
                (order_id, payment_method_id, amount_received, change, credit_days,
                 deposit, discount, paid_at, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.order_id)
        .bind(payment.payment_method_id)
        .bind(payment.amount_received)
        .bind(payment.change)
        .bind(payment.credit_days)
        .bind(payment.deposit)
        .bind(payment.discount)
        .bind(payment.paid_at)
        .bind(&payment.note)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        if let Some(slip) = &confirmation.slip {
            sqlx::query(
                "INSERT INTO payment_order_slips (id, order_id, image_url, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(slip.id)
            .bind(slip.order_id)
            .bind(&slip.image_url)
            .bind(slip.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for line in &confirmation.lines {
            let stock_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE stocks
                SET quantity = quantity - $3, updated_at = $4
                WHERE product_id = $1 AND branch_id = $2 AND quantity >= $3
                RETURNING id
                "#,
            )
            .bind(line.product_id)
            .bind(confirmation.branch_id)
            .bind(line.quantity)
            .bind(confirmation.confirmed_at)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(AppError::insufficient_stock)?;

            sqlx::query(
                r#"
                INSERT INTO stock_out_histories
                    (id, order_id, stock_id, product_id, quantity, sell_price, kind, note, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(confirmation.order_id)
            .bind(stock_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.sell_price)
            .bind(StockOutType::Sale.as_str())
            .bind(&confirmation.note)
            .bind(confirmation.confirmed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_payment(&self, order_id: Uuid) -> AppResult<Option<PaymentOrder>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT order_id, payment_method_id, amount_received, change, credit_days,
                   deposit, discount, paid_at, note, created_at
            FROM payment_orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_slips(&self, order_id: Uuid) -> AppResult<Vec<PaymentOrderSlip>> {
        let rows = sqlx::query_as::<_, SlipRow>(
            r#"
            SELECT id, order_id, image_url, created_at
            FROM payment_order_slips
            WHERE order_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_order_stock_outs(&self, order_id: Uuid) -> AppResult<Vec<StockOutHistory>> {
        let rows = sqlx::query_as::<_, StockOutRow>(&format!(
            "SELECT {} FROM stock_out_histories so WHERE so.order_id = $1 ORDER BY so.created_at",
            STOCK_OUT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockOutRow::into_stock_out).collect()
    }

    async fn list_orders(&self, scope: OrderScope, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders WHERE ", ORDER_COLUMNS));
        match scope {
            OrderScope::Branch(branch_id) => query.push("branch_id = ").push_bind(branch_id),
            OrderScope::User(user_id) => query.push("user_id = ").push_bind(user_id),
        };
        if let Some(code) = &filter.order_code {
            query
                .push(" AND position(")
                .push_bind(code.clone())
                .push(" in order_code) > 0");
        }
        if let Some(order_type) = filter.order_type {
            query.push(" AND order_type = ").push_bind(order_type.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(start) = filter.start_date {
            query.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            query.push(" AND created_at <= ").push_bind(end);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query.build_query_as::<OrderRow>().fetch_all(&self.db).await?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }
}

#[async_trait]
impl StockRepository for PgStore {
    async fn find_stock(&self, product_id: Uuid, branch_id: Uuid) -> AppResult<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT id, product_id, branch_id, quantity, updated_at
            FROM stocks
            WHERE product_id = $1 AND branch_id = $2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn ref_code_exists(&self, branch_id: Uuid, ref_code: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stock_in_histories WHERE branch_id = $1 AND ref_code = $2)",
        )
        .bind(branch_id)
        .bind(ref_code)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn record_stock_in(&self, stock_in: &NewStockIn) -> AppResult<StockInHistory> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO stock_in_histories
                (id, branch_id, user_id, ref_code, distributor, total_price, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(stock_in.id)
        .bind(stock_in.branch_id)
        .bind(stock_in.user_id)
        .bind(&stock_in.ref_code)
        .bind(&stock_in.distributor)
        .bind(stock_in.total_price)
        .bind(&stock_in.note)
        .bind(stock_in.created_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(stock_in.items.len());
        for (position, input) in stock_in.items.iter().enumerate() {
            let stock_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO stocks (id, product_id, branch_id, quantity, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product_id, branch_id)
                DO UPDATE SET quantity = stocks.quantity + EXCLUDED.quantity,
                              updated_at = EXCLUDED.updated_at
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.product_id)
            .bind(stock_in.branch_id)
            .bind(input.quantity)
            .bind(stock_in.created_at)
            .fetch_one(&mut *tx)
            .await?;

            let item = StockInItem {
                id: Uuid::new_v4(),
                stock_in_history_id: stock_in.id,
                stock_id,
                product_id: input.product_id,
                cost_price: input.cost_price,
                quantity: input.quantity,
            };
            sqlx::query(
                r#"
                INSERT INTO stock_in_items
                    (id, stock_in_history_id, stock_id, product_id, cost_price, quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id)
            .bind(item.stock_in_history_id)
            .bind(item.stock_id)
            .bind(item.product_id)
            .bind(item.cost_price)
            .bind(item.quantity)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        Ok(StockInHistory {
            id: stock_in.id,
            branch_id: stock_in.branch_id,
            user_id: stock_in.user_id,
            ref_code: stock_in.ref_code.clone(),
            distributor: stock_in.distributor.clone(),
            total_price: stock_in.total_price,
            note: stock_in.note.clone(),
            cancellation: None,
            items,
            created_at: stock_in.created_at,
        })
    }

    async fn find_stock_in(&self, id: Uuid) -> AppResult<Option<StockInHistory>> {
        let row = sqlx::query_as::<_, StockInRow>(&format!(
            "SELECT {} FROM stock_in_histories WHERE id = $1",
            STOCK_IN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let mut items = self.load_stock_in_items(&[row.id]).await?;
                let own = items.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_history(own)))
            }
            None => Ok(None),
        }
    }

    async fn cancel_stock_in(
        &self,
        id: Uuid,
        cancellation: &StockInCancellation,
    ) -> AppResult<StockInHistory> {
        let mut tx = self.db.begin().await?;

        // Lock the header so two cancellations cannot both reverse the stock
        let open = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stock_in_histories WHERE id = $1 AND canceled_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if open.is_none() {
            return Err(AppError::not_found("StockInHistory", "ไม่พบบิลนำเข้า"));
        }

        let reversals = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT stock_id, SUM(quantity)::BIGINT
            FROM stock_in_items
            WHERE stock_in_history_id = $1
            GROUP BY stock_id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (stock_id, quantity) in reversals {
            let result = sqlx::query(
                r#"
                UPDATE stocks
                SET quantity = quantity - $2, updated_at = $3
                WHERE id = $1 AND quantity >= $2
                "#,
            )
            .bind(stock_id)
            .bind(quantity)
            .bind(cancellation.canceled_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::insufficient_stock());
            }
        }

        sqlx::query(
            r#"
            UPDATE stock_in_histories
            SET canceled_by = $2, canceled_at = $3, cancel_note = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(cancellation.canceled_by)
        .bind(cancellation.canceled_at)
        .bind(&cancellation.cancel_note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_stock_in(id)
            .await?
            .ok_or_else(|| AppError::not_found("StockInHistory", "ไม่พบบิลนำเข้า"))
    }

    async fn list_stock_ins(
        &self,
        branch_id: Uuid,
        filter: &StockInFilter,
    ) -> AppResult<Vec<StockInHistory>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM stock_in_histories WHERE branch_id = ",
            STOCK_IN_COLUMNS
        ));
        query.push_bind(branch_id);
        if let Some(code) = &filter.ref_code {
            query
                .push(" AND position(")
                .push_bind(code.clone())
                .push(" in ref_code) > 0");
        }
        if let Some(distributor) = &filter.distributor {
            query
                .push(" AND position(")
                .push_bind(distributor.clone())
                .push(" in distributor) > 0");
        }
        match filter.is_canceled {
            Some(true) => {
                query.push(" AND canceled_at IS NOT NULL");
            }
            Some(false) => {
                query.push(" AND canceled_at IS NULL");
            }
            None => {}
        }
        if let Some(start) = filter.start_date {
            query.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            query.push(" AND created_at <= ").push_bind(end);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<StockInRow>()
            .fetch_all(&self.db)
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.load_stock_in_items(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.into_history(own)
            })
            .collect())
    }

    async fn list_stocks(&self, branch_id: Uuid) -> AppResult<Vec<StockWithProduct>> {
        let rows = sqlx::query_as::<_, StockWithProductRow>(
            r#"
            SELECT s.id, s.product_id, s.branch_id, s.quantity, s.updated_at,
                   p.code AS product_code, p.name AS product_name
            FROM stocks s
            JOIN products p ON p.id = s.product_id
            WHERE s.branch_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StockWithProduct {
                stock: Stock {
                    id: r.id,
                    product_id: r.product_id,
                    branch_id: r.branch_id,
                    quantity: r.quantity,
                    updated_at: r.updated_at,
                },
                product_code: r.product_code,
                product_name: r.product_name,
            })
            .collect())
    }

    async fn list_branch_stock_outs(&self, branch_id: Uuid) -> AppResult<Vec<StockOutHistory>> {
        let rows = sqlx::query_as::<_, StockOutRow>(&format!(
            r#"
            SELECT {}
            FROM stock_out_histories so
            JOIN orders o ON o.id = so.order_id
            WHERE o.branch_id = $1
            ORDER BY so.created_at DESC
            "#,
            STOCK_OUT_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(StockOutRow::into_stock_out).collect()
    }
}

#[async_trait]
impl DeliveryRepository for PgStore {
    async fn insert_delivery(&self, delivery: &Delivery) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deliveries
                (order_id, track_number, distance, address, kind, latitude, longitude, note,
                 send_date, fee, status, delivered_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(delivery.order_id)
        .bind(&delivery.track_number)
        .bind(delivery.distance)
        .bind(&delivery.address)
        .bind(delivery.kind.as_str())
        .bind(delivery.location.as_ref().map(|l| l.latitude))
        .bind(delivery.location.as_ref().map(|l| l.longitude))
        .bind(&delivery.note)
        .bind(delivery.send_date)
        .bind(delivery.fee)
        .bind(delivery.status.as_str())
        .bind(delivery.delivered_at)
        .bind(delivery.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_delivery(&self, order_id: Uuid) -> AppResult<Option<DeliveryWithDrivers>> {
        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {} FROM deliveries d WHERE d.order_id = $1",
            DELIVERY_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(self.attach_drivers(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert_drivers(&self, drivers: &[DeliveryDriver]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        for driver in drivers {
            sqlx::query(
                r#"
                INSERT INTO delivery_drivers (order_id, user_id, assigned_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (order_id, user_id) DO NOTHING
                "#,
            )
            .bind(driver.order_id)
            .bind(driver.user_id)
            .bind(driver.assigned_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn settle_delivery(&self, settlement: &DeliverySettlement) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'DELIVERED', delivered_at = $2
            WHERE order_id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(settlement.order_id)
        .bind(settlement.delivered_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"));
        }

        if let Some(collected) = &settlement.payment {
            sqlx::query(
                "UPDATE payment_orders SET amount_received = $2, paid_at = $3 WHERE order_id = $1",
            )
            .bind(settlement.order_id)
            .bind(collected.amount_received)
            .bind(collected.paid_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO payment_order_slips (id, order_id, image_url, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(collected.slip.id)
            .bind(collected.slip.order_id)
            .bind(&collected.slip.image_url)
            .bind(collected.slip.created_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE orders SET status = 'COMPLETED', updated_at = $2 WHERE id = $1")
                .bind(settlement.order_id)
                .bind(settlement.delivered_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        branch_id: Uuid,
        filter: &DeliveryFilter,
        caller: Uuid,
    ) -> AppResult<Vec<DeliveryWithDrivers>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM deliveries d JOIN orders o ON o.id = d.order_id WHERE o.branch_id = ",
            DELIVERY_COLUMNS
        ));
        query.push_bind(branch_id);
        if let Some(track) = &filter.track_number {
            query
                .push(" AND position(")
                .push_bind(track.clone())
                .push(" in d.track_number) > 0");
        }
        if let Some(kind) = filter.kind {
            query.push(" AND d.kind = ").push_bind(kind.as_str());
        }
        if let Some(start) = filter.start_date {
            query.push(" AND d.send_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            query.push(" AND d.send_date <= ").push_bind(end);
        }
        if filter.mine {
            query
                .push(" AND EXISTS (SELECT 1 FROM delivery_drivers dd WHERE dd.order_id = d.order_id AND dd.user_id = ")
                .push_bind(caller)
                .push(")");
        }
        query.push(" ORDER BY d.send_date DESC");

        let rows = query
            .build_query_as::<DeliveryRow>()
            .fetch_all(&self.db)
            .await?;
        self.attach_drivers(rows).await
    }

    async fn busy_driver_ids(&self, branch_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT dd.user_id
            FROM delivery_drivers dd
            JOIN deliveries d ON d.order_id = dd.order_id
            JOIN orders o ON o.id = d.order_id
            WHERE o.branch_id = $1 AND d.status = 'PENDING'
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
