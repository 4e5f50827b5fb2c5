//! In-process store
//!
//! Holds every table in one mutex so each trait method is atomic, which
//! gives the same all-or-nothing behavior as the PostgreSQL transactions.
//! Used by the test suite and when `database.url = "memory://"`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    Branch, BranchProduct, Category, Customer, CustomerFilter, CustomerGroup, Delivery,
    DeliveryDriver, DeliveryFilter, DeliveryStatus, DeliveryWithDrivers, Order, OrderFilter, OrderStatus,
    PaymentMethod, PaymentOrder, PaymentOrderSlip, Product, ProductSaleBranch, ProductState,
    Stock, StockInCancellation, StockInFilter, StockInHistory, StockInItem, StockOutHistory,
    StockOutType, StockWithProduct, User, UserRole, UserStatus,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BranchRepository, CatalogRepository, CustomerRepository, DeliveryRepository,
    DeliverySettlement, NewStockIn, OrderConfirmation, OrderRepository, OrderScope,
    StockRepository, Store, UserCredentials, UserRepository,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct MemoryState {
    branches: Vec<Branch>,
    categories: Vec<Category>,
    products: Vec<Product>,
    prices: Vec<ProductSaleBranch>,
    payment_methods: Vec<PaymentMethod>,
    customers: Vec<Customer>,
    customer_groups: Vec<CustomerGroup>,
    users: Vec<UserCredentials>,
    orders: Vec<Order>,
    payments: Vec<PaymentOrder>,
    slips: Vec<PaymentOrderSlip>,
    stocks: Vec<Stock>,
    stock_ins: Vec<StockInHistory>,
    stock_outs: Vec<StockOutHistory>,
    deliveries: Vec<Delivery>,
    drivers: Vec<DeliveryDriver>,
}

impl MemoryState {
    fn stock_mut(&mut self, product_id: Uuid, branch_id: Uuid) -> Option<&mut Stock> {
        self.stocks
            .iter_mut()
            .find(|s| s.product_id == product_id && s.branch_id == branch_id)
    }

    fn delivery_with_drivers(&self, delivery: &Delivery) -> DeliveryWithDrivers {
        DeliveryWithDrivers {
            delivery: delivery.clone(),
            drivers: self
                .drivers
                .iter()
                .filter(|d| d.order_id == delivery.order_id)
                .cloned()
                .collect(),
        }
    }

    fn order_branch(&self, order_id: Uuid) -> Option<Uuid> {
        self.orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| o.branch_id)
    }
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort newest first, keeping later inserts ahead on equal timestamps
fn newest_first<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.reverse();
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

fn category_in_use() -> AppError {
    AppError::conflict(
        "products_category_id_fkey",
        "Category still has products",
        "ไม่สามารถลบหมวดหมู่ที่มีสินค้าอยู่ได้",
    )
}

fn payment_method_in_use() -> AppError {
    AppError::conflict(
        "payment_orders_payment_method_id_fkey",
        "Payment method is referenced by payments",
        "ไม่สามารถลบได้",
    )
}

/// Quantities summed per key, failing when a sum leaves the `i32` range
fn summed_quantities<I>(pairs: I) -> AppResult<HashMap<Uuid, i32>>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut sums: HashMap<Uuid, i32> = HashMap::new();
    for (key, quantity) in pairs {
        let sum = sums.entry(key).or_default();
        *sum = sum
            .checked_add(quantity)
            .ok_or_else(|| AppError::quantity_out_of_range("quantity"))?;
    }
    Ok(sums)
}

#[async_trait]
impl BranchRepository for MemoryStore {
    async fn insert_branch(&self, branch: &Branch) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .branches
            .iter()
            .any(|b| b.code == branch.code || b.name == branch.name)
        {
            return Err(AppError::conflict(
                "branches_code_key",
                "Branch code or name already exists",
                "รหัสสาขา หรือ ชื่อสาขานี้ถูกตั้งไปแล้ว",
            ));
        }
        state.branches.push(branch.clone());
        Ok(())
    }

    async fn find_branch(&self, id: Uuid) -> AppResult<Option<Branch>> {
        let state = self.state.lock().await;
        Ok(state.branches.iter().find(|b| b.id == id).cloned())
    }

    async fn branch_code_exists(&self, code: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.branches.iter().any(|b| b.code == code))
    }

    async fn branch_name_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .branches
            .iter()
            .any(|b| b.name == name && Some(b.id) != exclude))
    }

    async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        let state = self.state.lock().await;
        let mut branches = state.branches.clone();
        branches.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(branches)
    }

    async fn update_branch(&self, branch: &Branch) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .branches
            .iter_mut()
            .find(|b| b.id == branch.id)
            .ok_or_else(|| AppError::not_found("Branch", "ไม่พบสาขาที่ระบุ"))?;
        *existing = branch.clone();
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_category(&self, category: &Category) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.categories.push(category.clone());
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn category_exists(
        &self,
        code: &str,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .iter()
            .any(|c| (c.code == code || c.name == name) && Some(c.id) != exclude))
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(categories)
    }

    async fn update_category(&self, category: &Category) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or_else(|| AppError::not_found("Category", "ไม่พบหมวดหมู่นี้"))?;
        *existing = category.clone();
        Ok(())
    }

    async fn category_has_products(&self, id: Uuid) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.products.iter().any(|p| p.category_id == id))
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.products.iter().any(|p| p.category_id == id) {
            return Err(category_in_use());
        }
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(AppError::not_found("Category", "ไม่พบหมวดหมู่นี้"));
        }
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.products.push(product.clone());
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn product_exists(
        &self,
        code: &str,
        barcode: &str,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.products.iter().any(|p| {
            (p.code == code || p.barcode == barcode || p.name == name) && Some(p.id) != exclude
        }))
    }

    async fn list_products(&self, include_retired: bool) -> AppResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| include_retired || p.state.is_active())
            .cloned()
            .collect();
        products.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| AppError::not_found("Product", "ไม่พบสินค้าในระบบ"))?;
        existing.code = product.code.clone();
        existing.barcode = product.barcode.clone();
        existing.name = product.name.clone();
        existing.unit = product.unit;
        existing.category_id = product.category_id;
        existing.description = product.description.clone();
        existing.updated_at = product.updated_at;
        Ok(())
    }

    async fn update_product_state(
        &self,
        id: Uuid,
        product_state: ProductState,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::not_found("Product", "ไม่พบสินค้าในระบบ"))?;
        product.state = product_state;
        product.updated_at = updated_at;
        Ok(())
    }

    async fn list_branch_products(&self, branch_id: Uuid) -> AppResult<Vec<BranchProduct>> {
        let state = self.state.lock().await;
        let mut products: Vec<BranchProduct> = state
            .products
            .iter()
            .filter(|p| p.state.is_active())
            .map(|p| BranchProduct {
                product: p.clone(),
                sell_price: state
                    .prices
                    .iter()
                    .find(|s| s.product_id == p.id && s.branch_id == branch_id)
                    .map(|s| s.sell_price),
                quantity: state
                    .stocks
                    .iter()
                    .find(|s| s.product_id == p.id && s.branch_id == branch_id)
                    .map(|s| s.quantity),
            })
            .collect();
        products.sort_by(|a, b| a.product.code.cmp(&b.product.code));
        Ok(products)
    }

    async fn list_unpriced_products(&self, branch_id: Uuid) -> AppResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.state.is_active())
            .filter(|p| {
                !state
                    .prices
                    .iter()
                    .any(|s| s.product_id == p.id && s.branch_id == branch_id)
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(products)
    }

    async fn upsert_sell_price(&self, price: &ProductSaleBranch) -> AppResult<()> {
        let mut state = self.state.lock().await;
        match state
            .prices
            .iter_mut()
            .find(|p| p.product_id == price.product_id && p.branch_id == price.branch_id)
        {
            Some(existing) => *existing = price.clone(),
            None => state.prices.push(price.clone()),
        }
        Ok(())
    }

    async fn find_sell_price(
        &self,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Option<ProductSaleBranch>> {
        let state = self.state.lock().await;
        Ok(state
            .prices
            .iter()
            .find(|p| p.product_id == product_id && p.branch_id == branch_id)
            .cloned())
    }

    async fn insert_payment_method(&self, method: &PaymentMethod) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.payment_methods.push(method.clone());
        Ok(())
    }

    async fn find_payment_method(&self, id: Uuid) -> AppResult<Option<PaymentMethod>> {
        let state = self.state.lock().await;
        Ok(state.payment_methods.iter().find(|m| m.id == id).cloned())
    }

    async fn payment_method_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .payment_methods
            .iter()
            .any(|m| m.name == name && Some(m.id) != exclude))
    }

    async fn list_payment_methods(&self) -> AppResult<Vec<PaymentMethod>> {
        let state = self.state.lock().await;
        let mut methods = state.payment_methods.clone();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(methods)
    }

    async fn update_payment_method(&self, method: &PaymentMethod) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .payment_methods
            .iter_mut()
            .find(|m| m.id == method.id)
            .ok_or_else(|| AppError::not_found("PaymentMethod", "ไม่พบประเภทการชำระเงิน"))?;
        *existing = method.clone();
        Ok(())
    }

    async fn payment_method_in_use(&self, id: Uuid) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.payments.iter().any(|p| p.payment_method_id == id))
    }

    async fn delete_payment_method(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.payments.iter().any(|p| p.payment_method_id == id) {
            return Err(payment_method_in_use());
        }
        let before = state.payment_methods.len();
        state.payment_methods.retain(|m| m.id != id);
        if state.payment_methods.len() == before {
            return Err(AppError::not_found("PaymentMethod", "ไม่พบประเภทการชำระเงิน"));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn insert_customer(&self, customer: &Customer) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.customers.push(customer.clone());
        Ok(())
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let state = self.state.lock().await;
        Ok(state.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn list_customers(
        &self,
        branch_id: Uuid,
        filter: &CustomerFilter,
    ) -> AppResult<Vec<Customer>> {
        let state = self.state.lock().await;
        let customers: Vec<Customer> = state
            .customers
            .iter()
            .filter(|c| c.branch_id == branch_id && filter.matches(c))
            .cloned()
            .collect();
        Ok(newest_first(customers, |c| c.created_at))
    }

    async fn update_customer(&self, customer: &Customer) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .customers
            .iter_mut()
            .find(|c| c.id == customer.id)
            .ok_or_else(|| AppError::not_found("Customer", "ไม่พบลูกค้า"))?;
        *existing = customer.clone();
        Ok(())
    }

    async fn insert_customer_group(&self, group: &CustomerGroup) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.customer_groups.iter().any(|g| g.name == group.name) {
            return Err(AppError::conflict(
                "customer_groups_name_key",
                "Customer group name already exists",
                format!("ลูกค้ากลุ่ม {} ถูกสร้างแล้วในระบบ", group.name),
            ));
        }
        state.customer_groups.push(group.clone());
        Ok(())
    }

    async fn find_customer_group(&self, id: Uuid) -> AppResult<Option<CustomerGroup>> {
        let state = self.state.lock().await;
        Ok(state.customer_groups.iter().find(|g| g.id == id).cloned())
    }

    async fn customer_group_name_exists(
        &self,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .customer_groups
            .iter()
            .any(|g| g.name == name && Some(g.id) != exclude))
    }

    async fn list_customer_groups(&self) -> AppResult<Vec<CustomerGroup>> {
        let state = self.state.lock().await;
        let mut groups = state.customer_groups.clone();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn update_customer_group(&self, group: &CustomerGroup) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let existing = state
            .customer_groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| AppError::not_found("CustomerGroup", "ไม่พบกลุ่มลูกค้านี้ในระบบ"))?;
        *existing = group.clone();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User, password_hash: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.users.push(UserCredentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn find_credentials(&self, username: &str) -> AppResult<Option<UserCredentials>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.user.username == username)
            .cloned())
    }

    async fn user_exists(&self, username: &str, email: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .any(|u| u.user.username == username || u.user.email == email))
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| ids.contains(&u.user.id))
            .map(|u| u.user.clone())
            .collect())
    }

    async fn list_users_by_role(&self, branch_id: Uuid, role: UserRole) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .iter()
            .map(|u| &u.user)
            .filter(|u| {
                u.branch_id == Some(branch_id) && u.role == role && u.status == UserStatus::Active
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn list_users(&self, branch_id: Option<Uuid>) -> AppResult<Vec<User>> {
        let state = self.state.lock().await;
        let users: Vec<User> = state
            .users
            .iter()
            .map(|u| &u.user)
            .filter(|u| branch_id.map_or(true, |branch| u.branch_id == Some(branch)))
            .cloned()
            .collect();
        Ok(newest_first(users, |u| u.created_at))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.orders.iter().any(|o| {
            o.customer_id == order.customer_id
                && o.user_id == order.user_id
                && o.branch_id == order.branch_id
                && o.order_code == order.order_code
        }) {
            return Err(AppError::conflict(
                "orders_customer_user_branch_code_key",
                "Order already exists",
                "รายการนี้ถูกสร้างแล้ว",
            ));
        }
        state.orders.push(order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_exists(
        &self,
        customer_id: Uuid,
        user_id: Uuid,
        branch_id: Uuid,
        order_code: &str,
    ) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().any(|o| {
            o.customer_id == customer_id
                && o.user_id == user_id
                && o.branch_id == branch_id
                && o.order_code == order_code
        }))
    }

    async fn delete_pending_order(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.orders.len();
        state
            .orders
            .retain(|o| !(o.id == id && o.status == OrderStatus::Pending));
        let deleted = state.orders.len() < before;
        if deleted {
            state.deliveries.retain(|d| d.order_id != id);
            state.drivers.retain(|d| d.order_id != id);
        }
        Ok(deleted)
    }

    async fn apply_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<()> {
        let mut state = self.state.lock().await;

        let pending = state
            .orders
            .iter()
            .any(|o| o.id == confirmation.order_id && o.status == OrderStatus::Pending);
        if !pending {
            return Err(AppError::not_found("Order", "ไม่พบรายการนี้"));
        }

        // Every decrement must fit before anything is written
        let required = summed_quantities(
            confirmation.lines.iter().map(|l| (l.product_id, l.quantity)),
        )?;
        for (product_id, quantity) in &required {
            let covered = state.stocks.iter().any(|s| {
                s.product_id == *product_id
                    && s.branch_id == confirmation.branch_id
                    && s.quantity >= *quantity
            });
            if !covered {
                return Err(AppError::insufficient_stock());
            }
        }

        let mut stock_ids = Vec::with_capacity(confirmation.lines.len());
        for line in &confirmation.lines {
            let stock = state
                .stocks
                .iter()
                .find(|s| s.product_id == line.product_id && s.branch_id == confirmation.branch_id)
                .ok_or_else(AppError::insufficient_stock)?;
            stock_ids.push(stock.id);
        }

        for (line, stock_id) in confirmation.lines.iter().zip(&stock_ids) {
            if let Some(stock) = state.stock_mut(line.product_id, confirmation.branch_id) {
                stock.quantity -= line.quantity;
                stock.updated_at = confirmation.confirmed_at;
            }
            state.stock_outs.push(StockOutHistory {
                id: Uuid::new_v4(),
                order_id: confirmation.order_id,
                stock_id: *stock_id,
                product_id: line.product_id,
                quantity: line.quantity,
                sell_price: line.sell_price,
                kind: StockOutType::Sale,
                note: confirmation.note.clone(),
                created_at: confirmation.confirmed_at,
            });
        }

        state.payments.push(confirmation.payment.clone());
        if let Some(slip) = &confirmation.slip {
            state.slips.push(slip.clone());
        }
        if let Some(order) = state
            .orders
            .iter_mut()
            .find(|o| o.id == confirmation.order_id)
        {
            order.status = confirmation.status;
            order.order_type = Some(confirmation.order_type);
            order.total_price = Some(confirmation.total_price);
            order.updated_at = confirmation.confirmed_at;
        }

        Ok(())
    }

    async fn find_payment(&self, order_id: Uuid) -> AppResult<Option<PaymentOrder>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn list_slips(&self, order_id: Uuid) -> AppResult<Vec<PaymentOrderSlip>> {
        let state = self.state.lock().await;
        Ok(state
            .slips
            .iter()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_order_stock_outs(&self, order_id: Uuid) -> AppResult<Vec<StockOutHistory>> {
        let state = self.state.lock().await;
        Ok(state
            .stock_outs
            .iter()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, scope: OrderScope, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let state = self.state.lock().await;
        let orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| match scope {
                OrderScope::Branch(branch_id) => o.branch_id == branch_id,
                OrderScope::User(user_id) => o.user_id == user_id,
            })
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        Ok(newest_first(orders, |o| o.created_at))
    }
}

#[async_trait]
impl StockRepository for MemoryStore {
    async fn find_stock(&self, product_id: Uuid, branch_id: Uuid) -> AppResult<Option<Stock>> {
        let state = self.state.lock().await;
        Ok(state
            .stocks
            .iter()
            .find(|s| s.product_id == product_id && s.branch_id == branch_id)
            .cloned())
    }

    async fn ref_code_exists(&self, branch_id: Uuid, ref_code: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .stock_ins
            .iter()
            .any(|h| h.branch_id == branch_id && h.ref_code == ref_code))
    }

    async fn record_stock_in(&self, stock_in: &NewStockIn) -> AppResult<StockInHistory> {
        let mut state = self.state.lock().await;

        if state
            .stock_ins
            .iter()
            .any(|h| h.branch_id == stock_in.branch_id && h.ref_code == stock_in.ref_code)
        {
            return Err(AppError::conflict(
                "stock_in_histories_branch_ref_code_key",
                "Reference code already used",
                "เลขที่บิลนำเข้านี้ถูกใช้แล้ว",
            ));
        }

        let increments =
            summed_quantities(stock_in.items.iter().map(|i| (i.product_id, i.quantity)))?;
        for (product_id, quantity) in &increments {
            let on_hand = state
                .stocks
                .iter()
                .find(|s| s.product_id == *product_id && s.branch_id == stock_in.branch_id)
                .map_or(0, |s| s.quantity);
            if on_hand.checked_add(*quantity).is_none() {
                return Err(AppError::quantity_out_of_range("quantity"));
            }
        }

        let mut items = Vec::with_capacity(stock_in.items.len());
        for input in &stock_in.items {
            let stock_id = match state.stock_mut(input.product_id, stock_in.branch_id) {
                Some(stock) => {
                    stock.quantity += input.quantity;
                    stock.updated_at = stock_in.created_at;
                    stock.id
                }
                None => {
                    let stock = Stock {
                        id: Uuid::new_v4(),
                        product_id: input.product_id,
                        branch_id: stock_in.branch_id,
                        quantity: input.quantity,
                        updated_at: stock_in.created_at,
                    };
                    let id = stock.id;
                    state.stocks.push(stock);
                    id
                }
            };
            items.push(StockInItem {
                id: Uuid::new_v4(),
                stock_in_history_id: stock_in.id,
                stock_id,
                product_id: input.product_id,
                cost_price: input.cost_price,
                quantity: input.quantity,
            });
        }

        let history = StockInHistory {
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
        };
        state.stock_ins.push(history.clone());
        Ok(history)
    }

    async fn find_stock_in(&self, id: Uuid) -> AppResult<Option<StockInHistory>> {
        let state = self.state.lock().await;
        Ok(state.stock_ins.iter().find(|h| h.id == id).cloned())
    }

    async fn cancel_stock_in(
        &self,
        id: Uuid,
        cancellation: &StockInCancellation,
    ) -> AppResult<StockInHistory> {
        let mut state = self.state.lock().await;

        let items = state
            .stock_ins
            .iter()
            .find(|h| h.id == id && !h.is_canceled())
            .map(|h| h.items.clone())
            .ok_or_else(|| AppError::not_found("StockInHistory", "ไม่พบบิลนำเข้า"))?;

        let reversals = summed_quantities(items.iter().map(|i| (i.stock_id, i.quantity)))?;
        for (stock_id, quantity) in &reversals {
            let covered = state
                .stocks
                .iter()
                .any(|s| s.id == *stock_id && s.quantity >= *quantity);
            if !covered {
                return Err(AppError::insufficient_stock());
            }
        }

        for stock in state.stocks.iter_mut() {
            if let Some(quantity) = reversals.get(&stock.id) {
                stock.quantity -= quantity;
                stock.updated_at = cancellation.canceled_at;
            }
        }

        let history = state
            .stock_ins
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| AppError::not_found("StockInHistory", "ไม่พบบิลนำเข้า"))?;
        history.cancellation = Some(cancellation.clone());
        Ok(history.clone())
    }

    async fn list_stock_ins(
        &self,
        branch_id: Uuid,
        filter: &StockInFilter,
    ) -> AppResult<Vec<StockInHistory>> {
        let state = self.state.lock().await;
        let histories: Vec<StockInHistory> = state
            .stock_ins
            .iter()
            .filter(|h| h.branch_id == branch_id && filter.matches(h))
            .cloned()
            .collect();
        Ok(newest_first(histories, |h| h.created_at))
    }

    async fn list_stocks(&self, branch_id: Uuid) -> AppResult<Vec<StockWithProduct>> {
        let state = self.state.lock().await;
        let mut stocks: Vec<StockWithProduct> = state
            .stocks
            .iter()
            .filter(|s| s.branch_id == branch_id)
            .filter_map(|s| {
                let product = state.products.iter().find(|p| p.id == s.product_id)?;
                Some(StockWithProduct {
                    stock: s.clone(),
                    product_code: product.code.clone(),
                    product_name: product.name.clone(),
                })
            })
            .collect();
        stocks.sort_by(|a, b| a.product_code.cmp(&b.product_code));
        Ok(stocks)
    }

    async fn list_branch_stock_outs(&self, branch_id: Uuid) -> AppResult<Vec<StockOutHistory>> {
        let state = self.state.lock().await;
        let rows: Vec<StockOutHistory> = state
            .stock_outs
            .iter()
            .filter(|s| state.order_branch(s.order_id) == Some(branch_id))
            .cloned()
            .collect();
        Ok(newest_first(rows, |s| s.created_at))
    }
}

#[async_trait]
impl DeliveryRepository for MemoryStore {
    async fn insert_delivery(&self, delivery: &Delivery) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .deliveries
            .iter()
            .any(|d| d.order_id == delivery.order_id)
        {
            return Err(AppError::conflict(
                "deliveries_pkey",
                "Delivery already recorded for this order",
                "บิลนี้ได้มีการบันทึกจัดทำขนส่งแล้ว",
            ));
        }
        state.deliveries.push(delivery.clone());
        Ok(())
    }

    async fn find_delivery(&self, order_id: Uuid) -> AppResult<Option<DeliveryWithDrivers>> {
        let state = self.state.lock().await;
        Ok(state
            .deliveries
            .iter()
            .find(|d| d.order_id == order_id)
            .map(|d| state.delivery_with_drivers(d)))
    }

    async fn insert_drivers(&self, drivers: &[DeliveryDriver]) -> AppResult<()> {
        let mut state = self.state.lock().await;
        for driver in drivers {
            let assigned = state
                .drivers
                .iter()
                .any(|d| d.order_id == driver.order_id && d.user_id == driver.user_id);
            if !assigned {
                state.drivers.push(driver.clone());
            }
        }
        Ok(())
    }

    async fn settle_delivery(&self, settlement: &DeliverySettlement) -> AppResult<()> {
        let mut state = self.state.lock().await;

        let delivery = state
            .deliveries
            .iter_mut()
            .find(|d| d.order_id == settlement.order_id && d.status == DeliveryStatus::Pending)
            .ok_or_else(|| AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"))?;
        delivery.status = DeliveryStatus::Delivered;
        delivery.delivered_at = Some(settlement.delivered_at);

        if let Some(collected) = &settlement.payment {
            if let Some(payment) = state
                .payments
                .iter_mut()
                .find(|p| p.order_id == settlement.order_id)
            {
                payment.amount_received = Some(collected.amount_received);
                payment.paid_at = Some(collected.paid_at);
            }
            state.slips.push(collected.slip.clone());
            if let Some(order) = state
                .orders
                .iter_mut()
                .find(|o| o.id == settlement.order_id)
            {
                order.status = OrderStatus::Completed;
                order.updated_at = settlement.delivered_at;
            }
        }

        Ok(())
    }

    async fn list_deliveries(
        &self,
        branch_id: Uuid,
        filter: &DeliveryFilter,
        caller: Uuid,
    ) -> AppResult<Vec<DeliveryWithDrivers>> {
        let state = self.state.lock().await;
        let mut deliveries: Vec<DeliveryWithDrivers> = state
            .deliveries
            .iter()
            .filter(|d| state.order_branch(d.order_id) == Some(branch_id))
            .map(|d| state.delivery_with_drivers(d))
            .filter(|d| filter.matches(d, caller))
            .collect();
        deliveries.sort_by(|a, b| b.delivery.send_date.cmp(&a.delivery.send_date));
        Ok(deliveries)
    }

    async fn busy_driver_ids(&self, branch_id: Uuid) -> AppResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let mut ids: Vec<Uuid> = state
            .deliveries
            .iter()
            .filter(|d| {
                d.status == DeliveryStatus::Pending
                    && state.order_branch(d.order_id) == Some(branch_id)
            })
            .flat_map(|d| {
                state
                    .drivers
                    .iter()
                    .filter(move |driver| driver.order_id == d.order_id)
                    .map(|driver| driver.user_id)
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
