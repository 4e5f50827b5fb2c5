//! Shared fixtures: a seeded in-memory store and service constructors

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use pos_backend::external::{FileStorage, LocalFileStorage};
use pos_backend::repository::{MemoryStore, Store};
use pos_backend::services::{
    BranchService, CustomerService, DeliveryService, OrderService, PaymentMethodService,
    ProductService, StockService,
};
use shared::{
    Branch, ConfirmOrderInput, CreateBranchInput, CreateCategoryInput, CreateCustomerInput,
    CreateOrderInput, CreatePaymentMethodInput, CreateProductInput, Customer, Order,
    OrderItemInput, PaymentMethod, Product, ProductUnit, RecordStockInInput, SetSellPriceInput,
    SlipUpload, StockInHistory, StockInItemInput, User, UserRole, UserStatus,
};

pub const MAX_SLIP_BYTES: usize = 1024 * 1024;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// "hello" as a png upload
pub fn slip() -> SlipUpload {
    SlipUpload {
        file_name: "slip.png".to_string(),
        data: "aGVsbG8=".to_string(),
    }
}

pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn FileStorage>,
    pub upload_dir: TempDir,
    pub branch: Branch,
    pub customer: Customer,
    pub product: Product,
    pub payment_method: PaymentMethod,
    pub cashier: User,
}

impl Fixture {
    /// Branch BKK01 with customer C1, product P001 priced at 100 (no stock
    /// yet), a cash payment method and a cashier
    pub async fn new() -> Self {
        let upload_dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(upload_dir.path()));

        let branch = BranchService::new(store.clone())
            .create_branch(CreateBranchInput {
                code: "BKK01".to_string(),
                name: "Bangkok Silom".to_string(),
                phone: "021234567".to_string(),
                address: Some("Silom Rd, Bangkok".to_string()),
            })
            .await
            .unwrap();

        let products = ProductService::new(store.clone());
        let category = products
            .create_category(CreateCategoryInput {
                code: "DRINK".to_string(),
                name: "Drinks".to_string(),
            })
            .await
            .unwrap();
        let product = products
            .create_product(CreateProductInput {
                code: "P001".to_string(),
                barcode: "8850999320007".to_string(),
                name: "Drinking Water 600ml".to_string(),
                unit: ProductUnit::Bottle,
                category_id: category.id,
                description: None,
            })
            .await
            .unwrap();
        products
            .set_sell_price(SetSellPriceInput {
                product_id: product.id,
                branch_id: branch.id,
                sell_price: dec("100"),
            })
            .await
            .unwrap();

        let payment_method = PaymentMethodService::new(store.clone())
            .create_payment_method(CreatePaymentMethodInput {
                name: "Cash".to_string(),
            })
            .await
            .unwrap();

        let cashier = insert_user(store.as_ref(), branch.id, "cashier1", UserRole::Cashier).await;

        let customer = CustomerService::new(store.clone())
            .create_customer(cashier.id, CreateCustomerInput {
                branch_id: branch.id,
                customer_group_id: None,
                name: "Somchai".to_string(),
                phone: Some("0812345678".to_string()),
                address: Some("99 Sukhumvit Rd".to_string()),
            })
            .await
            .unwrap();

        Self {
            store,
            storage,
            upload_dir,
            branch,
            customer,
            product,
            payment_method,
            cashier,
        }
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.store.clone(), self.storage.clone(), MAX_SLIP_BYTES)
    }

    pub fn stocks(&self) -> StockService {
        StockService::new(self.store.clone())
    }

    pub fn deliveries(&self) -> DeliveryService {
        DeliveryService::new(self.store.clone(), self.storage.clone(), MAX_SLIP_BYTES)
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.store.clone())
    }

    /// Active user of the fixture branch with password "password123"
    pub async fn add_user(&self, username: &str, role: UserRole) -> User {
        insert_user(self.store.as_ref(), self.branch.id, username, role).await
    }

    /// Second product, priced only when `price` is given
    pub async fn add_product(&self, code: &str, barcode: &str, price: Option<&str>) -> Product {
        let category_id = self.product.category_id;
        let product = self
            .products()
            .create_product(CreateProductInput {
                code: code.to_string(),
                barcode: barcode.to_string(),
                name: format!("Product {}", code),
                unit: ProductUnit::Piece,
                category_id,
                description: None,
            })
            .await
            .unwrap();
        if let Some(price) = price {
            self.products()
                .set_sell_price(SetSellPriceInput {
                    product_id: product.id,
                    branch_id: self.branch.id,
                    sell_price: dec(price),
                })
                .await
                .unwrap();
        }
        product
    }

    pub async fn stock_in(&self, items: &[(Uuid, i32)]) -> StockInHistory {
        self.stocks()
            .record_stock_in(
                self.cashier.id,
                RecordStockInInput {
                    branch_id: self.branch.id,
                    ref_code: format!("RC-{}", Uuid::new_v4().simple()),
                    distributor: "Siam Supply".to_string(),
                    items: items
                        .iter()
                        .map(|(product_id, quantity)| StockInItemInput {
                            product_id: *product_id,
                            cost_price: dec("60"),
                            quantity: *quantity,
                        })
                        .collect(),
                    note: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn quantity(&self, product_id: Uuid) -> Option<i32> {
        self.store
            .find_stock(product_id, self.branch.id)
            .await
            .unwrap()
            .map(|s| s.quantity)
    }

    pub async fn open_order(&self, code: &str) -> Order {
        self.orders()
            .create_order(
                self.cashier.id,
                CreateOrderInput {
                    customer_id: self.customer.id,
                    branch_id: self.branch.id,
                    order_code: code.to_string(),
                },
            )
            .await
            .unwrap()
    }

    /// Confirmation of `order_id` with the given plan fields left unset
    pub fn confirmation(
        &self,
        order_id: Uuid,
        order_type: &str,
        items: Vec<OrderItemInput>,
    ) -> ConfirmOrderInput {
        ConfirmOrderInput {
            order_id,
            order_items: items,
            order_type: Some(order_type.to_string()),
            payment_method_id: self.payment_method.id,
            amount_received: None,
            change: None,
            credit: None,
            deposit: None,
            discount: None,
            slip_image: None,
            note: None,
        }
    }

    pub fn item(&self, product_id: Uuid, sell_price: &str, quantity: i32) -> OrderItemInput {
        OrderItemInput {
            product_id,
            sell_price: dec(sell_price),
            quantity,
        }
    }
}

/// Low bcrypt cost keeps the fixtures fast
pub async fn insert_user(store: &dyn Store, branch_id: Uuid, username: &str, role: UserRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@pos.example.com", username),
        name: username.to_string(),
        phone: None,
        role,
        branch_id: Some(branch_id),
        status: UserStatus::Active,
        created_at: Utc::now(),
    };
    let hash = bcrypt::hash("password123", 4).unwrap();
    store.insert_user(&user, &hash).await.unwrap();
    user
}
