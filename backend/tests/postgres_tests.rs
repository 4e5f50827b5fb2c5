//! Transaction tests against a live PostgreSQL
//!
//! Skipped unless `DATABASE_URL` points at a disposable database. Every run
//! seeds its own branch and catalog under fresh codes, so runs can share one
//! database.

mod common;

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tempfile::TempDir;
use uuid::Uuid;

use common::{dec, insert_user, MAX_SLIP_BYTES};
use pos_backend::error::AppError;
use pos_backend::external::{FileStorage, LocalFileStorage};
use pos_backend::repository::{OrderConfirmation, PgStore, StockOutLine, Store};
use pos_backend::services::{
    BranchService, CustomerService, OrderService, PaymentMethodService, ProductService,
    StockService,
};
use shared::{
    Branch, CancelStockInInput, ConfirmOrderInput, CreateBranchInput, CreateCategoryInput,
    CreateCustomerInput, CreateOrderInput, CreatePaymentMethodInput, CreateProductInput, Customer,
    Order, OrderItemInput, OrderStatus, PaymentMethod, PaymentOrder, Product, ProductUnit,
    RecordStockInInput, SetSellPriceInput, StockInHistory, StockInItemInput, User, UserRole,
};

struct PgFixture {
    store: Arc<dyn Store>,
    storage: Arc<dyn FileStorage>,
    _upload_dir: TempDir,
    branch: Branch,
    customer: Customer,
    payment_method: PaymentMethod,
    cashier: User,
    water: Product,
    soda: Product,
}

/// Eight uppercase hex digits unique to this call
fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Thirteen digits unique to this call
fn barcode() -> String {
    format!("{:013}", Uuid::new_v4().as_u128() % 10_000_000_000_000)
}

impl PgFixture {
    async fn connect() -> Option<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set; skipping PostgreSQL test");
                return None;
            }
        };
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let upload_dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(upload_dir.path()));
        let tag = suffix();

        let branch = BranchService::new(store.clone())
            .create_branch(CreateBranchInput {
                code: format!("PG-{}", tag),
                name: format!("Branch {}", tag),
                phone: "021234567".to_string(),
                address: None,
            })
            .await
            .unwrap();

        let products = ProductService::new(store.clone());
        let category = products
            .create_category(CreateCategoryInput {
                code: format!("CAT-{}", tag),
                name: format!("Category {}", tag),
            })
            .await
            .unwrap();
        let mut catalog = Vec::new();
        for name in ["WATER", "SODA"] {
            let product = products
                .create_product(CreateProductInput {
                    code: format!("{}-{}", &name[..1], tag),
                    barcode: barcode(),
                    name: format!("{} {}", name, tag),
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
                    sell_price: dec("10"),
                })
                .await
                .unwrap();
            catalog.push(product);
        }
        let soda = catalog.pop().unwrap();
        let water = catalog.pop().unwrap();

        let payment_method = PaymentMethodService::new(store.clone())
            .create_payment_method(CreatePaymentMethodInput {
                name: format!("Cash {}", tag),
            })
            .await
            .unwrap();

        let cashier = insert_user(
            store.as_ref(),
            branch.id,
            &format!("cashier-{}", tag.to_lowercase()),
            UserRole::Cashier,
        )
        .await;

        let customer = CustomerService::new(store.clone())
            .create_customer(
                cashier.id,
                CreateCustomerInput {
                    branch_id: branch.id,
                    customer_group_id: None,
                    name: format!("Customer {}", tag),
                    phone: None,
                    address: None,
                },
            )
            .await
            .unwrap();

        Some(Self {
            store,
            storage,
            _upload_dir: upload_dir,
            branch,
            customer,
            payment_method,
            cashier,
            water,
            soda,
        })
    }

    fn orders(&self) -> OrderService {
        OrderService::new(self.store.clone(), self.storage.clone(), MAX_SLIP_BYTES)
    }

    async fn stock_in(&self, items: &[(Uuid, i32)]) -> StockInHistory {
        StockService::new(self.store.clone())
            .record_stock_in(
                self.cashier.id,
                RecordStockInInput {
                    branch_id: self.branch.id,
                    ref_code: format!("RC-{}", suffix()),
                    distributor: "Siam Supply".to_string(),
                    items: items
                        .iter()
                        .map(|(product_id, quantity)| StockInItemInput {
                            product_id: *product_id,
                            cost_price: dec("6"),
                            quantity: *quantity,
                        })
                        .collect(),
                    note: None,
                },
            )
            .await
            .unwrap()
    }

    async fn quantity(&self, product_id: Uuid) -> Option<i32> {
        self.store
            .find_stock(product_id, self.branch.id)
            .await
            .unwrap()
            .map(|s| s.quantity)
    }

    async fn open_order(&self) -> Order {
        self.orders()
            .create_order(
                self.cashier.id,
                CreateOrderInput {
                    customer_id: self.customer.id,
                    branch_id: self.branch.id,
                    order_code: format!("INV-{}", suffix()),
                },
            )
            .await
            .unwrap()
    }

    fn cash_sale(&self, order_id: Uuid, items: Vec<OrderItemInput>, paid: &str) -> ConfirmOrderInput {
        ConfirmOrderInput {
            order_id,
            order_items: items,
            order_type: Some("FULL_PAYMENT".to_string()),
            payment_method_id: self.payment_method.id,
            amount_received: Some(dec(paid)),
            change: Some(dec("0")),
            credit: None,
            deposit: None,
            discount: None,
            slip_image: None,
            note: None,
        }
    }
}

fn item(product_id: Uuid, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        product_id,
        sell_price: dec("10"),
        quantity,
    }
}

#[tokio::test]
async fn test_confirmation_commits_payment_and_stock_together() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };
    fx.stock_in(&[(fx.water.id, 10), (fx.soda.id, 4)]).await;
    let order = fx.open_order().await;

    let detail = fx
        .orders()
        .confirm_order(fx.cash_sale(
            order.id,
            vec![item(fx.water.id, 3), item(fx.soda.id, 4)],
            "70",
        ))
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Completed);
    assert_eq!(detail.order.total_price, Some(dec("70")));
    assert_eq!(detail.stock_outs.len(), 2);
    assert_eq!(fx.quantity(fx.water.id).await, Some(7));
    assert_eq!(fx.quantity(fx.soda.id).await, Some(0));

    let payment = fx.store.find_payment(order.id).await.unwrap().unwrap();
    assert_eq!(payment.payment_method_id, fx.payment_method.id);
}

#[tokio::test]
async fn test_confirmation_rolls_back_when_a_later_line_is_short() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };
    fx.stock_in(&[(fx.water.id, 10), (fx.soda.id, 1)]).await;
    let order = fx.open_order().await;

    // Straight to the store so the repository's own check decides
    let input = fx.cash_sale(
        order.id,
        vec![item(fx.water.id, 2), item(fx.soda.id, 5)],
        "70",
    );
    let plan = input.payment_plan().unwrap();
    let now = Utc::now();
    let confirmation = OrderConfirmation {
        order_id: order.id,
        branch_id: fx.branch.id,
        status: plan.confirmed_status(),
        order_type: plan.order_type(),
        total_price: dec("70"),
        payment: PaymentOrder::from_plan(order.id, fx.payment_method.id, &plan, None, None, now),
        slip: None,
        lines: input
            .order_items
            .iter()
            .map(|line| StockOutLine {
                product_id: line.product_id,
                quantity: line.quantity,
                sell_price: line.sell_price,
            })
            .collect(),
        note: None,
        confirmed_at: now,
    };

    let err = fx.store.apply_confirmation(&confirmation).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    // The water decrement that ran first is undone
    assert_eq!(fx.quantity(fx.water.id).await, Some(10));
    assert_eq!(fx.quantity(fx.soda.id).await, Some(1));
    assert!(fx.store.find_payment(order.id).await.unwrap().is_none());
    assert!(fx
        .store
        .list_order_stock_outs(order.id)
        .await
        .unwrap()
        .is_empty());
    let stored = fx.store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_stock_in_cancel_rolls_back_when_stock_was_sold() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };
    let history = fx.stock_in(&[(fx.water.id, 5), (fx.soda.id, 5)]).await;
    let order = fx.open_order().await;
    fx.orders()
        .confirm_order(fx.cash_sale(order.id, vec![item(fx.soda.id, 4)], "40"))
        .await
        .unwrap();

    let err = StockService::new(fx.store.clone())
        .cancel_stock_in(
            fx.branch.id,
            history.id,
            fx.cashier.id,
            CancelStockInInput {
                cancel_note: "wrong delivery".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(fx.quantity(fx.water.id).await, Some(5));
    assert_eq!(fx.quantity(fx.soda.id).await, Some(1));
    let unchanged = fx.store.find_stock_in(history.id).await.unwrap().unwrap();
    assert!(!unchanged.is_canceled());
}

#[tokio::test]
async fn test_stock_in_cancel_reverses_every_line() {
    let Some(fx) = PgFixture::connect().await else {
        return;
    };
    fx.stock_in(&[(fx.water.id, 2)]).await;
    let history = fx.stock_in(&[(fx.water.id, 5), (fx.soda.id, 3)]).await;

    let canceled = StockService::new(fx.store.clone())
        .cancel_stock_in(
            fx.branch.id,
            history.id,
            fx.cashier.id,
            CancelStockInInput {
                cancel_note: "wrong delivery".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(canceled.is_canceled());
    assert_eq!(fx.quantity(fx.water.id).await, Some(2));
    assert_eq!(fx.quantity(fx.soda.id).await, Some(0));
}
