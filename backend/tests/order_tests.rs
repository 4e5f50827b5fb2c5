//! Order lifecycle tests
//!
//! Drives the order service against the in-memory store:
//! - creation, duplicate detection and cancellation of PENDING orders
//! - confirmation per payment type, pricing and stock-out bookkeeping
//! - atomicity when stock or reference data is missing

mod common;

use chrono::Utc;
use common::{dec, slip, Fixture};
use pos_backend::error::AppError;
use pos_backend::services::order::{order_total, required_quantities};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    CreateDeliveryInput, CreateOrderInput, CustomerFilter, DeliveryType, OrderFilter,
    OrderItemInput, OrderStatus, OrderType,
};
use uuid::Uuid;

// ============================================================================
// createOrder / cancelOrder
// ============================================================================

#[tokio::test]
async fn test_create_order_starts_pending() {
    let fx = Fixture::new().await;
    let order = fx.open_order("INV-0001").await;

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.order_type, None);
    assert_eq!(order.total_price, None);
    assert_eq!(order.user_id, fx.cashier.id);
}

#[tokio::test]
async fn test_duplicate_order_tuple_conflicts() {
    let fx = Fixture::new().await;
    fx.open_order("INV-0001").await;

    let err = fx
        .orders()
        .create_order(
            fx.cashier.id,
            CreateOrderInput {
                customer_id: fx.customer.id,
                branch_id: fx.branch.id,
                order_code: "INV-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let orders = fx
        .orders()
        .list_orders_by_branch(fx.branch.id, OrderFilter::default())
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_same_code_for_another_user_is_allowed() {
    let fx = Fixture::new().await;
    fx.open_order("INV-0001").await;
    let other = fx.add_user("cashier2", shared::UserRole::Cashier).await;

    let order = fx
        .orders()
        .create_order(
            other.id,
            CreateOrderInput {
                customer_id: fx.customer.id,
                branch_id: fx.branch.id,
                order_code: "INV-0001".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(order.user_id, other.id);
}

#[tokio::test]
async fn test_create_order_requires_branch_customer() {
    let fx = Fixture::new().await;

    let err = fx
        .orders()
        .create_order(
            fx.cashier.id,
            CreateOrderInput {
                customer_id: fx.customer.id,
                branch_id: Uuid::new_v4(),
                order_code: "INV-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Branch"));

    let err = fx
        .orders()
        .create_order(
            fx.cashier.id,
            CreateOrderInput {
                customer_id: Uuid::new_v4(),
                branch_id: fx.branch.id,
                order_code: "INV-0001".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Customer"));
}

#[tokio::test]
async fn test_cancel_pending_order_then_again() {
    let fx = Fixture::new().await;
    let order = fx.open_order("INV-0001").await;

    fx.orders().cancel_order(order.id).await.unwrap();
    assert!(matches!(
        fx.orders().get_order(order.id).await,
        Err(AppError::NotFound { .. })
    ));

    let err = fx.orders().cancel_order(order.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_cancel_confirmed_order_is_not_found() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "CREDIT_USED", vec![fx.item(fx.product.id, "100", 2)]);
    input.credit = Some(30);
    fx.orders().confirm_order(input).await.unwrap();

    let err = fx.orders().cancel_order(order.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(fx.quantity(fx.product.id).await, Some(8));
}

// ============================================================================
// confirmOrder
// ============================================================================

#[tokio::test]
async fn test_full_payment_completes_order() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 4)]);
    input.amount_received = Some(dec("400"));
    input.change = Some(Decimal::ZERO);

    let detail = fx.orders().confirm_order(input).await.unwrap();

    assert_eq!(detail.order.status, OrderStatus::Completed);
    assert_eq!(detail.order.order_type, Some(OrderType::FullPayment));
    assert_eq!(detail.order.total_price, Some(dec("400")));
    assert_eq!(fx.quantity(fx.product.id).await, Some(6));

    assert_eq!(detail.stock_outs.len(), 1);
    assert_eq!(detail.stock_outs[0].quantity, 4);
    assert_eq!(detail.stock_outs[0].sell_price, dec("100"));

    let payment = detail.payment.unwrap();
    assert_eq!(payment.amount_received, Some(dec("400")));
    assert!(payment.paid_at.is_some());
    assert_eq!(payment.deposit, None);
    assert_eq!(detail.customer.map(|c| c.id), Some(fx.customer.id));
}

#[tokio::test]
async fn test_deposit_leaves_order_unpaid() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "DEPOSITED", vec![fx.item(fx.product.id, "100", 4)]);
    input.deposit = Some(dec("50"));

    let detail = fx.orders().confirm_order(input).await.unwrap();

    assert_eq!(detail.order.status, OrderStatus::Unpaid);
    assert_eq!(detail.order.order_type, Some(OrderType::Deposited));
    let payment = detail.payment.unwrap();
    assert_eq!(payment.deposit, Some(dec("50")));
    assert_eq!(payment.paid_at, None);
    assert_eq!(fx.quantity(fx.product.id).await, Some(6));
}

#[tokio::test]
async fn test_deposited_credit_requires_both_fields() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(
        order.id,
        "DEPOSITED_CREDIT_USED",
        vec![fx.item(fx.product.id, "100", 1)],
    );
    input.credit = Some(15);
    let err = fx.orders().confirm_order(input.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "deposit"));

    input.deposit = Some(dec("20"));
    let detail = fx.orders().confirm_order(input).await.unwrap();
    let payment = detail.payment.unwrap();
    assert_eq!(payment.credit_days, Some(15));
    assert_eq!(payment.deposit, Some(dec("20")));
    assert_eq!(detail.order.status, OrderStatus::Unpaid);
}

#[tokio::test]
async fn test_insufficient_stock_changes_nothing() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 6)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 20)]);
    input.amount_received = Some(dec("2000"));

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let detail = fx.orders().get_order(order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert!(detail.payment.is_none());
    assert!(detail.stock_outs.is_empty());
    assert_eq!(fx.quantity(fx.product.id).await, Some(6));
}

#[tokio::test]
async fn test_duplicate_lines_cannot_oversell() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 5)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(
        order.id,
        "FULL_PAYMENT",
        vec![fx.item(fx.product.id, "100", 3), fx.item(fx.product.id, "100", 3)],
    );
    input.amount_received = Some(dec("600"));

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(fx.quantity(fx.product.id).await, Some(5));
}

#[tokio::test]
async fn test_each_line_gets_a_stock_out_row() {
    let fx = Fixture::new().await;
    let other = fx.add_product("P002", "8850999320014", Some("25.50")).await;
    fx.stock_in(&[(fx.product.id, 10), (other.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(
        order.id,
        "FULL_PAYMENT",
        vec![
            fx.item(fx.product.id, "100", 2),
            fx.item(other.id, "25.50", 4),
            fx.item(fx.product.id, "100", 1),
        ],
    );
    input.amount_received = Some(dec("500"));
    input.change = Some(dec("98"));

    let detail = fx.orders().confirm_order(input).await.unwrap();

    assert_eq!(detail.order.total_price, Some(dec("402")));
    assert_eq!(detail.stock_outs.len(), 3);
    let sold: i32 = detail.stock_outs.iter().map(|s| s.quantity).sum();
    assert_eq!(sold, 7);
    assert_eq!(fx.quantity(fx.product.id).await, Some(7));
    assert_eq!(fx.quantity(other.id).await, Some(6));
}

#[tokio::test]
async fn test_confirm_twice_is_rejected() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "CREDIT_USED", vec![fx.item(fx.product.id, "100", 2)]);
    input.credit = Some(7);
    fx.orders().confirm_order(input.clone()).await.unwrap();

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(fx.quantity(fx.product.id).await, Some(8));
}

#[tokio::test]
async fn test_unpriced_product_is_rejected() {
    let fx = Fixture::new().await;
    let unpriced = fx.add_product("P003", "8850999320021", None).await;
    fx.stock_in(&[(unpriced.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(unpriced.id, "10", 1)]);
    input.amount_received = Some(dec("10"));

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(
        matches!(err, AppError::NotFound { ref resource, .. } if resource == "ProductSaleBranch")
    );
    assert_eq!(fx.quantity(unpriced.id).await, Some(10));
}

#[tokio::test]
async fn test_missing_stock_row_is_not_found() {
    let fx = Fixture::new().await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 1)]);
    input.amount_received = Some(dec("100"));

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Stock"));
}

#[tokio::test]
async fn test_invalid_payment_plans() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;
    let items = vec![fx.item(fx.product.id, "100", 1)];

    let err = fx
        .orders()
        .confirm_order(fx.confirmation(order.id, "BARTER", items.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "order_type"));

    let mut credit = fx.confirmation(order.id, "CREDIT_USED", items.clone());
    credit.credit = Some(0);
    let err = fx.orders().confirm_order(credit).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "credit"));

    let err = fx
        .orders()
        .confirm_order(fx.confirmation(order.id, "FULL_PAYMENT", items))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "amount_received"));

    assert_eq!(fx.quantity(fx.product.id).await, Some(10));
}

#[tokio::test]
async fn test_empty_and_invalid_lines_are_rejected() {
    let fx = Fixture::new().await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", Vec::new());
    input.amount_received = Some(dec("1"));
    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "order_items"));

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 0)]);
    input.amount_received = Some(dec("1"));
    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ref msg) if msg.contains("order_items[0].quantity")));
}

#[tokio::test]
async fn test_unknown_payment_method() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "CREDIT_USED", vec![fx.item(fx.product.id, "100", 1)]);
    input.credit = Some(30);
    input.payment_method_id = Uuid::new_v4();

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "PaymentMethod"));
}

#[tokio::test]
async fn test_delivery_fee_and_discount_in_total() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    fx.deliveries()
        .create_delivery(
            order.id,
            CreateDeliveryInput {
                track_number: "TH0001".to_string(),
                distance: dec("12.5"),
                address: None,
                kind: DeliveryType::OwnFleet,
                location: None,
                note: None,
                send_date: Utc::now(),
                fee: dec("50"),
            },
        )
        .await
        .unwrap();

    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 2)]);
    input.amount_received = Some(dec("230"));
    input.discount = Some(dec("20"));

    let detail = fx.orders().confirm_order(input).await.unwrap();
    assert_eq!(detail.order.total_price, Some(dec("230")));
    assert_eq!(detail.payment.unwrap().discount, Some(dec("20")));
    assert!(detail.delivery.is_some());
}

#[tokio::test]
async fn test_discount_beyond_total_is_rejected() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "CREDIT_USED", vec![fx.item(fx.product.id, "100", 1)]);
    input.credit = Some(30);
    input.discount = Some(dec("150"));

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "discount"));
}

#[tokio::test]
async fn test_slip_is_stored_with_payment() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "DEPOSITED", vec![fx.item(fx.product.id, "100", 1)]);
    input.deposit = Some(dec("30"));
    input.slip_image = Some(slip());

    let detail = fx.orders().confirm_order(input).await.unwrap();
    assert_eq!(detail.slips.len(), 1);
    let saved = fx.upload_dir.path().join(&detail.slips[0].image_url);
    assert_eq!(std::fs::read(saved).unwrap(), b"hello");
}

#[tokio::test]
async fn test_rejected_confirmation_leaves_no_slip() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 1)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut input = fx.confirmation(order.id, "DEPOSITED", vec![fx.item(fx.product.id, "100", 1)]);
    input.deposit = Some(dec("30"));
    input.slip_image = Some(slip());

    let rival = fx.open_order("INV-0002").await;
    let mut rival_input =
        fx.confirmation(rival.id, "CREDIT_USED", vec![fx.item(fx.product.id, "100", 1)]);
    rival_input.credit = Some(30);
    fx.orders().confirm_order(rival_input).await.unwrap();

    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let folder = fx.upload_dir.path().join("payment-slips");
    let leftover = std::fs::read_dir(&folder).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftover, 0);
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_list_orders_filters() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let first = fx.open_order("INV-0001").await;
    fx.open_order("INV-0002").await;

    let mut input = fx.confirmation(first.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 1)]);
    input.amount_received = Some(dec("100"));
    fx.orders().confirm_order(input).await.unwrap();

    let all = fx
        .orders()
        .list_orders_by_branch(fx.branch.id, OrderFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].order.order_code, "INV-0002");

    let pending = fx
        .orders()
        .list_orders_by_branch(
            fx.branch.id,
            OrderFilter {
                status: Some(OrderStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order.order_code, "INV-0002");

    let by_code = fx
        .orders()
        .list_orders_by_user(
            fx.cashier.id,
            OrderFilter {
                order_code: Some("0001".to_string()),
                order_type: Some(OrderType::FullPayment),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code[0].stock_outs.len(), 1);
}

#[tokio::test]
async fn test_listings_require_known_scope() {
    let fx = Fixture::new().await;

    assert!(matches!(
        fx.orders()
            .list_orders_by_branch(Uuid::new_v4(), OrderFilter::default())
            .await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        fx.orders()
            .list_orders_by_user(Uuid::new_v4(), OrderFilter::default())
            .await,
        Err(AppError::NotFound { .. })
    ));

    let customers = pos_backend::services::CustomerService::new(fx.store.clone())
        .list_customers_by_branch(fx.branch.id, CustomerFilter::default())
        .await
        .unwrap();
    assert_eq!(customers.len(), 1);
}

// ============================================================================
// Arithmetic limits
// ============================================================================

#[tokio::test]
async fn test_confirm_rejects_quantity_above_line_limit() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let items = vec![
        fx.item(fx.product.id, "100", shared::MAX_LINE_QUANTITY),
        fx.item(fx.product.id, "100", shared::MAX_LINE_QUANTITY + 1),
    ];
    let mut input = fx.confirmation(order.id, "CREDIT_USED", items);
    input.credit = Some(30);
    let err = fx.orders().confirm_order(input).await.unwrap_err();
    match err {
        AppError::ValidationError(message) => {
            assert!(message.contains("order_items[1].quantity"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(fx.quantity(fx.product.id).await, Some(10));
}

#[tokio::test]
async fn test_confirm_rejects_total_beyond_decimal_range() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 10)]).await;
    let order = fx.open_order("INV-0001").await;

    let mut line = fx.item(fx.product.id, "100", 2);
    line.sell_price = Decimal::MAX;
    let mut input = fx.confirmation(order.id, "CREDIT_USED", vec![line]);
    input.credit = Some(30);
    let err = fx.orders().confirm_order(input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "order_items"));

    let detail = fx.orders().get_order(order.id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert!(detail.payment.is_none());
    assert_eq!(fx.quantity(fx.product.id).await, Some(10));
}

#[test]
fn test_required_quantities_overflow_is_none() {
    let product_id = Uuid::from_u128(7);
    let line = OrderItemInput {
        product_id,
        sell_price: Decimal::ONE,
        quantity: i32::MAX,
    };
    assert_eq!(required_quantities(&[line.clone(), line.clone()]), None);
    assert_eq!(
        required_quantities(&[line]).unwrap().get(&product_id),
        Some(&i32::MAX)
    );
    assert_eq!(
        order_total(&[], Decimal::MAX, Some(Decimal::MIN)),
        None
    );
}

// ============================================================================
// Property Tests
// ============================================================================

fn item_strategy(products: Vec<Uuid>) -> impl Strategy<Value = OrderItemInput> {
    (prop::sample::select(products), 0i64..100_000, 1i32..50).prop_map(
        |(product_id, cents, quantity)| OrderItemInput {
            product_id,
            sell_price: Decimal::new(cents, 2),
            quantity,
        },
    )
}

proptest! {
    #[test]
    fn prop_total_is_lines_plus_fee_minus_discount(
        items in prop::collection::vec(item_strategy(vec![Uuid::from_u128(1), Uuid::from_u128(2)]), 1..10),
        fee in 0i64..10_000,
        discount in prop::option::of(0i64..10_000),
    ) {
        let fee = Decimal::new(fee, 2);
        let discount = discount.map(|d| Decimal::new(d, 2));
        let lines: Decimal = items
            .iter()
            .map(|i| i.sell_price * Decimal::from(i.quantity))
            .sum();

        prop_assert_eq!(
            order_total(&items, fee, discount),
            Some(lines + fee - discount.unwrap_or(Decimal::ZERO))
        );
    }

    #[test]
    fn prop_required_quantities_preserve_total(
        items in prop::collection::vec(item_strategy((1..4).map(Uuid::from_u128).collect()), 1..20),
    ) {
        let required = required_quantities(&items).unwrap();
        let requested: i32 = items.iter().map(|i| i.quantity).sum();

        prop_assert_eq!(required.values().sum::<i32>(), requested);
        prop_assert!(required.len() <= 3);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Stock falls by exactly the sold quantity, and stock-out rows add up
    /// to the requested quantities
    #[test]
    fn prop_confirm_decrements_by_requested(
        initial in 1i32..200,
        quantities in prop::collection::vec(1i32..20, 1..5),
    ) {
        tokio_test::block_on(async {
            let fx = Fixture::new().await;
            fx.stock_in(&[(fx.product.id, initial)]).await;
            let order = fx.open_order("INV-PROP").await;

            let items: Vec<OrderItemInput> = quantities
                .iter()
                .map(|q| fx.item(fx.product.id, "100", *q))
                .collect();
            let mut input = fx.confirmation(order.id, "CREDIT_USED", items);
            input.credit = Some(30);

            let requested: i32 = quantities.iter().sum();
            let result = fx.orders().confirm_order(input).await;

            if requested <= initial {
                let detail = result.unwrap();
                let sold: i32 = detail.stock_outs.iter().map(|s| s.quantity).sum();
                assert_eq!(sold, requested);
                assert_eq!(fx.quantity(fx.product.id).await, Some(initial - requested));
            } else {
                assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
                assert_eq!(fx.quantity(fx.product.id).await, Some(initial));
            }
        });
    }
}
