//! Branch, catalog, payment method and customer tests

mod common;

use common::{dec, Fixture};
use pos_backend::error::AppError;
use pos_backend::services::{BranchService, CustomerService, PaymentMethodService};
use proptest::prelude::*;
use shared::{
    validate_barcode, validate_code, CreateBranchInput, CreateCategoryInput, CreateCustomerInput,
    CreatePaymentMethodInput, CreateProductInput, CustomerFilter, ProductState, ProductUnit,
    SetSellPriceInput, UpdateBranchInput, UpdateCategoryInput, UpdatePaymentMethodInput,
    UpdateProductInput,
};
use uuid::Uuid;

fn branch_input(code: &str, name: &str, phone: &str) -> CreateBranchInput {
    CreateBranchInput {
        code: code.to_string(),
        name: name.to_string(),
        phone: phone.to_string(),
        address: None,
    }
}

// ============================================================================
// Branches
// ============================================================================

#[tokio::test]
async fn test_branch_code_and_name_are_unique() {
    let fx = Fixture::new().await;
    let branches = BranchService::new(fx.store.clone());

    let err = branches
        .create_branch(branch_input("BKK01", "Bangkok Asok", "021234568"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let err = branches
        .create_branch(branch_input("BKK02", "Bangkok Silom", "021234568"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    branches
        .create_branch(branch_input("BKK02", "Bangkok Asok", "0812345678"))
        .await
        .unwrap();
    let codes: Vec<String> = branches
        .list_branches()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.code)
        .collect();
    assert_eq!(codes, vec!["BKK01", "BKK02"]);
}

#[tokio::test]
async fn test_branch_rejects_bad_code_and_phone() {
    let fx = Fixture::new().await;
    let branches = BranchService::new(fx.store.clone());

    let err = branches
        .create_branch(branch_input("bkk02", "Bangkok Asok", "021234568"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "code"));

    let err = branches
        .create_branch(branch_input("BKK02", "Bangkok Asok", "123456789"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "phone"));
}

#[tokio::test]
async fn test_branch_update_keeps_code() {
    let fx = Fixture::new().await;
    let branches = BranchService::new(fx.store.clone());
    let other = branches
        .create_branch(branch_input("CNX01", "Chiang Mai Nimman", "0531234567"))
        .await
        .unwrap();

    let err = branches
        .update_branch(
            other.id,
            UpdateBranchInput {
                name: "Bangkok Silom".to_string(),
                phone: "0531234567".to_string(),
                address: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Keeping its own name is not a conflict
    let updated = branches
        .update_branch(
            other.id,
            UpdateBranchInput {
                name: "Chiang Mai Nimman".to_string(),
                phone: "0539876543".to_string(),
                address: Some("Nimmanhaemin Rd".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.code, "CNX01");
    assert_eq!(updated.phone, "0539876543");
    assert!(updated.updated_at >= other.updated_at);

    let err = branches
        .update_branch(
            Uuid::new_v4(),
            UpdateBranchInput {
                name: "Nowhere".to_string(),
                phone: "0539876543".to_string(),
                address: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

// ============================================================================
// Categories and products
// ============================================================================

#[tokio::test]
async fn test_category_and_product_uniqueness() {
    let fx = Fixture::new().await;

    let err = fx
        .products()
        .create_category(CreateCategoryInput {
            code: "DRINK".to_string(),
            name: "Beverages".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Same barcode as P001
    let err = fx
        .products()
        .create_product(CreateProductInput {
            code: "P002".to_string(),
            barcode: "8850999320007".to_string(),
            name: "Soda Water".to_string(),
            unit: ProductUnit::Bottle,
            category_id: fx.product.category_id,
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let err = fx
        .products()
        .create_product(CreateProductInput {
            code: "P002".to_string(),
            barcode: "8850999320014".to_string(),
            name: "Soda Water".to_string(),
            unit: ProductUnit::Bottle,
            category_id: Uuid::new_v4(),
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Category"));

    let err = fx
        .products()
        .create_product(CreateProductInput {
            code: "P002".to_string(),
            barcode: "8850999x".to_string(),
            name: "Soda Water".to_string(),
            unit: ProductUnit::Bottle,
            category_id: fx.product.category_id,
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "barcode"));
}

#[tokio::test]
async fn test_product_retire_and_restore() {
    let fx = Fixture::new().await;
    let products = fx.products();

    let retired = products.retire_product(fx.product.id).await.unwrap();
    assert!(matches!(retired.state, ProductState::Retired { .. }));

    let err = products.retire_product(fx.product.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));

    assert!(products.list_products(false).await.unwrap().is_empty());
    assert_eq!(products.list_products(true).await.unwrap().len(), 1);
    assert!(products
        .list_products_by_branch(fx.branch.id)
        .await
        .unwrap()
        .is_empty());

    // Retired products can still be looked up
    let found = products.get_product(fx.product.id).await.unwrap();
    assert!(!found.state.is_active());

    let restored = products.restore_product(fx.product.id).await.unwrap();
    assert_eq!(restored.state, ProductState::Active);
    let err = products.restore_product(fx.product.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_branch_products_carry_price_and_quantity() {
    let fx = Fixture::new().await;
    let unpriced = fx.add_product("P002", "8850999320014", None).await;
    fx.stock_in(&[(fx.product.id, 7)]).await;

    let listed = fx
        .products()
        .list_products_by_branch(fx.branch.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].product.id, fx.product.id);
    assert_eq!(listed[0].sell_price, Some(dec("100")));
    assert_eq!(listed[0].quantity, Some(7));
    assert_eq!(listed[1].product.id, unpriced.id);
    assert_eq!(listed[1].sell_price, None);
    assert_eq!(listed[1].quantity, None);
}

#[tokio::test]
async fn test_sell_price_is_replaced() {
    let fx = Fixture::new().await;
    let products = fx.products();

    let price = products
        .set_sell_price(SetSellPriceInput {
            product_id: fx.product.id,
            branch_id: fx.branch.id,
            sell_price: dec("125.50"),
        })
        .await
        .unwrap();
    assert_eq!(price.sell_price, dec("125.50"));

    let stored = fx
        .store
        .find_sell_price(fx.product.id, fx.branch.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.sell_price, dec("125.50"));

    let err = products
        .set_sell_price(SetSellPriceInput {
            product_id: fx.product.id,
            branch_id: fx.branch.id,
            sell_price: dec("-1"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "sell_price"));

    products.retire_product(fx.product.id).await.unwrap();
    let err = products
        .set_sell_price(SetSellPriceInput {
            product_id: fx.product.id,
            branch_id: fx.branch.id,
            sell_price: dec("90"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Product"));
}

#[tokio::test]
async fn test_category_update_and_delete() {
    let fx = Fixture::new().await;
    let products = fx.products();
    let snacks = products
        .create_category(CreateCategoryInput {
            code: "SNACK".to_string(),
            name: "Snacks".to_string(),
        })
        .await
        .unwrap();

    let err = products
        .update_category(
            snacks.id,
            UpdateCategoryInput {
                code: "DRINK".to_string(),
                name: "Chips".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let renamed = products
        .update_category(
            snacks.id,
            UpdateCategoryInput {
                code: "SNACK".to_string(),
                name: "Chips and Snacks".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Chips and Snacks");

    // DRINK still holds P001
    let err = products
        .delete_category(fx.product.category_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { ref resource, .. } if resource == "products_category_id_fkey"));

    products.delete_category(snacks.id).await.unwrap();
    assert_eq!(products.list_categories().await.unwrap().len(), 1);
    let err = products.delete_category(snacks.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Category"));
}

#[tokio::test]
async fn test_product_update_checks_identity_against_others() {
    let fx = Fixture::new().await;
    let other = fx.add_product("P002", "8850999320014", Some("20")).await;
    let products = fx.products();

    let edit = |code: &str, barcode: &str, name: &str| UpdateProductInput {
        code: code.to_string(),
        barcode: barcode.to_string(),
        name: name.to_string(),
        unit: ProductUnit::Pack,
        category_id: fx.product.category_id,
        description: Some("Six bottles".to_string()),
    };

    // Its own code and barcode are fine
    let updated = products
        .update_product(
            fx.product.id,
            edit("P001", "8850999320007", "Drinking Water 600ml x6"),
        )
        .await
        .unwrap();
    assert_eq!(updated.unit, ProductUnit::Pack);
    assert_eq!(updated.name, "Drinking Water 600ml x6");
    assert_eq!(updated.state, ProductState::Active);
    let stored = products.get_product(fx.product.id).await.unwrap();
    assert_eq!(stored.description.as_deref(), Some("Six bottles"));

    let err = products
        .update_product(fx.product.id, edit("P001", &other.barcode, "Water"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let mut moved = edit("P001", "8850999320007", "Water");
    moved.category_id = Uuid::new_v4();
    let err = products
        .update_product(fx.product.id, moved)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Category"));

    let err = products
        .update_product(Uuid::new_v4(), edit("P009", "8850999320090", "Ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Product"));
}

#[tokio::test]
async fn test_unpriced_products_of_branch() {
    let fx = Fixture::new().await;
    let unpriced = fx.add_product("P003", "8850999320021", None).await;
    let retired = fx.add_product("P002", "8850999320014", None).await;
    let products = fx.products();
    products.retire_product(retired.id).await.unwrap();

    let listed = products
        .list_unpriced_products_by_branch(fx.branch.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, unpriced.id);

    products
        .set_sell_price(SetSellPriceInput {
            product_id: unpriced.id,
            branch_id: fx.branch.id,
            sell_price: dec("15"),
        })
        .await
        .unwrap();
    assert!(products
        .list_unpriced_products_by_branch(fx.branch.id)
        .await
        .unwrap()
        .is_empty());

    let err = products
        .list_unpriced_products_by_branch(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Branch"));
}

// ============================================================================
// Payment methods and customers
// ============================================================================

#[tokio::test]
async fn test_payment_method_names_are_unique() {
    let fx = Fixture::new().await;
    let methods = PaymentMethodService::new(fx.store.clone());

    let err = methods
        .create_payment_method(CreatePaymentMethodInput {
            name: "Cash".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    methods
        .create_payment_method(CreatePaymentMethodInput {
            name: "PromptPay".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(methods.list_payment_methods().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_payment_method_rename_and_removal() {
    let fx = Fixture::new().await;
    let methods = PaymentMethodService::new(fx.store.clone());
    let transfer = methods
        .create_payment_method(CreatePaymentMethodInput {
            name: "Bank Transfer".to_string(),
        })
        .await
        .unwrap();

    let err = methods
        .update_payment_method(
            transfer.id,
            UpdatePaymentMethodInput {
                name: "Cash".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let renamed = methods
        .update_payment_method(
            transfer.id,
            UpdatePaymentMethodInput {
                name: "PromptPay".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "PromptPay");

    methods.remove_payment_method(transfer.id).await.unwrap();
    assert_eq!(methods.list_payment_methods().await.unwrap().len(), 1);
    let err = methods.remove_payment_method(transfer.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_payment_method_used_by_an_order_stays() {
    let fx = Fixture::new().await;
    fx.stock_in(&[(fx.product.id, 5)]).await;
    let order = fx.open_order("INV-0001").await;
    let mut input = fx.confirmation(order.id, "FULL_PAYMENT", vec![fx.item(fx.product.id, "100", 1)]);
    input.amount_received = Some(dec("100"));
    input.change = Some(dec("0"));
    fx.orders().confirm_order(input).await.unwrap();

    let methods = PaymentMethodService::new(fx.store.clone());
    let err = methods
        .remove_payment_method(fx.payment_method.id)
        .await
        .unwrap_err();
    match err {
        AppError::Conflict { message_th, .. } => assert_eq!(message_th, "ไม่สามารถลบได้"),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(methods.list_payment_methods().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_customer_listing_is_scoped_and_filtered() {
    let fx = Fixture::new().await;
    let customers = CustomerService::new(fx.store.clone());
    let other_branch = BranchService::new(fx.store.clone())
        .create_branch(branch_input("CNX01", "Chiang Mai Nimman", "0531234567"))
        .await
        .unwrap();

    customers
        .create_customer(fx.cashier.id, CreateCustomerInput {
            branch_id: fx.branch.id,
            customer_group_id: None,
            name: "Somsri".to_string(),
            phone: Some("0898765432".to_string()),
            address: None,
        })
        .await
        .unwrap();
    customers
        .create_customer(fx.cashier.id, CreateCustomerInput {
            branch_id: other_branch.id,
            customer_group_id: None,
            name: "Somchai North".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap();

    let all = customers
        .list_customers_by_branch(fx.branch.id, CustomerFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let by_name = customers
        .list_customers_by_branch(
            fx.branch.id,
            CustomerFilter {
                name: Some("Somchai".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, fx.customer.id);

    let by_phone = customers
        .list_customers_by_branch(
            fx.branch.id,
            CustomerFilter {
                phone: Some("0898".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_phone.len(), 1);
    assert_eq!(by_phone[0].name, "Somsri");
}

#[tokio::test]
async fn test_customer_requires_branch_and_valid_phone() {
    let fx = Fixture::new().await;
    let customers = CustomerService::new(fx.store.clone());

    let err = customers
        .create_customer(fx.cashier.id, CreateCustomerInput {
            branch_id: Uuid::new_v4(),
            customer_group_id: None,
            name: "Nobody".to_string(),
            phone: None,
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { ref resource, .. } if resource == "Branch"));

    let err = customers
        .create_customer(fx.cashier.id, CreateCustomerInput {
            branch_id: fx.branch.id,
            customer_group_id: None,
            name: "Nobody".to_string(),
            phone: Some("123456789".to_string()),
            address: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "phone"));

    let found = customers.get_customer(fx.customer.id).await.unwrap();
    assert_eq!(found.name, "Somchai");
    let err = customers.get_customer(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

// ============================================================================
// Code and barcode formats
// ============================================================================

proptest! {
    #[test]
    fn prop_uppercase_codes_are_accepted(code in "[A-Z0-9-]{2,20}") {
        prop_assert!(validate_code(&code).is_ok());
    }

    #[test]
    fn prop_lowercase_codes_are_rejected(code in "[a-z]{2,20}") {
        prop_assert!(validate_code(&code).is_err());
    }

    #[test]
    fn prop_barcode_lengths(barcode in "[0-9]{1,20}") {
        let expected = matches!(barcode.len(), 8 | 12 | 13 | 14);
        prop_assert_eq!(validate_barcode(&barcode).is_ok(), expected);
    }
}
