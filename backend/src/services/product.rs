//! Catalog service: categories, products, their lifecycle and branch prices

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_barcode, validate_code, validate_non_negative_amount, BranchProduct, Category,
    CreateCategoryInput, CreateProductInput, Product, ProductSaleBranch, ProductState,
    SetSellPriceInput, UpdateCategoryInput, UpdateProductInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::guards;

/// Product service
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        validate_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "รหัสหมวดหมู่ไม่ถูกต้อง"))?;

        if self
            .store
            .category_exists(&input.code, &input.name, None)
            .await?
        {
            return Err(duplicate_category());
        }

        let category = Category {
            id: Uuid::new_v4(),
            code: input.code,
            name: input.name,
            created_at: Utc::now(),
        };
        self.store.insert_category(&category).await?;

        tracing::info!(category_id = %category.id, code = %category.code, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn update_category(&self, id: Uuid, input: UpdateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        validate_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "รหัสหมวดหมู่ไม่ถูกต้อง"))?;

        let mut category = self.require_category(id).await?;
        if self
            .store
            .category_exists(&input.code, &input.name, Some(id))
            .await?
        {
            return Err(duplicate_category());
        }

        category.code = input.code;
        category.name = input.name;
        self.store.update_category(&category).await?;

        tracing::info!(category_id = %category.id, code = %category.code, "Category updated");
        Ok(category)
    }

    /// Categories still holding products, retired ones included, stay
    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        self.require_category(id).await?;
        if self.store.category_has_products(id).await? {
            return Err(AppError::conflict(
                "products_category_id_fkey",
                "Category still has products",
                "ไม่สามารถลบหมวดหมู่ที่มีสินค้าอยู่ได้",
            ));
        }
        self.store.delete_category(id).await?;

        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    async fn require_category(&self, id: Uuid) -> AppResult<Category> {
        self.store
            .find_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category", "ไม่พบหมวดหมู่นี้"))
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "รหัสสินค้าไม่ถูกต้อง"))?;
        validate_barcode(&input.barcode)
            .map_err(|msg| AppError::validation("barcode", msg, "บาร์โค้ดไม่ถูกต้อง"))?;

        if self.store.find_category(input.category_id).await?.is_none() {
            return Err(AppError::not_found("Category", "ไม่พบหมวดหมู่สินค้า"));
        }
        if self
            .store
            .product_exists(&input.code, &input.barcode, &input.name, None)
            .await?
        {
            return Err(duplicate_product());
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            code: input.code,
            barcode: input.barcode,
            name: input.name,
            unit: input.unit,
            category_id: input.category_id,
            description: input.description,
            image_url: None,
            state: ProductState::Active,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_product(&product).await?;

        tracing::info!(product_id = %product.id, code = %product.code, "Product created");
        Ok(product)
    }

    /// Replace the descriptive fields of a product, retired or not
    pub async fn update_product(&self, id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "รหัสสินค้าไม่ถูกต้อง"))?;
        validate_barcode(&input.barcode)
            .map_err(|msg| AppError::validation("barcode", msg, "บาร์โค้ดไม่ถูกต้อง"))?;

        let mut product = guards::require_product(self.store.as_ref(), id).await?;
        if self.store.find_category(input.category_id).await?.is_none() {
            return Err(AppError::not_found("Category", "ไม่พบหมวดหมู่สินค้า"));
        }
        if self
            .store
            .product_exists(&input.code, &input.barcode, &input.name, Some(id))
            .await?
        {
            return Err(duplicate_product());
        }

        product.code = input.code;
        product.barcode = input.barcode;
        product.name = input.name;
        product.unit = input.unit;
        product.category_id = input.category_id;
        product.description = input.description;
        product.updated_at = Utc::now();
        self.store.update_product(&product).await?;

        tracing::info!(product_id = %product.id, code = %product.code, "Product updated");
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Product> {
        guards::require_product(self.store.as_ref(), id).await
    }

    pub async fn list_products(&self, include_retired: bool) -> AppResult<Vec<Product>> {
        self.store.list_products(include_retired).await
    }

    /// Take a product out of sale without removing its history
    pub async fn retire_product(&self, id: Uuid) -> AppResult<Product> {
        let mut product = guards::require_product(self.store.as_ref(), id).await?;
        let now = Utc::now();
        product.state = product.state.retire(now)?;
        product.updated_at = now;
        self.store.update_product_state(id, product.state, now).await?;

        tracing::info!(product_id = %id, "Product retired");
        Ok(product)
    }

    pub async fn restore_product(&self, id: Uuid) -> AppResult<Product> {
        let mut product = guards::require_product(self.store.as_ref(), id).await?;
        let now = Utc::now();
        product.state = product.state.restore()?;
        product.updated_at = now;
        self.store.update_product_state(id, product.state, now).await?;

        tracing::info!(product_id = %id, "Product restored");
        Ok(product)
    }

    /// Active products with this branch's price and stock
    pub async fn list_products_by_branch(&self, branch_id: Uuid) -> AppResult<Vec<BranchProduct>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_branch_products(branch_id).await
    }

    /// Active products the branch cannot sell yet for lack of a price
    pub async fn list_unpriced_products_by_branch(&self, branch_id: Uuid) -> AppResult<Vec<Product>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_unpriced_products(branch_id).await
    }

    // ========================================================================
    // Branch prices
    // ========================================================================

    pub async fn set_sell_price(&self, input: SetSellPriceInput) -> AppResult<ProductSaleBranch> {
        validate_non_negative_amount(input.sell_price)
            .map_err(|msg| AppError::validation("sell_price", msg, "ราคาขายต้องไม่ติดลบ"))?;

        let store = self.store.as_ref();
        guards::require_active_product(store, input.product_id).await?;
        guards::require_branch(store, input.branch_id).await?;

        let price = ProductSaleBranch {
            product_id: input.product_id,
            branch_id: input.branch_id,
            sell_price: input.sell_price,
            updated_at: Utc::now(),
        };
        store.upsert_sell_price(&price).await?;

        tracing::info!(
            product_id = %price.product_id,
            branch_id = %price.branch_id,
            sell_price = %price.sell_price,
            "Sell price set"
        );
        Ok(price)
    }
}

fn duplicate_category() -> AppError {
    AppError::conflict(
        "categories_code_key",
        "Category code or name already exists",
        "รหัส หรือ ชื่อหมวดหมู่นี้ถูกใช้แล้ว",
    )
}

fn duplicate_product() -> AppError {
    AppError::conflict(
        "products_code_key",
        "Product code, barcode or name already exists",
        "รหัสสินค้า บาร์โค้ด หรือ ชื่อสินค้านี้ถูกใช้แล้ว",
    )
}
