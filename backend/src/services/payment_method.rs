use std::sync::Arc;

use chrono::Utc;
use shared::{CreatePaymentMethodInput, PaymentMethod, UpdatePaymentMethodInput};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::guards;

#[derive(Clone)]
pub struct PaymentMethodService {
    store: Arc<dyn Store>,
}

impl PaymentMethodService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_payment_method(
        &self,
        input: CreatePaymentMethodInput,
    ) -> AppResult<PaymentMethod> {
        input.validate()?;

        if self.store.payment_method_exists(&input.name, None).await? {
            return Err(duplicate_method());
        }

        let method = PaymentMethod {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: Utc::now(),
        };
        self.store.insert_payment_method(&method).await?;

        tracing::info!(payment_method_id = %method.id, name = %method.name, "Payment method created");
        Ok(method)
    }

    pub async fn list_payment_methods(&self) -> AppResult<Vec<PaymentMethod>> {
        self.store.list_payment_methods().await
    }

    pub async fn update_payment_method(
        &self,
        id: Uuid,
        input: UpdatePaymentMethodInput,
    ) -> AppResult<PaymentMethod> {
        input.validate()?;
        let mut method = guards::require_payment_method(self.store.as_ref(), id).await?;
        if self.store.payment_method_exists(&input.name, Some(id)).await? {
            return Err(duplicate_method());
        }

        method.name = input.name;
        self.store.update_payment_method(&method).await?;

        tracing::info!(payment_method_id = %method.id, name = %method.name, "Payment method renamed");
        Ok(method)
    }

    /// Only methods no payment ever used can be removed
    pub async fn remove_payment_method(&self, id: Uuid) -> AppResult<()> {
        guards::require_payment_method(self.store.as_ref(), id).await?;
        if self.store.payment_method_in_use(id).await? {
            return Err(AppError::conflict(
                "payment_orders_payment_method_id_fkey",
                "Payment method is referenced by payments",
                "ไม่สามารถลบได้",
            ));
        }
        self.store.delete_payment_method(id).await?;

        tracing::info!(payment_method_id = %id, "Payment method removed");
        Ok(())
    }
}

fn duplicate_method() -> AppError {
    AppError::conflict(
        "payment_methods_name_key",
        "Payment method already exists",
        "ประเภทการชำระเงินนี้มีอยู่แล้ว",
    )
}
