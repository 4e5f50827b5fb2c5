//! Customers registered at a branch

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_thai_phone, CreateCustomerInput, Customer, CustomerFilter, UpdateCustomerInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::guards;

#[derive(Clone)]
pub struct CustomerService {
    store: Arc<dyn Store>,
}

impl CustomerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register a customer on behalf of `user_id`
    pub async fn create_customer(
        &self,
        user_id: Uuid,
        input: CreateCustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;
        check_phone(input.phone.as_deref())?;

        let store = self.store.as_ref();
        guards::require_branch(store, input.branch_id).await?;
        if let Some(group_id) = input.customer_group_id {
            guards::require_customer_group(store, group_id).await?;
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            branch_id: input.branch_id,
            user_id,
            customer_group_id: input.customer_group_id,
            name: input.name,
            phone: input.phone,
            address: input.address,
            created_at: now,
            updated_at: now,
        };
        store.insert_customer(&customer).await?;

        tracing::info!(customer_id = %customer.id, branch_id = %customer.branch_id, "Customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: Uuid) -> AppResult<Customer> {
        self.store
            .find_customer(id)
            .await?
            .ok_or_else(|| AppError::not_found("Customer", "ไม่พบลูกค้าที่ระบุ"))
    }

    pub async fn update_customer(&self, id: Uuid, input: UpdateCustomerInput) -> AppResult<Customer> {
        input.validate()?;
        check_phone(input.phone.as_deref())?;

        let mut customer = self.get_customer(id).await?;
        if let Some(group_id) = input.customer_group_id {
            guards::require_customer_group(self.store.as_ref(), group_id).await?;
        }

        customer.customer_group_id = input.customer_group_id;
        customer.name = input.name;
        customer.phone = input.phone;
        customer.address = input.address;
        customer.updated_at = Utc::now();
        self.store.update_customer(&customer).await?;

        tracing::info!(customer_id = %customer.id, "Customer updated");
        Ok(customer)
    }

    pub async fn list_customers_by_branch(
        &self,
        branch_id: Uuid,
        filter: CustomerFilter,
    ) -> AppResult<Vec<Customer>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_customers(branch_id, &filter).await
    }

    /// Customers of the branch registered by `user_id`
    pub async fn list_customers_by_branch_and_user(
        &self,
        branch_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<Customer>> {
        let filter = CustomerFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list_customers_by_branch(branch_id, filter).await
    }
}

fn check_phone(phone: Option<&str>) -> AppResult<()> {
    match phone {
        Some(phone) => validate_thai_phone(phone)
            .map_err(|msg| AppError::validation("phone", msg, "เบอร์โทรศัพท์ไม่ถูกต้อง")),
        None => Ok(()),
    }
}
