//! Shop-wide customer groups

use std::sync::Arc;

use chrono::Utc;
use shared::{CustomerGroup, CustomerGroupInput};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::Store;

#[derive(Clone)]
pub struct CustomerGroupService {
    store: Arc<dyn Store>,
}

impl CustomerGroupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_customer_group(&self, input: CustomerGroupInput) -> AppResult<CustomerGroup> {
        input.validate()?;
        if self.store.customer_group_name_exists(&input.name, None).await? {
            return Err(duplicate_group(&input.name));
        }

        let now = Utc::now();
        let group = CustomerGroup {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_customer_group(&group).await?;

        tracing::info!(customer_group_id = %group.id, name = %group.name, "Customer group created");
        Ok(group)
    }

    pub async fn update_customer_group(
        &self,
        id: Uuid,
        input: CustomerGroupInput,
    ) -> AppResult<CustomerGroup> {
        input.validate()?;
        let mut group = self
            .store
            .find_customer_group(id)
            .await?
            .ok_or_else(|| AppError::not_found("CustomerGroup", "ไม่พบกลุ่มลูกค้านี้ในระบบ"))?;
        if self
            .store
            .customer_group_name_exists(&input.name, Some(id))
            .await?
        {
            return Err(duplicate_group(&input.name));
        }

        group.name = input.name;
        group.updated_at = Utc::now();
        self.store.update_customer_group(&group).await?;

        tracing::info!(customer_group_id = %group.id, "Customer group renamed");
        Ok(group)
    }

    pub async fn list_customer_groups(&self) -> AppResult<Vec<CustomerGroup>> {
        self.store.list_customer_groups().await
    }
}

fn duplicate_group(name: &str) -> AppError {
    AppError::conflict(
        "customer_groups_name_key",
        "Customer group name already exists",
        format!("ลูกค้ากลุ่ม {} ถูกสร้างแล้วในระบบ", name),
    )
}
