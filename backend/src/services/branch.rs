//! Branch management

use std::sync::Arc;

use chrono::Utc;
use shared::{validate_code, validate_thai_phone, Branch, CreateBranchInput, UpdateBranchInput};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::guards;

#[derive(Clone)]
pub struct BranchService {
    store: Arc<dyn Store>,
}

impl BranchService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_branch(&self, input: CreateBranchInput) -> AppResult<Branch> {
        input.validate()?;
        validate_code(&input.code)
            .map_err(|msg| AppError::validation("code", msg, "รหัสสาขาไม่ถูกต้อง"))?;
        validate_thai_phone(&input.phone)
            .map_err(|msg| AppError::validation("phone", msg, "เบอร์โทรศัพท์ไม่ถูกต้อง"))?;

        if self.store.branch_code_exists(&input.code).await?
            || self.store.branch_name_exists(&input.name, None).await?
        {
            return Err(duplicate_branch());
        }

        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4(),
            code: input.code,
            name: input.name,
            phone: input.phone,
            address: input.address,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_branch(&branch).await?;

        tracing::info!(branch_id = %branch.id, code = %branch.code, "Branch created");
        Ok(branch)
    }

    pub async fn list_branches(&self) -> AppResult<Vec<Branch>> {
        self.store.list_branches().await
    }

    /// Rename or re-contact a branch; the code stays fixed
    pub async fn update_branch(&self, id: Uuid, input: UpdateBranchInput) -> AppResult<Branch> {
        input.validate()?;
        validate_thai_phone(&input.phone)
            .map_err(|msg| AppError::validation("phone", msg, "เบอร์โทรศัพท์ไม่ถูกต้อง"))?;

        let mut branch = guards::require_branch(self.store.as_ref(), id).await?;
        if self.store.branch_name_exists(&input.name, Some(id)).await? {
            return Err(duplicate_branch());
        }

        branch.name = input.name;
        branch.phone = input.phone;
        branch.address = input.address;
        branch.updated_at = Utc::now();
        self.store.update_branch(&branch).await?;

        tracing::info!(branch_id = %branch.id, "Branch updated");
        Ok(branch)
    }
}

fn duplicate_branch() -> AppError {
    AppError::conflict(
        "branch",
        "Branch code or name already exists",
        "รหัสสาขา หรือ ชื่อสาขานี้ถูกตั้งไปแล้ว",
    )
}
