//! Read side of staff accounts. Creation lives in the auth service next to
//! password hashing.

use std::sync::Arc;

use shared::User;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::Store;
use crate::services::guards;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", "ไม่พบผู้ใช้งาน"))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.store.list_users(None).await
    }

    pub async fn list_users_by_branch(&self, branch_id: Uuid) -> AppResult<Vec<User>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_users(Some(branch_id)).await
    }
}
