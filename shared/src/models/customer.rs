//! Customer and customer group models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Shop-wide grouping of customers (wholesale, retail, ...). Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerGroup {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of both the create and the rename call
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CustomerGroupInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// A customer registered at a branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub branch_id: Uuid,
    /// Staff member who registered the customer
    pub user_id: Uuid,
    pub customer_group_id: Option<Uuid>,
    pub name: String,
    pub phone: Option<String>,
    /// Default delivery address
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerInput {
    pub branch_id: Uuid,
    pub customer_group_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 9, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// Every field is replaced; the branch and the owner stay fixed
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCustomerInput {
    pub customer_group_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 9, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// Filters for customer listings. Name and phone match substrings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub customer_group_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |name| customer.name.contains(name));
        let phone_ok = self.phone.as_deref().map_or(true, |phone| {
            customer
                .phone
                .as_deref()
                .is_some_and(|own| own.contains(phone))
        });
        let group_ok = self
            .customer_group_id
            .map_or(true, |group| customer.customer_group_id == Some(group));
        let owner_ok = self.user_id.map_or(true, |user| customer.user_id == user);
        name_ok && phone_ok && group_ok && owner_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(group: Option<Uuid>, user_id: Uuid) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            user_id,
            customer_group_id: group,
            name: "Somchai Jaidee".to_string(),
            phone: Some("0812345678".to_string()),
            address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_filter_matches_group_and_owner() {
        let group = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let grouped = customer(Some(group), owner);
        let loose = customer(None, Uuid::new_v4());

        let by_group = CustomerFilter {
            customer_group_id: Some(group),
            ..Default::default()
        };
        assert!(by_group.matches(&grouped));
        assert!(!by_group.matches(&loose));

        let by_owner = CustomerFilter {
            user_id: Some(owner),
            name: Some("Jai".to_string()),
            ..Default::default()
        };
        assert!(by_owner.matches(&grouped));
        assert!(!by_owner.matches(&loose));
    }
}
