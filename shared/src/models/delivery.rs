//! Delivery models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::SlipUpload;
use crate::types::{DateRange, GpsCoordinates};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    /// Delivered by the branch's own transporters
    OwnFleet,
    /// Handed to a courier; `track_number` is the courier's
    Courier,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::OwnFleet => "OWN_FLEET",
            DeliveryType::Courier => "COURIER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OWN_FLEET" => Some(DeliveryType::OwnFleet),
            "COURIER" => Some(DeliveryType::Courier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Delivered => "DELIVERED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DeliveryStatus::Pending),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }
}

/// Shipment of an order, at most one per order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub order_id: Uuid,
    pub track_number: String,
    /// Distance in kilometres
    pub distance: Decimal,
    pub address: String,
    pub kind: DeliveryType,
    pub location: Option<GpsCoordinates>,
    pub note: Option<String>,
    pub send_date: DateTime<Utc>,
    /// Added to the order total when the order is confirmed afterwards
    pub fee: Decimal,
    pub status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryDriver {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryWithDrivers {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub drivers: Vec<DeliveryDriver>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDeliveryInput {
    #[validate(length(min = 1, max = 100))]
    pub track_number: String,
    pub distance: Decimal,
    /// Falls back to the customer's address when omitted
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
    pub kind: DeliveryType,
    pub location: Option<GpsCoordinates>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    pub send_date: DateTime<Utc>,
    pub fee: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddDriversInput {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompleteDeliveryInput {
    #[validate]
    pub slip_image: Option<SlipUpload>,
}

/// Filters for delivery listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub track_number: Option<String>,
    pub kind: Option<DeliveryType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Only deliveries assigned to the caller
    #[serde(default)]
    pub mine: bool,
}

impl DeliveryFilter {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// `caller` is used for the `mine` filter
    pub fn matches(&self, delivery: &DeliveryWithDrivers, caller: Uuid) -> bool {
        self.track_number
            .as_deref()
            .map_or(true, |track| delivery.delivery.track_number.contains(track))
            && self.kind.map_or(true, |kind| delivery.delivery.kind == kind)
            && self.date_range().contains(delivery.delivery.send_date)
            && (!self.mine || delivery.drivers.iter().any(|d| d.user_id == caller))
    }
}
