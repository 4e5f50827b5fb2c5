//! Common types used across the platform

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// GPS coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Optional, inclusive time window used by list filters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// True when `at` falls inside the window. Missing bounds are open.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }
}

/// Success envelope returned by every endpoint: `{ok, message, payload: {data}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub message: String,
    pub payload: Payload<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message("Call API Success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            message: message.into(),
            payload: Payload { data },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_range_open_bounds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(DateRange::default().contains(at));
        assert!(DateRange::new(Some(at), None).contains(at));
        assert!(!DateRange::new(None, Some(at - chrono::Duration::seconds(1))).contains(at));
    }

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::success(3)).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["payload"]["data"], 3);
    }
}
