//! Error handling for the Retail POS platform
//!
//! Provides consistent error responses in Thai and English

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{LifecycleError, PaymentPlanError};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_th: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        message_th: String,
    },

    // Business logic errors
    #[error("Invalid state transition: {message}")]
    InvalidStateTransition {
        message: String,
        message_th: String,
    },

    #[error("Insufficient stock: {message}")]
    InsufficientStock {
        message: String,
        message_th: String,
    },

    // Collaborator errors
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource: impl Into<String>, message_th: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
            message_th: message_th.into(),
        }
    }

    pub fn conflict(
        resource: impl Into<String>,
        message: impl Into<String>,
        message_th: impl Into<String>,
    ) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
            message_th: message_th.into(),
        }
    }

    pub fn validation(
        field: impl Into<String>,
        message: impl Into<String>,
        message_th: impl Into<String>,
    ) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
            message_th: message_th.into(),
        }
    }

    /// A quantity or a quantity sum that does not fit the stock counters
    pub fn quantity_out_of_range(field: impl Into<String>) -> Self {
        AppError::validation(
            field,
            "Quantity exceeds the supported range",
            "จำนวนสินค้าเกินขอบเขตที่รองรับ",
        )
    }

    /// A money total that does not fit a decimal
    pub fn amount_out_of_range(field: impl Into<String>) -> Self {
        AppError::validation(
            field,
            "Amount exceeds the supported range",
            "ยอดเงินเกินขอบเขตที่รองรับ",
        )
    }

    pub fn insufficient_stock() -> Self {
        AppError::InsufficientStock {
            message: "some product has insufficient stock".to_string(),
            message_th: "บางสินค้า มีจำนวน ในStock ไม่เพียงพอ".to_string(),
        }
    }

    /// HTTP status the boundary maps this error to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition { .. } | AppError::InsufficientStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // 23505: unique_violation, 23503: foreign_key_violation,
        // 22003: numeric_value_out_of_range
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some("22003") {
                return AppError::quantity_out_of_range("quantity");
            }
            if db_err.code().as_deref() == Some("23503") {
                let resource = db_err.constraint().unwrap_or("record").to_string();
                return AppError::Conflict {
                    message: format!("Record is still referenced through {}", resource),
                    message_th: "ข้อมูลนี้ถูกใช้งานอยู่ ไม่สามารถลบได้".to_string(),
                    resource,
                };
            }
            if db_err.code().as_deref() == Some("23505") {
                let resource = db_err.constraint().unwrap_or("record").to_string();
                return AppError::Conflict {
                    message: format!("A record violating {} already exists", resource),
                    message_th: "มีข้อมูลนี้อยู่ในระบบแล้ว".to_string(),
                    resource,
                };
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages("", &errors, &mut messages);
        messages.sort();
        AppError::ValidationError(messages.join(", "))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text(), "รูปแบบข้อมูลที่ส่งมาไม่ถูกต้อง")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text(), "เงื่อนไขการค้นหาไม่ถูกต้อง")
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("path", rejection.body_text(), "รหัสอ้างอิงใน URL ไม่ถูกต้อง")
    }
}

impl From<PaymentPlanError> for AppError {
    fn from(err: PaymentPlanError) -> Self {
        AppError::validation(err.field(), err.to_string(), err.message_th())
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        AppError::InvalidStateTransition {
            message: err.to_string(),
            message_th: err.message_th().to_string(),
        }
    }
}

/// Flatten nested validator output into `path: code` entries
fn collect_validation_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let detail = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(format!("{}: {}", path, detail));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_messages(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_messages(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

/// Error response structure: `{ok:false, message, type, payload:null, error}`
#[derive(Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    /// Thai message suitable for direct display
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: Option<()>,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: ErrorDetail) -> Self {
        Self {
            ok: false,
            message: error.message_th.clone(),
            kind: if status.is_server_error() { "error" } else { "fail" },
            payload: None,
            error,
        }
    }
}

impl AppError {
    fn detail(&self) -> ErrorDetail {
        let (code, message_en, message_th, field) = match self {
            AppError::InvalidCredentials => (
                "INVALID_CREDENTIALS",
                "Invalid username or password".to_string(),
                "ชื่อผู้ใช้หรือรหัสผ่านไม่ถูกต้อง".to_string(),
                None,
            ),
            AppError::TokenExpired => (
                "TOKEN_EXPIRED",
                "Token has expired".to_string(),
                "โทเค็นหมดอายุแล้ว".to_string(),
                None,
            ),
            AppError::InvalidToken => (
                "INVALID_TOKEN",
                "Invalid token".to_string(),
                "ไม่สามารถยืนยันตัวตนได้".to_string(),
                None,
            ),
            AppError::InsufficientPermissions => (
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action".to_string(),
                "คุณไม่มีสิทธิ์เข้าถึง".to_string(),
                None,
            ),
            AppError::Unauthorized {
                message,
                message_th,
            } => ("UNAUTHORIZED", message.clone(), message_th.clone(), None),
            AppError::Validation {
                field,
                message,
                message_th,
            } => (
                "VALIDATION_ERROR",
                message.clone(),
                message_th.clone(),
                Some(field.clone()),
            ),
            AppError::ValidationError(msg) => (
                "VALIDATION_ERROR",
                msg.clone(),
                format!("ข้อมูลไม่ถูกต้อง: {}", msg),
                None,
            ),
            AppError::Conflict {
                resource,
                message,
                message_th,
            } => (
                "CONFLICT",
                message.clone(),
                message_th.clone(),
                Some(resource.clone()),
            ),
            AppError::NotFound {
                resource,
                message_th,
            } => (
                "NOT_FOUND",
                format!("{} not found", resource),
                message_th.clone(),
                None,
            ),
            AppError::InvalidStateTransition {
                message,
                message_th,
            } => (
                "INVALID_STATE_TRANSITION",
                message.clone(),
                message_th.clone(),
                None,
            ),
            AppError::InsufficientStock {
                message,
                message_th,
            } => (
                "INSUFFICIENT_STOCK",
                message.clone(),
                message_th.clone(),
                None,
            ),
            AppError::StorageError(msg) => (
                "STORAGE_ERROR",
                format!("Storage error: {}", msg),
                "เกิดข้อผิดพลาดในการจัดเก็บไฟล์".to_string(),
                None,
            ),
            AppError::Configuration(_) => (
                "CONFIGURATION_ERROR",
                "A configuration error occurred".to_string(),
                "เกิดข้อผิดพลาดในการตั้งค่า".to_string(),
                None,
            ),
            AppError::DatabaseError(_) => (
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "เกิดข้อผิดพลาดกับฐานข้อมูล".to_string(),
                None,
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                None,
            ),
        };

        ErrorDetail {
            code: code.to_string(),
            message_en,
            message_th,
            field,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse::new(status, self.detail()))).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Line {
        #[validate(range(min = 1))]
        quantity: i32,
    }

    #[derive(Validate)]
    struct Request {
        #[validate(length(min = 1))]
        code: String,
        #[validate]
        lines: Vec<Line>,
    }

    #[test]
    fn test_nested_validation_paths() {
        let request = Request {
            code: String::new(),
            lines: vec![Line { quantity: 1 }, Line { quantity: 0 }],
        };
        let err: AppError = request.validate().unwrap_err().into();
        match err {
            AppError::ValidationError(msg) => {
                assert!(msg.contains("code: length"));
                assert!(msg.contains("lines[1].quantity: range"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::insufficient_stock().status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::not_found("Order", "ไม่พบรายการนี้").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InsufficientPermissions.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_error_body_is_redacted_for_internal_errors() {
        let err = AppError::Internal("connection string leaked".to_string());
        let body = ErrorResponse::new(err.status_code(), err.detail());
        assert_eq!(body.kind, "error");
        assert!(!body.error.message_en.contains("leaked"));
    }

    #[test]
    fn test_payment_plan_error_maps_to_field() {
        let err: AppError = PaymentPlanError::NonPositiveDeposit.into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "deposit"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
