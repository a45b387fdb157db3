//! Error handling for the Bakery Production Backend
//!
//! Ledger and transition failures carry enough structured detail (shortfall
//! amount, packaging packages/remainder) for callers to render an actionable
//! message rather than a bare "operation failed".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{Quantity, QuantityError, Stage, Unit, UnitError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Client errors
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("unknown unit: {0}")]
    UnknownUnit(String),

    #[error("unit mismatch: cannot express {given} in {expected}")]
    UnitMismatch { expected: Unit, given: Unit },

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock: short {shortfall} {unit}")]
    InsufficientStock { shortfall: Quantity, unit: Unit },

    #[error("lot holds {available}, cannot move {requested}")]
    InsufficientLotStock {
        available: Quantity,
        requested: Quantity,
    },

    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("quantity is not a multiple of the packaging size: {packages} whole packages with {remainder} left over")]
    PackagingMultipleViolation { packages: i64, remainder: Quantity },

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<UnitError> for AppError {
    fn from(err: UnitError) -> Self {
        match err {
            UnitError::Unknown(s) => AppError::UnknownUnit(s),
            UnitError::IncompatibleCategory { from, to } => AppError::UnitMismatch {
                expected: to,
                given: from,
            },
            UnitError::NotRepresentable => {
                AppError::InvalidQuantity("not representable at 3 decimal places".to_string())
            }
        }
    }
}

impl From<QuantityError> for AppError {
    fn from(err: QuantityError) -> Self {
        AppError::InvalidQuantity(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::InvalidQuantity(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_QUANTITY".to_string(),
                    message: self.to_string(),
                    details: None,
                },
            ),
            AppError::UnknownUnit(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "UNKNOWN_UNIT".to_string(),
                    message: self.to_string(),
                    details: None,
                },
            ),
            AppError::UnitMismatch { expected, given } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "UNIT_MISMATCH".to_string(),
                    message: self.to_string(),
                    details: Some(serde_json::json!({
                        "expected": expected.as_str(),
                        "given": given.as_str(),
                    })),
                },
            ),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: self.to_string(),
                    details: None,
                },
            ),
            AppError::InsufficientStock { shortfall, unit } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message: self.to_string(),
                    details: Some(serde_json::json!({
                        "shortfall": shortfall.to_decimal(),
                        "unit": unit.as_str(),
                    })),
                },
            ),
            AppError::InsufficientLotStock {
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_LOT_STOCK".to_string(),
                    message: self.to_string(),
                    details: Some(serde_json::json!({
                        "available": available.to_decimal(),
                        "requested": requested.to_decimal(),
                    })),
                },
            ),
            AppError::InvalidTransition { from, to } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_TRANSITION".to_string(),
                    message: self.to_string(),
                    details: Some(serde_json::json!({
                        "from": from.as_str(),
                        "to": to.as_str(),
                    })),
                },
            ),
            AppError::PackagingMultipleViolation {
                packages,
                remainder,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "PACKAGING_MULTIPLE_VIOLATION".to_string(),
                    message: self.to_string(),
                    details: Some(serde_json::json!({
                        "packages": packages,
                        "remainder": remainder.to_decimal(),
                    })),
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            AppError::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "EXTERNAL_SERVICE_ERROR".to_string(),
                    message: msg.clone(),
                    details: None,
                },
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message: "A database error occurred".to_string(),
                    details: None,
                },
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    details: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
