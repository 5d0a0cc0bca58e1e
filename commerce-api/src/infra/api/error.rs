// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::EngineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use commerce_common::infra::sqlx::postgres::is_serialization_failure;
use log::{error, warn};
use serde_json::{Value, json};

/// An API error: HTTP status plus the `{"error":{"code","message"}}` body contract.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn user_email_required() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "USER_EMAIL_REQUIRED",
            "the X-User-Email header is required",
        )
    }

    pub fn invalid_email() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "INVALID_EMAIL",
            "the X-User-Email header does not contain a valid email address",
        )
    }

    pub fn idempotency_key_required() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "IDEMPOTENCY_KEY_REQUIRED",
            "the X-Idempotency-Key header is required for this endpoint",
        )
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", "admin access required")
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Value {
        json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        })
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let status = match &error {
            EngineError::BookNotFound
            | EngineError::BorrowNotFound
            | EngineError::PurchaseNotFound
            | EngineError::UserNotFound => StatusCode::NOT_FOUND,

            EngineError::NoCopiesAvailable
            | EngineError::BorrowLimitExceeded
            | EngineError::BookBuyLimitExceeded
            | EngineError::TotalBuyLimitExceeded => StatusCode::CONFLICT,

            EngineError::CancellationWindowExpired => StatusCode::BAD_REQUEST,

            EngineError::Sqlx(inner) if is_serialization_failure(inner) => {
                // Expected under contention on serializable transactions; the client
                // retries.
                warn!("serialization failure: {inner}");
                StatusCode::INTERNAL_SERVER_ERROR
            }

            EngineError::Sqlx(inner) => {
                error!("storage error: {inner}");
                StatusCode::INTERNAL_SERVER_ERROR
            }

            EngineError::Payload(inner) => {
                error!("payload encoding error: {inner}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            error.to_string()
        };

        Self {
            status,
            code: error.code(),
            message,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        Self::from(EngineError::Sqlx(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        (self.status, Json(body)).into_response()
    }
}
