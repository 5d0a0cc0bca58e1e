// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The idempotency cache: a per `(key, user, endpoint)` response snapshot with a TTL,
//! wrapped around the mutating endpoints. Fresh cells replay the stored status and body
//! verbatim and short-circuit the engine; expired cells are deleted and the operation
//! runs again.

use super::{AppState, error::ApiError};
use crate::domain::storage::Storage;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fastrace::trace;
use log::{debug, warn};
use serde_json::Value;
use std::future::Future;

/// Run the given operation behind the idempotency cache. Without a key the operation
/// runs directly, unless the endpoint makes the key mandatory.
#[trace]
pub async fn execute<F, Fut>(
    state: &AppState,
    email: &str,
    endpoint: &'static str,
    key: Option<String>,
    key_required: bool,
    operation: F,
) -> Result<Response, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(StatusCode, Value), ApiError>>,
{
    let Some(key) = key else {
        if key_required {
            return Err(ApiError::idempotency_key_required());
        }
        let (status, body) = operation().await?;
        return Ok((status, Json(body)).into_response());
    };

    // The cache runs before the engine, so the caller is resolved (and auto-created)
    // here.
    let user = state.storage.ensure_user(email).await?;

    if let Some(cell) = state
        .storage
        .get_idempotency_cell(&key, user.id, endpoint)
        .await?
    {
        if cell.expires_at > Utc::now() {
            debug!(endpoint, user_id = user.id; "replaying idempotent response");
            let status =
                StatusCode::from_u16(cell.status_code as u16).unwrap_or(StatusCode::OK);
            return Ok((status, Json(cell.response)).into_response());
        }

        state
            .storage
            .delete_idempotency_cell(&key, user.id, endpoint)
            .await?;
    }

    let (status, body) = match operation().await {
        Ok(response) => response,
        Err(error) => (error.status(), error.body()),
    };

    // Availability over perfect idempotency: storage failures are logged and swallowed.
    if status.as_u16() < 500 {
        if let Err(error) = state
            .storage
            .put_idempotency_cell(
                &key,
                user.id,
                endpoint,
                status.as_u16() as i32,
                &body,
                state.engine_config.idempotency_ttl,
            )
            .await
        {
            warn!(endpoint, error:%; "cannot store idempotent response");
        }
    }

    Ok((status, Json(body)).into_response())
}
