// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use super::{
    AppState,
    books::to_body,
    error::ApiError,
    extract::{IdempotencyKey, UserEmail},
    idempotency,
    response::PurchaseResponse,
};
use crate::domain;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};

pub async fn cancel(
    State(state): State<AppState>,
    Path(purchase_id): Path<i64>,
    UserEmail(email): UserEmail,
    IdempotencyKey(key): IdempotencyKey,
) -> Result<Response, ApiError> {
    idempotency::execute(&state, &email, "cancel", key, false, || async {
        let outcome = domain::purchase::cancel(
            &state.storage,
            &state.engine_config,
            &email,
            purchase_id,
        )
        .await?;
        Ok((StatusCode::OK, to_body(PurchaseResponse::from(outcome))?))
    })
    .await
}
