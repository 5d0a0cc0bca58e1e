// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use super::{
    AppState,
    error::ApiError,
    extract::{IdempotencyKey, UserEmail},
    idempotency,
    response::{ApiBook, BorrowResponse, PageResponse, PurchaseResponse},
};
use crate::domain::{self, BookFilter, storage::Storage};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use commerce_common::domain::PageRequest;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooksQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<BooksQuery>,
) -> Result<Json<PageResponse<ApiBook>>, ApiError> {
    let filter = BookFilter {
        title: query.title,
        author: query.author,
        genre: query.genre,
    };
    let page = PageRequest::new(query.page, query.page_size);

    let books = state.storage.list_books(&filter, page).await?;

    Ok(Json(books.map(ApiBook::from).into()))
}

pub async fn borrow(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
    UserEmail(email): UserEmail,
    IdempotencyKey(key): IdempotencyKey,
) -> Result<Response, ApiError> {
    idempotency::execute(&state, &email, "borrow", key, false, || async {
        let outcome =
            domain::borrow::borrow(&state.storage, &state.engine_config, &email, &isbn).await?;
        Ok((StatusCode::OK, to_body(BorrowResponse::from(outcome))?))
    })
    .await
}

pub async fn return_book(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
    UserEmail(email): UserEmail,
    IdempotencyKey(key): IdempotencyKey,
) -> Result<Response, ApiError> {
    idempotency::execute(&state, &email, "return", key, false, || async {
        let outcome = domain::borrow::return_book(&state.storage, &email, &isbn).await?;
        Ok((StatusCode::OK, to_body(BorrowResponse::from(outcome))?))
    })
    .await
}

pub async fn buy(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
    UserEmail(email): UserEmail,
    IdempotencyKey(key): IdempotencyKey,
) -> Result<Response, ApiError> {
    // The idempotency key is mandatory for buy.
    idempotency::execute(&state, &email, "buy", key, true, || async {
        let outcome =
            domain::purchase::buy(&state.storage, &state.engine_config, &email, &isbn).await?;
        Ok((StatusCode::OK, to_body(PurchaseResponse::from(outcome))?))
    })
    .await
}

pub(crate) fn to_body(response: impl serde::Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(response).map_err(|_| ApiError::internal())
}
