// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Typed outcome of an engine operation that did not succeed. Each domain variant maps to
/// a stable error code of the HTTP contract; storage errors pass through and surface as
/// internal errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("book not found")]
    BookNotFound,

    #[error("borrow not found")]
    BorrowNotFound,

    #[error("purchase not found")]
    PurchaseNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("no copies available")]
    NoCopiesAvailable,

    #[error("borrow limit exceeded")]
    BorrowLimitExceeded,

    #[error("per-book purchase limit exceeded")]
    BookBuyLimitExceeded,

    #[error("total purchase limit exceeded")]
    TotalBuyLimitExceeded,

    #[error("cancellation window expired")]
    CancellationWindowExpired,

    #[error("cannot encode job payload")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl EngineError {
    /// Stable error code of the HTTP contract.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::BookNotFound => "BOOK_NOT_FOUND",
            EngineError::BorrowNotFound => "BORROW_NOT_FOUND",
            EngineError::PurchaseNotFound => "PURCHASE_NOT_FOUND",
            EngineError::UserNotFound => "USER_NOT_FOUND",
            EngineError::NoCopiesAvailable => "NO_COPIES_AVAILABLE",
            EngineError::BorrowLimitExceeded => "BORROW_LIMIT_EXCEEDED",
            EngineError::BookBuyLimitExceeded => "BOOK_BUY_LIMIT_EXCEEDED",
            EngineError::TotalBuyLimitExceeded => "TOTAL_BUY_LIMIT_EXCEEDED",
            EngineError::CancellationWindowExpired => "CANCELLATION_WINDOW_EXPIRED",
            EngineError::Payload(_) | EngineError::Sqlx(_) => "INTERNAL_ERROR",
        }
    }
}
