// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

pub mod reminder;
pub mod restock;
pub mod storage;

use chrono::{DateTime, Utc};
use commerce_common::domain::Cents;
use thiserror::Error;

/// Book fields the restock handler works with.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub stock_cents: Cents,
    pub available_copies: i32,
    pub seeded_copies: i32,
}

/// Borrow details the reminder handler works with, joined with its user and book.
#[derive(Debug, Clone)]
pub struct ReminderBorrow {
    pub id: i64,
    pub user_email: String,
    pub book_title: String,
    pub isbn: String,
    pub due_at: DateTime<Utc>,
    /// Whether the borrow still holds its active key, i.e. has not been returned.
    pub active: bool,
}

/// Failure of a job handler. Every variant is retried by the runner with backoff until
/// the job's attempts are exhausted.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("insufficient funds: cost {cost}, balance {balance}")]
    InsufficientFunds { cost: Cents, balance: Cents },

    #[error("handler timed out")]
    Timeout,

    #[error("cannot decode job payload")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
