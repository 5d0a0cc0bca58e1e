// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

pub mod book;
pub mod borrow;
pub mod error;
pub mod milestone;
pub mod purchase;
pub mod stock;
pub mod storage;

pub use book::*;
pub use borrow::{Borrow, BorrowOutcome, BorrowStatus, borrow_active_key};
pub use error::EngineError;
pub use purchase::{Purchase, PurchaseOutcome, PurchaseStatus};

use chrono::{DateTime, Utc};
use commerce_common::domain::Cents;
use serde::Deserialize;
use std::{error::Error as StdError, time::Duration};

/// API abstraction, allowing the server binary to stay agnostic of the HTTP stack.
#[trait_variant::make(Send)]
pub trait Api
where
    Self: 'static,
{
    type Error: StdError + Send + Sync + 'static;

    async fn serve(self) -> Result<(), Self::Error>;
}

/// A library user; auto-created on first interaction, identified by email.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
}

/// Business constants of the transaction engines. Defaults follow the operational
/// contract; deployments rarely override them.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How long a borrow lasts before the reminder fires.
    #[serde(with = "humantime_serde", default = "borrow_period_default")]
    pub borrow_period: Duration,

    /// Window after purchase during which cancellation is allowed.
    #[serde(with = "humantime_serde", default = "cancel_window_default")]
    pub cancel_window: Duration,

    /// Max active borrows per user.
    #[serde(default = "borrow_limit_default")]
    pub borrow_limit: i64,

    /// Max active purchases per (user, book).
    #[serde(default = "per_book_buy_limit_default")]
    pub per_book_buy_limit: i64,

    /// Max active purchases per user.
    #[serde(default = "total_buy_limit_default")]
    pub total_buy_limit: i64,

    /// Wallet balance above which the one-shot milestone fires.
    #[serde(default = "milestone_cents_default")]
    pub milestone_cents: Cents,

    /// Delay before a scheduled restock job runs.
    #[serde(with = "humantime_serde", default = "restock_delay_default")]
    pub restock_delay: Duration,

    /// Max attempts for jobs scheduled by the engines.
    #[serde(default = "job_max_attempts_default")]
    pub job_max_attempts: i32,

    /// TTL of stored idempotent responses.
    #[serde(with = "humantime_serde", default = "idempotency_ttl_default")]
    pub idempotency_ttl: Duration,

    /// Statement timeout applied to every engine transaction.
    #[serde(with = "humantime_serde", default = "statement_timeout_default")]
    pub statement_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            borrow_period: borrow_period_default(),
            cancel_window: cancel_window_default(),
            borrow_limit: borrow_limit_default(),
            per_book_buy_limit: per_book_buy_limit_default(),
            total_buy_limit: total_buy_limit_default(),
            milestone_cents: milestone_cents_default(),
            restock_delay: restock_delay_default(),
            job_max_attempts: job_max_attempts_default(),
            idempotency_ttl: idempotency_ttl_default(),
            statement_timeout: statement_timeout_default(),
        }
    }
}

fn borrow_period_default() -> Duration {
    Duration::from_secs(72 * 60 * 60)
}

fn cancel_window_default() -> Duration {
    Duration::from_secs(5 * 60)
}

fn borrow_limit_default() -> i64 {
    3
}

fn per_book_buy_limit_default() -> i64 {
    2
}

fn total_buy_limit_default() -> i64 {
    10
}

fn milestone_cents_default() -> Cents {
    Cents(200_000)
}

fn restock_delay_default() -> Duration {
    Duration::from_secs(60 * 60)
}

fn job_max_attempts_default() -> i32 {
    10
}

fn idempotency_ttl_default() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn statement_timeout_default() -> Duration {
    Duration::from_secs(30)
}

/// The current instant shifted by the given delay, saturating instead of overflowing for
/// absurdly large configured delays.
pub(crate) fn delay_from_now(delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| Utc::now().checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
