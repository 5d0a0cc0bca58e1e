// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{Book, ReminderBorrow};
use commerce_common::domain::{Cents, Job, NewEmail, NewEvent, NewWalletMovement, WalletMovement};
use std::time::Duration;

/// Sqlx transaction for Postgres.
pub type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

/// Storage abstraction for the job runner and its handlers.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// Jobs that are due: live (non-NULL active key, attempts left) and either PENDING
    /// with `run_at` reached, or PROCESSING with an expired lease. Ordered by `run_at`.
    async fn due_jobs(&self, lease: Duration, limit: i64) -> Result<Vec<Job>, sqlx::Error>;

    /// Atomically claim the given job: transition to PROCESSING, take the lease, bump
    /// the attempt counter. Returns the new attempt count, or `None` when another worker
    /// won the claim.
    async fn claim_job(&self, job_id: i64, lease: Duration) -> Result<Option<i32>, sqlx::Error>;

    /// Record handler success: COMPLETED, active key cleared.
    async fn complete_job(&self, job_id: i64) -> Result<(), sqlx::Error>;

    /// Record permanent failure: FAILED, active key cleared, error kept for operators.
    async fn fail_job(&self, job_id: i64, last_error: &str) -> Result<(), sqlx::Error>;

    /// Record a retryable failure: back to PENDING with `run_at` pushed out by the given
    /// delay; the active key is preserved so the logical slot stays taken.
    async fn reschedule_job(
        &self,
        job_id: i64,
        delay: Duration,
        last_error: &str,
    ) -> Result<(), sqlx::Error>;

    /// Begin a serializable handler transaction with the statement timeout applied.
    async fn begin_tx(&self) -> Result<Tx, sqlx::Error>;

    async fn get_book(&self, book_id: i64, tx: &mut Tx) -> Result<Option<Book>, sqlx::Error>;

    /// Add copies and return the new available count.
    async fn add_available_copies(
        &self,
        book_id: i64,
        by: i32,
        tx: &mut Tx,
    ) -> Result<i32, sqlx::Error>;

    async fn wallet_balance(&self, tx: &mut Tx) -> Result<Cents, sqlx::Error>;

    async fn append_movement(
        &self,
        movement: NewWalletMovement,
        tx: &mut Tx,
    ) -> Result<WalletMovement, sqlx::Error>;

    async fn append_event(&self, event: NewEvent, tx: &mut Tx) -> Result<(), sqlx::Error>;

    async fn append_email(&self, email: NewEmail, tx: &mut Tx) -> Result<(), sqlx::Error>;

    async fn get_reminder_borrow(
        &self,
        borrow_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<ReminderBorrow>, sqlx::Error>;

    async fn email_exists(&self, dedupe_key: &str, tx: &mut Tx) -> Result<bool, sqlx::Error>;
}
