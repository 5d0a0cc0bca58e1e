// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{
    Book, BookFilter, User,
    borrow::Borrow,
    purchase::Purchase,
};
use chrono::{DateTime, Utc};
use commerce_common::domain::{
    Cents, EmailType, Event, EventType, Job, JobStatus, JobType, LibraryWallet, MovementFilter,
    NewEmail, NewEvent, NewJob, NewWalletMovement, Page, PageRequest, SimulatedEmail,
    WalletMovement,
};
use std::time::Duration;

/// Sqlx transaction for Postgres.
pub type Tx = sqlx::Transaction<'static, sqlx::Postgres>;

/// A stored idempotent response cell, scoped by `(key, user, endpoint)`.
#[derive(Debug, Clone)]
pub struct IdempotencyCell {
    pub response: serde_json::Value,
    pub status_code: i32,
    pub expires_at: DateTime<Utc>,
}

/// Filter for the admin job listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
}

/// Storage abstraction for the request-driven engines. Engine operations orchestrate
/// several calls against one transaction obtained from [Storage::begin_user_tx]; every
/// mutating method takes that transaction.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// Begin a serializable transaction with the statement timeout applied and the
    /// per-user advisory lock taken. The lock serializes all state-changing operations
    /// of a single user and is released when the transaction ends.
    async fn begin_user_tx(&self, email: &str) -> Result<Tx, sqlx::Error>;

    /// Get or create the user with the given email.
    async fn upsert_user(&self, email: &str, tx: &mut Tx) -> Result<User, sqlx::Error>;

    async fn get_user_by_email(
        &self,
        email: &str,
        tx: &mut Tx,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Get or create the user with the given email, outside any engine transaction. Used
    /// by the idempotency cache which runs before the engine.
    async fn ensure_user(&self, email: &str) -> Result<User, sqlx::Error>;

    async fn get_book_by_isbn(
        &self,
        isbn: &str,
        tx: &mut Tx,
    ) -> Result<Option<Book>, sqlx::Error>;

    /// Conditionally decrement `available_copies`; returns the post-decrement count, or
    /// `None` if no copy was available (or the book does not exist).
    async fn decrement_available_copies(
        &self,
        isbn: &str,
        tx: &mut Tx,
    ) -> Result<Option<i32>, sqlx::Error>;

    /// Unconditionally add copies back (returns and cancellations).
    async fn increment_available_copies(
        &self,
        book_id: i64,
        by: i32,
        tx: &mut Tx,
    ) -> Result<(), sqlx::Error>;

    async fn find_active_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Borrow>, sqlx::Error>;

    /// Most recent RETURNED borrow for (user, book), for idempotent returns.
    async fn find_latest_returned_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Borrow>, sqlx::Error>;

    async fn count_active_borrows(&self, user_id: i64, tx: &mut Tx) -> Result<i64, sqlx::Error>;

    /// Insert an ACTIVE borrow with `due_at = borrowed_at + borrow_period` computed
    /// database-side.
    async fn insert_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        borrow_period: Duration,
        tx: &mut Tx,
    ) -> Result<Borrow, sqlx::Error>;

    /// Transition the borrow to RETURNED, clearing its active key.
    async fn return_borrow(&self, borrow_id: i64, tx: &mut Tx) -> Result<Borrow, sqlx::Error>;

    async fn count_active_purchases_for_book(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<i64, sqlx::Error>;

    async fn count_active_purchases(
        &self,
        user_id: i64,
        tx: &mut Tx,
    ) -> Result<i64, sqlx::Error>;

    async fn insert_purchase(
        &self,
        user_id: i64,
        book_id: i64,
        price_cents: Cents,
        tx: &mut Tx,
    ) -> Result<Purchase, sqlx::Error>;

    /// Load a purchase by (id, user) with a row lock (`SELECT … FOR UPDATE`).
    async fn get_purchase_for_update(
        &self,
        purchase_id: i64,
        user_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Purchase>, sqlx::Error>;

    /// Transition the purchase to CANCELED.
    async fn cancel_purchase(&self, purchase_id: i64, tx: &mut Tx)
    -> Result<Purchase, sqlx::Error>;

    /// Insert a PENDING job; returns `None` when another live job holds the same
    /// `active_key` slot.
    async fn insert_job(&self, job: NewJob, tx: &mut Tx) -> Result<Option<Job>, sqlx::Error>;

    /// The live (PENDING or PROCESSING) restock job for the given book, if any.
    async fn find_live_restock_job(
        &self,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Job>, sqlx::Error>;

    /// Cancel the live reminder job of the given borrow, clearing its active key.
    async fn cancel_reminder_jobs(&self, borrow_id: i64, tx: &mut Tx)
    -> Result<(), sqlx::Error>;

    /// Append an event; a dedupe-key conflict is swallowed (the event already exists).
    async fn append_event(&self, event: NewEvent, tx: &mut Tx) -> Result<(), sqlx::Error>;

    /// Append a simulated email; a dedupe-key conflict is swallowed.
    async fn append_email(&self, email: NewEmail, tx: &mut Tx) -> Result<(), sqlx::Error>;

    async fn get_wallet(&self, tx: &mut Tx) -> Result<LibraryWallet, sqlx::Error>;

    async fn set_milestone_reached(&self, tx: &mut Tx) -> Result<(), sqlx::Error>;

    async fn wallet_balance(&self, tx: &mut Tx) -> Result<Cents, sqlx::Error>;

    /// Append a wallet movement; see the wallet ledger for dedupe semantics.
    async fn append_movement(
        &self,
        movement: NewWalletMovement,
        tx: &mut Tx,
    ) -> Result<WalletMovement, sqlx::Error>;

    // Read paths, outside engine transactions.

    async fn list_books(
        &self,
        filter: &BookFilter,
        page: PageRequest,
    ) -> Result<Page<Book>, sqlx::Error>;

    async fn wallet_overview(&self) -> Result<(Cents, bool), sqlx::Error>;

    async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<WalletMovement>, sqlx::Error>;

    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<Job>, sqlx::Error>;

    async fn list_emails(
        &self,
        email_type: Option<EmailType>,
        page: PageRequest,
    ) -> Result<Page<SimulatedEmail>, sqlx::Error>;

    async fn list_events(
        &self,
        event_type: Option<EventType>,
        page: PageRequest,
    ) -> Result<Page<Event>, sqlx::Error>;

    // Idempotency cells.

    async fn get_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
    ) -> Result<Option<IdempotencyCell>, sqlx::Error>;

    async fn delete_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
    ) -> Result<(), sqlx::Error>;

    async fn put_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
        status_code: i32,
        response: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), sqlx::Error>;
}
