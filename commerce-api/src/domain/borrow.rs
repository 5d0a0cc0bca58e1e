// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The borrow engine: borrow and return, each one serializable transaction serialized
//! per user by an advisory lock.

use crate::domain::{
    EngineConfig, EngineError,
    milestone, stock,
    storage::Storage,
};
use chrono::{DateTime, Utc};
use commerce_common::domain::{
    EventType, JobType, MovementType, NewEvent, NewJob, NewWalletMovement, ReminderPayload,
    UnknownVariant, reminder_active_key,
};
use fastrace::trace;
use log::info;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowStatus {
    Active,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Active => "ACTIVE",
            BorrowStatus::Returned => "RETURNED",
        }
    }
}

impl FromStr for BorrowStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(BorrowStatus::Active),
            "RETURNED" => Ok(BorrowStatus::Returned),
            other => Err(UnknownVariant("borrow status", other.to_string())),
        }
    }
}

/// A borrow row. `active_key` is `"{user_id}:{book_id}"` iff the borrow is ACTIVE; its
/// unique index enforces at most one active borrow per (user, book).
#[derive(Debug, Clone)]
pub struct Borrow {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub active_key: Option<String>,
}

/// Result of a borrow or return: the affected row, and whether it pre-existed (the
/// operation was an idempotent repeat).
#[derive(Debug, Clone)]
pub struct BorrowOutcome {
    pub borrow: Borrow,
    pub is_existing: bool,
}

pub fn borrow_active_key(user_id: i64, book_id: i64) -> String {
    format!("{user_id}:{book_id}")
}

/// Borrow the book with the given ISBN for the given user.
#[trace]
pub async fn borrow<S>(
    storage: &S,
    config: &EngineConfig,
    user_email: &str,
    isbn: &str,
) -> Result<BorrowOutcome, EngineError>
where
    S: Storage,
{
    let mut tx = storage.begin_user_tx(user_email).await?;

    let user = storage.upsert_user(user_email, &mut tx).await?;
    let book = storage
        .get_book_by_isbn(isbn, &mut tx)
        .await?
        .ok_or(EngineError::BookNotFound)?;

    // An active borrow for (user, book) makes a repeated borrow an idempotent success.
    if let Some(existing) = storage.find_active_borrow(user.id, book.id, &mut tx).await? {
        tx.commit().await?;
        return Ok(BorrowOutcome {
            borrow: existing,
            is_existing: true,
        });
    }

    let active_borrows = storage.count_active_borrows(user.id, &mut tx).await?;
    if active_borrows >= config.borrow_limit {
        return Err(EngineError::BorrowLimitExceeded);
    }

    let Some(available_copies) = storage.decrement_available_copies(isbn, &mut tx).await? else {
        return Err(EngineError::NoCopiesAvailable);
    };

    let borrow = storage
        .insert_borrow(user.id, book.id, config.borrow_period, &mut tx)
        .await?;

    storage
        .append_movement(
            NewWalletMovement {
                amount_cents: book.borrow_cents,
                movement_type: MovementType::BorrowIncome,
                reason: format!("borrow of \"{}\"", book.title),
                related_entity: Some(format!("borrow:{}", borrow.id)),
                dedupe_key: Some(format!("BORROW:{}", borrow.id)),
            },
            &mut tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(EventType::Borrow, format!("BORROW:{}", borrow.id))
                .with_user(user.id)
                .with_book(book.id)
                .with_borrow(borrow.id),
            &mut tx,
        )
        .await?;

    let payload = serde_json::to_value(ReminderPayload {
        borrow_id: borrow.id,
        user_email: user.email.clone(),
    })?;
    storage
        .insert_job(
            NewJob {
                job_type: JobType::Reminder,
                payload,
                run_at: borrow.due_at,
                max_attempts: config.job_max_attempts,
                active_key: reminder_active_key(borrow.id),
                book_id: Some(book.id),
                borrow_id: Some(borrow.id),
            },
            &mut tx,
        )
        .await?;

    // Low stock means exactly one copy left after this decrement; the watcher only fires
    // on the transition.
    if available_copies == 1 {
        stock::watch(storage, config, &book, &mut tx).await?;
    }

    milestone::watch(storage, config, &mut tx).await?;

    tx.commit().await?;

    info!(
        user_id = user.id,
        book_id = book.id,
        borrow_id = borrow.id,
        available_copies;
        "book borrowed"
    );

    Ok(BorrowOutcome {
        borrow,
        is_existing: false,
    })
}

/// Return the book with the given ISBN for the given user.
#[trace]
pub async fn return_book<S>(
    storage: &S,
    user_email: &str,
    isbn: &str,
) -> Result<BorrowOutcome, EngineError>
where
    S: Storage,
{
    let mut tx = storage.begin_user_tx(user_email).await?;

    let user = storage
        .get_user_by_email(user_email, &mut tx)
        .await?
        .ok_or(EngineError::BorrowNotFound)?;
    let book = storage
        .get_book_by_isbn(isbn, &mut tx)
        .await?
        .ok_or(EngineError::BookNotFound)?;

    let Some(active) = storage.find_active_borrow(user.id, book.id, &mut tx).await? else {
        // No active borrow: a past return makes this an idempotent repeat, anything else
        // is not found.
        let returned = storage
            .find_latest_returned_borrow(user.id, book.id, &mut tx)
            .await?
            .ok_or(EngineError::BorrowNotFound)?;
        tx.commit().await?;
        return Ok(BorrowOutcome {
            borrow: returned,
            is_existing: true,
        });
    };

    let borrow = storage.return_borrow(active.id, &mut tx).await?;
    storage
        .increment_available_copies(book.id, 1, &mut tx)
        .await?;
    storage.cancel_reminder_jobs(borrow.id, &mut tx).await?;
    storage
        .append_event(
            NewEvent::new(EventType::Return, format!("RETURN:{}", borrow.id))
                .with_user(user.id)
                .with_book(book.id)
                .with_borrow(borrow.id),
            &mut tx,
        )
        .await?;

    tx.commit().await?;

    info!(user_id = user.id, book_id = book.id, borrow_id = borrow.id; "book returned");

    Ok(BorrowOutcome {
        borrow,
        is_existing: false,
    })
}
