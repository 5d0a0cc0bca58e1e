// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The stock watcher. Invoked by the engines only when the triggering transaction
//! observes exactly one copy left post-decrement; everything it does joins that
//! transaction, so the job, the email and the events commit or roll back with the
//! triggering operation.

use crate::domain::{Book, EngineConfig, EngineError, delay_from_now, storage::Storage};
use commerce_common::domain::{
    EmailType, EventType, JobType, NewEmail, NewEvent, NewJob, RestockPayload, SUPPLY_EMAIL,
    restock_active_key,
};
use fastrace::trace;
use log::info;
use serde_json::json;

use super::storage::Tx;

/// Schedule a restock for the given low-stock book unless one is already scheduled.
#[trace]
pub async fn watch<S>(
    storage: &S,
    config: &EngineConfig,
    book: &Book,
    tx: &mut Tx,
) -> Result<(), EngineError>
where
    S: Storage,
{
    if storage.find_live_restock_job(book.id, tx).await?.is_some() {
        return Ok(());
    }

    let payload = serde_json::to_value(RestockPayload {
        book_id: book.id,
        isbn: book.isbn.clone(),
    })?;
    let job = storage
        .insert_job(
            NewJob {
                job_type: JobType::Restock,
                payload,
                run_at: delay_from_now(config.restock_delay),
                max_attempts: config.job_max_attempts,
                active_key: restock_active_key(book.id),
                book_id: Some(book.id),
                borrow_id: None,
            },
            tx,
        )
        .await?;

    // A concurrent transaction may have won the active-key slot in the meantime.
    let Some(job) = job else {
        return Ok(());
    };

    storage
        .append_email(
            NewEmail {
                recipient: SUPPLY_EMAIL.to_string(),
                subject: format!("Low stock: {}", book.title),
                body: format!(
                    "Only one copy of \"{}\" (ISBN {}) is left; a restock has been scheduled.",
                    book.title, book.isbn
                ),
                email_type: EmailType::LowStock,
                dedupe_key: format!("LOW_STOCK:{}:{}", book.isbn, job.id),
            },
            tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(
                EventType::LowStockEmail,
                format!("LOW_STOCK_EMAIL:{}:{}", book.isbn, job.id),
            )
            .with_book(book.id)
            .with_job(job.id),
            tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(
                EventType::RestockScheduled,
                format!("RESTOCK_SCHEDULED:{}", job.id),
            )
            .with_book(book.id)
            .with_job(job.id)
            .with_metadata(json!({ "runAt": job.run_at })),
            tx,
        )
        .await?;

    info!(book_id = book.id, job_id = job.id; "restock scheduled");

    Ok(())
}
