// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The reminder handler: exactly one due-date reminder email per active borrow. The
//! email's dedupe key makes redelivery after a lease-expiry reprocessing a no-op.

use crate::domain::{HandlerError, storage::Storage};
use commerce_common::domain::{
    EmailType, EventType, Job, NewEmail, NewEvent, ReminderPayload,
};
use fastrace::trace;
use log::info;
use serde_json::json;

/// Run a REMINDER job within one serializable transaction.
#[trace]
pub async fn handle<S>(storage: &S, job: &Job) -> Result<(), HandlerError>
where
    S: Storage,
{
    let payload = serde_json::from_value::<ReminderPayload>(job.payload.clone())?;

    let mut tx = storage.begin_tx().await?;

    // Already returned or never existed: no-op success.
    let Some(borrow) = storage.get_reminder_borrow(payload.borrow_id, &mut tx).await? else {
        tx.commit().await?;
        return Ok(());
    };
    if !borrow.active {
        tx.commit().await?;
        return Ok(());
    }

    let dedupe_key = format!("REMINDER:{}", borrow.id);
    if storage.email_exists(&dedupe_key, &mut tx).await? {
        tx.commit().await?;
        return Ok(());
    }

    storage
        .append_email(
            NewEmail {
                recipient: borrow.user_email.clone(),
                subject: format!("Reminder: \"{}\" is due", borrow.book_title),
                body: format!(
                    "Your borrow of \"{}\" (ISBN {}) is due at {}. Please return it to the library.",
                    borrow.book_title, borrow.isbn, borrow.due_at
                ),
                email_type: EmailType::Reminder,
                dedupe_key,
            },
            &mut tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(EventType::ReminderSent, format!("REMINDER_SENT:{}", borrow.id))
                .with_borrow(borrow.id)
                .with_metadata(json!({
                    "userEmail": borrow.user_email,
                    "bookTitle": borrow.book_title,
                    "dueAt": borrow.due_at,
                })),
            &mut tx,
        )
        .await?;

    tx.commit().await?;

    info!(job_id = job.id, borrow_id = borrow.id; "reminder sent");

    Ok(())
}
