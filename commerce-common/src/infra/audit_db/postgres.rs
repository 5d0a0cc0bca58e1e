// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! Postgres implementation of the append-only audit tables: events and simulated
//! emails. Inserts carry natural dedupe keys; a conflict means an earlier attempt
//! already recorded the side effect, so it is swallowed and treated as success.

use crate::domain::{NewEmail, NewEvent};
use fastrace::trace;
use indoc::indoc;
use sqlx::Postgres;

type Tx = sqlx::Transaction<'static, Postgres>;

/// Append an event within the given transaction; dedupe-key conflicts are swallowed.
#[trace]
pub async fn append_event(event: NewEvent, tx: &mut Tx) -> Result<(), sqlx::Error> {
    let query = indoc! {"
        INSERT INTO events (event_type, user_id, book_id, borrow_id, purchase_id, job_id,
                            metadata, dedupe_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (dedupe_key) DO NOTHING
    "};

    sqlx::query(query)
        .bind(event.event_type.as_str())
        .bind(event.user_id)
        .bind(event.book_id)
        .bind(event.borrow_id)
        .bind(event.purchase_id)
        .bind(event.job_id)
        .bind(&event.metadata)
        .bind(&event.dedupe_key)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Append a simulated email within the given transaction; dedupe-key conflicts are
/// swallowed.
#[trace]
pub async fn append_email(email: NewEmail, tx: &mut Tx) -> Result<(), sqlx::Error> {
    let query = indoc! {"
        INSERT INTO simulated_emails (recipient, subject, body, email_type, dedupe_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (dedupe_key) DO NOTHING
    "};

    sqlx::query(query)
        .bind(&email.recipient)
        .bind(&email.subject)
        .bind(&email.body)
        .bind(email.email_type.as_str())
        .bind(&email.dedupe_key)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
