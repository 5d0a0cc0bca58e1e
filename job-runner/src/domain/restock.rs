// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The restock handler: replenish a book to its seeded level, debiting the wallet. When
//! the wallet cannot fund the restock the handler raises, which makes the runner retry
//! with backoff until the balance has recovered or attempts run out.

use crate::domain::{HandlerError, storage::Storage};
use commerce_common::domain::{
    Cents, EventType, Job, MovementType, NewEvent, NewWalletMovement, RestockPayload,
};
use fastrace::trace;
use log::info;
use serde_json::json;

/// Run a RESTOCK job within one serializable transaction.
#[trace]
pub async fn handle<S>(storage: &S, job: &Job) -> Result<(), HandlerError>
where
    S: Storage,
{
    let payload = serde_json::from_value::<RestockPayload>(job.payload.clone())?;

    let mut tx = storage.begin_tx().await?;

    // A vanished book or a fully stocked one make this a no-op success.
    let Some(book) = storage.get_book(payload.book_id, &mut tx).await? else {
        tx.commit().await?;
        return Ok(());
    };

    let needed = book.seeded_copies - book.available_copies;
    if needed <= 0 {
        tx.commit().await?;
        return Ok(());
    }

    let cost = Cents(i64::from(needed) * i64::from(book.stock_cents));
    let balance = storage.wallet_balance(&mut tx).await?;
    if balance < cost {
        return Err(HandlerError::InsufficientFunds { cost, balance });
    }

    storage
        .append_movement(
            NewWalletMovement {
                amount_cents: -cost,
                movement_type: MovementType::RestockExpense,
                reason: format!("restock of \"{}\"", book.title),
                related_entity: Some(format!("book:{}", book.id)),
                dedupe_key: Some(format!("RESTOCK:{}", job.id)),
            },
            &mut tx,
        )
        .await?;

    let new_available = storage
        .add_available_copies(book.id, needed, &mut tx)
        .await?;

    storage
        .append_event(
            NewEvent::new(
                EventType::RestockDelivered,
                format!("RESTOCK_DELIVERED:{}", job.id),
            )
            .with_book(book.id)
            .with_job(job.id)
            .with_metadata(json!({
                "copiesAdded": needed,
                "totalCostCents": i64::from(cost),
                "previousAvailable": book.available_copies,
                "newAvailable": new_available,
            })),
            &mut tx,
        )
        .await?;

    tx.commit().await?;

    info!(
        job_id = job.id,
        book_id = book.id,
        copies_added = needed,
        total_cost:% = cost;
        "restock delivered"
    );

    Ok(())
}
