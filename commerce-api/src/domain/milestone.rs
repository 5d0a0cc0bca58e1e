// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The milestone watcher: a one-shot check that fires once the wallet balance crosses
//! the threshold. The `milestone_reached` flag only ever goes `false → true` and is read
//! and written inside the triggering transaction, never cached in the process.

use crate::domain::{EngineConfig, EngineError, storage::{Storage, Tx}};
use commerce_common::domain::{EmailType, EventType, MANAGEMENT_EMAIL, NewEmail, NewEvent};
use fastrace::trace;
use log::info;
use serde_json::json;

pub const MILESTONE_EMAIL_DEDUPE_KEY: &str = "MILESTONE:2000";
pub const MILESTONE_EVENT_DEDUPE_KEY: &str = "MILESTONE_EMAIL:2000";

/// Check the milestone within the triggering transaction.
#[trace]
pub async fn watch<S>(storage: &S, config: &EngineConfig, tx: &mut Tx) -> Result<(), EngineError>
where
    S: Storage,
{
    let wallet = storage.get_wallet(tx).await?;
    if wallet.milestone_reached {
        return Ok(());
    }

    let balance = storage.wallet_balance(tx).await?;
    if balance <= config.milestone_cents {
        return Ok(());
    }

    storage.set_milestone_reached(tx).await?;

    storage
        .append_email(
            NewEmail {
                recipient: MANAGEMENT_EMAIL.to_string(),
                subject: "Library wallet crossed $2000".to_string(),
                body: format!("The library wallet balance is now {balance}."),
                email_type: EmailType::Milestone,
                dedupe_key: MILESTONE_EMAIL_DEDUPE_KEY.to_string(),
            },
            tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(EventType::MilestoneEmail, MILESTONE_EVENT_DEDUPE_KEY)
                .with_metadata(json!({ "balanceCents": i64::from(balance) })),
            tx,
        )
        .await?;

    info!(balance:%; "wallet milestone reached");

    Ok(())
}
