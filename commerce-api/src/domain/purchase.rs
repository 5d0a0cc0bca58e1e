// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! The purchase engine: buy and cancel. Buy is additionally deduplicated at the
//! transport boundary by the idempotency cache.

use crate::domain::{
    EngineConfig, EngineError,
    milestone, stock,
    storage::Storage,
};
use chrono::{DateTime, Utc};
use commerce_common::domain::{
    Cents, EventType, MovementType, NewEvent, NewWalletMovement, UnknownVariant,
};
use fastrace::trace;
use log::info;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    Active,
    Canceled,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Active => "ACTIVE",
            PurchaseStatus::Canceled => "CANCELED",
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PurchaseStatus::Active),
            "CANCELED" => Ok(PurchaseStatus::Canceled),
            other => Err(UnknownVariant("purchase status", other.to_string())),
        }
    }
}

/// A purchase row. Unlike borrows there is no active key; limits are counted from
/// status.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub price_cents: Cents,
    pub purchased_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub status: PurchaseStatus,
}

#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub purchase: Purchase,
    pub is_existing: bool,
}

/// Buy the book with the given ISBN for the given user.
#[trace]
pub async fn buy<S>(
    storage: &S,
    config: &EngineConfig,
    user_email: &str,
    isbn: &str,
) -> Result<PurchaseOutcome, EngineError>
where
    S: Storage,
{
    let mut tx = storage.begin_user_tx(user_email).await?;

    let user = storage.upsert_user(user_email, &mut tx).await?;
    let book = storage
        .get_book_by_isbn(isbn, &mut tx)
        .await?
        .ok_or(EngineError::BookNotFound)?;

    let for_book = storage
        .count_active_purchases_for_book(user.id, book.id, &mut tx)
        .await?;
    if for_book >= config.per_book_buy_limit {
        return Err(EngineError::BookBuyLimitExceeded);
    }

    let total = storage.count_active_purchases(user.id, &mut tx).await?;
    if total >= config.total_buy_limit {
        return Err(EngineError::TotalBuyLimitExceeded);
    }

    let Some(available_copies) = storage.decrement_available_copies(isbn, &mut tx).await? else {
        return Err(EngineError::NoCopiesAvailable);
    };

    let purchase = storage
        .insert_purchase(user.id, book.id, book.sell_cents, &mut tx)
        .await?;

    storage
        .append_movement(
            NewWalletMovement {
                amount_cents: book.sell_cents,
                movement_type: MovementType::BuyIncome,
                reason: format!("purchase of \"{}\"", book.title),
                related_entity: Some(format!("purchase:{}", purchase.id)),
                dedupe_key: Some(format!("BUY:{}", purchase.id)),
            },
            &mut tx,
        )
        .await?;

    storage
        .append_event(
            NewEvent::new(EventType::Buy, format!("BUY:{}", purchase.id))
                .with_user(user.id)
                .with_book(book.id)
                .with_purchase(purchase.id),
            &mut tx,
        )
        .await?;

    if available_copies == 1 {
        stock::watch(storage, config, &book, &mut tx).await?;
    }

    milestone::watch(storage, config, &mut tx).await?;

    tx.commit().await?;

    info!(
        user_id = user.id,
        book_id = book.id,
        purchase_id = purchase.id,
        available_copies;
        "book bought"
    );

    Ok(PurchaseOutcome {
        purchase,
        is_existing: false,
    })
}

/// Cancel the given purchase of the given user within the cancellation window.
#[trace]
pub async fn cancel<S>(
    storage: &S,
    config: &EngineConfig,
    user_email: &str,
    purchase_id: i64,
) -> Result<PurchaseOutcome, EngineError>
where
    S: Storage,
{
    let mut tx = storage.begin_user_tx(user_email).await?;

    let user = storage
        .get_user_by_email(user_email, &mut tx)
        .await?
        .ok_or(EngineError::UserNotFound)?;

    let purchase = storage
        .get_purchase_for_update(purchase_id, user.id, &mut tx)
        .await?
        .ok_or(EngineError::PurchaseNotFound)?;

    if purchase.status == PurchaseStatus::Canceled {
        tx.commit().await?;
        return Ok(PurchaseOutcome {
            purchase,
            is_existing: true,
        });
    }

    let age = Utc::now()
        .signed_duration_since(purchase.purchased_at)
        .to_std()
        .unwrap_or_default();
    if age > config.cancel_window {
        return Err(EngineError::CancellationWindowExpired);
    }

    let purchase = storage.cancel_purchase(purchase.id, &mut tx).await?;

    storage
        .append_movement(
            NewWalletMovement {
                amount_cents: -purchase.price_cents,
                movement_type: MovementType::CancelRefund,
                reason: format!("cancellation of purchase {}", purchase.id),
                related_entity: Some(format!("purchase:{}", purchase.id)),
                dedupe_key: Some(format!("CANCEL:{}", purchase.id)),
            },
            &mut tx,
        )
        .await?;

    storage
        .increment_available_copies(purchase.book_id, 1, &mut tx)
        .await?;

    storage
        .append_event(
            NewEvent::new(EventType::CancelBuy, format!("CANCEL_BUY:{}", purchase.id))
                .with_user(user.id)
                .with_book(purchase.book_id)
                .with_purchase(purchase.id),
            &mut tx,
        )
        .await?;

    tx.commit().await?;

    info!(user_id = user.id, purchase_id = purchase.id; "purchase canceled");

    Ok(PurchaseOutcome {
        purchase,
        is_existing: false,
    })
}

#[cfg(test)]
mod tests {
    use super::PurchaseStatus;

    #[test]
    fn test_status_round_trip() {
        for status in [PurchaseStatus::Active, PurchaseStatus::Canceled] {
            assert_eq!(status.as_str().parse::<PurchaseStatus>().ok(), Some(status));
        }
        assert!("REFUNDED".parse::<PurchaseStatus>().is_err());
    }
}
