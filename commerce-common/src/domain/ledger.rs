// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// ID of the singleton library wallet row.
pub const LIBRARY_WALLET_ID: &str = "library-wallet";

/// The singleton library wallet. Its balance is never stored; it is always the sum over
/// the wallet's movements.
#[derive(Debug, Clone)]
pub struct LibraryWallet {
    pub id: String,
    pub milestone_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    BorrowIncome,
    BuyIncome,
    CancelRefund,
    RestockExpense,
    InitialBalance,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::BorrowIncome => "BORROW_INCOME",
            MovementType::BuyIncome => "BUY_INCOME",
            MovementType::CancelRefund => "CANCEL_REFUND",
            MovementType::RestockExpense => "RESTOCK_EXPENSE",
            MovementType::InitialBalance => "INITIAL_BALANCE",
        }
    }
}

impl FromStr for MovementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BORROW_INCOME" => Ok(MovementType::BorrowIncome),
            "BUY_INCOME" => Ok(MovementType::BuyIncome),
            "CANCEL_REFUND" => Ok(MovementType::CancelRefund),
            "RESTOCK_EXPENSE" => Ok(MovementType::RestockExpense),
            "INITIAL_BALANCE" => Ok(MovementType::InitialBalance),
            other => Err(UnknownVariant("movement type", other.to_string())),
        }
    }
}

/// Error for TEXT columns holding an unexpected enum value.
#[derive(Debug, Error)]
#[error("unknown {0}: {1}")]
pub struct UnknownVariant(pub &'static str, pub String);

/// One append-only row of the wallet ledger.
#[derive(Debug, Clone)]
pub struct WalletMovement {
    pub id: i64,
    pub wallet_id: String,
    pub amount_cents: Cents,
    pub movement_type: MovementType,
    pub reason: String,
    pub related_entity: Option<String>,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A movement to be appended; see [crate::infra::wallet_db::postgres::append].
#[derive(Debug, Clone)]
pub struct NewWalletMovement {
    pub amount_cents: Cents,
    pub movement_type: MovementType,
    pub reason: String,
    pub related_entity: Option<String>,
    pub dedupe_key: Option<String>,
}

/// Filter for listing wallet movements.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementFilter {
    pub direction: Option<MovementDirection>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Movement direction: a credit is a positive amount, a debit a negative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Credit,
    Debit,
}
