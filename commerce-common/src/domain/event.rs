// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::ledger::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Borrow,
    Return,
    Buy,
    CancelBuy,
    LowStockEmail,
    RestockScheduled,
    RestockDelivered,
    ReminderSent,
    MilestoneEmail,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Borrow => "BORROW",
            EventType::Return => "RETURN",
            EventType::Buy => "BUY",
            EventType::CancelBuy => "CANCEL_BUY",
            EventType::LowStockEmail => "LOW_STOCK_EMAIL",
            EventType::RestockScheduled => "RESTOCK_SCHEDULED",
            EventType::RestockDelivered => "RESTOCK_DELIVERED",
            EventType::ReminderSent => "REMINDER_SENT",
            EventType::MilestoneEmail => "MILESTONE_EMAIL",
        }
    }
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BORROW" => Ok(EventType::Borrow),
            "RETURN" => Ok(EventType::Return),
            "BUY" => Ok(EventType::Buy),
            "CANCEL_BUY" => Ok(EventType::CancelBuy),
            "LOW_STOCK_EMAIL" => Ok(EventType::LowStockEmail),
            "RESTOCK_SCHEDULED" => Ok(EventType::RestockScheduled),
            "RESTOCK_DELIVERED" => Ok(EventType::RestockDelivered),
            "REMINDER_SENT" => Ok(EventType::ReminderSent),
            "MILESTONE_EMAIL" => Ok(EventType::MilestoneEmail),
            other => Err(UnknownVariant("event type", other.to_string())),
        }
    }
}

/// Immutable audit record. Refers to other entities but owns none of them; references are
/// soft (`ON DELETE SET NULL`).
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub event_type: EventType,
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub borrow_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub job_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub borrow_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub job_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub dedupe_key: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: EventType, dedupe_key: impl Into<String>) -> Self {
        Self {
            event_type,
            user_id: None,
            book_id: None,
            borrow_id: None,
            purchase_id: None,
            job_id: None,
            metadata: serde_json::Value::Object(Default::default()),
            dedupe_key: Some(dedupe_key.into()),
        }
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_book(mut self, book_id: i64) -> Self {
        self.book_id = Some(book_id);
        self
    }

    pub fn with_borrow(mut self, borrow_id: i64) -> Self {
        self.borrow_id = Some(borrow_id);
        self
    }

    pub fn with_purchase(mut self, purchase_id: i64) -> Self {
        self.purchase_id = Some(purchase_id);
        self
    }

    pub fn with_job(mut self, job_id: i64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
