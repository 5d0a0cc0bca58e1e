// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::ledger::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Recipient of low-stock notifications.
pub const SUPPLY_EMAIL: &str = "supply@library.com";

/// Recipient of milestone notifications.
pub const MANAGEMENT_EMAIL: &str = "management@dummy-library.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailType {
    LowStock,
    Reminder,
    Milestone,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::LowStock => "LOW_STOCK",
            EmailType::Reminder => "REMINDER",
            EmailType::Milestone => "MILESTONE",
        }
    }
}

impl FromStr for EmailType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW_STOCK" => Ok(EmailType::LowStock),
            "REMINDER" => Ok(EmailType::Reminder),
            "MILESTONE" => Ok(EmailType::Milestone),
            other => Err(UnknownVariant("email type", other.to_string())),
        }
    }
}

/// An email "sent" by the system. No real delivery happens; rows in this table are the
/// observable side effect, deduplicated by `dedupe_key`.
#[derive(Debug, Clone)]
pub struct SimulatedEmail {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub email_type: EmailType,
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub email_type: EmailType,
    pub dedupe_key: String,
}
