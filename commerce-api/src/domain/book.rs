// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use commerce_common::domain::Cents;

/// A catalog book. The row is seeded once and never deleted; only `available_copies`
/// changes afterwards. `seeded_copies` is the replenishment target of restock jobs.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub sell_cents: Cents,
    pub borrow_cents: Cents,
    pub stock_cents: Cents,
    pub available_copies: i32,
    pub seeded_copies: i32,
    pub created_at: DateTime<Utc>,
}

/// Search filter for the catalog listing; all matches are case-insensitive substrings.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
}
