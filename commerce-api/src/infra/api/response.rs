// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! JSON response shapes. Monetary fields always come in pairs: `<name>Cents` (signed
//! integer) and `<name>Formatted` (`"D.CC"` string).

use crate::domain::{Book, Borrow, BorrowOutcome, Purchase, PurchaseOutcome};
use chrono::{DateTime, Utc};
use commerce_common::domain::{
    Cents, EmailType, Event, EventType, Job, JobStatus, JobType, MovementType, Page,
    SimulatedEmail, WalletMovement,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            pagination: Pagination {
                total: page.total,
                page: page.page,
                page_size: page.page_size,
                total_pages,
            },
            data: page.data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBook {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub sell_cents: i64,
    pub sell_formatted: String,
    pub borrow_cents: i64,
    pub borrow_formatted: String,
    pub stock_cents: i64,
    pub stock_formatted: String,
    pub available_copies: i32,
    pub seeded_copies: i32,
}

impl From<Book> for ApiBook {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            isbn: book.isbn,
            title: book.title,
            author: book.author,
            genre: book.genre,
            sell_cents: book.sell_cents.into(),
            sell_formatted: book.sell_cents.to_string(),
            borrow_cents: book.borrow_cents.into(),
            borrow_formatted: book.borrow_cents.to_string(),
            stock_cents: book.stock_cents.into(),
            stock_formatted: book.stock_cents.to_string(),
            available_copies: book.available_copies,
            seeded_copies: book.seeded_copies,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBorrow {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: &'static str,
}

impl From<Borrow> for ApiBorrow {
    fn from(borrow: Borrow) -> Self {
        Self {
            id: borrow.id,
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            borrowed_at: borrow.borrowed_at,
            due_at: borrow.due_at,
            returned_at: borrow.returned_at,
            status: borrow.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub borrow: ApiBorrow,
    pub is_existing: bool,
}

impl From<BorrowOutcome> for BorrowResponse {
    fn from(outcome: BorrowOutcome) -> Self {
        Self {
            borrow: outcome.borrow.into(),
            is_existing: outcome.is_existing,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPurchase {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub price_cents: i64,
    pub price_formatted: String,
    pub purchased_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub status: &'static str,
}

impl From<Purchase> for ApiPurchase {
    fn from(purchase: Purchase) -> Self {
        Self {
            id: purchase.id,
            user_id: purchase.user_id,
            book_id: purchase.book_id,
            price_cents: purchase.price_cents.into(),
            price_formatted: purchase.price_cents.to_string(),
            purchased_at: purchase.purchased_at,
            canceled_at: purchase.canceled_at,
            status: purchase.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub purchase: ApiPurchase,
    pub is_existing: bool,
}

impl From<PurchaseOutcome> for PurchaseResponse {
    fn from(outcome: PurchaseOutcome) -> Self {
        Self {
            purchase: outcome.purchase.into(),
            is_existing: outcome.is_existing,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance_cents: i64,
    pub balance_formatted: String,
    pub milestone_reached: bool,
}

impl WalletResponse {
    pub fn new(balance: Cents, milestone_reached: bool) -> Self {
        Self {
            balance_cents: balance.into(),
            balance_formatted: balance.to_string(),
            milestone_reached,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMovement {
    pub id: i64,
    pub amount_cents: i64,
    pub amount_formatted: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub reason: String,
    pub related_entity: Option<String>,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WalletMovement> for ApiMovement {
    fn from(movement: WalletMovement) -> Self {
        Self {
            id: movement.id,
            amount_cents: movement.amount_cents.into(),
            amount_formatted: movement.amount_cents.to_string(),
            movement_type: movement.movement_type,
            reason: movement.reason,
            related_entity: movement.related_entity,
            dedupe_key: movement.dedupe_key,
            created_at: movement.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiJob {
    pub id: i64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: Value,
    pub run_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub active_key: Option<String>,
    pub book_id: Option<i64>,
    pub borrow_id: Option<i64>,
}

impl From<Job> for ApiJob {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            payload: job.payload,
            run_at: job.run_at,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            locked_at: job.locked_at,
            last_error: job.last_error,
            completed_at: job.completed_at,
            active_key: job.active_key,
            book_id: job.book_id,
            borrow_id: job.borrow_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEmail {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(rename = "type")]
    pub email_type: EmailType,
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<SimulatedEmail> for ApiEmail {
    fn from(email: SimulatedEmail) -> Self {
        Self {
            id: email.id,
            recipient: email.recipient,
            subject: email.subject,
            body: email.body,
            email_type: email.email_type,
            dedupe_key: email.dedupe_key,
            created_at: email.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub borrow_id: Option<i64>,
    pub purchase_id: Option<i64>,
    pub job_id: Option<i64>,
    pub metadata: Value,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Event> for ApiEvent {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            user_id: event.user_id,
            book_id: event.book_id,
            borrow_id: event.borrow_id,
            purchase_id: event.purchase_id,
            job_id: event.job_id,
            metadata: event.metadata,
            dedupe_key: event.dedupe_key,
            created_at: event.created_at,
        }
    }
}
