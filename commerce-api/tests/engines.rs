// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! Engine tests against a real Postgres instance.

use assert_matches::assert_matches;
use commerce_api::{
    domain::{BorrowStatus, EngineConfig, EngineError, PurchaseStatus, borrow, purchase},
    infra::storage::PostgresStorage,
};
use commerce_common::{
    domain::Cents,
    infra::{
        migrations,
        pool::{self, postgres::PostgresPool},
    },
};
use sqlx::postgres::PgSslMode;
use std::{error::Error as StdError, time::Duration};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

const STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

async fn setup() -> Result<(ContainerAsync<Postgres>, PostgresPool), Box<dyn StdError>> {
    let container = Postgres::default()
        .with_db_name("commerce")
        .with_user("commerce")
        .with_password("commerce")
        .with_tag("17.1-alpine")
        .start()
        .await?;
    let port = container.get_host_port_ipv4(5432).await?;

    let config = pool::postgres::Config {
        host: "localhost".to_string(),
        port,
        dbname: "commerce".to_string(),
        user: "commerce".to_string(),
        password: "commerce".into(),
        sslmode: PgSslMode::Prefer,
        max_connections: 20,
        idle_timeout: Duration::from_secs(60),
        max_lifetime: Duration::from_secs(5 * 60),
    };
    let pool = PostgresPool::new(config).await?;

    migrations::postgres::run(&pool).await?;
    sqlx::query("INSERT INTO library_wallets (id) VALUES ('library-wallet')")
        .execute(&*pool)
        .await?;

    Ok((container, pool))
}

#[allow(clippy::too_many_arguments)]
async fn insert_book(
    pool: &PostgresPool,
    isbn: &str,
    title: &str,
    sell_cents: i64,
    borrow_cents: i64,
    stock_cents: i64,
    available_copies: i32,
) -> Result<i64, Box<dyn StdError>> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO books (isbn, title, author, genre, sell_cents, borrow_cents, stock_cents,
                            available_copies, seeded_copies)
         VALUES ($1, $2, 'Test Author', 'Fiction', $3, $4, $5, $6, $6)
         RETURNING id",
    )
    .bind(isbn)
    .bind(title)
    .bind(sell_cents)
    .bind(borrow_cents)
    .bind(stock_cents)
    .bind(available_copies)
    .fetch_one(&**pool)
    .await?;

    Ok(id)
}

async fn available_copies(pool: &PostgresPool, isbn: &str) -> Result<i32, Box<dyn StdError>> {
    let (available,): (i32,) =
        sqlx::query_as("SELECT available_copies FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_one(&**pool)
            .await?;
    Ok(available)
}

async fn count(pool: &PostgresPool, query: &str) -> Result<i64, Box<dyn StdError>> {
    let (count,): (i64,) = sqlx::query_as(query).fetch_one(&**pool).await?;
    Ok(count)
}

#[tokio::test]
async fn test_borrow_lifecycle() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);
    let config = EngineConfig::default();

    let isbn = "7b9a3c1e-0f64-4f0a-9b59-1a2e8c7d5f30";
    insert_book(&pool, isbn, "The Dispossessed", 1500, 200, 700, 5).await?;

    let outcome = borrow::borrow(&storage, &config, "alice@example.com", isbn).await?;
    assert!(!outcome.is_existing);
    assert_eq!(outcome.borrow.status, BorrowStatus::Active);
    let borrow_id = outcome.borrow.id;

    // Repeated borrow of the same book is an idempotent success.
    let repeated = borrow::borrow(&storage, &config, "alice@example.com", isbn).await?;
    assert!(repeated.is_existing);
    assert_eq!(repeated.borrow.id, borrow_id);
    assert_eq!(available_copies(&pool, isbn).await?, 4);

    // Exactly one income movement and one reminder job.
    let movements = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM wallet_movements WHERE dedupe_key = 'BORROW:{borrow_id}'"
        ),
    )
    .await?;
    assert_eq!(movements, 1);
    let reminders = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM jobs WHERE borrow_id = {borrow_id} \
             AND job_type = 'REMINDER' AND active_key IS NOT NULL"
        ),
    )
    .await?;
    assert_eq!(reminders, 1);

    // Two further borrows reach the limit of three.
    let isbn_2 = "3f2d8a55-6c1b-4b8e-a7d2-90e4f6b1c8a2";
    let isbn_3 = "b4e1f7c9-2a3d-45e6-8f01-6c7d8e9f0a1b";
    let isbn_4 = "9c8b7a65-4d3e-42f1-b0a9-8e7d6c5b4a39";
    insert_book(&pool, isbn_2, "Second", 1500, 200, 700, 5).await?;
    insert_book(&pool, isbn_3, "Third", 1500, 200, 700, 5).await?;
    insert_book(&pool, isbn_4, "Fourth", 1500, 200, 700, 5).await?;

    borrow::borrow(&storage, &config, "alice@example.com", isbn_2).await?;
    borrow::borrow(&storage, &config, "alice@example.com", isbn_3).await?;
    let over_limit = borrow::borrow(&storage, &config, "alice@example.com", isbn_4).await;
    assert_matches!(over_limit, Err(EngineError::BorrowLimitExceeded));
    assert_eq!(available_copies(&pool, isbn_4).await?, 5);

    // Return, then return again: the second is an idempotent repeat.
    let returned = borrow::return_book(&storage, "alice@example.com", isbn).await?;
    assert!(!returned.is_existing);
    assert_eq!(returned.borrow.status, BorrowStatus::Returned);
    assert_eq!(available_copies(&pool, isbn).await?, 5);

    let repeated = borrow::return_book(&storage, "alice@example.com", isbn).await?;
    assert!(repeated.is_existing);
    assert_eq!(repeated.borrow.id, returned.borrow.id);
    assert_eq!(available_copies(&pool, isbn).await?, 5);

    // The reminder job was canceled and released its slot.
    let canceled = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM jobs WHERE borrow_id = {borrow_id} \
             AND status = 'CANCELED' AND active_key IS NULL"
        ),
    )
    .await?;
    assert_eq!(canceled, 1);

    // Returning a book that was never borrowed is not found.
    let not_found = borrow::return_book(&storage, "alice@example.com", isbn_4).await;
    assert_matches!(not_found, Err(EngineError::BorrowNotFound));

    // Unknown book.
    let unknown = borrow::borrow(&storage, &config, "alice@example.com", "no-such-isbn").await;
    assert_matches!(unknown, Err(EngineError::BookNotFound));

    Ok(())
}

#[tokio::test]
async fn test_low_stock_schedules_restock_once() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);
    let config = EngineConfig::default();

    let isbn = "15d4e3f2-a1b0-4c9d-8e7f-6a5b4c3d2e1f";
    let book_id = insert_book(&pool, isbn, "Solaris", 1500, 200, 700, 3).await?;

    // 3 -> 2: no trigger.
    borrow::borrow(&storage, &config, "u1@example.com", isbn).await?;
    let jobs = count(
        &pool,
        &format!("SELECT COUNT(*) FROM jobs WHERE book_id = {book_id} AND job_type = 'RESTOCK'"),
    )
    .await?;
    assert_eq!(jobs, 0);

    // 2 -> 1: the transition fires the watcher.
    borrow::borrow(&storage, &config, "u2@example.com", isbn).await?;
    let live = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM jobs WHERE book_id = {book_id} \
             AND job_type = 'RESTOCK' AND active_key IS NOT NULL"
        ),
    )
    .await?;
    assert_eq!(live, 1);
    let emails = count(
        &pool,
        "SELECT COUNT(*) FROM simulated_emails WHERE email_type = 'LOW_STOCK'",
    )
    .await?;
    assert_eq!(emails, 1);
    let events = count(
        &pool,
        "SELECT COUNT(*) FROM events \
         WHERE event_type IN ('LOW_STOCK_EMAIL', 'RESTOCK_SCHEDULED')",
    )
    .await?;
    assert_eq!(events, 2);

    // 1 -> 0 while a restock is already scheduled: no second job.
    borrow::borrow(&storage, &config, "u3@example.com", isbn).await?;
    let live = count(
        &pool,
        &format!("SELECT COUNT(*) FROM jobs WHERE book_id = {book_id} AND job_type = 'RESTOCK'"),
    )
    .await?;
    assert_eq!(live, 1);
    assert_eq!(available_copies(&pool, isbn).await?, 0);

    // No copy left.
    let sold_out = borrow::borrow(&storage, &config, "u4@example.com", isbn).await;
    assert_matches!(sold_out, Err(EngineError::NoCopiesAvailable));

    Ok(())
}

#[tokio::test]
async fn test_purchase_lifecycle() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);
    let config = EngineConfig::default();

    let isbn = "e6f5a4b3-c2d1-40e9-9f8a-7b6c5d4e3f2a";
    insert_book(&pool, isbn, "Blindsight", 1500, 200, 700, 10).await?;

    let first = purchase::buy(&storage, &config, "buyer@example.com", isbn).await?;
    assert!(!first.is_existing);
    assert_eq!(first.purchase.status, PurchaseStatus::Active);
    assert_eq!(first.purchase.price_cents, Cents(1500));
    assert_eq!(available_copies(&pool, isbn).await?, 9);

    let second = purchase::buy(&storage, &config, "buyer@example.com", isbn).await?;
    assert!(!second.is_existing);

    // Two active copies of the same book is the per-book limit.
    let third = purchase::buy(&storage, &config, "buyer@example.com", isbn).await;
    assert_matches!(third, Err(EngineError::BookBuyLimitExceeded));

    // Canceling releases the slot and refunds the price.
    let canceled = purchase::cancel(&storage, &config, "buyer@example.com", first.purchase.id)
        .await?;
    assert!(!canceled.is_existing);
    assert_eq!(canceled.purchase.status, PurchaseStatus::Canceled);
    assert_eq!(available_copies(&pool, isbn).await?, 9);

    let refunds = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM wallet_movements WHERE dedupe_key = 'CANCEL:{}'",
            first.purchase.id
        ),
    )
    .await?;
    assert_eq!(refunds, 1);

    // Canceling again is an idempotent no-op with still exactly one refund.
    let repeated = purchase::cancel(&storage, &config, "buyer@example.com", first.purchase.id)
        .await?;
    assert!(repeated.is_existing);
    let refunds = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM wallet_movements WHERE dedupe_key = 'CANCEL:{}'",
            first.purchase.id
        ),
    )
    .await?;
    assert_eq!(refunds, 1);

    // The released slot allows buying the book again.
    let again = purchase::buy(&storage, &config, "buyer@example.com", isbn).await?;
    assert!(!again.is_existing);

    // Unknown purchase and unknown user.
    let not_found = purchase::cancel(&storage, &config, "buyer@example.com", 999_999).await;
    assert_matches!(not_found, Err(EngineError::PurchaseNotFound));
    let no_user = purchase::cancel(&storage, &config, "nobody@example.com", 1).await;
    assert_matches!(no_user, Err(EngineError::UserNotFound));

    Ok(())
}

#[tokio::test]
async fn test_total_buy_limit() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);
    let config = EngineConfig::default();

    for n in 0..11 {
        insert_book(&pool, &format!("total-limit-{n}"), &format!("Book {n}"), 1000, 100, 500, 5)
            .await?;
    }

    for n in 0..10 {
        purchase::buy(&storage, &config, "collector@example.com", &format!("total-limit-{n}"))
            .await?;
    }

    let over_limit =
        purchase::buy(&storage, &config, "collector@example.com", "total-limit-10").await;
    assert_matches!(over_limit, Err(EngineError::TotalBuyLimitExceeded));

    Ok(())
}

#[tokio::test]
async fn test_cancellation_window() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);

    // A zero-length window makes every cancellation late.
    let config = EngineConfig {
        cancel_window: Duration::ZERO,
        ..EngineConfig::default()
    };

    let isbn = "28a9b8c7-d6e5-4f40-a312-0b1c2d3e4f5a";
    insert_book(&pool, isbn, "Roadside Picnic", 1500, 200, 700, 5).await?;

    let bought = purchase::buy(&storage, &config, "late@example.com", isbn).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let expired = purchase::cancel(&storage, &config, "late@example.com", bought.purchase.id).await;
    assert_matches!(expired, Err(EngineError::CancellationWindowExpired));

    // The purchase stays active, no refund happened.
    let refunds = count(
        &pool,
        &format!(
            "SELECT COUNT(*) FROM wallet_movements WHERE dedupe_key = 'CANCEL:{}'",
            bought.purchase.id
        ),
    )
    .await?;
    assert_eq!(refunds, 0);

    Ok(())
}

#[tokio::test]
async fn test_milestone_fires_once() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);

    let config = EngineConfig {
        milestone_cents: Cents(2_000),
        ..EngineConfig::default()
    };

    let isbn = "c1d2e3f4-a5b6-4789-8abc-def012345678";
    insert_book(&pool, isbn, "Embassytown", 1_500, 200, 700, 10).await?;

    // 1500 <= 2000: no milestone yet.
    purchase::buy(&storage, &config, "m1@example.com", isbn).await?;
    let emails = count(
        &pool,
        "SELECT COUNT(*) FROM simulated_emails WHERE dedupe_key = 'MILESTONE:2000'",
    )
    .await?;
    assert_eq!(emails, 0);

    // 3000 > 2000: the one-shot fires.
    purchase::buy(&storage, &config, "m2@example.com", isbn).await?;
    let emails = count(
        &pool,
        "SELECT COUNT(*) FROM simulated_emails WHERE dedupe_key = 'MILESTONE:2000'",
    )
    .await?;
    assert_eq!(emails, 1);
    let (milestone_reached,): (bool,) =
        sqlx::query_as("SELECT milestone_reached FROM library_wallets WHERE id = 'library-wallet'")
            .fetch_one(&*pool)
            .await?;
    assert!(milestone_reached);

    // Further commerce never fires it again.
    purchase::buy(&storage, &config, "m3@example.com", isbn).await?;
    let emails = count(
        &pool,
        "SELECT COUNT(*) FROM simulated_emails WHERE dedupe_key = 'MILESTONE:2000'",
    )
    .await?;
    assert_eq!(emails, 1);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_borrows_of_last_copy() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), STATEMENT_TIMEOUT);
    let config = EngineConfig::default();

    let isbn = "aaaa1111-2222-4333-8444-555566667777";
    insert_book(&pool, isbn, "The Last Copy", 1500, 200, 700, 1).await?;

    let handles = (0..10)
        .map(|n| {
            let storage = storage.clone();
            let config = config.clone();
            tokio::spawn(async move {
                borrow::borrow(&storage, &config, &format!("racer-{n}@example.com"), isbn).await
            })
        })
        .collect::<Vec<_>>();

    let mut successes = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            successes += 1;
        }
    }

    // Exactly one winner; the rest failed with a conflict or a serialization error.
    assert_eq!(successes, 1);
    assert_eq!(available_copies(&pool, isbn).await?, 0);

    let active = count(
        &pool,
        "SELECT COUNT(*) FROM borrows WHERE status = 'ACTIVE'",
    )
    .await?;
    assert_eq!(active, 1);

    Ok(())
}
