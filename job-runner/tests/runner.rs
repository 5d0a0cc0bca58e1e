// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! Job store and handler tests against a real Postgres instance.

use assert_matches::assert_matches;
use chrono::{DateTime, Utc};
use commerce_common::{
    domain::{Cents, JobStatus},
    infra::{
        migrations,
        pool::{self, postgres::PostgresPool},
    },
};
use job_runner::{
    domain::{HandlerError, reminder, restock, storage::Storage},
    infra::storage::PostgresStorage,
};
use serde_json::json;
use sqlx::postgres::PgSslMode;
use std::{error::Error as StdError, time::Duration};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

const LEASE: Duration = Duration::from_secs(60);

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
        max_connections: 10,
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

async fn insert_book(
    pool: &PostgresPool,
    isbn: &str,
    stock_cents: i64,
    available_copies: i32,
    seeded_copies: i32,
) -> Result<i64, Box<dyn StdError>> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO books (isbn, title, author, genre, sell_cents, borrow_cents, stock_cents,
                            available_copies, seeded_copies)
         VALUES ($1, 'Restockable', 'Test Author', 'Fiction', 1500, 200, $2, $3, $4)
         RETURNING id",
    )
    .bind(isbn)
    .bind(stock_cents)
    .bind(available_copies)
    .bind(seeded_copies)
    .fetch_one(&**pool)
    .await?;

    Ok(id)
}

async fn insert_job(
    pool: &PostgresPool,
    job_type: &str,
    payload: serde_json::Value,
    active_key: &str,
    book_id: Option<i64>,
    borrow_id: Option<i64>,
) -> Result<i64, Box<dyn StdError>> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO jobs (job_type, status, payload, run_at, max_attempts, active_key,
                           book_id, borrow_id)
         VALUES ($1, 'PENDING', $2, now() - interval '1 second', 10, $3, $4, $5)
         RETURNING id",
    )
    .bind(job_type)
    .bind(payload)
    .bind(active_key)
    .bind(book_id)
    .bind(borrow_id)
    .fetch_one(&**pool)
    .await?;

    Ok(id)
}

async fn fund_wallet(pool: &PostgresPool, amount_cents: i64) -> Result<(), Box<dyn StdError>> {
    sqlx::query(
        "INSERT INTO wallet_movements (wallet_id, amount_cents, movement_type, reason)
         VALUES ('library-wallet', $1, 'INITIAL_BALANCE', 'test funding')",
    )
    .bind(amount_cents)
    .execute(&**pool)
    .await?;

    Ok(())
}

async fn job_state(
    pool: &PostgresPool,
    job_id: i64,
) -> Result<(String, Option<String>, i32, DateTime<Utc>), Box<dyn StdError>> {
    let state = sqlx::query_as::<_, (String, Option<String>, i32, DateTime<Utc>)>(
        "SELECT status, active_key, attempts, run_at FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_one(&**pool)
    .await?;

    Ok(state)
}

#[tokio::test]
async fn test_claim_is_exclusive_and_terminal_states_release_the_slot()
-> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), Duration::from_secs(30));

    let book_id = insert_book(&pool, "claim-test", 100, 5, 5).await?;
    let job_id = insert_job(
        &pool,
        "RESTOCK",
        json!({ "bookId": book_id, "isbn": "claim-test" }),
        "RESTOCK:claim-test",
        Some(book_id),
        None,
    )
    .await?;

    let due = storage.due_jobs(LEASE, 10).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, job_id);
    assert_eq!(due[0].status, JobStatus::Pending);

    // First claim wins, the second loses while the lease is fresh.
    assert_eq!(storage.claim_job(job_id, LEASE).await?, Some(1));
    assert_eq!(storage.claim_job(job_id, LEASE).await?, None);

    // A fresh PROCESSING job is not due.
    let due = storage.due_jobs(LEASE, 10).await?;
    assert!(due.is_empty());

    storage.complete_job(job_id).await?;
    let (status, active_key, attempts, _) = job_state(&pool, job_id).await?;
    assert_eq!(status, "COMPLETED");
    assert_eq!(active_key, None);
    assert_eq!(attempts, 1);

    Ok(())
}

#[tokio::test]
async fn test_expired_lease_is_reclaimable() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), Duration::from_secs(30));

    let book_id = insert_book(&pool, "lease-test", 100, 5, 5).await?;
    let job_id = insert_job(
        &pool,
        "RESTOCK",
        json!({ "bookId": book_id, "isbn": "lease-test" }),
        "RESTOCK:lease-test",
        Some(book_id),
        None,
    )
    .await?;

    // Simulate a worker that claimed and then died.
    sqlx::query(
        "UPDATE jobs SET status = 'PROCESSING', locked_at = now() - interval '5 minutes',
         attempts = 1 WHERE id = $1",
    )
    .bind(job_id)
    .execute(&*pool)
    .await?;

    let due = storage.due_jobs(LEASE, 10).await?;
    assert_eq!(due.len(), 1);
    assert_eq!(storage.claim_job(job_id, LEASE).await?, Some(2));

    Ok(())
}

#[tokio::test]
async fn test_reschedule_preserves_the_slot_and_backs_off() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), Duration::from_secs(30));

    let book_id = insert_book(&pool, "backoff-test", 100, 5, 5).await?;
    let job_id = insert_job(
        &pool,
        "RESTOCK",
        json!({ "bookId": book_id, "isbn": "backoff-test" }),
        "RESTOCK:backoff-test",
        Some(book_id),
        None,
    )
    .await?;

    assert_eq!(storage.claim_job(job_id, LEASE).await?, Some(1));
    storage
        .reschedule_job(job_id, Duration::from_secs(120), "insufficient funds")
        .await?;

    let (status, active_key, attempts, run_at) = job_state(&pool, job_id).await?;
    assert_eq!(status, "PENDING");
    assert_eq!(active_key.as_deref(), Some("RESTOCK:backoff-test"));
    assert_eq!(attempts, 1);
    assert!(run_at > Utc::now() + chrono::Duration::seconds(60));

    // Pushed into the future, so not due anymore.
    let due = storage.due_jobs(LEASE, 10).await?;
    assert!(due.is_empty());

    // Exhausted jobs are skipped entirely.
    sqlx::query("UPDATE jobs SET run_at = now(), attempts = max_attempts WHERE id = $1")
        .bind(job_id)
        .execute(&*pool)
        .await?;
    let due = storage.due_jobs(LEASE, 10).await?;
    assert!(due.is_empty());

    storage.fail_job(job_id, "attempts exhausted").await?;
    let (status, active_key, _, _) = job_state(&pool, job_id).await?;
    assert_eq!(status, "FAILED");
    assert_eq!(active_key, None);

    Ok(())
}

#[tokio::test]
async fn test_restock_handler_replenishes_to_seeded_level() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), Duration::from_secs(30));

    let book_id = insert_book(&pool, "restock-isbn", 100, 3, 10).await?;
    let job_id = insert_job(
        &pool,
        "RESTOCK",
        json!({ "bookId": book_id, "isbn": "restock-isbn" }),
        "RESTOCK:restock-isbn",
        Some(book_id),
        None,
    )
    .await?;

    let due = storage.due_jobs(LEASE, 10).await?;
    let job = due.into_iter().next().expect("job is due");
    assert_eq!(job.id, job_id);

    // Empty wallet: the handler raises and the runner will retry with backoff.
    let broke = restock::handle(&storage, &job).await;
    assert_matches!(
        broke,
        Err(HandlerError::InsufficientFunds { cost, .. }) if cost == Cents(700)
    );

    // Nothing happened.
    let (available,): (i32,) =
        sqlx::query_as("SELECT available_copies FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_one(&*pool)
            .await?;
    assert_eq!(available, 3);

    // With funds the restock goes through: 7 copies at 100 cents.
    fund_wallet(&pool, 700).await?;
    restock::handle(&storage, &job).await?;

    let (available,): (i32,) =
        sqlx::query_as("SELECT available_copies FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_one(&*pool)
            .await?;
    assert_eq!(available, 10);

    let (expense,): (i64,) = sqlx::query_as(
        "SELECT amount_cents FROM wallet_movements WHERE dedupe_key = $1",
    )
    .bind(format!("RESTOCK:{job_id}"))
    .fetch_one(&*pool)
    .await?;
    assert_eq!(expense, -700);

    let (events,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM events WHERE dedupe_key = $1",
    )
    .bind(format!("RESTOCK_DELIVERED:{job_id}"))
    .fetch_one(&*pool)
    .await?;
    assert_eq!(events, 1);

    // Re-running the handler (lease expiry reprocessing) is a no-op: the book is full.
    restock::handle(&storage, &job).await?;
    let (expenses,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM wallet_movements WHERE movement_type = 'RESTOCK_EXPENSE'",
    )
    .fetch_one(&*pool)
    .await?;
    assert_eq!(expenses, 1);

    Ok(())
}

#[tokio::test]
async fn test_reminder_handler_sends_exactly_one_email() -> Result<(), Box<dyn StdError>> {
    let (_container, pool) = setup().await?;
    let storage = PostgresStorage::new(pool.clone(), Duration::from_secs(30));

    let book_id = insert_book(&pool, "reminder-isbn", 100, 5, 5).await?;
    let (user_id,): (i64,) =
        sqlx::query_as("INSERT INTO users (email) VALUES ('reader@example.com') RETURNING id")
            .fetch_one(&*pool)
            .await?;
    let (borrow_id,): (i64,) = sqlx::query_as(
        "INSERT INTO borrows (user_id, book_id, due_at, status, active_key)
         VALUES ($1, $2, now(), 'ACTIVE', $1::TEXT || ':' || $2::TEXT)
         RETURNING id",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_one(&*pool)
    .await?;

    let job_id = insert_job(
        &pool,
        "REMINDER",
        json!({ "borrowId": borrow_id, "userEmail": "reader@example.com" }),
        &format!("REMINDER:{borrow_id}"),
        Some(book_id),
        Some(borrow_id),
    )
    .await?;

    let due = storage.due_jobs(LEASE, 10).await?;
    let job = due.into_iter().next().expect("job is due");
    assert_eq!(job.id, job_id);

    reminder::handle(&storage, &job).await?;

    // Processing again, as after a lease-expiry reclaim, never duplicates the email.
    reminder::handle(&storage, &job).await?;

    let (emails,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM simulated_emails WHERE dedupe_key = $1",
    )
    .bind(format!("REMINDER:{borrow_id}"))
    .fetch_one(&*pool)
    .await?;
    assert_eq!(emails, 1);

    let (events,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM events WHERE dedupe_key = $1",
    )
    .bind(format!("REMINDER_SENT:{borrow_id}"))
    .fetch_one(&*pool)
    .await?;
    assert_eq!(events, 1);

    // A returned borrow gets no reminder.
    sqlx::query(
        "UPDATE borrows SET status = 'RETURNED', returned_at = now(), active_key = NULL
         WHERE id = $1",
    )
    .bind(borrow_id)
    .execute(&*pool)
    .await?;
    sqlx::query("DELETE FROM simulated_emails").execute(&*pool).await?;

    reminder::handle(&storage, &job).await?;
    let (emails,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM simulated_emails")
        .fetch_one(&*pool)
        .await?;
    assert_eq!(emails, 0);

    Ok(())
}
