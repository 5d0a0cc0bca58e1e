// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{
    Book, ReminderBorrow,
    storage::{Storage, Tx},
};
use commerce_common::{
    domain::{
        Cents, Job, JobStatus, JobType, NewEmail, NewEvent, NewWalletMovement, WalletMovement,
    },
    infra::{audit_db, pool::postgres::PostgresPool, wallet_db},
};
use fastrace::trace;
use indoc::indoc;
use sqlx::{Row, postgres::{PgRow, types::PgInterval}};
use std::time::Duration;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
    statement_timeout: Duration,
}

impl PostgresStorage {
    /// Create a new [PostgresStorage] applying the given statement timeout to handler
    /// transactions.
    pub fn new(pool: PostgresPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

impl Storage for PostgresStorage {
    #[trace]
    async fn due_jobs(&self, lease: Duration, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, job_type, status, payload, run_at, attempts, max_attempts, locked_at,
                   last_error, completed_at, active_key, book_id, borrow_id
            FROM jobs
            WHERE active_key IS NOT NULL
            AND attempts < max_attempts
            AND (
                (status = 'PENDING' AND run_at <= now())
                OR (status = 'PROCESSING' AND locked_at < now() - $1)
            )
            ORDER BY run_at ASC
            LIMIT $2
        "};

        let lease = PgInterval::try_from(lease).map_err(sqlx::Error::Encode)?;

        sqlx::query(query)
            .bind(lease)
            .bind(limit)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(job_from_row)
            .collect()
    }

    #[trace]
    async fn claim_job(&self, job_id: i64, lease: Duration) -> Result<Option<i32>, sqlx::Error> {
        let query = indoc! {"
            UPDATE jobs
            SET status = 'PROCESSING', locked_at = now(), attempts = attempts + 1
            WHERE id = $1
            AND active_key IS NOT NULL
            AND (
                status = 'PENDING'
                OR (status = 'PROCESSING' AND locked_at < now() - $2)
            )
            RETURNING attempts
        "};

        let lease = PgInterval::try_from(lease).map_err(sqlx::Error::Encode)?;

        let attempts = sqlx::query_as::<_, (i32,)>(query)
            .bind(job_id)
            .bind(lease)
            .fetch_optional(&*self.pool)
            .await?
            .map(|(attempts,)| attempts);

        Ok(attempts)
    }

    #[trace]
    async fn complete_job(&self, job_id: i64) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE jobs
            SET status = 'COMPLETED', active_key = NULL, completed_at = now(),
                last_error = NULL, locked_at = NULL
            WHERE id = $1
        "};

        sqlx::query(query).bind(job_id).execute(&*self.pool).await?;

        Ok(())
    }

    #[trace]
    async fn fail_job(&self, job_id: i64, last_error: &str) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE jobs
            SET status = 'FAILED', active_key = NULL, completed_at = now(),
                last_error = $2, locked_at = NULL
            WHERE id = $1
        "};

        sqlx::query(query)
            .bind(job_id)
            .bind(last_error)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn reschedule_job(
        &self,
        job_id: i64,
        delay: Duration,
        last_error: &str,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE jobs
            SET status = 'PENDING', locked_at = NULL, run_at = now() + $2, last_error = $3
            WHERE id = $1
        "};

        let delay = PgInterval::try_from(delay).map_err(sqlx::Error::Encode)?;

        sqlx::query(query)
            .bind(job_id)
            .bind(delay)
            .bind(last_error)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn begin_tx(&self) -> Result<Tx, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let timeout_millis = self.statement_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_millis}"))
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    #[trace]
    async fn get_book(&self, book_id: i64, tx: &mut Tx) -> Result<Option<Book>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, isbn, title, stock_cents, available_copies, seeded_copies
            FROM books
            WHERE id = $1
        "};

        let book = sqlx::query_as::<_, (i64, String, String, i64, i32, i32)>(query)
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(
                |(id, isbn, title, stock_cents, available_copies, seeded_copies)| Book {
                    id,
                    isbn,
                    title,
                    stock_cents: Cents(stock_cents),
                    available_copies,
                    seeded_copies,
                },
            );

        Ok(book)
    }

    #[trace]
    async fn add_available_copies(
        &self,
        book_id: i64,
        by: i32,
        tx: &mut Tx,
    ) -> Result<i32, sqlx::Error> {
        let query = indoc! {"
            UPDATE books
            SET available_copies = available_copies + $2
            WHERE id = $1
            RETURNING available_copies
        "};

        let (available,) = sqlx::query_as::<_, (i32,)>(query)
            .bind(book_id)
            .bind(by)
            .fetch_one(&mut **tx)
            .await?;

        Ok(available)
    }

    #[trace]
    async fn wallet_balance(&self, tx: &mut Tx) -> Result<Cents, sqlx::Error> {
        wallet_db::postgres::balance(&mut **tx).await
    }

    #[trace]
    async fn append_movement(
        &self,
        movement: NewWalletMovement,
        tx: &mut Tx,
    ) -> Result<WalletMovement, sqlx::Error> {
        wallet_db::postgres::append(movement, tx).await
    }

    #[trace]
    async fn append_event(&self, event: NewEvent, tx: &mut Tx) -> Result<(), sqlx::Error> {
        audit_db::postgres::append_event(event, tx).await
    }

    #[trace]
    async fn append_email(&self, email: NewEmail, tx: &mut Tx) -> Result<(), sqlx::Error> {
        audit_db::postgres::append_email(email, tx).await
    }

    #[trace]
    async fn get_reminder_borrow(
        &self,
        borrow_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<ReminderBorrow>, sqlx::Error> {
        let query = indoc! {"
            SELECT borrows.id,
                   users.email,
                   books.title,
                   books.isbn,
                   borrows.due_at,
                   borrows.active_key IS NOT NULL AS active
            FROM borrows
            JOIN users ON users.id = borrows.user_id
            JOIN books ON books.id = borrows.book_id
            WHERE borrows.id = $1
        "};

        sqlx::query(query)
            .bind(borrow_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(reminder_borrow_from_row)
            .transpose()
    }

    #[trace]
    async fn email_exists(&self, dedupe_key: &str, tx: &mut Tx) -> Result<bool, sqlx::Error> {
        let query = indoc! {"
            SELECT EXISTS (
                SELECT 1
                FROM simulated_emails
                WHERE dedupe_key = $1
            )
        "};

        let (exists,) = sqlx::query_as::<_, (bool,)>(query)
            .bind(dedupe_key)
            .fetch_one(&mut **tx)
            .await?;

        Ok(exists)
    }
}

fn job_from_row(row: PgRow) -> Result<Job, sqlx::Error> {
    let job_type = row
        .try_get::<String, _>("job_type")?
        .parse::<JobType>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;
    let status = row
        .try_get::<String, _>("status")?
        .parse::<JobStatus>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(Job {
        id: row.try_get("id")?,
        job_type,
        status,
        payload: row.try_get("payload")?,
        run_at: row.try_get("run_at")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        locked_at: row.try_get("locked_at")?,
        last_error: row.try_get("last_error")?,
        completed_at: row.try_get("completed_at")?,
        active_key: row.try_get("active_key")?,
        book_id: row.try_get("book_id")?,
        borrow_id: row.try_get("borrow_id")?,
    })
}

fn reminder_borrow_from_row(row: PgRow) -> Result<ReminderBorrow, sqlx::Error> {
    Ok(ReminderBorrow {
        id: row.try_get("id")?,
        user_email: row.try_get("email")?,
        book_title: row.try_get("title")?,
        isbn: row.try_get("isbn")?,
        due_at: row.try_get("due_at")?,
        active: row.try_get("active")?,
    })
}
