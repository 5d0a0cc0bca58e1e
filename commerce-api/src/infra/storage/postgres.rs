// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{
    Book, BookFilter, User,
    borrow::{Borrow, BorrowStatus},
    purchase::{Purchase, PurchaseStatus},
    storage::{IdempotencyCell, JobFilter, Storage, Tx},
};
use chrono::{DateTime, Utc};
use commerce_common::{
    domain::{
        Cents, EmailType, Event, EventType, Job, JobStatus, JobType, LIBRARY_WALLET_ID,
        LibraryWallet, MovementFilter, NewEmail, NewEvent, NewJob, NewWalletMovement, Page,
        PageRequest, SimulatedEmail, WalletMovement,
    },
    infra::{
        audit_db,
        pool::postgres::PostgresPool,
        sqlx::postgres::{USER_LOCK_SPACE, user_lock_key},
        wallet_db,
    },
};
use fastrace::trace;
use indoc::indoc;
use sqlx::{
    Postgres, QueryBuilder, Row,
    postgres::{PgRow, types::PgInterval},
};
use std::time::Duration;

/// Postgres based implementation of [Storage].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
    statement_timeout: Duration,
}

impl PostgresStorage {
    /// Create a new [PostgresStorage] applying the given statement timeout to every
    /// transaction it begins.
    pub fn new(pool: PostgresPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    async fn begin_serializable(&self) -> Result<Tx, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // statement_timeout takes no bind parameters; the value is a config integer.
        let timeout_millis = self.statement_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_millis}"))
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }
}

impl Storage for PostgresStorage {
    #[trace]
    async fn begin_user_tx(&self, email: &str) -> Result<Tx, sqlx::Error> {
        let mut tx = self.begin_serializable().await?;

        // Held until the transaction ends; serializes all state-changing operations of
        // this user.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(USER_LOCK_SPACE)
            .bind(user_lock_key(email))
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    #[trace]
    async fn upsert_user(&self, email: &str, tx: &mut Tx) -> Result<User, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO users (email)
            VALUES ($1)
            ON CONFLICT (email)
            DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email
        "};

        let (id, email) = sqlx::query_as::<_, (i64, String)>(query)
            .bind(email)
            .fetch_one(&mut **tx)
            .await?;

        Ok(User { id, email })
    }

    #[trace]
    async fn get_user_by_email(
        &self,
        email: &str,
        tx: &mut Tx,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, email
            FROM users
            WHERE email = $1
        "};

        let user = sqlx::query_as::<_, (i64, String)>(query)
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?
            .map(|(id, email)| User { id, email });

        Ok(user)
    }

    #[trace]
    async fn ensure_user(&self, email: &str) -> Result<User, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO users (email)
            VALUES ($1)
            ON CONFLICT (email)
            DO UPDATE SET email = EXCLUDED.email
            RETURNING id, email
        "};

        let (id, email) = sqlx::query_as::<_, (i64, String)>(query)
            .bind(email)
            .fetch_one(&*self.pool)
            .await?;

        Ok(User { id, email })
    }

    #[trace]
    async fn get_book_by_isbn(
        &self,
        isbn: &str,
        tx: &mut Tx,
    ) -> Result<Option<Book>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, isbn, title, author, genre, sell_cents, borrow_cents, stock_cents,
                   available_copies, seeded_copies, created_at
            FROM books
            WHERE isbn = $1
        "};

        sqlx::query(query)
            .bind(isbn)
            .fetch_optional(&mut **tx)
            .await?
            .map(book_from_row)
            .transpose()
    }

    #[trace]
    async fn decrement_available_copies(
        &self,
        isbn: &str,
        tx: &mut Tx,
    ) -> Result<Option<i32>, sqlx::Error> {
        let query = indoc! {"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE isbn = $1
            AND available_copies >= 1
            RETURNING available_copies
        "};

        let available = sqlx::query_as::<_, (i32,)>(query)
            .bind(isbn)
            .fetch_optional(&mut **tx)
            .await?
            .map(|(available,)| available);

        Ok(available)
    }

    #[trace]
    async fn increment_available_copies(
        &self,
        book_id: i64,
        by: i32,
        tx: &mut Tx,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE books
            SET available_copies = available_copies + $2
            WHERE id = $1
        "};

        sqlx::query(query)
            .bind(book_id)
            .bind(by)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    #[trace]
    async fn find_active_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Borrow>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, user_id, book_id, borrowed_at, due_at, returned_at, status, active_key
            FROM borrows
            WHERE user_id = $1
            AND book_id = $2
            AND status = 'ACTIVE'
        "};

        sqlx::query(query)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(borrow_from_row)
            .transpose()
    }

    #[trace]
    async fn find_latest_returned_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Borrow>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, user_id, book_id, borrowed_at, due_at, returned_at, status, active_key
            FROM borrows
            WHERE user_id = $1
            AND book_id = $2
            AND status = 'RETURNED'
            ORDER BY returned_at DESC
            LIMIT 1
        "};

        sqlx::query(query)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(borrow_from_row)
            .transpose()
    }

    #[trace]
    async fn count_active_borrows(&self, user_id: i64, tx: &mut Tx) -> Result<i64, sqlx::Error> {
        let query = indoc! {"
            SELECT COUNT(*)
            FROM borrows
            WHERE user_id = $1
            AND status = 'ACTIVE'
        "};

        let (count,) = sqlx::query_as::<_, (i64,)>(query)
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(count)
    }

    #[trace]
    async fn insert_borrow(
        &self,
        user_id: i64,
        book_id: i64,
        borrow_period: Duration,
        tx: &mut Tx,
    ) -> Result<Borrow, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO borrows (user_id, book_id, due_at, status, active_key)
            VALUES ($1, $2, now() + $3, 'ACTIVE', $4)
            RETURNING id, user_id, book_id, borrowed_at, due_at, returned_at, status, active_key
        "};

        let period = PgInterval::try_from(borrow_period).map_err(sqlx::Error::Encode)?;
        let active_key = crate::domain::borrow_active_key(user_id, book_id);

        let row = sqlx::query(query)
            .bind(user_id)
            .bind(book_id)
            .bind(period)
            .bind(active_key)
            .fetch_one(&mut **tx)
            .await?;

        borrow_from_row(row)
    }

    #[trace]
    async fn return_borrow(&self, borrow_id: i64, tx: &mut Tx) -> Result<Borrow, sqlx::Error> {
        let query = indoc! {"
            UPDATE borrows
            SET status = 'RETURNED', returned_at = now(), active_key = NULL
            WHERE id = $1
            RETURNING id, user_id, book_id, borrowed_at, due_at, returned_at, status, active_key
        "};

        let row = sqlx::query(query)
            .bind(borrow_id)
            .fetch_one(&mut **tx)
            .await?;

        borrow_from_row(row)
    }

    #[trace]
    async fn count_active_purchases_for_book(
        &self,
        user_id: i64,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<i64, sqlx::Error> {
        let query = indoc! {"
            SELECT COUNT(*)
            FROM purchases
            WHERE user_id = $1
            AND book_id = $2
            AND status = 'ACTIVE'
        "};

        let (count,) = sqlx::query_as::<_, (i64,)>(query)
            .bind(user_id)
            .bind(book_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(count)
    }

    #[trace]
    async fn count_active_purchases(
        &self,
        user_id: i64,
        tx: &mut Tx,
    ) -> Result<i64, sqlx::Error> {
        let query = indoc! {"
            SELECT COUNT(*)
            FROM purchases
            WHERE user_id = $1
            AND status = 'ACTIVE'
        "};

        let (count,) = sqlx::query_as::<_, (i64,)>(query)
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(count)
    }

    #[trace]
    async fn insert_purchase(
        &self,
        user_id: i64,
        book_id: i64,
        price_cents: Cents,
        tx: &mut Tx,
    ) -> Result<Purchase, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO purchases (user_id, book_id, price_cents, status)
            VALUES ($1, $2, $3, 'ACTIVE')
            RETURNING id, user_id, book_id, price_cents, purchased_at, canceled_at, status
        "};

        let row = sqlx::query(query)
            .bind(user_id)
            .bind(book_id)
            .bind(price_cents)
            .fetch_one(&mut **tx)
            .await?;

        purchase_from_row(row)
    }

    #[trace]
    async fn get_purchase_for_update(
        &self,
        purchase_id: i64,
        user_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Purchase>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, user_id, book_id, price_cents, purchased_at, canceled_at, status
            FROM purchases
            WHERE id = $1
            AND user_id = $2
            FOR UPDATE
        "};

        sqlx::query(query)
            .bind(purchase_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(purchase_from_row)
            .transpose()
    }

    #[trace]
    async fn cancel_purchase(
        &self,
        purchase_id: i64,
        tx: &mut Tx,
    ) -> Result<Purchase, sqlx::Error> {
        let query = indoc! {"
            UPDATE purchases
            SET status = 'CANCELED', canceled_at = now()
            WHERE id = $1
            RETURNING id, user_id, book_id, price_cents, purchased_at, canceled_at, status
        "};

        let row = sqlx::query(query)
            .bind(purchase_id)
            .fetch_one(&mut **tx)
            .await?;

        purchase_from_row(row)
    }

    #[trace]
    async fn insert_job(&self, job: NewJob, tx: &mut Tx) -> Result<Option<Job>, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO jobs (job_type, status, payload, run_at, max_attempts, active_key,
                              book_id, borrow_id)
            VALUES ($1, 'PENDING', $2, $3, $4, $5, $6, $7)
            ON CONFLICT (active_key) DO NOTHING
            RETURNING id, job_type, status, payload, run_at, attempts, max_attempts,
                      locked_at, last_error, completed_at, active_key, book_id, borrow_id
        "};

        sqlx::query(query)
            .bind(job.job_type.as_str())
            .bind(&job.payload)
            .bind(job.run_at)
            .bind(job.max_attempts)
            .bind(&job.active_key)
            .bind(job.book_id)
            .bind(job.borrow_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(job_from_row)
            .transpose()
    }

    #[trace]
    async fn find_live_restock_job(
        &self,
        book_id: i64,
        tx: &mut Tx,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = indoc! {"
            SELECT id, job_type, status, payload, run_at, attempts, max_attempts,
                   locked_at, last_error, completed_at, active_key, book_id, borrow_id
            FROM jobs
            WHERE book_id = $1
            AND job_type = 'RESTOCK'
            AND active_key IS NOT NULL
        "};

        sqlx::query(query)
            .bind(book_id)
            .fetch_optional(&mut **tx)
            .await?
            .map(job_from_row)
            .transpose()
    }

    #[trace]
    async fn cancel_reminder_jobs(
        &self,
        borrow_id: i64,
        tx: &mut Tx,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE jobs
            SET status = 'CANCELED', active_key = NULL
            WHERE borrow_id = $1
            AND job_type = 'REMINDER'
            AND active_key IS NOT NULL
        "};

        sqlx::query(query)
            .bind(borrow_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
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
    async fn get_wallet(&self, tx: &mut Tx) -> Result<LibraryWallet, sqlx::Error> {
        let query = indoc! {"
            SELECT id, milestone_reached
            FROM library_wallets
            WHERE id = $1
        "};

        let (id, milestone_reached) = sqlx::query_as::<_, (String, bool)>(query)
            .bind(LIBRARY_WALLET_ID)
            .fetch_one(&mut **tx)
            .await?;

        Ok(LibraryWallet {
            id,
            milestone_reached,
        })
    }

    #[trace]
    async fn set_milestone_reached(&self, tx: &mut Tx) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE library_wallets
            SET milestone_reached = TRUE
            WHERE id = $1
        "};

        sqlx::query(query)
            .bind(LIBRARY_WALLET_ID)
            .execute(&mut **tx)
            .await?;

        Ok(())
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
    async fn list_books(
        &self,
        filter: &BookFilter,
        page: PageRequest,
    ) -> Result<Page<Book>, sqlx::Error> {
        fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
            for (column, pattern) in [
                ("title", &filter.title),
                ("author", &filter.author),
                ("genre", &filter.genre),
            ] {
                if let Some(pattern) = pattern {
                    query.push(format!(" AND {column} ILIKE "));
                    query.push_bind(format!("%{pattern}%"));
                }
            }
        }

        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books WHERE TRUE");
        push_filter(&mut count_query, filter);
        let (total,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&*self.pool)
            .await?;

        let mut select_query = QueryBuilder::<Postgres>::new(
            "SELECT id, isbn, title, author, genre, sell_cents, borrow_cents, stock_cents, \
             available_copies, seeded_copies, created_at FROM books WHERE TRUE",
        );
        push_filter(&mut select_query, filter);
        select_query.push(" ORDER BY title ASC, id ASC LIMIT ");
        select_query.push_bind(page.limit());
        select_query.push(" OFFSET ");
        select_query.push_bind(page.offset());

        let books = select_query
            .build()
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(book_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(books, total, page))
    }

    #[trace]
    async fn wallet_overview(&self) -> Result<(Cents, bool), sqlx::Error> {
        let balance = wallet_db::postgres::balance(&*self.pool).await?;

        let (milestone_reached,) =
            sqlx::query_as::<_, (bool,)>("SELECT milestone_reached FROM library_wallets WHERE id = $1")
                .bind(LIBRARY_WALLET_ID)
                .fetch_one(&*self.pool)
                .await?;

        Ok((balance, milestone_reached))
    }

    #[trace]
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: PageRequest,
    ) -> Result<Page<WalletMovement>, sqlx::Error> {
        wallet_db::postgres::list(filter, page, &self.pool).await
    }

    #[trace]
    async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<Job>, sqlx::Error> {
        fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
            if let Some(status) = filter.status {
                query.push(" AND status = ");
                query.push_bind(status.as_str());
            }
            if let Some(job_type) = filter.job_type {
                query.push(" AND job_type = ");
                query.push_bind(job_type.as_str());
            }
        }

        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs WHERE TRUE");
        push_filter(&mut count_query, filter);
        let (total,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&*self.pool)
            .await?;

        let mut select_query = QueryBuilder::<Postgres>::new(
            "SELECT id, job_type, status, payload, run_at, attempts, max_attempts, locked_at, \
             last_error, completed_at, active_key, book_id, borrow_id FROM jobs WHERE TRUE",
        );
        push_filter(&mut select_query, filter);
        select_query.push(" ORDER BY run_at ASC, id ASC LIMIT ");
        select_query.push_bind(page.limit());
        select_query.push(" OFFSET ");
        select_query.push_bind(page.offset());

        let jobs = select_query
            .build()
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(job_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(jobs, total, page))
    }

    #[trace]
    async fn list_emails(
        &self,
        email_type: Option<EmailType>,
        page: PageRequest,
    ) -> Result<Page<SimulatedEmail>, sqlx::Error> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM simulated_emails WHERE TRUE");
        if let Some(email_type) = email_type {
            count_query.push(" AND email_type = ");
            count_query.push_bind(email_type.as_str());
        }
        let (total,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&*self.pool)
            .await?;

        let mut select_query = QueryBuilder::<Postgres>::new(
            "SELECT id, recipient, subject, body, email_type, dedupe_key, created_at \
             FROM simulated_emails WHERE TRUE",
        );
        if let Some(email_type) = email_type {
            select_query.push(" AND email_type = ");
            select_query.push_bind(email_type.as_str());
        }
        select_query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        select_query.push_bind(page.limit());
        select_query.push(" OFFSET ");
        select_query.push_bind(page.offset());

        let emails = select_query
            .build()
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(email_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(emails, total, page))
    }

    #[trace]
    async fn list_events(
        &self,
        event_type: Option<EventType>,
        page: PageRequest,
    ) -> Result<Page<Event>, sqlx::Error> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events WHERE TRUE");
        if let Some(event_type) = event_type {
            count_query.push(" AND event_type = ");
            count_query.push_bind(event_type.as_str());
        }
        let (total,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&*self.pool)
            .await?;

        let mut select_query = QueryBuilder::<Postgres>::new(
            "SELECT id, event_type, user_id, book_id, borrow_id, purchase_id, job_id, \
             metadata, dedupe_key, created_at FROM events WHERE TRUE",
        );
        if let Some(event_type) = event_type {
            select_query.push(" AND event_type = ");
            select_query.push_bind(event_type.as_str());
        }
        select_query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        select_query.push_bind(page.limit());
        select_query.push(" OFFSET ");
        select_query.push_bind(page.offset());

        let events = select_query
            .build()
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(events, total, page))
    }

    #[trace]
    async fn get_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
    ) -> Result<Option<IdempotencyCell>, sqlx::Error> {
        let query = indoc! {"
            SELECT response, status_code, expires_at
            FROM idempotency_keys
            WHERE key = $1
            AND user_id = $2
            AND endpoint = $3
        "};

        let cell = sqlx::query_as::<_, (serde_json::Value, i32, DateTime<Utc>)>(query)
            .bind(key)
            .bind(user_id)
            .bind(endpoint)
            .fetch_optional(&*self.pool)
            .await?
            .map(|(response, status_code, expires_at)| IdempotencyCell {
                response,
                status_code,
                expires_at,
            });

        Ok(cell)
    }

    #[trace]
    async fn delete_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            DELETE FROM idempotency_keys
            WHERE key = $1
            AND user_id = $2
            AND endpoint = $3
        "};

        sqlx::query(query)
            .bind(key)
            .bind(user_id)
            .bind(endpoint)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn put_idempotency_cell(
        &self,
        key: &str,
        user_id: i64,
        endpoint: &str,
        status_code: i32,
        response: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO idempotency_keys (key, user_id, endpoint, response, status_code, expires_at)
            VALUES ($1, $2, $3, $4, $5, now() + $6)
            ON CONFLICT (key, user_id, endpoint) DO NOTHING
        "};

        let ttl = PgInterval::try_from(ttl).map_err(sqlx::Error::Encode)?;

        sqlx::query(query)
            .bind(key)
            .bind(user_id)
            .bind(endpoint)
            .bind(response)
            .bind(status_code)
            .bind(ttl)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

fn book_from_row(row: PgRow) -> Result<Book, sqlx::Error> {
    Ok(Book {
        id: row.try_get("id")?,
        isbn: row.try_get("isbn")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        genre: row.try_get("genre")?,
        sell_cents: Cents(row.try_get::<i64, _>("sell_cents")?),
        borrow_cents: Cents(row.try_get::<i64, _>("borrow_cents")?),
        stock_cents: Cents(row.try_get::<i64, _>("stock_cents")?),
        available_copies: row.try_get("available_copies")?,
        seeded_copies: row.try_get("seeded_copies")?,
        created_at: row.try_get("created_at")?,
    })
}

fn borrow_from_row(row: PgRow) -> Result<Borrow, sqlx::Error> {
    let status = row
        .try_get::<String, _>("status")?
        .parse::<BorrowStatus>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(Borrow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        borrowed_at: row.try_get("borrowed_at")?,
        due_at: row.try_get("due_at")?,
        returned_at: row.try_get("returned_at")?,
        status,
        active_key: row.try_get("active_key")?,
    })
}

fn purchase_from_row(row: PgRow) -> Result<Purchase, sqlx::Error> {
    let status = row
        .try_get::<String, _>("status")?
        .parse::<PurchaseStatus>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(Purchase {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        price_cents: Cents(row.try_get::<i64, _>("price_cents")?),
        purchased_at: row.try_get("purchased_at")?,
        canceled_at: row.try_get("canceled_at")?,
        status,
    })
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

fn email_from_row(row: PgRow) -> Result<SimulatedEmail, sqlx::Error> {
    let email_type = row
        .try_get::<String, _>("email_type")?
        .parse::<EmailType>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(SimulatedEmail {
        id: row.try_get("id")?,
        recipient: row.try_get("recipient")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        email_type,
        dedupe_key: row.try_get("dedupe_key")?,
        created_at: row.try_get("created_at")?,
    })
}

fn event_from_row(row: PgRow) -> Result<Event, sqlx::Error> {
    let event_type = row
        .try_get::<String, _>("event_type")?
        .parse::<EventType>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(Event {
        id: row.try_get("id")?,
        event_type,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        borrow_id: row.try_get("borrow_id")?,
        purchase_id: row.try_get("purchase_id")?,
        job_id: row.try_get("job_id")?,
        metadata: row.try_get("metadata")?,
        dedupe_key: row.try_get("dedupe_key")?,
        created_at: row.try_get("created_at")?,
    })
}
