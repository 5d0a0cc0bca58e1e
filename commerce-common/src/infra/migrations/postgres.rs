// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::{
    domain::{Cents, LIBRARY_WALLET_ID},
    infra::pool::postgres::PostgresPool,
};
use indoc::indoc;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Run the database migrations for Postgres.
pub async fn run(pool: &PostgresPool) -> Result<(), Error> {
    sqlx::migrate!("migrations/postgres").run(&**pool).await?;
    Ok(())
}

/// Balance the wallet starts out with before any commerce happened.
const INITIAL_BALANCE: Cents = Cents(50_000);

/// Seed the book catalog and the wallet singleton if the catalog is empty. The
/// `seeded_copies` written here are the replenishment target used by restock jobs.
pub async fn seed_books(pool: &PostgresPool) -> Result<(), SeedError> {
    let query = "SELECT COUNT(*) FROM books";
    let (count,): (i64,) = sqlx::query_as(query).fetch_one(&**pool).await?;

    if count == 0 {
        let book_query = indoc! {"
            INSERT INTO books (
                isbn,
                title,
                author,
                genre,
                sell_cents,
                borrow_cents,
                stock_cents,
                available_copies,
                seeded_copies
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
        "};

        // (isbn, title, author, genre, sell, borrow, stock, copies); ISBNs are
        // UUID-shaped opaque strings supplied by the catalog owner.
        let books: &[(&str, &str, &str, &str, i64, i64, i64, i32)] = &[
            (
                "7b9a3c1e-0f64-4f0a-9b59-1a2e8c7d5f30",
                "The Master and Margarita",
                "Mikhail Bulgakov",
                "Fiction",
                1999,
                299,
                899,
                10,
            ),
            (
                "3f2d8a55-6c1b-4b8e-a7d2-90e4f6b1c8a2",
                "A Wizard of Earthsea",
                "Ursula K. Le Guin",
                "Fantasy",
                1499,
                249,
                699,
                8,
            ),
            (
                "b4e1f7c9-2a3d-45e6-8f01-6c7d8e9f0a1b",
                "The Left Hand of Darkness",
                "Ursula K. Le Guin",
                "Science Fiction",
                1599,
                249,
                749,
                6,
            ),
            (
                "9c8b7a65-4d3e-42f1-b0a9-8e7d6c5b4a39",
                "Invisible Cities",
                "Italo Calvino",
                "Fiction",
                1299,
                199,
                599,
                5,
            ),
            (
                "15d4e3f2-a1b0-4c9d-8e7f-6a5b4c3d2e1f",
                "The Name of the Rose",
                "Umberto Eco",
                "Mystery",
                2199,
                349,
                999,
                7,
            ),
            (
                "e6f5a4b3-c2d1-40e9-9f8a-7b6c5d4e3f2a",
                "Kindred",
                "Octavia E. Butler",
                "Science Fiction",
                1799,
                299,
                849,
                9,
            ),
            (
                "28a9b8c7-d6e5-4f40-a312-0b1c2d3e4f5a",
                "The Remains of the Day",
                "Kazuo Ishiguro",
                "Fiction",
                1399,
                229,
                649,
                4,
            ),
            (
                "c1d2e3f4-a5b6-4789-8abc-def012345678",
                "Piranesi",
                "Susanna Clarke",
                "Fantasy",
                1699,
                279,
                799,
                6,
            ),
        ];

        for (isbn, title, author, genre, sell, borrow, stock, copies) in books {
            sqlx::query(book_query)
                .bind(isbn)
                .bind(title)
                .bind(author)
                .bind(genre)
                .bind(sell)
                .bind(borrow)
                .bind(stock)
                .bind(copies)
                .execute(&**pool)
                .await?;
        }
    }

    sqlx::query("INSERT INTO library_wallets (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(LIBRARY_WALLET_ID)
        .execute(&**pool)
        .await?;

    let movement_query = indoc! {"
        INSERT INTO wallet_movements (
            wallet_id,
            amount_cents,
            movement_type,
            reason,
            dedupe_key
        )
        VALUES ($1, $2, 'INITIAL_BALANCE', 'initial funding', 'INITIAL_BALANCE')
        ON CONFLICT (dedupe_key) DO NOTHING
    "};

    sqlx::query(movement_query)
        .bind(LIBRARY_WALLET_ID)
        .bind(INITIAL_BALANCE)
        .execute(&**pool)
        .await?;

    Ok(())
}

/// Error possibly returned by [seed_books].
#[derive(Debug, Error)]
#[error("cannot seed books")]
pub struct SeedError(#[from] sqlx::Error);

/// Error possibly returned by [run].
#[derive(Debug, Error)]
#[error("cannot run migrations for postgres")]
pub struct Error(#[from] MigrateError);

#[cfg(test)]
mod tests {
    use crate::infra::{
        migrations::postgres::{run, seed_books},
        pool::{self, postgres::PostgresPool},
    };
    use anyhow::Context;
    use sqlx::{Row, postgres::PgSslMode};
    use std::{collections::HashSet, error::Error as StdError, time::Duration};
    use testcontainers::{ImageExt, runners::AsyncRunner};
    use testcontainers_modules::postgres::Postgres;

    #[tokio::test]
    async fn test_run_and_seed() -> Result<(), Box<dyn StdError>> {
        let postgres_container = Postgres::default()
            .with_db_name("commerce")
            .with_user("commerce")
            .with_password("commerce")
            .with_tag("17.1-alpine")
            .start()
            .await
            .context("start Postgres container")?;
        let postgres_port = postgres_container
            .get_host_port_ipv4(5432)
            .await
            .context("get Postgres port")?;

        let config = pool::postgres::Config {
            host: "localhost".to_string(),
            port: postgres_port,
            dbname: "commerce".to_string(),
            user: "commerce".to_string(),
            password: "commerce".into(),
            sslmode: PgSslMode::Prefer,
            max_connections: 10,
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(5 * 60),
        };
        let pool = PostgresPool::new(config).await?;

        run(&pool).await?;

        let table_names = sqlx::query(
            "SELECT tablename
             FROM pg_catalog.pg_tables
             WHERE schemaname = 'public'",
        )
        .fetch_all(&*pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>(0))
        .collect::<HashSet<_>>();

        for table in [
            "books",
            "users",
            "borrows",
            "purchases",
            "library_wallets",
            "wallet_movements",
            "jobs",
            "events",
            "simulated_emails",
            "idempotency_keys",
        ] {
            assert!(table_names.contains(table), "missing table {table}");
        }

        // Seeding is idempotent.
        seed_books(&pool).await?;
        seed_books(&pool).await?;

        let (book_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&*pool)
            .await?;
        assert!(book_count > 0);

        let (movement_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wallet_movements")
                .fetch_one(&*pool)
                .await?;
        assert_eq!(movement_count, 1);

        Ok(())
    }
}
