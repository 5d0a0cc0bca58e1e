// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! Postgres implementation of the wallet ledger: an append-only movement table whose sum
//! is the wallet balance. Appends are deduplicated by `dedupe_key`, which makes them
//! safely retryable across request retries, worker retries and idempotency replays.

use crate::{
    domain::{
        Cents, LIBRARY_WALLET_ID, MovementDirection, MovementFilter, MovementType,
        NewWalletMovement, Page, PageRequest, WalletMovement,
    },
    infra::pool::postgres::PostgresPool,
};
use chrono::{DateTime, Utc};
use fastrace::trace;
use indoc::indoc;
use sqlx::{PgExecutor, Postgres, QueryBuilder, Row, postgres::PgRow};

type Tx = sqlx::Transaction<'static, Postgres>;

/// Current wallet balance: `SUM(amount_cents)` over all movements of the library wallet.
#[trace]
pub async fn balance<'a>(executor: impl PgExecutor<'a>) -> Result<Cents, sqlx::Error> {
    let query = indoc! {"
        SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM wallet_movements
        WHERE wallet_id = $1
    "};

    let (balance,) = sqlx::query_as::<_, (i64,)>(query)
        .bind(LIBRARY_WALLET_ID)
        .fetch_one(executor)
        .await?;

    Ok(Cents(balance))
}

/// Append the given movement within the given transaction. A conflict on the dedupe key
/// means the movement was already appended by an earlier attempt; the pre-existing row is
/// returned and callers treat both outcomes as success.
#[trace]
pub async fn append(
    movement: NewWalletMovement,
    tx: &mut Tx,
) -> Result<WalletMovement, sqlx::Error> {
    let query = indoc! {"
        INSERT INTO wallet_movements (
            wallet_id,
            amount_cents,
            movement_type,
            reason,
            related_entity,
            dedupe_key
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (dedupe_key) DO NOTHING
        RETURNING id, created_at
    "};

    let inserted = sqlx::query_as::<_, (i64, DateTime<Utc>)>(query)
        .bind(LIBRARY_WALLET_ID)
        .bind(movement.amount_cents)
        .bind(movement.movement_type.as_str())
        .bind(&movement.reason)
        .bind(&movement.related_entity)
        .bind(&movement.dedupe_key)
        .fetch_optional(&mut **tx)
        .await?;

    match inserted {
        Some((id, created_at)) => Ok(WalletMovement {
            id,
            wallet_id: LIBRARY_WALLET_ID.to_string(),
            amount_cents: movement.amount_cents,
            movement_type: movement.movement_type,
            reason: movement.reason,
            related_entity: movement.related_entity,
            dedupe_key: movement.dedupe_key,
            created_at,
        }),

        // `ON CONFLICT DO NOTHING` returned no row, so a movement with this dedupe key
        // already exists.
        None => {
            let dedupe_key = movement.dedupe_key.as_deref().unwrap_or_default();
            by_dedupe_key(dedupe_key, &mut **tx)
                .await?
                .ok_or(sqlx::Error::RowNotFound)
        }
    }
}

/// Look up a movement by its dedupe key.
#[trace]
pub async fn by_dedupe_key<'a>(
    dedupe_key: &str,
    executor: impl PgExecutor<'a>,
) -> Result<Option<WalletMovement>, sqlx::Error> {
    let query = indoc! {"
        SELECT id, wallet_id, amount_cents, movement_type, reason, related_entity,
               dedupe_key, created_at
        FROM wallet_movements
        WHERE dedupe_key = $1
    "};

    sqlx::query(query)
        .bind(dedupe_key)
        .fetch_optional(executor)
        .await?
        .map(movement_from_row)
        .transpose()
}

/// List movements of the library wallet, newest first, filtered by direction and
/// creation date range.
#[trace]
pub async fn list(
    filter: &MovementFilter,
    page: PageRequest,
    pool: &PostgresPool,
) -> Result<Page<WalletMovement>, sqlx::Error> {
    let mut count_query =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM wallet_movements WHERE wallet_id = ");
    count_query.push_bind(LIBRARY_WALLET_ID);
    push_filter(&mut count_query, filter);

    let (total,) = count_query
        .build_query_as::<(i64,)>()
        .fetch_one(&**pool)
        .await?;

    let mut select_query = QueryBuilder::<Postgres>::new(
        "SELECT id, wallet_id, amount_cents, movement_type, reason, related_entity, \
         dedupe_key, created_at FROM wallet_movements WHERE wallet_id = ",
    );
    select_query.push_bind(LIBRARY_WALLET_ID);
    push_filter(&mut select_query, filter);
    select_query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    select_query.push_bind(page.limit());
    select_query.push(" OFFSET ");
    select_query.push_bind(page.offset());

    let movements = select_query
        .build()
        .fetch_all(&**pool)
        .await?
        .into_iter()
        .map(movement_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(movements, total, page))
}

fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
    match filter.direction {
        Some(MovementDirection::Credit) => {
            query.push(" AND amount_cents > 0");
        }
        Some(MovementDirection::Debit) => {
            query.push(" AND amount_cents < 0");
        }
        None => {}
    }

    if let Some(from) = filter.from {
        query.push(" AND created_at >= ");
        query.push_bind(from);
    }

    if let Some(to) = filter.to {
        query.push(" AND created_at <= ");
        query.push_bind(to);
    }
}

fn movement_from_row(row: PgRow) -> Result<WalletMovement, sqlx::Error> {
    let movement_type = row
        .try_get::<String, _>("movement_type")?
        .parse::<MovementType>()
        .map_err(|error| sqlx::Error::Decode(error.into()))?;

    Ok(WalletMovement {
        id: row.try_get("id")?,
        wallet_id: row.try_get("wallet_id")?,
        amount_cents: Cents(row.try_get::<i64, _>("amount_cents")?),
        movement_type,
        reason: row.try_get("reason")?,
        related_entity: row.try_get("related_entity")?,
        dedupe_key: row.try_get("dedupe_key")?,
        created_at: row.try_get("created_at")?,
    })
}
