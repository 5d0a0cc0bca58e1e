// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

/// SQLSTATE of unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE of serializable isolation conflicts.
const SERIALIZATION_FAILURE: &str = "40001";

/// Lock space for per-user advisory locks, separating them from any other advisory lock
/// user of the same database.
pub const USER_LOCK_SPACE: i32 = 101;

/// Whether the given error is a unique constraint violation.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(e) if e.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

/// Whether the given error is a serializable isolation conflict; such errors surface to
/// the client which is expected to retry.
pub fn is_serialization_failure(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(e) if e.code().as_deref() == Some(SERIALIZATION_FAILURE)
    )
}

/// Map a unique violation to the given value, propagating any other error. Used where a
/// duplicate insert with a dedupe key means "already happened, treat as success".
pub fn ignore_unique_violation<T>(
    error: sqlx::Error,
    value: impl FnOnce() -> T,
) -> Result<T, sqlx::Error> {
    if is_unique_violation(&error) {
        Ok(value())
    } else {
        Err(error)
    }
}

/// Fold a user email into a 32-bit advisory lock key: djb2-like `((h << 5) - h) + byte`
/// with the absolute value taken at the end. Collisions between unrelated users are rare
/// and only cost unnecessary serialization, never correctness.
pub fn user_lock_key(email: &str) -> i32 {
    let mut hash: i32 = 0;
    for byte in email.bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(byte as i32);
    }
    hash.wrapping_abs()
}
