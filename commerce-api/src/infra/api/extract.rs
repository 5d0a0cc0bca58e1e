// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use super::{ADMIN_EMAIL, error::ApiError};
use axum::{extract::FromRequestParts, http::request::Parts};

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// The caller identity taken from the `X-User-Email` header, normalized to lower case.
#[derive(Debug, Clone)]
pub struct UserEmail(pub String);

impl<S> FromRequestParts<S> for UserEmail
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_EMAIL_HEADER) else {
            return Err(ApiError::user_email_required());
        };

        let email = value
            .to_str()
            .map_err(|_| ApiError::invalid_email())?
            .trim()
            .to_ascii_lowercase();

        if !is_valid_email(&email) {
            return Err(ApiError::invalid_email());
        }

        Ok(UserEmail(email))
    }
}

/// Caller identity that must match the admin email literal.
#[derive(Debug, Clone)]
pub struct AdminEmail(pub String);

impl<S> FromRequestParts<S> for AdminEmail
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let UserEmail(email) = UserEmail::from_request_parts(parts, state).await?;
        if email != ADMIN_EMAIL {
            return Err(ApiError::forbidden());
        }
        Ok(AdminEmail(email))
    }
}

/// The optional `X-Idempotency-Key` header; blank values count as absent.
#[derive(Debug, Clone)]
pub struct IdempotencyKey(pub Option<String>);

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(IdempotencyKey(key))
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !email.contains(' ')
}
