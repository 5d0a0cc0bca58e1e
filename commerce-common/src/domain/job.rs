// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::ledger::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Restock,
    Reminder,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Restock => "RESTOCK",
            JobType::Reminder => "REMINDER",
        }
    }
}

impl FromStr for JobType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RESTOCK" => Ok(JobType::Restock),
            "REMINDER" => Ok(JobType::Reminder),
            other => Err(UnknownVariant("job type", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Canceled => "CANCELED",
        }
    }

    /// Terminal states must have cleared their `active_key`, releasing the logical slot.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELED" => Ok(JobStatus::Canceled),
            other => Err(UnknownVariant("job status", other.to_string())),
        }
    }
}

/// A durable job row. `active_key` is non-NULL exactly while the job is schedulable
/// (PENDING or PROCESSING); its unique index keeps at most one live job per logical key.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub payload: serde_json::Value,
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

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
    pub max_attempts: i32,
    pub active_key: String,
    pub book_id: Option<i64>,
    pub borrow_id: Option<i64>,
}

/// Payload of a RESTOCK job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockPayload {
    pub book_id: i64,
    pub isbn: String,
}

/// Payload of a REMINDER job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub borrow_id: i64,
    pub user_email: String,
}

/// Logical slot key of the single live restock job per book.
pub fn restock_active_key(book_id: i64) -> String {
    format!("RESTOCK:{book_id}")
}

/// Logical slot key of the single live reminder job per borrow.
pub fn reminder_active_key(borrow_id: i64) -> String {
    format!("REMINDER:{borrow_id}")
}

/// Retry delay after the given attempt (1-based): `base` doubled per failed attempt,
/// capped at `cap`.
pub fn retry_delay(attempts: i32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 31) as u32;
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(60);
    const CAP: Duration = Duration::from_secs(3600);

    #[test]
    fn test_retry_delay() {
        assert_eq!(retry_delay(1, BASE, CAP), Duration::from_secs(60));
        assert_eq!(retry_delay(2, BASE, CAP), Duration::from_secs(120));
        assert_eq!(retry_delay(3, BASE, CAP), Duration::from_secs(240));
        assert_eq!(retry_delay(6, BASE, CAP), Duration::from_secs(1920));
        // 60 * 2^6 = 3840 exceeds the cap.
        assert_eq!(retry_delay(7, BASE, CAP), CAP);
        assert_eq!(retry_delay(100, BASE, CAP), CAP);
    }

    #[test]
    fn test_active_keys() {
        assert_eq!(restock_active_key(42), "RESTOCK:42");
        assert_eq!(reminder_active_key(7), "REMINDER:7");
    }

    #[test]
    fn test_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
