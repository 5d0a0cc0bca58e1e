// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

mod metrics;

use crate::{
    application::metrics::Metrics,
    domain::{HandlerError, reminder, restock, storage::Storage},
};
use anyhow::Context;
use async_stream::try_stream;
use commerce_common::domain::{Job, JobType, retry_delay};
use fastrace::trace;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{pin::pin, time::Duration};
use tokio::{
    select,
    signal::unix::Signal,
    task,
    time::{sleep, timeout},
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Sleep between polls when no job is due.
    #[serde(with = "humantime_serde", default = "poll_interval_default")]
    pub poll_interval: Duration,

    /// How long a claim stays exclusive; an expired lease makes a stuck PROCESSING job
    /// reclaimable.
    #[serde(with = "humantime_serde", default = "lease_default")]
    pub lease: Duration,

    /// Max jobs fetched per poll.
    #[serde(default = "batch_size_default")]
    pub batch_size: i64,

    /// Timeout around one handler invocation; also the statement timeout of handler
    /// transactions.
    #[serde(with = "humantime_serde", default = "handler_timeout_default")]
    pub handler_timeout: Duration,

    /// Base of the exponential retry backoff.
    #[serde(with = "humantime_serde", default = "backoff_base_default")]
    pub backoff_base: Duration,

    /// Upper bound of the retry backoff.
    #[serde(with = "humantime_serde", default = "backoff_cap_default")]
    pub backoff_cap: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: poll_interval_default(),
            lease: lease_default(),
            batch_size: batch_size_default(),
            handler_timeout: handler_timeout_default(),
            backoff_base: backoff_base_default(),
            backoff_cap: backoff_cap_default(),
        }
    }
}

fn poll_interval_default() -> Duration {
    Duration::from_secs(5)
}

fn lease_default() -> Duration {
    Duration::from_secs(60)
}

fn batch_size_default() -> i64 {
    10
}

fn handler_timeout_default() -> Duration {
    Duration::from_secs(30)
}

fn backoff_base_default() -> Duration {
    Duration::from_secs(60)
}

fn backoff_cap_default() -> Duration {
    Duration::from_secs(3600)
}

/// Run the job runner until it fails or SIGTERM arrives.
pub async fn run(
    config: Config,
    storage: impl Storage,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let process_jobs_task = task::spawn({
        async move {
            let metrics = Metrics;

            let batches = due_job_batches(
                config.poll_interval,
                config.lease,
                config.batch_size,
                &storage,
            );
            let mut batches = pin!(batches);

            while let Some(batch) = batches.next().await {
                let batch = batch.context("get next batch of due jobs")?;

                for job in batch {
                    process_job(&config, &storage, &metrics, job).await?;
                }
            }

            warn!("process_jobs_task completed");

            Ok::<(), anyhow::Error>(())
        }
    });

    select! {
        result = process_jobs_task => result
            .context("process_jobs_task panicked")
            .and_then(|r| r.context("process_jobs_task failed")),

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}

/// Repeatedly query the due jobs, sleeping between polls only when nothing was due, so a
/// backlog is drained without artificial delay.
fn due_job_batches(
    poll_interval: Duration,
    lease: Duration,
    batch_size: i64,
    storage: &impl Storage,
) -> impl Stream<Item = Result<Vec<Job>, sqlx::Error>> + '_ {
    try_stream! {
        loop {
            let jobs = storage.due_jobs(lease, batch_size).await?;

            if jobs.is_empty() {
                sleep(poll_interval).await;
                continue;
            }

            yield jobs;
        }
    }
}

#[trace]
async fn process_job(
    config: &Config,
    storage: &impl Storage,
    metrics: &Metrics,
    job: Job,
) -> anyhow::Result<()> {
    // The claim is an atomic conditional update; zero affected rows means another worker
    // won.
    let Some(attempts) = storage
        .claim_job(job.id, config.lease)
        .await
        .context("claim job")?
    else {
        return Ok(());
    };
    metrics.claimed(job.job_type);

    let outcome = match timeout(config.handler_timeout, dispatch(storage, &job)).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(HandlerError::Timeout),
    };

    match outcome {
        Ok(()) => {
            storage.complete_job(job.id).await.context("complete job")?;
            metrics.completed(job.job_type);
            info!(job_id = job.id, job_type = job.job_type.as_str(), attempts; "job completed");
        }

        Err(error) => {
            let last_error = error.to_string();

            if attempts >= job.max_attempts {
                storage
                    .fail_job(job.id, &last_error)
                    .await
                    .context("fail job")?;
                metrics.failed(job.job_type);
                warn!(
                    job_id = job.id,
                    job_type = job.job_type.as_str(),
                    attempts,
                    last_error;
                    "job failed permanently"
                );
            } else {
                let delay = retry_delay(attempts, config.backoff_base, config.backoff_cap);
                storage
                    .reschedule_job(job.id, delay, &last_error)
                    .await
                    .context("reschedule job")?;
                metrics.rescheduled(job.job_type);
                debug!(
                    job_id = job.id,
                    job_type = job.job_type.as_str(),
                    attempts,
                    delay:?,
                    last_error;
                    "job rescheduled"
                );
            }
        }
    }

    Ok(())
}

async fn dispatch(storage: &impl Storage, job: &Job) -> Result<(), HandlerError> {
    match job.job_type {
        JobType::Restock => restock::handle(storage, job).await,
        JobType::Reminder => reminder::handle(storage, job).await,
    }
}
