// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use commerce_common::domain::JobType;
use metrics::counter;

/// Runner metrics, exported via the Prometheus listener when one is configured.
pub struct Metrics;

impl Metrics {
    pub fn claimed(&self, job_type: JobType) {
        counter!("commerce_jobs_claimed_total", "type" => job_type.as_str()).increment(1);
    }

    pub fn completed(&self, job_type: JobType) {
        counter!("commerce_jobs_completed_total", "type" => job_type.as_str()).increment(1);
    }

    pub fn failed(&self, job_type: JobType) {
        counter!("commerce_jobs_failed_total", "type" => job_type.as_str()).increment(1);
    }

    pub fn rescheduled(&self, job_type: JobType) {
        counter!("commerce_jobs_rescheduled_total", "type" => job_type.as_str()).increment(1);
    }
}
