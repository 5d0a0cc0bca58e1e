// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "api")]
    pub api_config: commerce_api::infra::api::Config,

    #[serde(rename = "engine", default)]
    pub engine_config: commerce_api::domain::EngineConfig,

    #[serde(rename = "runner", default)]
    pub runner_config: job_runner::application::Config,

    #[serde(rename = "storage")]
    pub storage_config: commerce_common::infra::pool::postgres::Config,

    #[serde(rename = "telemetry", default)]
    pub telemetry_config: commerce_common::telemetry::Config,
}
