// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

mod config;

#[tokio::main]
async fn main() {
    use commerce_common::telemetry;
    use log::error;
    use std::panic;

    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    use crate::config::Config;
    use anyhow::Context;
    use commerce_api::infra::api::AxumApi;
    use commerce_common::{config::ConfigExt, infra::migrations, infra::pool, telemetry};
    use log::info;
    use tokio::{select, signal::unix::{SignalKind, signal}, task};

    let api_sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let runner_sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        api_config,
        engine_config,
        runner_config,
        storage_config,
        telemetry_config,
    } = config;

    telemetry::init_metrics(telemetry_config);

    let pool = pool::postgres::PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;

    if run_migrations {
        migrations::postgres::run(&pool)
            .await
            .context("run migrations for Postgres")?;
        migrations::postgres::seed_books(&pool)
            .await
            .context("seed books")?;
    }

    let api_storage = commerce_api::infra::storage::PostgresStorage::new(
        pool.clone(),
        engine_config.statement_timeout,
    );
    let api = AxumApi::new(api_config, api_storage, engine_config);

    let runner_storage =
        job_runner::infra::storage::PostgresStorage::new(pool, runner_config.handler_timeout);

    let api_task = task::spawn(commerce_api::application::run(api, api_sigterm));
    let runner_task = task::spawn(job_runner::application::run(
        runner_config,
        runner_storage,
        runner_sigterm,
    ));

    select! {
        result = api_task => result
            .context("api_task panicked")
            .and_then(|r| r.context("api_task failed")),

        result = runner_task => result
            .context("runner_task panicked")
            .and_then(|r| r.context("runner_task failed")),
    }
}
