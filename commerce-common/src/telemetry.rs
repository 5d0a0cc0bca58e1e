// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use log::error;
use logforth::{append, filter::env_filter::EnvFilterBuilder};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Address for the Prometheus metrics listener; metrics are disabled when absent.
    #[serde(default)]
    pub metrics_address: Option<SocketAddr>,
}

/// Initialize logging with an env-filtered (`RUST_LOG`) stderr appender.
pub fn init_logging() {
    logforth::starter_log::builder()
        .dispatch(|dispatch| {
            dispatch
                .filter(EnvFilterBuilder::from_default_env().build())
                .append(append::Stderr::default())
        })
        .apply();
}

/// Install the Prometheus metrics exporter if an address is configured.
pub fn init_metrics(config: Config) {
    if let Some(metrics_address) = config.metrics_address {
        if let Err(error) = PrometheusBuilder::new()
            .with_http_listener(metrics_address)
            .install()
        {
            error!(error:%; "cannot install Prometheus metrics exporter");
        }
    }
}
