// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use crate::domain::Api;
use anyhow::Context;
use log::warn;
use tokio::{select, signal::unix::Signal, task};

/// Serve the API until it fails or SIGTERM arrives.
pub async fn run(api: impl Api, mut sigterm: Signal) -> anyhow::Result<()> {
    let serve_api_task = task::spawn(async move {
        api.serve().await.context("serving commerce API")
    });

    select! {
        result = serve_api_task => result
            .context("serve_api_task panicked")
            .and_then(|r| r.context("serve_api_task failed")),

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}
