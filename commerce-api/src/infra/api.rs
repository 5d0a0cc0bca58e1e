// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

pub mod admin;
pub mod books;
pub mod error;
pub mod extract;
pub mod idempotency;
pub mod purchases;
pub mod response;

use crate::{
    domain::{Api, EngineConfig},
    infra::storage::PostgresStorage,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::{io, net::IpAddr};
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// Email granting access to the admin read paths.
pub const ADMIN_EMAIL: &str = "admin@dummy-library.com";

#[derive(Clone)]
pub struct AppState {
    pub storage: PostgresStorage,
    pub engine_config: EngineConfig,
}

pub struct AxumApi {
    config: Config,
    state: AppState,
}

impl AxumApi {
    pub fn new(config: Config, storage: PostgresStorage, engine_config: EngineConfig) -> Self {
        Self {
            config,
            state: AppState {
                storage,
                engine_config,
            },
        }
    }
}

impl Api for AxumApi {
    type Error = AxumApiError;

    async fn serve(self) -> Result<(), Self::Error> {
        let Config {
            address,
            port,
            request_body_limit,
        } = self.config;

        let app = make_app(self.state, request_body_limit as usize);

        let listener = tokio::net::TcpListener::bind((address, port))
            .await
            .map_err(AxumApiError::Bind)?;
        info!(address:?, port; "listening to TCP connections");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(AxumApiError::Serve)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub address: IpAddr,
    pub port: u16,
    #[serde(with = "byte_unit_serde")]
    pub request_body_limit: u64,
}

#[derive(Debug, Error)]
pub enum AxumApiError {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot serve API")]
    Serve(#[source] io::Error),
}

pub fn make_app(state: AppState, request_body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/books", get(books::list))
        .route("/api/books/{isbn}/borrow", post(books::borrow))
        .route("/api/books/{isbn}/return", post(books::return_book))
        .route("/api/books/{isbn}/buy", post(books::buy))
        .route("/api/purchases/{id}/cancel", post(purchases::cancel))
        .route("/api/admin/wallet", get(admin::wallet))
        .route("/api/admin/wallet/movements", get(admin::movements))
        .route("/api/admin/jobs", get(admin::jobs))
        .route("/api/admin/emails", get(admin::emails))
        .route("/api/admin/events", get(admin::events))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(request_body_limit))
                .layer(CorsLayer::permissive()),
        )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&**state.storage.pool())
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(_error) => (StatusCode::SERVICE_UNAVAILABLE, "database not ready").into_response(),
    }
}

async fn shutdown_signal() {
    signal(SignalKind::terminate())
        .expect("install SIGTERM handler")
        .recv()
        .await;
}
