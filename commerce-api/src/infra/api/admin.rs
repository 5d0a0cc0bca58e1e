// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

//! Admin read paths, guarded by the admin email literal.

use super::{
    AppState,
    error::ApiError,
    extract::AdminEmail,
    response::{ApiEmail, ApiEvent, ApiJob, ApiMovement, PageResponse, WalletResponse},
};
use crate::domain::storage::{JobFilter, Storage};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use commerce_common::domain::{
    EmailType, EventType, JobStatus, JobType, MovementDirection, MovementFilter, PageRequest,
};
use serde::Deserialize;

pub async fn wallet(
    State(state): State<AppState>,
    AdminEmail(_): AdminEmail,
) -> Result<Json<WalletResponse>, ApiError> {
    let (balance, milestone_reached) = state.storage.wallet_overview().await?;
    Ok(Json(WalletResponse::new(balance, milestone_reached)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsQuery {
    #[serde(rename = "type")]
    pub direction: Option<MovementDirection>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn movements(
    State(state): State<AppState>,
    AdminEmail(_): AdminEmail,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<PageResponse<ApiMovement>>, ApiError> {
    let filter = MovementFilter {
        direction: query.direction,
        from: query.from,
        to: query.to,
    };
    let page = PageRequest::new(query.page, query.page_size);

    let movements = state.storage.list_movements(&filter, page).await?;

    Ok(Json(movements.map(ApiMovement::from).into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsQuery {
    pub status: Option<JobStatus>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn jobs(
    State(state): State<AppState>,
    AdminEmail(_): AdminEmail,
    Query(query): Query<JobsQuery>,
) -> Result<Json<PageResponse<ApiJob>>, ApiError> {
    let filter = JobFilter {
        status: query.status,
        job_type: query.job_type,
    };
    let page = PageRequest::new(query.page, query.page_size);

    let jobs = state.storage.list_jobs(&filter, page).await?;

    Ok(Json(jobs.map(ApiJob::from).into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailsQuery {
    #[serde(rename = "type")]
    pub email_type: Option<EmailType>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn emails(
    State(state): State<AppState>,
    AdminEmail(_): AdminEmail,
    Query(query): Query<EmailsQuery>,
) -> Result<Json<PageResponse<ApiEmail>>, ApiError> {
    let page = PageRequest::new(query.page, query.page_size);

    let emails = state.storage.list_emails(query.email_type, page).await?;

    Ok(Json(emails.map(ApiEmail::from).into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub async fn events(
    State(state): State<AppState>,
    AdminEmail(_): AdminEmail,
    Query(query): Query<EventsQuery>,
) -> Result<Json<PageResponse<ApiEvent>>, ApiError> {
    let page = PageRequest::new(query.page, query.page_size);

    let events = state.storage.list_events(query.event_type, page).await?;

    Ok(Json(events.map(ApiEvent::from).into()))
}
