// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provisioning API endpoints.
//!
//! The HTTP layer validates shape and delegates; KYC gating happens in
//! the caller's onboarding flow before a request ever reaches this
//! service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::error::ApiError;
use crate::models::{AccountListResponse, AccountView, ProvisionRequest, ProvisionResponse};
use crate::provisioning::ProvisionError;
use crate::state::AppState;

/// Provision custody accounts for a user on the requested chains.
///
/// Partial failure is a 200: callers must inspect `failed`. The call is
/// only an error when nothing could be provisioned at all.
#[utoipa::path(
    post,
    path = "/v1/provision",
    tag = "Provisioning",
    request_body = ProvisionRequest,
    responses(
        (status = 200, description = "Provisioning completed (possibly partially)", body = ProvisionResponse),
        (status = 422, description = "Empty or entirely unsupported chain set"),
        (status = 502, description = "Custody wallet resolution failed or every chain failed", body = ProvisionResponse),
        (status = 500, description = "Accounts were created at the provider but could not be persisted")
    )
)]
pub async fn provision(
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<ProvisionResponse>), ApiError> {
    info!(user_id = %request.user_id, chains = ?request.chains, "provision requested");

    let outcome = state
        .orchestrator
        .provision(&request.user_id, &request.chains)
        .await
        .map_err(|e| match e {
            ProvisionError::Precondition(_) => ApiError::unprocessable(e.to_string()),
            ProvisionError::WalletResolution(_) => ApiError::bad_gateway(e.to_string()),
            ProvisionError::Persistence(_) => ApiError::internal(e.to_string()),
        })?;

    let status = if outcome.overall_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    Ok((status, Json(ProvisionResponse::from(&outcome))))
}

/// List a user's active provisioned accounts.
#[utoipa::path(
    get,
    path = "/v1/accounts/{user_id}",
    tag = "Provisioning",
    params(
        ("user_id" = String, Path, description = "User to list accounts for")
    ),
    responses(
        (status = 200, description = "Active accounts for the user", body = AccountListResponse)
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let accounts = state
        .store
        .active_accounts(&user_id)
        .await
        .map_err(|e| ApiError::internal(format!("failed to read accounts: {e}")))?;

    let accounts: Vec<AccountView> = accounts.into_iter().map(AccountView::from).collect();
    let total = accounts.len();

    Ok(Json(AccountListResponse {
        user_id,
        accounts,
        total,
    }))
}
