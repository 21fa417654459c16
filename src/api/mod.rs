// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    chains::Chain,
    health::{ComponentHealth, HealthReport, HealthStatus},
    models::{
        AccountListResponse, AccountView, ProvisionRequest, ProvisionResponse, ProvisionedAccount,
    },
    provisioning::ErrorDetail,
    state::AppState,
    storage::AccountStatus,
};

pub mod health;
pub mod provision;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/provision", post(provision::provision))
        .route("/accounts/{user_id}", get(provision::list_accounts));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        provision::provision,
        provision::list_accounts,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ProvisionRequest,
            ProvisionResponse,
            ProvisionedAccount,
            AccountListResponse,
            AccountView,
            AccountStatus,
            Chain,
            ErrorDetail,
            HealthReport,
            ComponentHealth,
            HealthStatus,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Provisioning", description = "Custody wallet and account provisioning"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
