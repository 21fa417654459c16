// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::health::HealthAggregator;
use crate::provisioning::ProvisioningOrchestrator;
use crate::storage::AccountStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ProvisioningOrchestrator>,
    pub store: Arc<dyn AccountStore>,
    pub health: Arc<HealthAggregator>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<ProvisioningOrchestrator>,
        store: Arc<dyn AccountStore>,
        health: Arc<HealthAggregator>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            health,
        }
    }
}
