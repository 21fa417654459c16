// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composite health checks over the custody provider and account store.
//!
//! Each dependency probe is timed out independently so the aggregate
//! check completes in bounded time even if a dependency hangs.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{timeout, Instant};
use tracing::warn;
use utoipa::ToSchema;

use crate::custody::CustodyProvider;
use crate::storage::AccountStore;

/// Health verdict for one component or the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Responding, but slower than the configured threshold.
    Degraded,
    Unhealthy,
}

/// Probe result for one dependency.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    /// Observed probe latency. Capped at the probe timeout when the
    /// dependency never answered.
    pub latency_ms: u64,
}

/// Aggregate health report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub custody: ComponentHealth,
    pub store: ComponentHealth,
}

pub struct HealthAggregator {
    custody: Arc<dyn CustodyProvider>,
    store: Arc<dyn AccountStore>,
    probe_timeout: Duration,
    degraded_threshold: Duration,
}

impl HealthAggregator {
    pub fn new(custody: Arc<dyn CustodyProvider>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            custody,
            store,
            probe_timeout: Duration::from_secs(5),
            degraded_threshold: Duration::from_millis(1500),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_degraded_threshold(mut self, degraded_threshold: Duration) -> Self {
        self.degraded_threshold = degraded_threshold;
        self
    }

    /// Probe both dependencies concurrently. Overall is the worst of the
    /// parts: unhealthy if either is unhealthy, degraded if either is
    /// slow, healthy otherwise.
    pub async fn check(&self) -> HealthReport {
        let (custody, store) = tokio::join!(self.probe_custody(), self.probe_store());
        let overall = custody.status.max(store.status);
        HealthReport {
            overall,
            custody,
            store,
        }
    }

    async fn probe_custody(&self) -> ComponentHealth {
        let started = Instant::now();
        let result = timeout(self.probe_timeout, self.custody.organization_info()).await;
        match result {
            Ok(Ok(_)) => self.classify_latency(started.elapsed()),
            Ok(Err(e)) => {
                warn!(error = %e, "custody health probe failed");
                ComponentHealth {
                    status: HealthStatus::Unhealthy,
                    latency_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(_) => ComponentHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: self.probe_timeout.as_millis() as u64,
            },
        }
    }

    async fn probe_store(&self) -> ComponentHealth {
        let started = Instant::now();
        let result = timeout(self.probe_timeout, self.store.ping()).await;
        match result {
            Ok(Ok(())) => self.classify_latency(started.elapsed()),
            Ok(Err(e)) => {
                warn!(error = %e, "store health probe failed");
                ComponentHealth {
                    status: HealthStatus::Unhealthy,
                    latency_ms: started.elapsed().as_millis() as u64,
                }
            }
            Err(_) => ComponentHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: self.probe_timeout.as_millis() as u64,
            },
        }
    }

    fn classify_latency(&self, elapsed: Duration) -> ComponentHealth {
        let status = if elapsed > self.degraded_threshold {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        ComponentHealth {
            status,
            latency_ms: elapsed.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::chains::Chain;
    use crate::custody::{CustodyAccount, CustodyError, OrganizationInfo};
    use crate::storage::{Account, StoreError, StoreResult};

    struct FakeCustody {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl CustodyProvider for FakeCustody {
        async fn get_or_create_wallet(&self, _user_id: &str) -> Result<String, CustodyError> {
            unimplemented!("not used by health probes")
        }

        async fn create_account(
            &self,
            _wallet_id: &str,
            _chain: Chain,
            _user_id: &str,
        ) -> Result<CustodyAccount, CustodyError> {
            unimplemented!("not used by health probes")
        }

        async fn organization_info(&self) -> Result<OrganizationInfo, CustodyError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(CustodyError::Network("connection refused".to_string()));
            }
            Ok(OrganizationInfo {
                organization_id: "org-1".to_string(),
                organization_name: None,
            })
        }
    }

    struct FakeStore {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl AccountStore for FakeStore {
        async fn active_accounts(&self, _user_id: &str) -> StoreResult<Vec<Account>> {
            Ok(Vec::new())
        }

        async fn upsert_accounts(
            &self,
            _user_id: &str,
            accounts: Vec<Account>,
        ) -> StoreResult<Vec<Account>> {
            Ok(accounts)
        }

        async fn ping(&self) -> StoreResult<()> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(StoreError::Serde(
                    serde_json::from_str::<serde_json::Value>("not json").unwrap_err(),
                ));
            }
            Ok(())
        }
    }

    fn aggregator(custody: FakeCustody, store: FakeStore) -> HealthAggregator {
        HealthAggregator::new(Arc::new(custody), Arc::new(store))
            .with_probe_timeout(Duration::from_millis(100))
            .with_degraded_threshold(Duration::from_millis(30))
    }

    fn fast() -> Duration {
        Duration::ZERO
    }

    #[tokio::test]
    async fn healthy_when_both_probes_are_fast() {
        let report = aggregator(
            FakeCustody {
                delay: fast(),
                fail: false,
            },
            FakeStore {
                delay: fast(),
                fail: false,
            },
        )
        .check()
        .await;

        assert_eq!(report.overall, HealthStatus::Healthy);
        assert_eq!(report.custody.status, HealthStatus::Healthy);
        assert_eq!(report.store.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn degraded_when_a_probe_is_slow() {
        let report = aggregator(
            FakeCustody {
                delay: Duration::from_millis(50),
                fail: false,
            },
            FakeStore {
                delay: fast(),
                fail: false,
            },
        )
        .check()
        .await;

        assert_eq!(report.custody.status, HealthStatus::Degraded);
        assert_eq!(report.store.status, HealthStatus::Healthy);
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn unhealthy_when_a_probe_fails() {
        let report = aggregator(
            FakeCustody {
                delay: fast(),
                fail: true,
            },
            FakeStore {
                delay: fast(),
                fail: false,
            },
        )
        .check()
        .await;

        assert_eq!(report.custody.status, HealthStatus::Unhealthy);
        assert_eq!(report.overall, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn unhealthy_when_a_probe_hangs_past_the_timeout() {
        let report = aggregator(
            FakeCustody {
                delay: fast(),
                fail: false,
            },
            FakeStore {
                delay: Duration::from_secs(10),
                fail: false,
            },
        )
        .check()
        .await;

        assert_eq!(report.store.status, HealthStatus::Unhealthy);
        assert_eq!(report.store.latency_ms, 100);
        assert_eq!(report.overall, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn unhealthy_beats_degraded_in_the_aggregate() {
        let report = aggregator(
            FakeCustody {
                delay: Duration::from_millis(50),
                fail: false,
            },
            FakeStore {
                delay: fast(),
                fail: true,
            },
        )
        .check()
        .await;

        assert_eq!(report.custody.status, HealthStatus::Degraded);
        assert_eq!(report.store.status, HealthStatus::Unhealthy);
        assert_eq!(report.overall, HealthStatus::Unhealthy);
    }
}
