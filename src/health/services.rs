use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::warn;

use crate::{db::LivenessProbe, error::ConnectionError};

pub const HEALTHY: &str = "healthy";
pub const UNHEALTHY: &str = "unhealthy - database connection failed";

/// Probe budget for one health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
#[error("{status}: {source}")]
pub struct Unhealthy {
    pub status: &'static str,
    #[source]
    pub source: ConnectionError,
}

/// Turns the store's liveness into a status string.
#[derive(Clone)]
pub struct HealthService {
    probe: Arc<dyn LivenessProbe>,
    timeout: Duration,
}

impl HealthService {
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            probe,
            timeout: HEALTH_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn check(&self) -> Result<&'static str, Unhealthy> {
        match self.probe.probe(self.timeout).await {
            Ok(()) => Ok(HEALTHY),
            Err(source) => {
                warn!(error = %source, "health check failed");
                Err(Unhealthy {
                    status: UNHEALTHY,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Fixed-answer probe for tests.
    pub(crate) struct FakeProbe {
        pub healthy: bool,
    }

    #[async_trait]
    impl LivenessProbe for FakeProbe {
        async fn probe(&self, timeout: Duration) -> Result<(), ConnectionError> {
            if self.healthy {
                Ok(())
            } else {
                Err(ConnectionError::PingTimeout(timeout))
            }
        }
    }

    #[tokio::test]
    async fn healthy_store() {
        let svc = HealthService::new(Arc::new(FakeProbe { healthy: true }));
        assert_eq!(svc.check().await.unwrap(), HEALTHY);
    }

    #[tokio::test]
    async fn unreachable_store() {
        let svc = HealthService::new(Arc::new(FakeProbe { healthy: false }))
            .with_timeout(Duration::from_millis(10));
        let err = svc.check().await.unwrap_err();
        assert_eq!(err.status, UNHEALTHY);
        assert_ne!(err.status, HEALTHY);
        assert!(matches!(err.source, ConnectionError::PingTimeout(_)));
    }

    #[tokio::test]
    async fn uninitialized_database_is_unhealthy() {
        use crate::{config::{AppConfig, Env}, db::Database};

        let cfg = AppConfig::from_env(&Env::default()).unwrap();
        let svc = HealthService::new(Arc::new(Database::new(cfg.database)));
        let err = svc.check().await.unwrap_err();
        assert!(matches!(err.source, ConnectionError::NotInitialized));
    }
}
