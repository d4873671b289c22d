use crate::api::{Mode, ProbeKind, Resolution};
use crate::commands::{open_pipeline, Out};
use crate::{Config, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// The endpoint that answered and how much probing it took.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub endpoint: String,
    pub rounds: u32,
    pub probes: usize,
}

/// Probes the health candidates, up to `attempts` rounds with `interval` between them, until one
/// answers with a JSON object. Useful for waking up a backend that sleeps when idle.
///
/// # Errors
/// - Returns an error when no candidate answered in any round.
pub async fn health(
    config: &Config,
    mode: Mode,
    attempts: u32,
    interval: Duration,
) -> Result<Out<HealthReport>> {
    let pipeline = open_pipeline(config, mode).await?;
    let gateway = pipeline.gateway();
    let rounds = attempts.max(1);
    let mut probes = 0;
    for round in 1..=rounds {
        match gateway.probe(pipeline.session(), ProbeKind::Health).await {
            Resolution::Found {
                candidate,
                attempts,
                ..
            } => {
                probes += attempts;
                let report = HealthReport {
                    endpoint: candidate.url,
                    rounds: round,
                    probes,
                };
                return Ok(Out::new(
                    format!("The backend is up at {}", report.endpoint),
                    report,
                ));
            }
            Resolution::NotFound { attempts } => {
                probes += attempts;
                warn!("Round {round} of {rounds}: no health endpoint answered");
            }
        }
        if round < rounds {
            info!("Retrying in {}s", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
    }
    anyhow::bail!(
        "The backend at {} did not answer after {rounds} round(s)",
        config.base_url()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_fake_backend_is_healthy() {
        let env = TestEnv::new().await;
        let out = health(&env.config(), Mode::Testing, 3, Duration::ZERO)
            .await
            .unwrap();
        let report = out.structure().unwrap();
        assert!(report.endpoint.ends_with("/api/health/"));
        assert_eq!(report.rounds, 1);
        assert_eq!(report.probes, 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails() {
        let env = TestEnv::with_base_url("http://127.0.0.1:9").await;
        let result = health(&env.config(), Mode::Http, 2, Duration::ZERO).await;
        assert!(result.is_err());
    }
}
