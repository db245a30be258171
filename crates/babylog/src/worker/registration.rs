//! Bringing a worker up.

use tracing::{info, warn};

use super::{CacheStorage, Platform, PrecacheManifest, Result, Worker, WorkerHandle};
use crate::config::WorkerConfig;

/// Start the worker described by `config`.
///
/// When the bucket for the configured version already exists the version is
/// considered installed: nothing is fetched, but stale buckets are still
/// pruned before the worker reaches
/// [`WorkerState::Activated`](super::WorkerState::Activated). Otherwise it is
/// installed and then activated immediately.
///
/// # Errors
///
/// Returns an error if the cache storage cannot be queried or install fails.
pub async fn register(
    config: &WorkerConfig,
    platform: &Platform,
    precache: PrecacheManifest,
) -> Result<WorkerHandle> {
    let worker = Worker::new(config.cache_version.clone(), platform, precache);

    let (precached, report) = if platform.caches.has(worker.version()).await? {
        (0, worker.resume().await?)
    } else {
        let installed = worker.install().await?;
        (installed.precached, worker.activate().await?)
    };
    for failure in &report.failures {
        warn!(error = %failure, "Activation step failed");
    }
    info!(
        version = %worker.version(),
        precached,
        deleted = report.deleted.len(),
        "Worker registered"
    );

    Ok(WorkerHandle::spawn(worker, config.channel_capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{manifest, Harness};
    use crate::worker::{WorkerError, WorkerState};

    fn config() -> WorkerConfig {
        WorkerConfig {
            cache_version: "baby-log-v2".to_string(),
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_registration_installs_and_activates() {
        let harness = Harness::new();
        harness.network.route("/", 200, "<html>");
        harness.caches.open("baby-log-v1").await.unwrap();

        let handle = register(&config(), &harness.platform(), manifest(&["/"]))
            .await
            .unwrap();

        assert_eq!(handle.state(), WorkerState::Activated);
        assert_eq!(harness.bucket_names().await, vec!["baby-log-v2"]);
        assert_eq!(harness.network.request_count("/"), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_bucket_skips_install() {
        let harness = Harness::new();
        harness.caches.open("baby-log-v2").await.unwrap();
        harness.caches.open("baby-log-v1").await.unwrap();

        let handle = register(&config(), &harness.platform(), manifest(&["/"]))
            .await
            .unwrap();

        assert_eq!(handle.state(), WorkerState::Activated);
        assert!(harness.network.requests().is_empty());
        assert_eq!(harness.bucket_names().await, vec!["baby-log-v2"]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_registration_completes_interrupted_activation() {
        let harness = Harness::new();
        harness.network.route("/", 200, "<html>");
        harness.caches.open("baby-log-v1").await.unwrap();
        let interrupted = Worker::new("baby-log-v2", &harness.platform(), manifest(&["/"]));
        interrupted.install().await.unwrap();
        drop(interrupted);

        let handle = register(&config(), &harness.platform(), manifest(&["/"]))
            .await
            .unwrap();

        assert_eq!(handle.state(), WorkerState::Activated);
        assert_eq!(harness.bucket_names().await, vec!["baby-log-v2"]);
        assert_eq!(harness.network.request_count("/"), 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_install_failure_is_returned() {
        let harness = Harness::new();
        harness.network.fail("/");

        let result = register(&config(), &harness.platform(), manifest(&["/"])).await;

        assert!(matches!(result, Err(WorkerError::Install(_))));
        assert!(harness.bucket_names().await.is_empty());
    }
}
