//! Top-level lifecycle: load configuration, register sources, start
//! whichever acquisition paths are enabled, and shut them down in reverse
//! order on request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harbor_types::{JsonLoader, Reporter};

use crate::monitor::ReleaseMonitor;
use crate::registry::SourceRegistry;
use crate::webhook::WebhookIntake;

pub struct CoordinatorConfig {
    /// Local path or `http(s)://` URL the release-config array is read from.
    pub config_source: String,
    pub monitor_enabled: bool,
    pub webhook_enabled: bool,
    /// Run one synchronous sweep over every configured source before
    /// returning from `run`, independent of whether the periodic monitor
    /// loop itself is enabled.
    pub initial_collect: bool,
}

pub struct Coordinator {
    registry: Arc<SourceRegistry>,
    monitor: Arc<ReleaseMonitor>,
    webhook: Option<Arc<WebhookIntake>>,
    json_loader: Arc<dyn JsonLoader>,
    reporter: Arc<dyn Reporter>,
    config: CoordinatorConfig,
    running: AtomicBool,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to load release configuration: {0}")]
    Config(#[from] harbor_types::ConfigLoadError),
    #[error("failed to start webhook server: {0}")]
    Webhook(#[from] crate::webhook::WebhookStartError),
}

impl Coordinator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        monitor: Arc<ReleaseMonitor>,
        webhook: Option<Arc<WebhookIntake>>,
        json_loader: Arc<dyn JsonLoader>,
        reporter: Arc<dyn Reporter>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            monitor,
            webhook,
            json_loader,
            reporter,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Load configuration, register every repository, start whichever
    /// acquisition paths are enabled, and optionally run one collection
    /// sweep before returning.
    pub fn run(&self) -> Result<(), RunError> {
        self.reporter.info("loading release configuration");
        let configs = self.json_loader.load_list(&self.config.config_source)?;

        for config in configs {
            self.registry.register(config, self.reporter.as_ref());
        }

        self.running.store(true, Ordering::SeqCst);

        if self.config.monitor_enabled {
            self.monitor.start();
        }

        if self.config.webhook_enabled
            && let Some(webhook) = &self.webhook
        {
            webhook.start()?;
        }

        if self.config.initial_collect {
            self.monitor.check_all();
        }

        Ok(())
    }

    /// Stop whichever acquisition paths were started, in the reverse of
    /// their startup order. Safe to call from a signal handler; idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.reporter.info("shutting down");

        if let Some(webhook) = &self.webhook {
            webhook.shutdown();
        }
        self.monitor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::{
        DownloadError, NullReporter, Release, ReleaseConfig, Repository, RepositoryError,
        RepositoryProvider,
    };
    use std::time::Duration;

    struct NoopRepository;
    impl Repository for NoopRepository {
        fn get_latest_release(&self) -> Result<Option<Release>, RepositoryError> {
            Ok(None)
        }
    }

    struct NoopProvider;
    impl RepositoryProvider for NoopProvider {
        fn get_repository(&self, _config: &ReleaseConfig) -> Box<dyn Repository> {
            Box::new(NoopRepository)
        }
    }

    struct NoopDownloader;
    impl harbor_types::AssetDownloader for NoopDownloader {
        fn download(&self, _config: &ReleaseConfig, _release: &Release) -> Result<(), DownloadError> {
            Ok(())
        }
    }

    struct StaticJsonLoader(Vec<ReleaseConfig>);
    impl JsonLoader for StaticJsonLoader {
        fn load_list(&self, _path_or_url: &str) -> Result<Vec<ReleaseConfig>, harbor_types::ConfigLoadError> {
            Ok(self.0.clone())
        }
    }

    fn coordinator(initial_collect: bool) -> Coordinator {
        let registry = Arc::new(SourceRegistry::new(Arc::new(NoopProvider), None));
        let monitor = Arc::new(ReleaseMonitor::new(
            registry.clone(),
            Arc::new(NoopDownloader),
            Duration::from_secs(600),
            Arc::new(NullReporter),
        ));
        let loader: Arc<dyn JsonLoader> = Arc::new(StaticJsonLoader(vec![ReleaseConfig::new(
            "owner1", "repo1",
        )]));

        Coordinator::new(
            registry,
            monitor,
            None,
            loader,
            Arc::new(NullReporter),
            CoordinatorConfig {
                config_source: "unused".to_string(),
                monitor_enabled: false,
                webhook_enabled: false,
                initial_collect,
            },
        )
    }

    #[test]
    fn run_registers_every_configured_repository() {
        let coordinator = coordinator(false);
        coordinator.run().unwrap();
        assert!(coordinator.registry.is_registered("owner1/repo1"));
    }

    #[test]
    fn shutdown_before_run_is_a_harmless_no_op() {
        let coordinator = coordinator(false);
        coordinator.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let coordinator = coordinator(false);
        coordinator.run().unwrap();
        coordinator.shutdown();
        coordinator.shutdown();
    }

    #[test]
    fn run_with_initial_collect_does_not_panic_with_no_releases() {
        let coordinator = coordinator(true);
        coordinator.run().unwrap();
    }
}
