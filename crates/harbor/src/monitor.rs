//! Periodic sweep over every registered source, driving the downloader on
//! positive change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harbor_types::{AssetDownloader, Reporter};

use crate::registry::SourceRegistry;
use crate::timer::ReusableTimer;

pub struct ReleaseMonitor {
    registry: Arc<SourceRegistry>,
    downloader: Arc<dyn AssetDownloader>,
    timer: ReusableTimer,
    interval: Duration,
    running: Arc<AtomicBool>,
    reporter: Arc<dyn Reporter>,
}

impl ReleaseMonitor {
    pub fn new(
        registry: Arc<SourceRegistry>,
        downloader: Arc<dyn AssetDownloader>,
        interval: Duration,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            registry,
            downloader,
            timer: ReusableTimer::new(),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            reporter,
        }
    }

    pub fn start(self: &Arc<Self>) {
        self.reporter.info("starting release monitor");
        self.running.store(true, Ordering::SeqCst);
        self.arm_tick();
    }

    pub fn shutdown(&self) {
        self.reporter.info("stopping release monitor");
        self.timer.cancel();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Re-arm the timer first, then run the sweep, so cadence drift is
    /// bounded by one interval even when a sweep takes comparable time to
    /// the configured interval.
    fn arm_tick(self: &Arc<Self>) {
        let this = self.clone();
        self.timer.start(self.interval, move || {
            this.tick();
        });
    }

    fn tick(self: &Arc<Self>) {
        if self.running.load(Ordering::SeqCst) {
            let _ = self.timer.restart();
        }
        self.check_all();
    }

    /// Iterate over every registered source; on a positive
    /// `check_latest_release`, download the release's assets. Per-source
    /// failures are logged and do not stop the sweep.
    pub fn check_all(&self) {
        self.reporter.info("checking for new releases");

        for source in self.registry.get_all() {
            if !self.running.load(Ordering::SeqCst) {
                self.reporter.info("checking interrupted");
                return;
            }

            self.check_source(&source);
        }

        self.reporter.info("checking completed");
    }

    pub fn check(&self, full_name: &str) {
        match self.registry.get(full_name) {
            Ok(source) => self.check_source(&source),
            Err(_) => self
                .reporter
                .warn(&format!("no source registered for repository repo={full_name}")),
        }
    }

    fn check_source(&self, source: &crate::source::ReleaseSource) {
        if source.check_latest_release(self.reporter.as_ref())
            && let Some(release) = source.get_release()
        {
            let config = source.get_config();
            if let Err(error) = self.downloader.download(&config, &release) {
                self.reporter.error(&format!(
                    "failed to download release repo={} tag={} error={error}",
                    config.full_name(),
                    release.tag_name
                ));
            }
        }
    }
}
