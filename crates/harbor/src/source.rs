//! Per-repository state: last-seen release, lazily-materialized repository
//! handle, and the lock serializing all reads and writes of both.

use std::sync::{Arc, Mutex};

use harbor_types::{
    PrivacyState, Release, ReleaseConfig, Repository, RepositoryError, RepositoryProvider,
    asset_name_set,
};

/// Owns one repository's mutable state. At most one `ReleaseSource` exists
/// per `full_name` for the life of the process — enforced by
/// [`crate::registry::SourceRegistry`], not by this type itself.
pub struct ReleaseSource {
    config: Mutex<ReleaseConfig>,
    provider: Arc<dyn RepositoryProvider>,
    state: Mutex<State>,
}

struct State {
    repository: Option<Box<dyn Repository>>,
    release: Option<Release>,
}

impl ReleaseSource {
    pub fn new(config: ReleaseConfig, provider: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            config: Mutex::new(config),
            provider,
            state: Mutex::new(State {
                repository: None,
                release: None,
            }),
        }
    }

    pub fn get_config(&self) -> ReleaseConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get_release(&self) -> Option<Release> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .release
            .clone()
    }

    /// The heart of the design. See the module-level design notes on asset
    /// superset change detection. Returns `true` only when `release` was
    /// just updated to a release that has at least one asset.
    pub fn check_latest_release(&self, reporter: &dyn harbor_types::Reporter) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.repository.is_none() {
            let config = self.config.lock().unwrap_or_else(|e| e.into_inner()).clone();
            let repository = self.provider.get_repository(&config);

            if config.private == PrivacyState::Unknown
                && let Some(private) = repository.is_private()
            {
                let mut config = self.config.lock().unwrap_or_else(|e| e.into_inner());
                config.private = if private {
                    PrivacyState::Private
                } else {
                    PrivacyState::Public
                };
            }

            state.repository = Some(repository);
        }

        let repository = state.repository.as_ref().expect("just materialized above");

        let latest = match repository.get_latest_release() {
            Ok(Some(release)) => release,
            Ok(None) => return false,
            Err(RepositoryError::NotFound) => return false,
            Err(RepositoryError::Transient(reason)) => {
                reporter.error(&format!(
                    "error fetching release repo={} error={reason}",
                    self.full_name()
                ));
                return false;
            }
        };

        let update = match &state.release {
            None => true,
            Some(current) if current.tag_name != latest.tag_name => true,
            Some(current) => {
                let current_names = asset_name_set(current);
                let latest_names = asset_name_set(&latest);
                !latest_names.is_subset(&current_names)
            }
        };

        if !update {
            return false;
        }

        let has_assets = !latest.assets.is_empty();
        reporter.info(&format!(
            "new release found repo={} old_tag={:?} new_tag={}",
            self.full_name(),
            state.release.as_ref().map(|r| r.tag_name.as_str()),
            latest.tag_name
        ));
        state.release = Some(latest);
        has_assets
    }

    fn full_name(&self) -> String {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .full_name()
    }
}
