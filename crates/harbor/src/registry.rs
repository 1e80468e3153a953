//! Keyed collection of [`ReleaseSource`], with registration idempotency and
//! global default credential fall-in.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use harbor_types::{ReleaseConfig, RepositoryProvider};

use crate::source::ReleaseSource;

#[derive(Debug, thiserror::Error)]
#[error("release source not registered for repository {0}")]
pub struct NotRegistered(pub String);

/// The `full_name -> ReleaseSource` mapping. `register` is the only way to
/// introduce a source; nothing is ever removed.
pub struct SourceRegistry {
    provider: Arc<dyn RepositoryProvider>,
    default_token: Option<String>,
    sources: RwLock<HashMap<String, Arc<ReleaseSource>>>,
}

impl SourceRegistry {
    pub fn new(provider: Arc<dyn RepositoryProvider>, default_token: Option<String>) -> Self {
        Self {
            provider,
            default_token,
            sources: RwLock::new(HashMap::new()),
        }
    }

    /// Register `config`. If `full_name` is already registered, the
    /// existing source is returned unchanged (a duplicate registration is
    /// not an error, just a no-op past the first call).
    pub fn register(
        &self,
        mut config: ReleaseConfig,
        reporter: &dyn harbor_types::Reporter,
    ) -> Arc<ReleaseSource> {
        let full_name = config.full_name();

        if let Some(existing) = self.sources.read().unwrap_or_else(|e| e.into_inner()).get(&full_name) {
            reporter.warn(&format!("release source already registered repo={full_name}"));
            return existing.clone();
        }

        if config.token.is_none()
            && let Some(default_token) = &self.default_token
        {
            reporter.info(&format!("using global token for release source repo={full_name}"));
            config.token = Some(default_token.clone());
        }

        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock in case of a registration race.
        if let Some(existing) = sources.get(&full_name) {
            return existing.clone();
        }

        let source = Arc::new(ReleaseSource::new(config, self.provider.clone()));
        sources.insert(full_name.clone(), source.clone());
        reporter.info(&format!("registered release source repo={full_name}"));
        source
    }

    pub fn is_registered(&self, full_name: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(full_name)
    }

    pub fn get(&self, full_name: &str) -> Result<Arc<ReleaseSource>, NotRegistered> {
        self.sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(full_name)
            .cloned()
            .ok_or_else(|| NotRegistered(full_name.to_string()))
    }

    /// Snapshot of all registered sources. Ordering is not guaranteed.
    pub fn get_all(&self) -> Vec<Arc<ReleaseSource>> {
        self.sources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_types::{NullReporter, Repository, RepositoryError};

    struct NoopRepository;
    impl Repository for NoopRepository {
        fn get_latest_release(&self) -> Result<Option<harbor_types::Release>, RepositoryError> {
            Ok(None)
        }
    }

    struct NoopProvider;
    impl RepositoryProvider for NoopProvider {
        fn get_repository(&self, _config: &ReleaseConfig) -> Box<dyn Repository> {
            Box::new(NoopRepository)
        }
    }

    fn registry(default_token: Option<&str>) -> SourceRegistry {
        SourceRegistry::new(Arc::new(NoopProvider), default_token.map(str::to_string))
    }

    #[test]
    fn register_is_idempotent_and_returns_same_source() {
        let registry = registry(None);
        let config = ReleaseConfig::new("owner1", "repo1");

        let first = registry.register(config.clone(), &NullReporter);
        let second = registry.register(config, &NullReporter);

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn get_fails_for_unregistered_repo() {
        let registry = registry(None);
        assert!(registry.get("owner1/repo1").is_err());
        assert!(!registry.is_registered("owner1/repo1"));
    }

    #[test]
    fn register_fills_in_default_token_when_config_has_none() {
        let registry = registry(Some("global-token"));
        let config = ReleaseConfig::new("owner1", "repo1");

        registry.register(config, &NullReporter);
        let source = registry.get("owner1/repo1").unwrap();
        assert_eq!(source.get_config().token.as_deref(), Some("global-token"));
    }

    #[test]
    fn register_does_not_override_an_explicit_token() {
        let registry = registry(Some("global-token"));
        let mut config = ReleaseConfig::new("owner1", "repo1");
        config.token = Some("explicit-token".to_string());

        registry.register(config, &NullReporter);
        let source = registry.get("owner1/repo1").unwrap();
        assert_eq!(source.get_config().token.as_deref(), Some("explicit-token"));
    }

    #[test]
    fn get_all_returns_every_registered_source() {
        let registry = registry(None);
        registry.register(ReleaseConfig::new("owner1", "repo1"), &NullReporter);
        registry.register(ReleaseConfig::new("owner2", "repo2"), &NullReporter);

        assert_eq!(registry.get_all().len(), 2);
    }
}
