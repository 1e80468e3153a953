use crate::release::{Release, ReleaseConfig};

/// A handle to a single upstream repository, obtained from a
/// [`RepositoryProvider`]. Cheap to clone; implementations typically wrap
/// an `owner`/`repo` pair plus whatever auth context is needed to query it.
pub trait Repository: Send + Sync {
    /// Fetch the latest release for this repository.
    ///
    /// Returns `Ok(None)` when the repository genuinely has no releases yet
    /// (the *unknown-object* case from the error taxonomy) — this is not an
    /// error, it is absorbed by the caller as "no change." Any other
    /// failure (network, auth, rate limit, malformed response) is an `Err`.
    fn get_latest_release(&self) -> Result<Option<Release>, RepositoryError>;

    /// Best-effort lookup of whether the repository is private. Used to
    /// back-fill `ReleaseConfig.private` the first time a source is
    /// checked. Implementations that cannot determine this cheaply may
    /// return `None`.
    fn is_private(&self) -> Option<bool> {
        None
    }
}

/// Failure modes a [`Repository`] call can surface. Distinguishing `NotFound`
/// from `Transient` lets `ReleaseSource::check_latest_release` apply the
/// right log level and still return `false` for both without the caller
/// needing to inspect error internals.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository not found or has no releases")]
    NotFound,
    #[error("transient upstream error: {0}")]
    Transient(String),
}

/// Resolves a [`ReleaseConfig`] into a [`Repository`] handle. Implementations
/// typically cache nothing themselves — the caller ([`crate::Repository`]
/// materialization in `ReleaseSource`) is responsible for calling this at
/// most once per source.
pub trait RepositoryProvider: Send + Sync {
    fn get_repository(&self, config: &ReleaseConfig) -> Box<dyn Repository>;
}

/// Downloads the assets of a release to disk, per the layout rules encoded
/// in `ReleaseConfig` (distribution sub-dirs, private sub-dir, glob
/// matcher).
pub trait AssetDownloader: Send + Sync {
    fn download(&self, config: &ReleaseConfig, release: &Release) -> Result<(), DownloadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("failed to download asset {asset}: {source}")]
    Asset {
        asset: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Loads the release-config JSON array from a path or URL.
pub trait JsonLoader: Send + Sync {
    fn load_list(&self, path_or_url: &str) -> Result<Vec<ReleaseConfig>, ConfigLoadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config source {source_ref}: {reason}")]
    Read { source_ref: String, reason: String },
    #[error("failed to parse config JSON: {0}")]
    Parse(String),
}
