//! Core domain types shared across the harbor workspace.
//!
//! This crate has no knowledge of HTTP, threads, or the filesystem — it only
//! describes the shapes that flow between the release-acquisition engine and
//! its external collaborators (the GitHub client, the downloader, the CLI).

mod envref;
mod release;
mod report;
mod traits;

pub use envref::resolve_env_ref;
pub use release::{Asset, PrivacyState, Release, ReleaseConfig, asset_name_set};
pub use report::{NullReporter, Reporter};
pub use traits::{
    AssetDownloader, ConfigLoadError, DownloadError, JsonLoader, Repository, RepositoryError,
    RepositoryProvider,
};
