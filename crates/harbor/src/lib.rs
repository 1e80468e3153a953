//! The release-acquisition engine: polling and webhook-driven mirroring of
//! upstream release assets into a local pool.
//!
//! This crate is transport- and provider-agnostic. It is driven entirely
//! through the traits defined in `harbor-types` (`RepositoryProvider`,
//! `AssetDownloader`, `JsonLoader`); concrete GitHub and filesystem
//! implementations live in `harbor-github` and `harbor-download`.

mod coordinator;
mod json_loader;
mod monitor;
mod registry;
mod source;
mod timer;
mod webhook;

pub use coordinator::{Coordinator, CoordinatorConfig, RunError};
pub use json_loader::FileOrHttpJsonLoader;
pub use monitor::ReleaseMonitor;
pub use registry::{NotRegistered, SourceRegistry};
pub use source::ReleaseSource;
pub use timer::{ReusableTimer, TimerError};
pub use webhook::{WebhookIntake, WebhookIntakeConfig, WebhookStartError};
