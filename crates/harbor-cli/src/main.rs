use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use harbor::{Coordinator, CoordinatorConfig, FileOrHttpJsonLoader, ReleaseMonitor, SourceRegistry, WebhookIntake, WebhookIntakeConfig};
use harbor_download::{AssetDownloader, FileDownloader};
use harbor_github::GitHubRepositoryProvider;
use harbor_types::{resolve_env_ref, ConfigLoadError, JsonLoader, ReleaseConfig, Reporter};

/// Mirrors upstream release artifacts into a local package pool, by
/// polling on an interval and/or accepting GitHub release webhooks.
#[derive(Parser, Debug)]
#[command(name = "harbor", version)]
#[command(about = "Release-acquisition engine: mirrors release assets into a local pool")]
struct Cli {
    /// Path or http(s) URL to the release-config JSON array.
    release_config: Option<String>,

    /// Overrides the positional release-config source, if given.
    #[arg(long)]
    config_file: Option<String>,

    /// Root directory assets are downloaded into.
    #[arg(long = "download-dir", default_value = "/tmp/packages")]
    download_dir: PathBuf,

    /// Comma-separated distribution names, used to partition the download root.
    #[arg(long = "distro-sub-dirs", value_delimiter = ',')]
    distro_sub_dirs: Vec<String>,

    /// Sub-directory private-repo assets are nested under.
    #[arg(long = "private-sub-dir")]
    private_sub_dir: Option<String>,

    /// Enable the periodic polling monitor (on by default).
    #[arg(long = "monitor-enable", action = clap::ArgAction::SetTrue)]
    monitor_enable_flag: bool,

    /// Disable the periodic polling monitor.
    #[arg(long = "no-monitor-enable", action = clap::ArgAction::SetTrue, conflicts_with = "monitor_enable_flag")]
    no_monitor_enable: bool,

    /// Polling interval, in seconds.
    #[arg(long = "monitor-interval", default_value_t = 600)]
    monitor_interval: u64,

    /// Enable the webhook HTTP intake (on by default).
    #[arg(long = "webhook-enable", action = clap::ArgAction::SetTrue)]
    webhook_enable_flag: bool,

    /// Disable the webhook HTTP intake.
    #[arg(long = "no-webhook-enable", action = clap::ArgAction::SetTrue, conflicts_with = "webhook_enable_flag")]
    no_webhook_enable: bool,

    /// Port the webhook server listens on.
    #[arg(long = "webhook-port", default_value_t = 8080)]
    webhook_port: u16,

    /// Webhook HMAC secret. A leading `$NAME` is resolved from the
    /// environment at startup.
    #[arg(long = "webhook-secret")]
    webhook_secret: Option<String>,

    /// Max attempts for the webhook's asset-visibility retry loop.
    #[arg(long = "webhook-retries", default_value_t = 10)]
    webhook_retries: u32,

    /// Delay between webhook retry attempts, in seconds.
    #[arg(long = "webhook-delay", default_value_t = 60)]
    webhook_delay: u64,

    /// Run one collection sweep over every configured source at startup
    /// (on by default).
    #[arg(long = "initial-collect", action = clap::ArgAction::SetTrue)]
    initial_collect_flag: bool,

    /// Skip the startup collection sweep.
    #[arg(long = "no-initial-collect", action = clap::ArgAction::SetTrue, conflicts_with = "initial_collect_flag")]
    no_initial_collect: bool,

    /// Default GitHub token used for sources whose config has none. A
    /// leading `$NAME` is resolved from the environment at startup.
    #[arg(long = "github-token")]
    github_token: Option<String>,

    /// Append log output to this file instead of stderr.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Minimum level logged: info, warn, or error.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => anyhow::bail!("unrecognized log level: {other}"),
        }
    }
}

/// Writes leveled, line-oriented text to stderr or an append-mode file,
/// gated by a minimum level. Mirrors the teacher's `Reporter` idiom,
/// generalized to be thread-safe (see `harbor-types::Reporter`'s doc
/// comment for why).
struct CliReporter {
    level: LogLevel,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl CliReporter {
    fn new(level: LogLevel, log_file: Option<&PathBuf>) -> Result<Self> {
        let sink: Box<dyn Write + Send> = match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("failed to open log file {}", path.display()))?;
                Box::new(file)
            }
            None => Box::new(std::io::stderr()),
        };
        Ok(Self {
            level,
            sink: Mutex::new(sink),
        })
    }

    fn write(&self, level: LogLevel, tag: &str, msg: &str) {
        if level < self.level {
            return;
        }
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(sink, "[{tag}] {msg}");
    }
}

impl Reporter for CliReporter {
    fn info(&self, msg: &str) {
        self.write(LogLevel::Info, "info", msg);
    }

    fn warn(&self, msg: &str) {
        self.write(LogLevel::Warn, "warn", msg);
    }

    fn error(&self, msg: &str) {
        self.write(LogLevel::Error, "error", msg);
    }
}

/// Applies `--distro-sub-dirs`/`--private-sub-dir` to every loaded config
/// that doesn't already set them, so the common case of "one layout for
/// every repository" doesn't require repeating it in the JSON.
struct DefaultsJsonLoader {
    inner: Arc<dyn JsonLoader>,
    distro_sub_dirs: Vec<String>,
    private_sub_dir: Option<String>,
}

impl JsonLoader for DefaultsJsonLoader {
    fn load_list(&self, path_or_url: &str) -> Result<Vec<ReleaseConfig>, ConfigLoadError> {
        let mut configs = self.inner.load_list(path_or_url)?;
        for config in &mut configs {
            if config.distro_sub_dirs.is_empty() {
                config.distro_sub_dirs = self.distro_sub_dirs.clone();
            }
            if config.private_sub_dir.is_none() {
                config.private_sub_dir = self.private_sub_dir.clone();
            }
        }
        Ok(configs)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let monitor_enable = !cli.no_monitor_enable;
    let webhook_enable = !cli.no_webhook_enable;
    let initial_collect = !cli.no_initial_collect;

    let level = LogLevel::from_str(&cli.log_level)?;
    let reporter: Arc<dyn Reporter> = Arc::new(CliReporter::new(level, cli.log_file.as_ref())?);

    let config_source = cli
        .config_file
        .clone()
        .or(cli.release_config.clone())
        .context("a release-config path or URL is required (positional argument or --config-file)")?;

    let github_token = cli.github_token.as_deref().map(resolve_env_ref).filter(|s| !s.is_empty());
    let webhook_secret = cli.webhook_secret.as_deref().map(resolve_env_ref).filter(|s| !s.is_empty());

    let provider = Arc::new(
        GitHubRepositoryProvider::new(github_token.clone()).context("failed to build GitHub HTTP client")?,
    );
    let registry = Arc::new(SourceRegistry::new(provider, github_token));

    let files = FileDownloader::new(cli.download_dir.clone()).context("failed to build asset downloader")?;
    let downloader = Arc::new(AssetDownloader::new(files));

    let monitor = Arc::new(ReleaseMonitor::new(
        registry.clone(),
        downloader.clone(),
        Duration::from_secs(cli.monitor_interval),
        reporter.clone(),
    ));

    let webhook = if webhook_enable {
        Some(Arc::new(WebhookIntake::new(
            registry.clone(),
            downloader,
            WebhookIntakeConfig {
                port: cli.webhook_port,
                secret: webhook_secret,
                retry_attempts: cli.webhook_retries,
                retry_delay: Duration::from_secs(cli.webhook_delay),
            },
            reporter.clone(),
        )))
    } else {
        None
    };

    let json_loader: Arc<dyn JsonLoader> = Arc::new(DefaultsJsonLoader {
        inner: Arc::new(FileOrHttpJsonLoader::new().context("failed to build config loader")?),
        distro_sub_dirs: cli.distro_sub_dirs.clone(),
        private_sub_dir: cli.private_sub_dir.clone(),
    });

    let coordinator = Arc::new(Coordinator::new(
        registry,
        monitor,
        webhook,
        json_loader,
        reporter.clone(),
        CoordinatorConfig {
            config_source,
            monitor_enabled: monitor_enable,
            webhook_enabled: webhook_enable,
            initial_collect,
        },
    ));

    coordinator.run().context("failed to start")?;

    let shutdown_requested = Arc::new((Mutex::new(false), Condvar::new()));
    {
        let shutdown_requested = shutdown_requested.clone();
        ctrlc::set_handler(move || {
            let (lock, cvar) = &*shutdown_requested;
            *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
            cvar.notify_all();
        })
        .context("failed to install signal handler")?;
    }

    let (lock, cvar) = &*shutdown_requested;
    let mut requested = lock.lock().unwrap_or_else(|e| e.into_inner());
    while !*requested {
        requested = cvar.wait(requested).unwrap_or_else(|e| e.into_inner());
    }
    drop(requested);

    coordinator.shutdown();
    Ok(())
}
