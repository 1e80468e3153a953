//! `POST /webhook` HTTP intake: HMAC authentication, event/action
//! filtering, and cancellable per-repository retry dispatch into a bounded
//! worker pool.
//!
//! Runs on `tiny_http`, matching the rest of this workspace's synchronous,
//! thread-based concurrency model — no async runtime is introduced for a
//! single inbound listener.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use harbor_types::{AssetDownloader, Reporter};
use harbor_retry::{CancellationSignal, RetryOutcome, retry_until_ready};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::registry::SourceRegistry;

type HmacSha256 = Hmac<Sha256>;
type Job = Box<dyn FnOnce() + Send>;

const WORKER_POOL_SIZE: usize = 3;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct WebhookIntakeConfig {
    pub port: u16,
    /// Already resolved (any `$NAME` reference has been read from the
    /// environment at construction time). `None`/empty means "do not
    /// verify the HMAC, but still enforce header shape."
    pub secret: Option<String>,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

pub struct WebhookIntake {
    registry: Arc<SourceRegistry>,
    downloader: Arc<dyn AssetDownloader>,
    config: WebhookIntakeConfig,
    reporter: Arc<dyn Reporter>,
    running: Arc<AtomicBool>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    job_tx: Mutex<Option<Sender<Job>>>,
    signals: Arc<Mutex<HashMap<String, CancellationSignal>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookStartError {
    #[error("failed to bind webhook listener on port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

impl WebhookIntake {
    pub fn new(
        registry: Arc<SourceRegistry>,
        downloader: Arc<dyn AssetDownloader>,
        config: WebhookIntakeConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            registry,
            downloader,
            config,
            reporter,
            running: Arc::new(AtomicBool::new(false)),
            listener_handle: Mutex::new(None),
            worker_handles: Mutex::new(Vec::new()),
            job_tx: Mutex::new(None),
            signals: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn start(self: &Arc<Self>) -> Result<(), WebhookStartError> {
        self.reporter
            .info(&format!("starting webhook server port={}", self.config.port));

        let server = tiny_http::Server::http(("0.0.0.0", self.config.port)).map_err(|e| {
            WebhookStartError::Bind {
                port: self.config.port,
                reason: e.to_string(),
            }
        })?;

        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut worker_handles = self.worker_handles.lock().unwrap_or_else(|e| e.into_inner());
        for _ in 0..WORKER_POOL_SIZE {
            let rx = rx.clone();
            worker_handles.push(std::thread::spawn(move || {
                loop {
                    let job = {
                        let rx = rx.lock().unwrap_or_else(|e| e.into_inner());
                        rx.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                }
            }));
        }
        drop(worker_handles);

        *self.job_tx.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx.clone());
        self.running.store(true, Ordering::SeqCst);

        let this = self.clone();
        let handle = std::thread::spawn(move || {
            while this.running.load(Ordering::SeqCst) {
                match server.recv_timeout(POLL_INTERVAL) {
                    Ok(Some(request)) => this.handle_request(request, &tx),
                    Ok(None) => continue,
                    Err(error) => {
                        this.reporter
                            .error(&format!("webhook listener error={error}"));
                        break;
                    }
                }
            }
        });

        *self.listener_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Close the listener, cancel every pending per-repo retry task, and
    /// drain the worker pool. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.reporter.info("shutting down webhook server");

        for signal in self.signals.lock().unwrap_or_else(|e| e.into_inner()).values() {
            signal.set();
        }

        if let Some(handle) = self.listener_handle.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }

        // Dropping the sender lets every worker's `recv()` return `Err`
        // once the queue drains, so they exit their loop and can be joined.
        self.job_tx.lock().unwrap_or_else(|e| e.into_inner()).take();

        let handles: Vec<_> = self
            .worker_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn handle_request(self: &Arc<Self>, mut request: tiny_http::Request, job_tx: &Sender<Job>) {
        if request.method() != &tiny_http::Method::Post || request.url() != "/webhook" {
            let _ = request.respond(tiny_http::Response::empty(404));
            return;
        }

        let mut body = Vec::new();
        if let Err(error) = request.as_reader().read_to_end(&mut body) {
            self.reporter
                .error(&format!("failed to read webhook body error={error}"));
            let _ = request.respond(tiny_http::Response::empty(400));
            return;
        }

        let signature_header = header_value(&request, "X-Hub-Signature-256");
        let event_header = header_value(&request, "X-GitHub-Event");

        match self.authenticate(signature_header.as_deref(), &body) {
            Ok(()) => {}
            Err(reason) => {
                self.reporter.error(&format!("webhook authentication failed reason={reason}"));
                let _ = request.respond(tiny_http::Response::empty(403));
                return;
            }
        }

        if event_header.as_deref() != Some("release") {
            let _ = request.respond(tiny_http::Response::empty(204));
            return;
        }

        let payload: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => {
                let _ = request.respond(tiny_http::Response::empty(204));
                return;
            }
        };

        let action = payload.get("action").and_then(|v| v.as_str()).unwrap_or("");
        if !matches!(action, "released" | "published" | "edited") {
            let _ = request.respond(tiny_http::Response::empty(204));
            return;
        }

        let full_name = payload
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if full_name.is_empty() || !self.registry.is_registered(&full_name) {
            self.reporter
                .warn(&format!("repository not registered, skipping repo={full_name}"));
            let _ = request.respond(tiny_http::Response::empty(204));
            return;
        }

        let _ = request.respond(tiny_http::Response::empty(200));
        self.dispatch(full_name, job_tx);
    }

    fn authenticate(&self, signature_header: Option<&str>, body: &[u8]) -> Result<(), &'static str> {
        let header = signature_header.ok_or("no signature provided")?;
        let (algorithm, signature_hex) = header.split_once('=').ok_or("malformed signature header")?;
        if algorithm != "sha256" {
            return Err("only sha256 signature is supported");
        }

        let secret = match &self.config.secret {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(()),
        };

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid secret key length")?;
        mac.update(body);

        let provided = hex::decode(signature_hex).map_err(|_| "invalid signature encoding")?;
        mac.verify_slice(&provided).map_err(|_| "invalid signature")
    }

    /// Hand the repository off to the worker pool, cancelling any retry
    /// loop already pending for it so at most one is ever active.
    fn dispatch(self: &Arc<Self>, full_name: String, job_tx: &Sender<Job>) {
        let signal = CancellationSignal::new();
        {
            let mut signals = self.signals.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = signals.insert(full_name.clone(), signal.clone()) {
                previous.set();
            }
        }

        let this = self.clone();
        let job: Job = Box::new(move || this.fetch_via_api(full_name, signal));
        // A send failure means the intake is shutting down; the signal was
        // already set above by `shutdown`, so dropping the job is correct.
        let _ = job_tx.send(job);
    }

    fn fetch_via_api(&self, full_name: String, signal: CancellationSignal) {
        let source = match self.registry.get(&full_name) {
            Ok(source) => source,
            Err(_) => return,
        };

        let reporter = self.reporter.as_ref();
        let outcome = retry_until_ready(
            self.config.retry_attempts,
            self.config.retry_delay,
            &signal,
            |_attempt| source.check_latest_release(reporter),
        );

        match outcome {
            RetryOutcome::Ready { .. } => {
                if let Some(release) = source.get_release() {
                    let config = source.get_config();
                    if let Err(error) = self.downloader.download(&config, &release) {
                        self.reporter.error(&format!(
                            "failed to download release repo={full_name} tag={} error={error}",
                            release.tag_name
                        ));
                    }
                }
            }
            RetryOutcome::Exhausted { attempts } => {
                self.reporter.error(&format!(
                    "assets not available after retries repo={full_name} attempts={attempts}"
                ));
            }
            RetryOutcome::Cancelled { .. } => {
                self.reporter
                    .info(&format!("retry loop superseded by a newer webhook repo={full_name}"));
            }
        }

        let mut signals = self.signals.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = signals.get(&full_name)
            && current.same_as(&signal)
        {
            signals.remove(&full_name);
        }
    }
}

fn header_value(request: &tiny_http::Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}
