/// Sink for operator-facing progress messages.
///
/// Generalizes the single-threaded `Reporter` used by the upstream engine
/// into a shape usable from several concurrent execution contexts at once
/// (the monitor timer thread, the webhook listener thread, and the webhook
/// worker pool all hold a reference to the same reporter). Implementations
/// are responsible for their own synchronization.
pub trait Reporter: Send + Sync {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// A [`Reporter`] that discards everything. Useful as a default in tests
/// and in library call sites that do not care about progress output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}
