//! The cancellable, fixed-delay retry loop used by the webhook intake's
//! per-repository asset-visibility polling.

mod cancel;

pub use cancel::{CancellationSignal, RetryOutcome, retry_until_ready};
