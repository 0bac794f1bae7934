//! Non-critical side effects
//!
//! Calendar events and notifications run after the owning transaction has
//! committed. Their failures are logged here and turned into `None`; the
//! signature leaves no way to hand the error back to the caller.

use std::future::Future;
use tracing::warn;

use crate::ports::PortError;

/// Runs a best-effort side effect, logging and swallowing its failure
pub async fn best_effort<T, F>(effect: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, PortError>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(effect, error = %error, transient = error.is_transient(), "non-critical effect failed");
            None
        }
    }
}
