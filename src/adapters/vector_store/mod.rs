//! Vector store provider implementations

pub mod embedded;
pub mod remote;

pub use embedded::EmbeddedVectorStore;
pub use remote::RemoteVectorStore;

use crate::domain::error::Result;
use std::future::Future;
use tokio::time::{sleep, Duration};

/// Retry budget for transient store failures.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff; doubles per attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Run a store operation, retrying transient failures up to
/// [`MAX_RETRIES`] times with exponential backoff. Permanent errors
/// surface immediately.
pub async fn with_retry<T, F, Fut>(operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = BASE_BACKOFF;
    let mut attempt = 1;
    loop {
        match f().await {
            Err(err) if err.is_transient() && attempt < MAX_RETRIES => {
                tracing::warn!(operation, attempt, error = %err, "transient store failure, retrying");
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}
