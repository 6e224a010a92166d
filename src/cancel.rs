//! Cooperative cancellation
//!
//! Batches are cancelled through `tokio_util`'s token, used synchronously. Work
//! checks the token before each block and before each new file; nothing is
//! interrupted preemptively.

use crate::error::{AudioError, Result};

pub use tokio_util::sync::CancellationToken;

/// Fail with [`AudioError::Cancelled`] if the token has fired
pub fn check(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(AudioError::Cancelled)
    } else {
        Ok(())
    }
}
