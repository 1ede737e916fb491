//! Utility modules

pub mod memory_storage;
pub mod validation;

pub use memory_storage::*;
pub use validation::*;

use std::future::Future;
use std::time::Duration;

use crate::types::{FeeError, FeeResult};

/// Run an external call with a deadline; expiry becomes `FeeError::Timeout`
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> FeeResult<T>
where
    F: Future<Output = FeeResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| FeeError::Timeout(limit))?
}
