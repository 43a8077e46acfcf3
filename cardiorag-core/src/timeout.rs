use std::future::Future;
use std::time::Duration;

use crate::CardioError;

/// Bounds an external call. `None` leaves the call unbounded.
pub async fn with_timeout<T, Fut>(limit: Option<Duration>, call: Fut) -> Result<T, CardioError>
where
    Fut: Future<Output = Result<T, CardioError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| CardioError::Timeout(limit))?,
        None => call.await,
    }
}
