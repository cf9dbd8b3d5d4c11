//! Service-specific tests


pub mod common {
    use std::future::Future;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    /// Poll `condition` until it holds or the test timeout expires
    pub async fn eventually<F>(mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        with_timeout(async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}
