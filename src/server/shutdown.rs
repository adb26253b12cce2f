use tokio_util::sync::CancellationToken;

/// The process-wide "stop requested" flag plus its wake-up primitive.
///
/// Cloned handles all observe the same token. `begin_shutdown` only signals
/// intent — it never invokes any feature's `stop`. It is idempotent, cheap,
/// and safe to call from any task, including the signal listener; calling it
/// twice (even concurrently) results in exactly one effective shutdown.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn begin_shutdown(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Block until shutdown is requested. Returns immediately if it already
    /// was.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
