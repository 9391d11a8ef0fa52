//! Per-call cancellation and deadlines.

use crate::error::{OrmError, OrmResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline, forwarded to every execute, query
/// and row fetch.
///
/// Cloning shares the underlying token: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct QueryCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl QueryCtx {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the caller's token so it can cancel in-flight work.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Expire `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self.timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.timeout = Some(deadline.saturating_duration_since(Instant::now()));
        self.deadline = Some(deadline);
        self
    }

    /// Apply `timeout` only if no deadline was set yet.
    pub(crate) fn with_default_timeout(self, timeout: Option<Duration>) -> Self {
        match (self.deadline, timeout) {
            (None, Some(t)) => self.with_timeout(t),
            _ => self,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> OrmResult<()> {
        if self.cancel.is_cancelled() {
            return Err(OrmError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(OrmError::Timeout(self.timeout.unwrap_or_default()))
            }
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it finishes, the token is cancelled or the deadline passes.
    ///
    /// On cancellation or expiry `fut` is dropped; callers that need server-side
    /// cleanup do it after observing the error.
    pub async fn run<T, F>(&self, fut: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        self.check()?;
        tokio::pin!(fut);
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(OrmError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => {
                        Err(OrmError::Timeout(self.timeout.unwrap_or_default()))
                    }
                    result = &mut fut => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(OrmError::Cancelled),
                    result = &mut fut => result,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_result_when_not_cancelled() {
        let ctx = QueryCtx::new();
        let out = ctx.run(async { Ok::<_, OrmError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = QueryCtx::new();
        ctx.cancel();
        let err = ctx.run(async { Ok::<_, OrmError>(()) }).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_unblocks_pending_future() {
        let token = CancellationToken::new();
        let ctx = QueryCtx::new().with_cancel(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let err = ctx
            .run(std::future::pending::<OrmResult<()>>())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_surfaces_timeout() {
        let ctx = QueryCtx::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(std::future::pending::<OrmResult<()>>())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn default_timeout_does_not_override_explicit_deadline() {
        let ctx = QueryCtx::new()
            .with_timeout(Duration::from_secs(60))
            .with_default_timeout(Some(Duration::from_millis(1)));
        assert!(ctx.check().is_ok());
        assert!(QueryCtx::new().with_default_timeout(None).deadline().is_none());
    }
}
