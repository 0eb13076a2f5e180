use super::ports::DomainError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-request cancellation and deadline handle. Every external call made on
/// behalf of a request is wrapped in [`RequestContext::run`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn new(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self::new(token, Some(Instant::now() + timeout))
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails fast when the context is already done.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.token.is_cancelled() {
            return Err(DomainError::Canceled);
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Err(DomainError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drives `fut` until it completes, the token fires, or the deadline
    /// passes. Cancellation wins ties so a canceled request never reports
    /// success.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(DomainError::Canceled),
            _ = deadline => Err(DomainError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
