use crate::domain::model::{ApiResult, ErrorCode};
use crate::utils::error::{ClientError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 10_000;

/// 哪些失敗需要重試
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetryOn {
    /// Every failure is retried the same way, whatever its code.
    #[default]
    All,
    /// Only failures tagged with one of these codes are retried.
    Codes(HashSet<ErrorCode>),
}

impl RetryOn {
    pub fn codes<I: IntoIterator<Item = ErrorCode>>(codes: I) -> Self {
        RetryOn::Codes(codes.into_iter().collect())
    }

    /// Timeouts and transport failures only.
    pub fn transient() -> Self {
        Self::codes([ErrorCode::Timeout, ErrorCode::NetworkError])
    }

    pub fn allows(&self, code: ErrorCode) -> bool {
        match self {
            RetryOn::All => true,
            RetryOn::Codes(codes) => codes.contains(&code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ClientError::InvalidConfigValueError {
                field: "retry.max_attempts".to_string(),
                value: max_attempts.to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        Ok(Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            retry_on: RetryOn::All,
        })
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            retry_on: RetryOn::All,
        }
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn retry_on(&self) -> &RetryOn {
        &self.retry_on
    }

    /// Wait after the given (1-based) failed attempt: `base_delay * attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn should_retry(&self, attempt: u32, code: ErrorCode) -> bool {
        attempt < self.max_attempts && self.retry_on.allows(code)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            retry_on: RetryOn::All,
        }
    }
}

/// Anything a single attempt may resolve to.
///
/// `ApiResult` passes through untouched. A `Result` is treated as a
/// rejected attempt on `Err`, tagged with the error's own code.
pub trait IntoApiResult<T> {
    fn into_api_result(self) -> ApiResult<T>;
}

impl<T> IntoApiResult<T> for ApiResult<T> {
    fn into_api_result(self) -> ApiResult<T> {
        self
    }
}

impl<T, E> IntoApiResult<T> for std::result::Result<T, E>
where
    E: Into<ClientError>,
{
    fn into_api_result(self) -> ApiResult<T> {
        match self {
            Ok(data) => ApiResult::success(data),
            Err(e) => {
                let e: ClientError = e.into();
                ApiResult::failure(e.to_string(), e.error_code())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Attempting { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded { .. } | AttemptState::Failed { .. }
        )
    }

    pub fn can_transition_to(&self, next: &AttemptState) -> bool {
        use AttemptState::*;
        match (self, next) {
            (Idle, Attempting { attempt }) => *attempt == 1,
            (Attempting { attempt }, Succeeded { attempts })
            | (Attempting { attempt }, Failed { attempts }) => attempt == attempts,
            (Attempting { attempt }, Waiting { attempt: waiting, .. }) => attempt == waiting,
            (Waiting { attempt, .. }, Attempting { attempt: next }) => *next == attempt + 1,
            _ => false,
        }
    }

    fn advance(self, next: AttemptState) -> AttemptState {
        debug_assert!(
            self.can_transition_to(&next),
            "invalid retry transition {:?} -> {:?}",
            self,
            next
        );
        tracing::trace!(from = ?self, to = ?next, "retry state transition");
        next
    }
}

/// Everything one `execute_with_report` run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryReport<T> {
    pub result: ApiResult<T>,
    pub state: AttemptState,
    pub delays: Vec<Duration>,
}

impl<T> RetryReport<T> {
    pub fn attempts(&self) -> u32 {
        match self.state {
            AttemptState::Succeeded { attempts } | AttemptState::Failed { attempts } => attempts,
            AttemptState::Attempting { attempt } | AttemptState::Waiting { attempt, .. } => attempt,
            AttemptState::Idle => 0,
        }
    }

    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Runs an operation under a [`RetryPolicy`], bounding each attempt with a
/// timeout. Never fails: the last attempt's result is returned as data.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempt_timeout: Some(Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS)),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Leave timing entirely to the operation (e.g. a client with its own timeout).
    pub fn without_attempt_timeout(mut self) -> Self {
        self.attempt_timeout = None;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub async fn execute<T, F, Fut, R>(&self, operation: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = R>,
        R: IntoApiResult<T>,
    {
        self.execute_with_report(operation).await.result
    }

    pub async fn execute_with_report<T, F, Fut, R>(&self, mut operation: F) -> RetryReport<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = R>,
        R: IntoApiResult<T>,
    {
        let mut state = AttemptState::Idle;
        let mut delays = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            state = state.advance(AttemptState::Attempting { attempt });
            tracing::debug!(
                "🔁 Attempt {}/{}",
                attempt,
                self.policy.max_attempts()
            );

            let result = self.run_attempt(&mut operation).await;

            let Some(code) = result.code() else {
                state = state.advance(AttemptState::Succeeded { attempts: attempt });
                return RetryReport {
                    result,
                    state,
                    delays,
                };
            };
            tracing::debug!(
                "❌ Attempt {} failed [{}]: {}",
                attempt,
                code,
                result.error().unwrap_or_default()
            );

            if !self.policy.should_retry(attempt, code) {
                if attempt < self.policy.max_attempts() {
                    tracing::debug!("Failure code {} is not retryable, giving up", code);
                }
                state = state.advance(AttemptState::Failed { attempts: attempt });
                return RetryReport {
                    result,
                    state,
                    delays,
                };
            }

            let delay = self.policy.delay_for_attempt(attempt);
            state = state.advance(AttemptState::Waiting { attempt, delay });
            tracing::warn!(
                "⏳ Request failed with {}, retrying in {:?} (attempt {}/{})",
                code,
                delay,
                attempt + 1,
                self.policy.max_attempts()
            );
            tokio::time::sleep(delay).await;
            delays.push(delay);
        }
    }

    async fn run_attempt<T, F, Fut, R>(&self, operation: &mut F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = R>,
        R: IntoApiResult<T>,
    {
        let pending = operation();
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(outcome) => outcome.into_api_result(),
                Err(_) => ApiResult::failure(
                    format!("Request timed out after {}ms", limit.as_millis()),
                    ErrorCode::Timeout,
                ),
            },
            None => pending.await.into_api_result(),
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn policy(max_attempts: u32, base_delay_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_attempts, base_delay_ms).unwrap()
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(RetryPolicy::new(0, 1000).is_err());
    }

    #[test]
    fn test_delay_grows_linearly() {
        let policy = policy(4, 250);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(750));
    }

    #[test]
    fn test_state_machine_transitions() {
        let idle = AttemptState::Idle;
        assert!(idle.can_transition_to(&AttemptState::Attempting { attempt: 1 }));
        assert!(!idle.can_transition_to(&AttemptState::Succeeded { attempts: 1 }));

        let attempting = AttemptState::Attempting { attempt: 2 };
        assert!(attempting.can_transition_to(&AttemptState::Failed { attempts: 2 }));
        assert!(!attempting.can_transition_to(&AttemptState::Attempting { attempt: 3 }));

        let waiting = AttemptState::Waiting {
            attempt: 2,
            delay: Duration::from_secs(2),
        };
        assert!(waiting.can_transition_to(&AttemptState::Attempting { attempt: 3 }));
        assert!(AttemptState::Failed { attempts: 3 }.is_terminal());
        assert!(!waiting.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_runs_every_attempt() {
        let executor = RetryExecutor::new(policy(3, 1000));
        let mut calls = 0;
        let start = Instant::now();

        let report = executor
            .execute_with_report(|| {
                calls += 1;
                let n = calls;
                async move { ApiResult::<()>::failure(format!("boom {}", n), ErrorCode::NetworkError) }
            })
            .await;

        assert_eq!(calls, 3);
        assert_eq!(report.attempts(), 3);
        assert_eq!(report.state, AttemptState::Failed { attempts: 3 });
        assert_eq!(
            report.delays,
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_eq!(report.result.error(), Some("boom 3"));

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returns_immediately() {
        let executor = RetryExecutor::new(policy(5, 1000));
        let mut calls = 0;
        let start = Instant::now();

        let report = executor
            .execute_with_report(|| {
                calls += 1;
                async { ApiResult::success("ok") }
            })
            .await;

        assert_eq!(calls, 1);
        assert!(report.delays.is_empty());
        assert_eq!(report.result, ApiResult::success("ok"));
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_then_succeed() {
        let executor = RetryExecutor::new(policy(3, 1000));
        let mut calls = 0;

        let report = executor
            .execute_with_report(|| {
                calls += 1;
                let n = calls;
                async move {
                    if n < 2 {
                        ApiResult::failure("HTTP error! status: 503", ErrorCode::ServerError)
                    } else {
                        ApiResult::success(n)
                    }
                }
            })
            .await;

        assert_eq!(calls, 2);
        assert_eq!(report.result, ApiResult::success(2));
        assert_eq!(report.delays, vec![Duration::from_millis(1000)]);
        assert_eq!(report.state, AttemptState::Succeeded { attempts: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_attempts_are_retried() {
        let executor = RetryExecutor::new(policy(2, 10));
        let mut calls = 0;

        let result: ApiResult<u32> = executor
            .execute(|| {
                calls += 1;
                async { Err::<u32, ClientError>(ClientError::AuthenticationRequired) }
            })
            .await;

        assert_eq!(calls, 2);
        assert_eq!(result.code(), Some(ErrorCode::Unauthorized));
        assert_eq!(result.error(), Some("Authentication required"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out() {
        let executor =
            RetryExecutor::new(policy(1, 0)).with_attempt_timeout(Duration::from_millis(10_000));

        let result = executor
            .execute(std::future::pending::<ApiResult<()>>)
            .await;

        assert_eq!(result.code(), Some(ErrorCode::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let executor =
            RetryExecutor::new(policy(3, 100)).with_attempt_timeout(Duration::from_millis(500));
        let mut calls = 0;

        let report = executor
            .execute_with_report(|| {
                calls += 1;
                let n = calls;
                async move {
                    if n == 1 {
                        std::future::pending::<()>().await;
                    }
                    ApiResult::success(n)
                }
            })
            .await;

        assert_eq!(report.result, ApiResult::success(2));
        assert_eq!(report.delays, vec![Duration::from_millis(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_code_stops_early() {
        let policy = policy(3, 1000).with_retry_on(RetryOn::transient());
        let executor = RetryExecutor::new(policy);
        let mut calls = 0;

        let report = executor
            .execute_with_report(|| {
                calls += 1;
                async { ApiResult::<()>::failure("HTTP error! status: 404", ErrorCode::NotFound) }
            })
            .await;

        assert_eq!(calls, 1);
        assert_eq!(report.state, AttemptState::Failed { attempts: 1 });
        assert!(report.delays.is_empty());
    }
}
