use crate::domain::ports::{NoopObserver, PipelineObserver};
use crate::utils::error::{BookError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 指數退避設定：第 n 次重試前等待 `base_delay * 2^(n-1)`，上限 `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSpec {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffSpec {
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Self::DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// `retry` 從 1 開始計算
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// `max_retries` 為重試次數，總執行次數為 `max_retries + 1`，上限 `u32::MAX` 次。
/// 執行次數以 `u32` 計數，`max_retries == u32::MAX` 時在第 `u32::MAX` 次後停止。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// 只執行一次
    #[default]
    None,
    /// 立即重跑整條管線，不過濾錯誤種類；用盡後回傳最後一次的原始錯誤
    Fixed { max_retries: u32 },
    /// 只對查詢失敗重試；用盡後回傳 `RetriesExhausted`
    Backoff(BackoffSpec),
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32) -> Self {
        RetryPolicy::Fixed { max_retries }
    }

    pub fn backoff(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy::Backoff(BackoffSpec::new(max_retries, base_delay))
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_retries } => *max_retries,
            RetryPolicy::Backoff(spec) => spec.max_retries,
        }
    }

    /// 重試過濾條件
    pub fn matches(&self, error: &BookError) -> bool {
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Fixed { .. } => true,
            RetryPolicy::Backoff(_) => error.is_retryable(),
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            RetryPolicy::Backoff(spec) => spec.delay_for(retry),
            _ => Duration::ZERO,
        }
    }

    /// `attempt` 為已執行次數
    pub fn has_retries_left(&self, attempt: u32) -> bool {
        attempt < self.max_retries().saturating_add(1)
    }

    /// Running 狀態執行結束後的轉移
    pub fn on_outcome<T>(&self, attempt: u32, outcome: Result<T>) -> RetryState<T> {
        match outcome {
            Ok(value) => RetryState::Succeeded(value),
            Err(error) if self.matches(&error) => RetryState::FailedRetryable { attempt, error },
            Err(error) => RetryState::FailedTerminal(error),
        }
    }

    /// FailedRetryable 狀態的轉移：還有次數就回到 Running，否則 Exhausted
    pub fn advance<T>(&self, attempt: u32, error: BookError) -> RetryState<T> {
        if self.has_retries_left(attempt) {
            return RetryState::Running {
                attempt: attempt.saturating_add(1),
                delay: self.delay_for(attempt),
            };
        }

        match self {
            RetryPolicy::Backoff(spec) => RetryState::Exhausted(BookError::RetriesExhausted {
                retries: spec.max_retries,
                last: Box::new(error),
            }),
            _ => RetryState::Exhausted(error),
        }
    }
}

#[derive(Debug)]
pub enum RetryState<T> {
    /// `delay` 是這次執行前要等待的時間
    Running { attempt: u32, delay: Duration },
    FailedRetryable { attempt: u32, error: BookError },
    FailedTerminal(BookError),
    Succeeded(T),
    Exhausted(BookError),
}

impl<T> RetryState<T> {
    pub fn start() -> Self {
        RetryState::Running {
            attempt: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::FailedTerminal(_) | RetryState::Succeeded(_) | RetryState::Exhausted(_)
        )
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// 只記錄延遲、不真的等待，測試用
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for TrackingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
    }
}

/// 依照 `RetryPolicy` 驅動狀態機，每次重試都從頭執行整個 operation
pub struct RetryExecutor {
    name: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn PipelineObserver>,
}

impl RetryExecutor {
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::start();

        loop {
            state = match state {
                RetryState::Running { attempt, delay } => {
                    if !delay.is_zero() {
                        self.sleeper.sleep(delay).await;
                    }
                    tracing::debug!("▶️ {}: attempt {}", self.name, attempt);
                    let outcome = operation(attempt).await;
                    self.policy.on_outcome(attempt, outcome)
                }
                RetryState::FailedRetryable { attempt, error } => {
                    if self.policy.has_retries_left(attempt) {
                        let delay = self.policy.delay_for(attempt);
                        tracing::warn!(
                            "🔁 {}: attempt {} failed ({}), retrying in {:?}",
                            self.name,
                            attempt,
                            error,
                            delay
                        );
                        self.observer
                            .on_retry(&self.name, attempt.saturating_add(1), delay, &error);
                    }
                    self.policy.advance(attempt, error)
                }
                RetryState::FailedTerminal(error) => {
                    tracing::error!("❌ {}: non-retryable failure: {}", self.name, error);
                    return Err(error);
                }
                RetryState::Exhausted(error) => {
                    tracing::error!("❌ {}: giving up: {}", self.name, error);
                    return Err(error);
                }
                RetryState::Succeeded(value) => return Ok(value),
            };
        }
    }
}
