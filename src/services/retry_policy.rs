//! 重试策略
//!
//! 退避时长是纯函数，等待动作通过 [`Sleeper`] 注入，测试中不需要真实等待。

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::ServiceError;

/// 重试参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次）
    pub max_attempts: u32,
    /// 指数退避的时间单位
    pub backoff_unit: Duration,
    /// 429 时额外等待
    pub rate_limit_delay: Duration,
    /// 5xx 时额外等待
    pub server_error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(10),
            server_error_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_unit: Duration::from_secs(config.backoff_unit_secs),
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
            server_error_delay: Duration::from_secs(config.server_error_delay_secs),
        }
    }

    /// 第 `attempt` 次（从 0 开始）失败后的指数退避：`unit × 2^(attempt+1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_add(1));
        self.backoff_unit.saturating_mul(factor)
    }

    /// 按失败类型额外等待的时长
    pub fn penalty(&self, error: &ServiceError) -> Duration {
        match error {
            ServiceError::RateLimited { .. } => self.rate_limit_delay,
            ServiceError::Server { .. } => self.server_error_delay,
            _ => Duration::ZERO,
        }
    }

    /// 第 `attempt` 次失败后、下一次尝试前的总等待时长
    pub fn delay_after(&self, error: &ServiceError, attempt: u32) -> Duration {
        self.penalty(error).saturating_add(self.backoff(attempt))
    }

    /// 第 `attempt` 次之后是否还有机会
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

/// 等待能力
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// 生产环境：tokio 定时器
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
