//! 自适应速率控制
//!
//! 远端服务的限流阈值未知且随时间变化，控制器根据观察到的结果调整每次请求前的延迟：
//! 被限流时快速增长，成功时缓慢衰减。

use crate::error::{Result, TranslationError};
use crate::types::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 速率控制器
///
/// 每个后端实例持有自己的控制器，所有工作任务共享同一个延迟值。
/// 延迟以 `f64` 位模式存放在原子变量中，并发更新通过 CAS 循环完成。
///
/// ```rust
/// use ordered_translator::RateController;
///
/// let controller = RateController::default();
/// controller.on_rate_limited();
/// assert_eq!(controller.delay(), 0.05);
/// ```
#[derive(Debug)]
pub struct RateController {
    delay: AtomicU64,
    config: RetryConfig,
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RateController {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            delay: AtomicU64::new(0f64.to_bits()),
            config,
        }
    }

    /// 当前延迟（秒）
    pub fn delay(&self) -> f64 {
        f64::from_bits(self.delay.load(Ordering::Relaxed))
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let previous = self
            .delay
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(f(f64::from_bits(bits)).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f(f64::from_bits(previous))
    }

    /// 收到限流响应：延迟跳到下限或乘以增长倍数
    pub fn on_rate_limited(&self) -> f64 {
        let config = &self.config;
        self.update(|delay| {
            if delay < config.min_delay {
                config.initial_delay
            } else {
                (delay * config.growth).min(config.max_delay)
            }
        })
    }

    /// 未被限流的成功请求：延迟衰减，足够小时归零
    pub fn on_success(&self) -> f64 {
        let config = &self.config;
        self.update(|delay| {
            let next = delay * config.decay;
            if next < config.min_delay {
                0.0
            } else {
                next
            }
        })
    }

    /// 按 `delay × U(0.5, 1.0)` 等待，避免并行任务同步撞上限流
    pub async fn throttle(&self) {
        let delay = self.delay();
        if delay <= 0.0 {
            return;
        }

        let jittered = delay * rand::thread_rng().gen_range(0.5..=1.0);
        sleep(Duration::from_secs_f64(jittered)).await;
    }

    /// 在速率控制下执行一次远端调用
    ///
    /// * `RateLimited` - 增大延迟后重试，不计次数
    /// * `Server` - 固定间隔重试，达到 `max_server_errors` 次后返回错误
    /// * 其他错误立即返回
    pub async fn call<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut rate_limited = false;
        let mut server_errors = 0;

        loop {
            self.throttle().await;

            match operation().await {
                Ok(result) => {
                    if !rate_limited {
                        self.on_success();
                    }
                    return Ok(result);
                }
                Err(TranslationError::RateLimited(message)) => {
                    rate_limited = true;
                    let delay = self.on_rate_limited();
                    debug!(delay, %message, "rate limited, backing off");
                }
                Err(e @ TranslationError::Server { .. }) => {
                    server_errors += 1;
                    if server_errors >= self.config.max_server_errors {
                        return Err(e);
                    }
                    warn!(
                        attempt = server_errors,
                        error = %e,
                        "server error, retrying in {}ms",
                        self.config.server_retry_interval_ms
                    );
                    sleep(Duration::from_millis(self.config.server_retry_interval_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
