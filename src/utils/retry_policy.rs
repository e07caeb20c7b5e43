// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 重试策略配置
///
/// 编排器在临时性失败后、切换到下一个引擎之前按该策略退避。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 单个请求允许的最大退避次数
    pub max_retries: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: false,
        }
    }
}

impl RetryPolicy {
    /// 创建标准重试策略
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            ..Self::default()
        }
    }

    /// 不退避的策略（测试与本地调试用）
    pub fn immediate() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.enable_jitter = true;
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// 计算第 `attempt` 次退避的时间（从 1 开始）
    ///
    /// `initial × multiplier^(attempt-1)`，不超过 `max_backoff`。
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let max_nanos = self.max_backoff.as_nanos() as f64;
        let backoff_nanos =
            self.initial_backoff.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);

        // 限制最大退避时间
        let capped_nanos = backoff_nanos.min(max_nanos);

        // 添加抖动
        let final_nanos = if self.enable_jitter && capped_nanos > 0.0 && self.jitter_factor > 0.0 {
            let jitter_range = capped_nanos * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..jitter_range);
            (capped_nanos + jitter).clamp(0.0, max_nanos)
        } else {
            capped_nanos
        };

        Duration::from_nanos(final_nanos.round() as u64)
    }

    /// 是否还允许退避
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// 所有退避时间之和的上限
    pub fn total_backoff_cap(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| {
                let mut policy = self.clone();
                policy.enable_jitter = false;
                policy.calculate_backoff(attempt)
            })
            .fold(Duration::ZERO, |total, backoff| total.saturating_add(backoff))
    }
}
