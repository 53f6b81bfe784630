//! 批次调度器
//!
//! 避免每发现一个链接就发一次请求。首次入队后"武装"调度器：
//! 先让出执行权直到宿主空闲（有上限），无法检测空闲时退化为固定短延迟；
//! 之后再等一个静默窗口吸收突发的变更，然后把整个待发批次一次性发出。
//!
//! 两种让出方式实现同一个 [`YieldStrategy`]，在构造时按能力检测选择。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, sleep_until, Instant};

use crate::resolution::config::PipelineConfig;

/// 让出执行权的策略
#[async_trait(?Send)]
pub trait YieldStrategy {
    /// 等待到可以开始静默窗口的时刻
    async fn yield_to_host(&self);

    fn name(&self) -> &'static str;
}

/// 宿主活动记录
///
/// 变更桥接每收到一条变更记录就调用 [`IdleTracker::touch`]，
/// 超过宽限时间没有活动即视为空闲。
#[derive(Debug)]
pub struct IdleTracker {
    last_activity: Cell<Instant>,
    grace: Duration,
}

impl IdleTracker {
    pub fn new(grace: Duration) -> Self {
        Self {
            last_activity: Cell::new(Instant::now()),
            grace,
        }
    }

    pub fn touch(&self) {
        self.last_activity.set(Instant::now());
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity.get()
    }

    /// 宿主变为空闲的时刻
    pub fn idle_at(&self) -> Instant {
        self.last_activity.get() + self.grace
    }

    pub fn is_idle(&self) -> bool {
        Instant::now() >= self.idle_at()
    }
}

/// 基于空闲检测的让出：等待宿主空闲，最长 `timeout`
pub struct IdleYield {
    tracker: Rc<IdleTracker>,
    timeout: Duration,
}

impl IdleYield {
    pub fn new(tracker: Rc<IdleTracker>, timeout: Duration) -> Self {
        Self { tracker, timeout }
    }
}

#[async_trait(?Send)]
impl YieldStrategy for IdleYield {
    async fn yield_to_host(&self) {
        let deadline = Instant::now() + self.timeout;

        loop {
            let idle_at = self.tracker.idle_at();
            let now = Instant::now();
            if now >= idle_at || now >= deadline {
                return;
            }
            // 等待期间可能又有新活动，醒来后重新检查
            sleep_until(idle_at.min(deadline)).await;
        }
    }

    fn name(&self) -> &'static str {
        "idle"
    }
}

/// 固定延迟的让出
pub struct TimerYield {
    delay: Duration,
}

impl TimerYield {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait(?Send)]
impl YieldStrategy for TimerYield {
    async fn yield_to_host(&self) {
        sleep(self.delay).await;
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

/// 按能力选择让出策略：有空闲信号时用空闲检测，否则用固定延迟
pub fn detect(config: &PipelineConfig, tracker: Option<Rc<IdleTracker>>) -> Box<dyn YieldStrategy> {
    match tracker {
        Some(tracker) => Box::new(IdleYield::new(tracker, config.idle_timeout())),
        None => Box::new(TimerYield::new(config.fallback_delay())),
    }
}

/// 批次调度器
pub struct BatchScheduler {
    strategy: Box<dyn YieldStrategy>,
    quiet_window: Duration,
    armed: Cell<bool>,
}

impl BatchScheduler {
    pub fn new(strategy: Box<dyn YieldStrategy>, quiet_window: Duration) -> Self {
        Self {
            strategy,
            quiet_window,
            armed: Cell::new(false),
        }
    }

    pub fn from_config(config: &PipelineConfig, tracker: Option<Rc<IdleTracker>>) -> Self {
        Self::new(detect(config, tracker), config.quiet_window())
    }

    /// 武装调度器；已武装时返回 `false`，调用方不应再启动新的定时任务
    pub fn arm(&self) -> bool {
        !self.armed.replace(true)
    }

    /// 取出批次时解除武装，之后的入队会重新武装
    pub fn disarm(&self) {
        self.armed.set(false);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    /// 让出 + 静默窗口
    pub async fn wait_for_flush(&self) {
        self.strategy.yield_to_host().await;
        sleep(self.quiet_window).await;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}
