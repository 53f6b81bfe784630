//! 链接处理管道
//!
//! 提供域名过滤、变更观察和批次调度

pub mod batch;
pub mod collector;
pub mod filters;

// 重新导出主要类型
pub use batch::{BatchScheduler, IdleTracker, IdleYield, TimerYield, YieldStrategy};
pub use collector::{added_anchors, candidate_from_anchor, collect_candidates, MutationBridge};
pub use filters::{is_in_scope, is_listed};
