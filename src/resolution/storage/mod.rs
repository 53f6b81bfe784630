//! 存储模块
//!
//! 链接队列和会话内的解析结果缓存

pub mod cache;

pub use cache::{AdmitOutcome, CandidateLink, LinkBatch, LinkQueue, LinkState, QueueStats};
