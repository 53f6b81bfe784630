//! # LinkLens Library
//!
//! 把页面中可见文本为裸 URL 的链接改写为可读的页面标题。
//!
//! ## 模块组织
//!
//! - `core` - 文档处理入口（读取、解析、运行流水线、序列化）
//! - `env` - 类型安全的环境变量
//! - `parsers` - HTML 解析、DOM 操作与可观察的活动文档
//! - `resolution` - 链接解析流水线（过滤、排队、调度、请求、改写）
//! - `utils` - URL 分类与规范化

pub mod core;
pub mod env;
pub mod parsers;
pub mod resolution;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::*;
pub use crate::parsers::*;
pub use crate::utils::*;
