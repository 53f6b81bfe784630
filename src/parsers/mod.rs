//! # 解析器模块
//!
//! 这个模块包含HTML解析和DOM操作功能：
//!
//! - HTML解析和序列化
//! - DOM节点查询和修改
//! - 可观察的活动文档（MutationObserver 风格的变更广播）

pub mod html;

// Re-export commonly used items for convenience
pub use html::{
    find_anchors, get_base_url, get_charset, get_title, html_to_dom, serialize_document,
    LiveDocument, MutationKind, MutationRecord,
};
