//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `document`: 可观察的活动文档（变更记录广播）
//! - `metadata`: 文档元数据处理
//! - `serializer`: 序列化功能

pub mod document;
pub mod dom;
pub mod metadata;
pub mod serializer;

pub use document::{LiveDocument, MutationKind, MutationRecord};
pub use dom::{
    append_child, detach, find_anchors, find_nodes, get_child_node_by_name, get_node_attr,
    get_node_name, get_node_text, get_parent_node, html_to_dom, is_connected, set_node_attr,
    set_node_text,
};
pub use metadata::{get_base_url, get_charset, get_title};
pub use serializer::serialize_document;
