//! # 工具模块
//!
//! 这个模块包含各种工具函数和实用程序：
//!
//! - 裸 URL 文本识别
//! - 特殊平台（视频站点）识别
//! - URL规范化和域名提取
//!
//! # 模块组织
//!
//! - `url` - URL分类、规范化、域名提取等工具函数

pub mod url;

// Re-export commonly used items for convenience
pub use url::{
    get_domain, is_candidate_text, is_special_platform, is_url_and_has_protocol,
    normalize_link_url, normalize_url, resolve_url, special_platform, SpecialPlatform, Url,
};
