//! DOM 修改器与悬停提示
//!
//! 把解析到的标题写回链接元素，并在元素上保存提示层所需的元数据。
//! 修改在会话内不可逆，不保留原始文本。

use std::cell::Cell;

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{get_node_attr, get_node_name, set_node_attr, set_node_text};
use crate::resolution::core::service::LinkDetails;
use crate::resolution::storage::CandidateLink;
use crate::utils::url::get_domain;

pub const ATTR_TITLE: &str = "data-linklens-title";
pub const ATTR_DESCRIPTION: &str = "data-linklens-description";
pub const ATTR_PLATFORM: &str = "data-linklens-platform";
pub const ATTR_DOMAIN: &str = "data-linklens-domain";
/// 已入队、尚未得到结果的链接
pub const ATTR_PENDING: &str = "data-linklens-pending";

/// 未识别平台时的默认平台名
pub const GENERIC_PLATFORM: &str = "generic";

/// 提示层显示的数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipData {
    pub title: String,
    pub description: Option<String>,
    pub domain: String,
    pub platform: String,
}

/// 提示层（纯展示，渲染不在本库范围内）
pub trait TooltipLayer {
    fn show(&self, target: &Handle, data: TooltipData);
    fn hide(&self);
}

/// 指针事件
#[derive(Debug, Clone)]
pub enum HoverEvent {
    /// 悬停意图
    Intent(Handle),
    /// 指针离开
    Leave(Handle),
}

/// 链接文本：特殊平台加 `[标签] ` 前缀
pub fn display_text(link: &CandidateLink, title: &str) -> String {
    match link.platform() {
        Some(platform) => format!("[{}] {}", platform.label(), title),
        None => title.to_string(),
    }
}

/// DOM 修改器
#[derive(Debug, Default)]
pub struct DomMutator {
    applied: Cell<u64>,
}

impl DomMutator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把结果写到链接元素上；没有结果或元素已离开文档时不做任何修改
    pub fn apply(&self, link: &CandidateLink, details: Option<&LinkDetails>) -> bool {
        clear_pending(link);

        let Some(details) = details else {
            return false;
        };
        let Some(element) = link.element() else {
            tracing::debug!("链接元素已离开文档，跳过: {}", link.url());
            return false;
        };

        let platform = details
            .platform
            .clone()
            .or_else(|| link.platform().map(|p| p.name().to_string()))
            .unwrap_or_else(|| GENERIC_PLATFORM.to_string());

        set_node_text(&element, &display_text(link, &details.title));
        set_node_attr(&element, "title", Some(details.title.clone()));
        set_node_attr(&element, ATTR_TITLE, Some(details.title.clone()));
        set_node_attr(&element, ATTR_DESCRIPTION, details.description.clone());
        set_node_attr(&element, ATTR_PLATFORM, Some(platform));
        set_node_attr(&element, ATTR_DOMAIN, Some(get_domain(link.url())));

        self.applied.set(self.applied.get() + 1);
        true
    }

    pub fn applied(&self) -> u64 {
        self.applied.get()
    }
}

/// 读取已修改链接上的提示数据；未被修改的元素返回 `None`
pub fn hover_metadata(anchor: &Handle) -> Option<TooltipData> {
    if get_node_name(anchor) != Some("a") {
        return None;
    }

    let title = get_node_attr(anchor, ATTR_TITLE)?;
    Some(TooltipData {
        title,
        description: get_node_attr(anchor, ATTR_DESCRIPTION),
        domain: get_node_attr(anchor, ATTR_DOMAIN).unwrap_or_default(),
        platform: get_node_attr(anchor, ATTR_PLATFORM)
            .unwrap_or_else(|| GENERIC_PLATFORM.to_string()),
    })
}

/// 已被修改过的链接
pub fn is_annotated(anchor: &Handle) -> bool {
    get_node_attr(anchor, ATTR_TITLE).is_some()
}

/// 标记链接已入队，重复扫描时不再接纳同一元素
pub fn mark_pending(link: &CandidateLink) {
    if let Some(element) = link.element() {
        set_node_attr(&element, ATTR_PENDING, Some(String::new()));
    }
}

/// 清除入队标记：批次完成或失败后调用
pub fn clear_pending(link: &CandidateLink) {
    if let Some(element) = link.element() {
        set_node_attr(&element, ATTR_PENDING, None);
    }
}

pub fn is_pending(anchor: &Handle) -> bool {
    get_node_attr(anchor, ATTR_PENDING).is_some()
}
