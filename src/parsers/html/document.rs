//! 可观察的活动文档
//!
//! 在 `RcDom` 之上提供类似浏览器 MutationObserver 的接口：
//! 所有经由 `LiveDocument` 的修改都会以 `MutationRecord` 的形式广播给订阅者。

use std::cell::RefCell;

use markup5ever_rcdom::{Handle, RcDom};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use url::Url;

use super::dom::{
    append_child, detach, get_child_node_by_name, get_parent_node, html_to_dom, set_node_attr,
    set_node_text,
};

/// 变更类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// 子节点增删
    ChildList,
    /// 属性变更（属性名）
    Attributes(String),
    /// 文本内容变更
    CharacterData,
}

/// 单条变更记录
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: Handle,
    pub added_nodes: Vec<Handle>,
    pub removed_nodes: Vec<Handle>,
}

/// 页面文档及其变更广播
pub struct LiveDocument {
    dom: RcDom,
    url: Url,
    observers: RefCell<Vec<UnboundedSender<MutationRecord>>>,
}

impl LiveDocument {
    pub fn new(dom: RcDom, url: Url) -> Self {
        Self {
            dom,
            url,
            observers: RefCell::new(Vec::new()),
        }
    }

    /// 从 HTML 字符串直接创建文档
    pub fn parse(html: &str, url: Url) -> std::io::Result<Self> {
        let dom = html_to_dom(html.as_bytes(), "utf-8".to_string())?;
        Ok(Self::new(dom, url))
    }

    /// 文档根节点
    pub fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    /// `<body>` 元素（如果存在）
    pub fn body(&self) -> Option<Handle> {
        get_child_node_by_name(&self.dom.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// 页面所属域名（小写）
    pub fn domain(&self) -> String {
        self.url
            .host_str()
            .map(|h| h.to_lowercase())
            .unwrap_or_default()
    }

    /// 订阅整个文档的变更
    pub fn subscribe(&self) -> UnboundedReceiver<MutationRecord> {
        let (tx, rx) = unbounded_channel();
        self.observers.borrow_mut().push(tx);
        rx
    }

    /// 解析 HTML 片段并追加到 `parent` 末尾，返回新增的顶层节点
    pub fn append_html(&self, parent: &Handle, html: &str) -> std::io::Result<Vec<Handle>> {
        let wrapper = format!("<html><body>{}</body></html>", html);
        let fragment = html_to_dom(wrapper.as_bytes(), "utf-8".to_string())?;

        let nodes: Vec<Handle> = get_child_node_by_name(&fragment.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"))
            .map(|body| body.children.borrow().clone())
            .unwrap_or_default();

        for node in &nodes {
            append_child(parent, node.clone());
        }

        self.notify(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent.clone(),
            added_nodes: nodes.clone(),
            removed_nodes: Vec::new(),
        });

        Ok(nodes)
    }

    /// 从文档中移除节点
    pub fn remove(&self, node: &Handle) {
        let Some(parent) = get_parent_node(node) else {
            return;
        };
        detach(node);

        self.notify(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![node.clone()],
        });
    }

    /// 设置或移除属性
    pub fn set_attribute(&self, node: &Handle, name: &str, value: Option<String>) {
        set_node_attr(node, name, value);
        self.notify(MutationRecord {
            kind: MutationKind::Attributes(name.to_string()),
            target: node.clone(),
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        });
    }

    /// 替换元素的文本内容
    pub fn set_text(&self, node: &Handle, text: &str) {
        set_node_text(node, text);
        self.notify(MutationRecord {
            kind: MutationKind::CharacterData,
            target: node.clone(),
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        });
    }

    /// 取回底层 DOM 用于序列化
    pub fn into_dom(self) -> RcDom {
        self.dom
    }

    fn notify(&self, record: MutationRecord) {
        // 已关闭的订阅者直接丢弃
        self.observers
            .borrow_mut()
            .retain(|tx| tx.send(record.clone()).is_ok());
    }
}
