//! 变更观察桥接
//!
//! 订阅文档的子树新增，只收集新增节点（含其子树）中的 `<a>` 元素，
//! 忽略移除和属性变更。启动时的全量扫描也走同一套候选判断。

use std::cell::RefCell;
use std::future::poll_fn;
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

use crate::parsers::html::dom::{find_anchors, get_node_attr, get_node_text};
use crate::parsers::html::{MutationKind, MutationRecord};
use crate::resolution::pipeline::batch::IdleTracker;
use crate::resolution::processor::{is_annotated, is_pending};
use crate::resolution::storage::CandidateLink;
use crate::utils::url::{is_candidate_text, normalize_link_url};

/// 判断锚点是否为候选链接：可见文本是裸 URL 且能得到 http(s) 地址
pub fn candidate_from_anchor(anchor: &Handle, base_url: &Url) -> Option<CandidateLink> {
    // 已改写或正在等待结果的元素不再接纳
    if is_annotated(anchor) || is_pending(anchor) {
        return None;
    }

    let text = get_node_text(anchor);
    if !is_candidate_text(&text) {
        return None;
    }

    let href = get_node_attr(anchor, "href");
    let url = normalize_link_url(href.as_deref(), &text, base_url)?;
    Some(CandidateLink::new(anchor, url))
}

/// 子树中的全部候选链接（文档顺序）
pub fn collect_candidates(root: &Handle, base_url: &Url) -> Vec<CandidateLink> {
    find_anchors(root)
        .iter()
        .filter_map(|anchor| candidate_from_anchor(anchor, base_url))
        .collect()
}

/// 变更记录中新增的锚点
pub fn added_anchors(record: &MutationRecord) -> Vec<Handle> {
    if record.kind != MutationKind::ChildList {
        return Vec::new();
    }

    record.added_nodes.iter().flat_map(find_anchors).collect()
}

/// 变更观察桥接
///
/// 每条记录都刷新空闲状态。接收端放在 `RefCell` 中，借用从不跨越 await，
/// 因此后台循环和同步排空可以共用同一个订阅。
pub struct MutationBridge {
    records: RefCell<UnboundedReceiver<MutationRecord>>,
    tracker: Option<Rc<IdleTracker>>,
}

impl MutationBridge {
    pub fn new(records: UnboundedReceiver<MutationRecord>, tracker: Option<Rc<IdleTracker>>) -> Self {
        Self {
            records: RefCell::new(records),
            tracker,
        }
    }

    /// 等待下一条记录并返回其中新增的锚点；文档关闭（所有发送端释放）后返回 `None`
    pub async fn next(&self) -> Option<Vec<Handle>> {
        let record = poll_fn(|cx| self.records.borrow_mut().poll_recv(cx)).await?;
        Some(self.accept(&record))
    }

    /// 同步取出已经到达的全部记录
    pub fn drain(&self) -> Vec<Handle> {
        let mut anchors = Vec::new();
        loop {
            let record = self.records.borrow_mut().try_recv();
            match record {
                Ok(record) => anchors.extend(self.accept(&record)),
                Err(_) => break,
            }
        }
        anchors
    }

    fn accept(&self, record: &MutationRecord) -> Vec<Handle> {
        if let Some(tracker) = &self.tracker {
            tracker.touch();
        }

        let anchors = added_anchors(record);
        if !anchors.is_empty() {
            tracing::debug!("观察到 {} 个新增链接", anchors.len());
        }
        anchors
    }
}
