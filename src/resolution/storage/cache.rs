//! 链接队列与会话缓存
//!
//! 以规范化后的 URL 字符串为键记录每个链接的状态：
//! 已解析（含会话内缓存的标题）、等待中（排队或请求中）、失败（可重新入队）。
//! 元素引用只作为最终修改 DOM 的载荷，不参与任何比较或查找。

use std::collections::{HashMap, HashSet};
use std::rc::Weak;
use std::time::Instant;

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::dom::is_connected;
use crate::resolution::core::service::LinkDetails;
use crate::utils::url::{special_platform, SpecialPlatform};

// ============================================================================
// 核心类型
// ============================================================================

/// 待解析的候选链接
#[derive(Debug, Clone)]
pub struct CandidateLink {
    element: Weak<Node>,
    url: String,
    platform: Option<SpecialPlatform>,
}

/// 单个 URL 的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unseen,
    /// 已排队或请求中
    Pending,
    /// 终态，不会再次请求
    Resolved,
    /// 请求失败，下次发现时可重新入队
    Failed,
}

/// 入队结果
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitOutcome {
    /// 新 URL，进入下一批次
    Queued,
    /// URL 已在下一批次中，元素随该批次一起处理
    Coalesced,
    /// URL 正在请求中，元素等待该请求的结果
    Waiting,
    /// URL 已解析，直接使用缓存结果
    Cached(Option<LinkDetails>),
}

/// 一次发送的批次
#[derive(Debug, Clone)]
pub struct LinkBatch {
    pub id: u64,
    pub links: Vec<CandidateLink>,
    pub created_at: Instant,
}

/// 队列统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub admitted: u64,
    pub coalesced: u64,
    pub waiting: u64,
    pub cache_hits: u64,
    pub resolved_urls: u64,
    pub failed_urls: u64,
}

/// 链接队列
#[derive(Debug, Default)]
pub struct LinkQueue {
    resolved: HashMap<String, Option<LinkDetails>>,
    pending: HashSet<String>,
    failed: HashSet<String>,
    pending_batch: Vec<CandidateLink>,
    in_flight: HashMap<String, Vec<CandidateLink>>,
    next_batch_id: u64,
    stats: QueueStats,
}

// ============================================================================
// 实现
// ============================================================================

impl CandidateLink {
    pub fn new(element: &Handle, url: String) -> Self {
        let platform = special_platform(&url);
        Self {
            element: std::rc::Rc::downgrade(element),
            url,
            platform,
        }
    }

    /// 仍在文档中的元素；元素已被回收或移出文档时返回 `None`
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade().filter(is_connected)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn platform(&self) -> Option<SpecialPlatform> {
        self.platform
    }

    pub fn is_special_platform(&self) -> bool {
        self.platform.is_some()
    }
}

impl LinkBatch {
    /// 去重后的 URL 列表（保持发现顺序）
    pub fn urls(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.links
            .iter()
            .filter(|link| seen.insert(link.url.as_str()))
            .map(|link| link.url.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl LinkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接纳一个候选链接
    pub fn admit(&mut self, link: CandidateLink) -> AdmitOutcome {
        if let Some(details) = self.resolved.get(&link.url) {
            self.stats.cache_hits += 1;
            return AdmitOutcome::Cached(details.clone());
        }

        if let Some(waiters) = self.in_flight.get_mut(&link.url) {
            waiters.push(link);
            self.stats.waiting += 1;
            return AdmitOutcome::Waiting;
        }

        if self.pending.contains(&link.url) {
            self.pending_batch.push(link);
            self.stats.coalesced += 1;
            return AdmitOutcome::Coalesced;
        }

        self.failed.remove(&link.url);
        self.pending.insert(link.url.clone());
        self.pending_batch.push(link);
        self.stats.admitted += 1;
        AdmitOutcome::Queued
    }

    /// 取出下一批次，批次中的 URL 转为请求中
    pub fn take_batch(&mut self) -> Option<LinkBatch> {
        if self.pending_batch.is_empty() {
            return None;
        }

        let links = std::mem::take(&mut self.pending_batch);
        for link in &links {
            self.in_flight.entry(link.url.clone()).or_default();
        }

        self.next_batch_id += 1;
        Some(LinkBatch {
            id: self.next_batch_id,
            links,
            created_at: Instant::now(),
        })
    }

    /// 批次成功完成：所有 URL 都记为已解析（无论是否有标题）。
    /// 返回需要交给 DOM 修改器的 (链接, 结果) 列表，包括请求期间等待的元素。
    pub fn complete_batch(
        &mut self,
        batch: LinkBatch,
        results: &HashMap<String, LinkDetails>,
    ) -> Vec<(CandidateLink, Option<LinkDetails>)> {
        for url in batch.urls() {
            self.pending.remove(&url);
            self.failed.remove(&url);
            self.resolved.insert(url.clone(), results.get(&url).cloned());
            self.stats.resolved_urls += 1;
        }

        let mut applications = Vec::with_capacity(batch.links.len());
        for link in batch.links {
            if let Some(waiters) = self.in_flight.remove(&link.url) {
                let details = results.get(&link.url).cloned();
                applications.extend(waiters.into_iter().map(|w| (w, details.clone())));
            }
            let details = results.get(&link.url).cloned();
            applications.push((link, details));
        }

        applications
    }

    /// 批次失败：释放等待状态，URL 可在下次发现时重新入队。
    /// 返回被放弃的链接（含等待中的元素）。
    pub fn fail_batch(&mut self, batch: LinkBatch) -> Vec<CandidateLink> {
        for url in batch.urls() {
            self.pending.remove(&url);
            self.failed.insert(url);
            self.stats.failed_urls += 1;
        }

        let mut dropped = Vec::with_capacity(batch.links.len());
        for link in batch.links {
            if let Some(waiters) = self.in_flight.remove(&link.url) {
                dropped.extend(waiters);
            }
            dropped.push(link);
        }
        dropped
    }

    pub fn state(&self, url: &str) -> LinkState {
        if self.resolved.contains_key(url) {
            LinkState::Resolved
        } else if self.pending.contains(url) {
            LinkState::Pending
        } else if self.failed.contains(url) {
            LinkState::Failed
        } else {
            LinkState::Unseen
        }
    }

    /// 会话缓存中的结果（外层 `None` 表示尚未解析）
    pub fn cached(&self, url: &str) -> Option<Option<&LinkDetails>> {
        self.resolved.get(url).map(Option::as_ref)
    }

    pub fn has_pending_batch(&self) -> bool {
        !self.pending_batch.is_empty()
    }

    pub fn pending_batch_len(&self) -> usize {
        self.pending_batch.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// 没有排队也没有请求中的链接
    pub fn is_idle(&self) -> bool {
        self.pending_batch.is_empty() && self.in_flight.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.clone()
    }
}
