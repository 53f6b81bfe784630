//! 链接解析流水线
//!
//! 每个页面构造一个 [`LinkPipeline`]，它拥有链接队列、批次调度器、解析服务客户端、
//! DOM 修改器以及可选的提示层。所有状态都在单线程的执行时间线上访问，
//! 不需要任何锁；"每个 URL 至多一个请求"由队列的状态转换保证。
//!
//! ## 工作流程
//! 1. 启动时按域名策略判断页面是否在处理范围内，不在范围内则什么都不做
//! 2. 订阅文档变更，全量扫描一次现有链接
//! 3. 每个新发现的候选链接入队；首次入队武装调度器
//! 4. 让出 + 静默窗口之后取出整个待发批次，发送一次请求
//! 5. 成功时写回标题；失败时释放等待状态，等下次发现时重试
//!
//! 后台任务通过 `tokio::task::spawn_local` 启动，必须在 `LocalSet` 中运行。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Instant;

use markup5ever_rcdom::Handle;
use tokio::sync::{Notify, Semaphore};
use url::Url;

use crate::parsers::html::metadata::get_base_url;
use crate::parsers::html::LiveDocument;
use crate::resolution::config::{PipelineConfig, Settings};
use crate::resolution::core::service::ResolverClient;
use crate::resolution::pipeline::batch::{BatchScheduler, IdleTracker};
use crate::resolution::pipeline::collector::{
    candidate_from_anchor, collect_candidates, MutationBridge,
};
use crate::resolution::pipeline::filters::is_in_scope;
use crate::resolution::processor::{
    clear_pending, hover_metadata, is_annotated, mark_pending, DomMutator, HoverEvent,
    TooltipLayer,
};
use crate::resolution::storage::{AdmitOutcome, CandidateLink, LinkQueue};
use crate::utils::url::resolve_url;

/// 流水线统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// 新入队的 URL
    pub admitted: u64,
    /// 并入已排队 URL 的重复元素
    pub coalesced: u64,
    /// 等待请求中 URL 的重复元素
    pub waiting: u64,
    /// 会话缓存命中
    pub cache_hits: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    /// 实际写回 DOM 的链接数
    pub links_applied: u64,
}

struct Inner {
    queue: RefCell<LinkQueue>,
    scheduler: BatchScheduler,
    client: Rc<dyn ResolverClient>,
    mutator: DomMutator,
    tooltip: Option<Rc<dyn TooltipLayer>>,
    bridge: Option<Rc<MutationBridge>>,
    base_url: Url,
    // 同一时间只允许一个批次在途
    gate: Semaphore,
    settled: Notify,
    batches_sent: Cell<u64>,
    batches_failed: Cell<u64>,
}

/// 单个页面的链接解析流水线
#[derive(Clone)]
pub struct LinkPipeline {
    inner: Rc<Inner>,
}

impl LinkPipeline {
    /// 为页面启动流水线；页面不在处理范围内时返回 `None`
    pub fn start(
        document: &LiveDocument,
        settings: &Settings,
        client: Rc<dyn ResolverClient>,
        config: &PipelineConfig,
        tooltip: Option<Rc<dyn TooltipLayer>>,
    ) -> Option<Self> {
        let domain = document.domain();
        if !is_in_scope(&domain, settings) {
            tracing::info!("页面域名 {} 不在处理范围内，跳过", domain);
            return None;
        }

        let base_url = match get_base_url(&document.document()) {
            Some(base) => resolve_url(document.url(), &base),
            None => document.url().clone(),
        };

        // 有变更订阅即可检测空闲
        let tracker = Rc::new(IdleTracker::new(config.idle_grace()));
        let bridge = Rc::new(MutationBridge::new(
            document.subscribe(),
            Some(tracker.clone()),
        ));
        let scheduler = BatchScheduler::from_config(config, Some(tracker));

        let pipeline = Self::with_parts(base_url, client, scheduler, tooltip, Some(bridge.clone()));
        tracing::info!(
            "链接解析已启动: {} (调度策略: {})",
            domain,
            pipeline.inner.scheduler.strategy_name()
        );

        let found = pipeline.scan(&document.document());
        tracing::debug!("初始扫描发现 {} 个候选链接", found);

        let weak = Rc::downgrade(&pipeline.inner);
        tokio::task::spawn_local(run_bridge(bridge, weak));

        Some(pipeline)
    }

    /// 不观察文档的流水线，由调用方自行送入链接；没有空闲信号，使用固定延迟调度
    pub fn detached(
        base_url: Url,
        client: Rc<dyn ResolverClient>,
        config: &PipelineConfig,
        tooltip: Option<Rc<dyn TooltipLayer>>,
    ) -> Self {
        let scheduler = BatchScheduler::from_config(config, None);
        Self::with_parts(base_url, client, scheduler, tooltip, None)
    }

    fn with_parts(
        base_url: Url,
        client: Rc<dyn ResolverClient>,
        scheduler: BatchScheduler,
        tooltip: Option<Rc<dyn TooltipLayer>>,
        bridge: Option<Rc<MutationBridge>>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(LinkQueue::new()),
                scheduler,
                client,
                mutator: DomMutator::new(),
                tooltip,
                bridge,
                base_url,
                gate: Semaphore::new(1),
                settled: Notify::new(),
                batches_sent: Cell::new(0),
                batches_failed: Cell::new(0),
            }),
        }
    }

    /// 扫描子树中的全部锚点并入队，返回候选链接数
    pub fn scan(&self, root: &Handle) -> usize {
        let candidates = collect_candidates(root, &self.inner.base_url);
        let count = candidates.len();
        for link in candidates {
            self.admit(link);
        }
        count
    }

    /// 重新扫描：失败批次中的链接会在这里重新入队，已解析的 URL 直接命中缓存
    pub fn rescan(&self, root: &Handle) -> usize {
        self.drain_mutations();
        self.scan(root)
    }

    /// 判断单个锚点并入队；不是候选链接时返回 `None`
    pub fn admit_anchor(&self, anchor: &Handle) -> Option<AdmitOutcome> {
        let link = candidate_from_anchor(anchor, &self.inner.base_url)?;
        Some(self.admit(link))
    }

    /// 入队一个候选链接
    pub fn admit(&self, link: CandidateLink) -> AdmitOutcome {
        let outcome = self.inner.queue.borrow_mut().admit(link.clone());
        tracing::debug!("入队 {}: {:?}", link.url(), outcome);

        match &outcome {
            AdmitOutcome::Queued | AdmitOutcome::Coalesced => {
                mark_pending(&link);
                self.schedule();
            }
            AdmitOutcome::Waiting => mark_pending(&link),
            AdmitOutcome::Cached(details) => {
                self.inner.mutator.apply(&link, details.as_ref());
            }
        }

        outcome
    }

    /// 等待流水线静止：没有排队、没有武装的定时器、没有在途批次
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            self.drain_mutations();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.queue.borrow().is_idle()
            && !self.inner.scheduler.is_armed()
            && self.inner.gate.available_permits() == 1
    }

    /// 处理悬停事件：只对已改写的链接显示提示
    pub fn on_hover(&self, event: HoverEvent) {
        let Some(tooltip) = &self.inner.tooltip else {
            return;
        };

        match event {
            HoverEvent::Intent(anchor) => {
                if let Some(data) = hover_metadata(&anchor) {
                    tooltip.show(&anchor, data);
                }
            }
            HoverEvent::Leave(anchor) => {
                if is_annotated(&anchor) {
                    tooltip.hide();
                }
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let queue = self.inner.queue.borrow().stats();
        PipelineStats {
            admitted: queue.admitted,
            coalesced: queue.coalesced,
            waiting: queue.waiting,
            cache_hits: queue.cache_hits,
            batches_sent: self.inner.batches_sent.get(),
            batches_failed: self.inner.batches_failed.get(),
            links_applied: self.inner.mutator.applied(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// 同步处理已经到达但后台任务还没来得及处理的变更记录
    fn drain_mutations(&self) {
        if let Some(bridge) = &self.inner.bridge {
            for anchor in bridge.drain() {
                self.admit_anchor(&anchor);
            }
        }
    }

    fn schedule(&self) {
        if !self.inner.scheduler.arm() {
            return;
        }

        let pipeline = self.clone();
        tokio::task::spawn_local(async move {
            pipeline.inner.scheduler.wait_for_flush().await;
            pipeline.flush().await;
        });
    }

    /// 发送整个待发批次
    async fn flush(&self) {
        let Ok(permit) = self.inner.gate.acquire().await else {
            return;
        };

        // 取出批次和解除武装之间不能有 await
        let batch = {
            let mut queue = self.inner.queue.borrow_mut();
            self.inner.scheduler.disarm();
            queue.take_batch()
        };

        if let Some(batch) = batch {
            let urls = batch.urls();
            let started = Instant::now();
            self.inner.batches_sent.set(self.inner.batches_sent.get() + 1);
            tracing::info!(
                "发送批次 #{}: {} 个URL ({} 个链接)",
                batch.id,
                urls.len(),
                batch.len()
            );

            match self.inner.client.resolve(&urls).await {
                Ok(result) => {
                    let batch_id = batch.id;
                    let applications = self
                        .inner
                        .queue
                        .borrow_mut()
                        .complete_batch(batch, result.entries());

                    let mut applied = 0;
                    for (link, details) in &applications {
                        if self.inner.mutator.apply(link, details.as_ref()) {
                            applied += 1;
                        }
                    }
                    tracing::info!(
                        "批次 #{} 完成: {} 个标题，改写 {} 个链接，耗时 {:?}",
                        batch_id,
                        result.len(),
                        applied,
                        started.elapsed()
                    );
                }
                Err(e) if e.is_retryable() => {
                    self.inner
                        .batches_failed
                        .set(self.inner.batches_failed.get() + 1);
                    let batch_id = batch.id;
                    let dropped = self.inner.queue.borrow_mut().fail_batch(batch);
                    for link in &dropped {
                        clear_pending(link);
                    }
                    tracing::warn!(
                        "批次 #{} 解析失败 ({}): {}，{} 个链接等待下次发现时重试",
                        batch_id,
                        self.inner.client.name(),
                        e,
                        dropped.len()
                    );
                }
                Err(e) => {
                    // 重试也不会成功：按无标题处理，URL 记为已解析
                    self.inner
                        .batches_failed
                        .set(self.inner.batches_failed.get() + 1);
                    let batch_id = batch.id;
                    let applications = self
                        .inner
                        .queue
                        .borrow_mut()
                        .complete_batch(batch, &HashMap::new());
                    for (link, _) in &applications {
                        clear_pending(link);
                    }
                    tracing::warn!(
                        "批次 #{} 解析失败且不可重试 ({}): {}，{} 个链接保持原样",
                        batch_id,
                        self.inner.client.name(),
                        e,
                        applications.len()
                    );
                }
            }
        }

        drop(permit);
        self.inner.settled.notify_waiters();
    }
}

/// 后台观察任务；流水线被释放或文档关闭后结束
async fn run_bridge(bridge: Rc<MutationBridge>, pipeline: Weak<Inner>) {
    while let Some(anchors) = bridge.next().await {
        let Some(inner) = pipeline.upgrade() else {
            break;
        };
        let pipeline = LinkPipeline { inner };
        for anchor in &anchors {
            pipeline.admit_anchor(anchor);
        }
    }
}
