// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use tokio::task::LocalSet;

use linklens::parsers::html::dom::{find_anchors, get_node_text};
use linklens::parsers::LiveDocument;
use linklens::resolution::error::{ResolveError, ResolveResult};
use linklens::resolution::{
    LinkDetails, PipelineConfig, ResolutionResult, ResolverClient, TooltipData, TooltipLayer,
};
use linklens::utils::Url;

/// 测试用的页面片段
pub struct HtmlFixtures;

impl HtmlFixtures {
    pub const YOUTUBE_SHORT_LINK: &'static str =
        "<html><body><p>Watch: <a>youtu.be/dQw4w9WgXcQ</a></p></body></html>";

    pub const DUPLICATE_LINKS: &'static str = r#"<html><body>
        <a href="https://example.com">example.com</a>
        <p>again <a href="https://example.com/">https://example.com</a></p>
        <a href="https://rust-lang.org">rust-lang.org</a>
    </body></html>"#;

    pub const MIXED_LINKS: &'static str = r#"<html><body>
        <a href="https://example.com">Click here</a>
        <a href="https://docs.rs">docs.rs</a>
        <a href="mailto:someone@example.com">someone.example.com</a>
        <a href="/relative/path">news.example/relative/path</a>
    </body></html>"#;

    pub const EMPTY_BODY: &'static str = "<html><body></body></html>";
}

/// 可编程的解析服务：记录每次请求的 URL，按预设返回标题或失败
pub struct MockResolver {
    titles: RefCell<HashMap<String, LinkDetails>>,
    failing: Cell<bool>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl MockResolver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            titles: RefCell::new(HashMap::new()),
            failing: Cell::new(false),
            calls: RefCell::new(Vec::new()),
        })
    }

    pub fn with_titles(pairs: &[(&str, &str)]) -> Rc<Self> {
        let resolver = Self::new();
        for (url, title) in pairs {
            resolver.add_title(url, title);
        }
        resolver
    }

    pub fn add_title(&self, url: &str, title: &str) {
        self.add_details(
            url,
            LinkDetails {
                title: title.to_string(),
                description: None,
                platform: None,
            },
        );
    }

    pub fn add_details(&self, url: &str, details: LinkDetails) {
        self.titles.borrow_mut().insert(url.to_string(), details);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

#[async_trait(?Send)]
impl ResolverClient for MockResolver {
    async fn resolve(&self, urls: &[String]) -> ResolveResult<ResolutionResult> {
        self.calls.borrow_mut().push(urls.to_vec());
        // 模拟网络往返
        tokio::task::yield_now().await;

        if self.failing.get() {
            return Err(ResolveError::HttpStatus {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let titles = self.titles.borrow();
        Ok(ResolutionResult::new(
            urls.iter()
                .filter_map(|url| titles.get(url).map(|d| (url.clone(), d.clone())))
                .collect(),
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 提示层事件
#[derive(Debug, Clone, PartialEq)]
pub enum TooltipEvent {
    Show(TooltipData),
    Hide,
}

/// 记录调用的提示层
#[derive(Default)]
pub struct RecordingTooltip {
    events: RefCell<Vec<TooltipEvent>>,
}

impl RecordingTooltip {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TooltipEvent> {
        self.events.borrow().clone()
    }
}

impl TooltipLayer for RecordingTooltip {
    fn show(&self, _target: &Handle, data: TooltipData) {
        self.events.borrow_mut().push(TooltipEvent::Show(data));
    }

    fn hide(&self) {
        self.events.borrow_mut().push(TooltipEvent::Hide);
    }
}

/// 测试用的快速调度参数
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        idle_timeout_ms: 100,
        quiet_window_ms: 10,
        fallback_delay_ms: 5,
        idle_grace_ms: 5,
    }
}

/// 创建页面
pub fn page(html: &str, url: &str) -> LiveDocument {
    LiveDocument::parse(html, Url::parse(url).expect("valid page URL")).expect("parse page")
}

/// 页面中所有链接的文本
pub fn anchor_texts(document: &LiveDocument) -> Vec<String> {
    find_anchors(&document.document())
        .iter()
        .map(get_node_text)
        .collect()
}

/// 在 LocalSet 中运行
pub async fn run_local<F: Future>(future: F) -> F::Output {
    LocalSet::new().run_until(future).await
}
