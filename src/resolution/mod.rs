//! 链接解析模块
//!
//! 识别页面中可见文本为裸 URL 的链接，批量向远程服务查询标题并就地改写链接文本：
//! - **core**: 流水线实例和解析服务客户端
//! - **pipeline**: 变更观察、域名过滤、批次调度
//! - **storage**: 链接队列与会话缓存
//! - **config**: 用户设置与调度参数
//! - **error**: 错误处理
//! - **processor**: DOM 修改与悬停提示
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use linklens::parsers::LiveDocument;
//! use linklens::resolution::{HttpResolverClient, LinkPipeline, PipelineConfig, Settings};
//! use linklens::utils::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let document = LiveDocument::parse(
//!     "<a>youtu.be/dQw4w9WgXcQ</a>",
//!     Url::parse("https://news.example/")?,
//! )?;
//! let settings = Settings::default();
//! let client = Rc::new(HttpResolverClient::new(&settings.api_url)?);
//!
//! // 需要在 LocalSet 中运行
//! if let Some(pipeline) =
//!     LinkPipeline::start(&document, &settings, client, &PipelineConfig::default(), None)
//! {
//!     pipeline.settled().await;
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块 - 流水线实例与解析服务
pub mod core;

/// 错误处理模块
pub mod error;

/// 处理管道模块 - 观察、过滤、调度
pub mod pipeline;

/// DOM 修改与提示
pub mod processor;

/// 存储模块 - 链接队列与缓存
pub mod storage;

// ============================================================================
// 公共API重新导出
// ============================================================================

pub use config::{
    ConfigManager, FileSettingsStore, FilterMode, MemorySettingsStore, PipelineConfig, Settings,
    SettingsStore,
};
pub use self::core::{
    HttpResolverClient, LinkDetails, LinkPipeline, PipelineStats, ResolutionResult,
    ResolverClient,
};
pub use error::{ErrorCategory, ResolveError, ResolveResult};
pub use pipeline::is_in_scope;
pub use processor::{hover_metadata, DomMutator, HoverEvent, TooltipData, TooltipLayer};
pub use storage::{AdmitOutcome, CandidateLink, LinkQueue, LinkState};
