//! 链接解析核心模块
//!
//! - **服务层** (`service.rs`): 远程解析服务的客户端接口
//! - **引擎层** (`engine.rs`): 每个页面一个的流水线实例，串联观察、排队、调度、请求和 DOM 修改
//!
//! ```text
//! LinkPipeline (engine.rs)
//!     ├── observe (pipeline/collector.rs)
//!     ├── LinkQueue (storage/cache.rs)
//!     ├── BatchScheduler (pipeline/batch.rs)
//!     ├── ResolverClient (service.rs)
//!     └── DomMutator (processor.rs)
//! ```

pub mod engine;
pub mod service;

pub use engine::{LinkPipeline, PipelineStats};
pub use service::{
    HttpResolverClient, LinkDetails, ResolutionResult, ResolveResponse, ResolverClient,
};
