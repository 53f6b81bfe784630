//! 链接解析配置模块
//!
//! 用户设置（启用开关、域名过滤）与流水线调度参数

pub mod manager;

pub use manager::{
    ConfigManager, FileSettingsStore, FilterMode, MemorySettingsStore, PipelineConfig, Settings,
    SettingsStore,
};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    /// 内置的远程解析服务地址
    pub const DEFAULT_API_URL: &str =
        "https://youtube-replacer-backend-542312799814.us-east1.run.app/resolve";

    /// 空闲等待的最长时间
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(2000);

    /// 空闲之后吸收突发变更的静默窗口
    pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(500);

    /// 无法检测空闲时的固定延迟
    pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(100);

    /// 多久没有 DOM 变更即视为宿主空闲
    pub const DEFAULT_IDLE_GRACE: Duration = Duration::from_millis(50);

    /// 设置文件查找路径
    pub const SETTINGS_PATHS: &[&str] = &[
        "./linklens.toml",
        "./linklens.json",
        "~/.config/linklens/settings.toml",
        "~/.config/linklens/settings.json",
    ];
}
