//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问

use std::env;
use std::fmt;
use std::time::Duration;

use crate::resolution::config::FilterMode;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅当变量被显式设置时返回解析结果
    fn get_if_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LINKLENS_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 用户设置覆盖
pub mod settings {
    use super::*;

    /// 全局启用状态
    pub struct Enabled;
    impl EnvVar<bool> for Enabled {
        const NAME: &'static str = "LINKLENS_ENABLED";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Enable link title resolution";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 域名过滤模式
    pub struct Mode;
    impl EnvVar<FilterMode> for Mode {
        const NAME: &'static str = "LINKLENS_FILTER_MODE";
        const DEFAULT: Option<FilterMode> = Some(FilterMode::Blocklist);
        const DESCRIPTION: &'static str = "Domain filter mode: blocklist or allowlist";

        fn parse(value: &str) -> EnvResult<FilterMode> {
            value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid filter mode '{}'. Use: blocklist, allowlist", value),
            })
        }
    }

    /// 域名列表
    pub struct DomainList;
    impl EnvVar<Vec<String>> for DomainList {
        const NAME: &'static str = "LINKLENS_DOMAIN_LIST";
        const DEFAULT: Option<Vec<String>> = None;

        fn get() -> EnvResult<Vec<String>> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(Vec::new()),
            }
        }
        const DESCRIPTION: &'static str = "Filtered domains (comma-separated)";

        fn parse(value: &str) -> EnvResult<Vec<String>> {
            Ok(value
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect())
        }
    }

    /// 子域名匹配
    pub struct MatchSubdomains;
    impl EnvVar<bool> for MatchSubdomains {
        const NAME: &'static str = "LINKLENS_MATCH_SUBDOMAINS";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Let listed domains also match their subdomains";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 解析服务地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "LINKLENS_API_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(crate::resolution::config::constants::DEFAULT_API_URL.to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Link resolution API endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            let is_http = url::Url::parse(url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if is_http {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }
}

/// 批次调度相关环境变量
pub mod scheduler {
    use super::*;

    /// 空闲等待上限
    pub struct IdleTimeout;
    impl EnvVar<Duration> for IdleTimeout {
        const NAME: &'static str = "LINKLENS_IDLE_TIMEOUT_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(2000));
        const DESCRIPTION: &'static str = "Maximum wait for host idle time in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 0, 60_000)
        }
    }

    /// 静默窗口
    pub struct QuietWindow;
    impl EnvVar<Duration> for QuietWindow {
        const NAME: &'static str = "LINKLENS_QUIET_WINDOW_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(500));
        const DESCRIPTION: &'static str = "Quiet window after idle before a batch is sent";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 0, 60_000)
        }
    }

    /// 固定延迟
    pub struct FallbackDelay;
    impl EnvVar<Duration> for FallbackDelay {
        const NAME: &'static str = "LINKLENS_FALLBACK_DELAY_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(100));
        const DESCRIPTION: &'static str = "Fixed delay used when idle detection is unavailable";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 0, 60_000)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_millis(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<Duration> {
    let millis: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid number of milliseconds".to_string(),
    })?;

    if millis < min || millis > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is outside {}..={}", millis, min, max),
        });
    }

    Ok(Duration::from_millis(millis))
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,

    pub enabled: bool,
    pub filter_mode: FilterMode,
    pub domain_list: Vec<String>,
    pub match_subdomains: bool,
    pub api_url: String,

    pub idle_timeout: Duration,
    pub quiet_window: Duration,
    pub fallback_delay: Duration,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,

            enabled: settings::Enabled::get()?,
            filter_mode: settings::Mode::get()?,
            domain_list: settings::DomainList::get()?,
            match_subdomains: settings::MatchSubdomains::get()?,
            api_url: settings::ApiUrl::get()?,

            idle_timeout: scheduler::IdleTimeout::get()?,
            quiet_window: scheduler::QuietWindow::get()?,
            fallback_delay: scheduler::FallbackDelay::get()?,
        })
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Log Level: {}", self.log_level);
        println!("  Enabled: {}", self.enabled);
        println!("  Filter Mode: {:?} ({} domains)", self.filter_mode, self.domain_list.len());
        println!("  API URL: {}", self.api_url);
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION,
        "info"
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::NoColor::NAME,
        core::NoColor::DESCRIPTION,
        core::NoColor::DEFAULT
    ));

    docs.push_str("\n## Settings Overrides\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        settings::Enabled::NAME,
        settings::Enabled::DESCRIPTION,
        settings::Enabled::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        settings::Mode::NAME,
        settings::Mode::DESCRIPTION,
        settings::Mode::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        settings::DomainList::NAME,
        settings::DomainList::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        settings::MatchSubdomains::NAME,
        settings::MatchSubdomains::DESCRIPTION,
        settings::MatchSubdomains::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        settings::ApiUrl::NAME,
        settings::ApiUrl::DESCRIPTION
    ));

    docs.push_str("\n## Scheduler Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        scheduler::IdleTimeout::NAME,
        scheduler::IdleTimeout::DESCRIPTION,
        scheduler::IdleTimeout::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        scheduler::QuietWindow::NAME,
        scheduler::QuietWindow::DESCRIPTION,
        scheduler::QuietWindow::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        scheduler::FallbackDelay::NAME,
        scheduler::FallbackDelay::DESCRIPTION,
        scheduler::FallbackDelay::DEFAULT
    ));

    docs
}
