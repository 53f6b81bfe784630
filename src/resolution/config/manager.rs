//! 设置与配置管理器
//!
//! 用户设置由外部存储持有，流水线在启动时读取一次快照。
//! 读取失败时回退到默认值，永远不会阻塞流水线启动。

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::resolution::error::{ResolveError, ResolveResult};
use crate::resolution::pipeline::filters::is_in_scope;

/// 域名列表的过滤模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// 列表中的域名不处理
    #[default]
    Blocklist,
    /// 只处理列表中的域名
    Allowlist,
}

impl std::str::FromStr for FilterMode {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocklist" => Ok(FilterMode::Blocklist),
            "allowlist" => Ok(FilterMode::Allowlist),
            other => Err(ResolveError::ConfigError(format!(
                "未知的过滤模式 '{}'，可选: blocklist, allowlist",
                other
            ))),
        }
    }
}

/// 用户设置快照
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub filter_mode: FilterMode,
    pub domain_list: Vec<String>,
    pub match_subdomains: bool,
    pub api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_mode: FilterMode::Blocklist,
            domain_list: Vec::new(),
            match_subdomains: true,
            api_url: constants::DEFAULT_API_URL.to_string(),
        }
    }
}

impl Settings {
    /// 页面域名是否在处理范围内
    pub fn is_in_scope(&self, domain: &str) -> bool {
        is_in_scope(domain, self)
    }

    /// 添加域名（大小写不敏感去重），返回是否新增
    pub fn add_domain(&mut self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() || self.contains_domain(&domain) {
            return false;
        }
        self.domain_list.push(domain);
        true
    }

    /// 移除域名，返回是否有条目被移除
    pub fn remove_domain(&mut self, domain: &str) -> bool {
        let before = self.domain_list.len();
        self.domain_list
            .retain(|d| !d.eq_ignore_ascii_case(domain.trim()));
        before != self.domain_list.len()
    }

    /// 切换全局开关，返回新状态
    pub fn toggle_enabled(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// 切换当前站点是否生效，返回切换后的生效状态
    ///
    /// 黑名单模式下"关闭"意味着加入列表，白名单模式下则相反。
    pub fn toggle_site(&mut self, domain: &str) -> bool {
        let currently_active = self.is_in_scope(domain);

        match (currently_active, self.filter_mode) {
            (true, FilterMode::Blocklist) | (false, FilterMode::Allowlist) => {
                self.add_domain(domain);
            }
            (true, FilterMode::Allowlist) | (false, FilterMode::Blocklist) => {
                self.remove_domain(domain);
            }
        }

        self.is_in_scope(domain)
    }

    /// 应用环境变量覆盖（仅覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{settings, EnvVar};

        if let Some(Ok(enabled)) = settings::Enabled::get_if_set() {
            self.enabled = enabled;
        }

        if let Some(Ok(mode)) = settings::Mode::get_if_set() {
            self.filter_mode = mode;
        }

        if let Some(Ok(domains)) = settings::DomainList::get_if_set() {
            self.domain_list = domains;
        }

        if let Some(Ok(match_subdomains)) = settings::MatchSubdomains::get_if_set() {
            self.match_subdomains = match_subdomains;
        }

        if let Some(Ok(api_url)) = settings::ApiUrl::get_if_set() {
            self.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }
    }

    /// 验证设置
    pub fn validate(&self) -> ResolveResult<()> {
        let is_http = url::Url::parse(self.api_url.trim())
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !is_http {
            return Err(ResolveError::ConfigError(format!(
                "apiUrl 必须以 http:// 或 https:// 开头: {}",
                self.api_url
            )));
        }
        Ok(())
    }

    fn contains_domain(&self, domain: &str) -> bool {
        self.domain_list.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}

/// 批次调度参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub idle_timeout_ms: u64,
    pub quiet_window_ms: u64,
    pub fallback_delay_ms: u64,
    pub idle_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: constants::DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            quiet_window_ms: constants::DEFAULT_QUIET_WINDOW.as_millis() as u64,
            fallback_delay_ms: constants::DEFAULT_FALLBACK_DELAY.as_millis() as u64,
            idle_grace_ms: constants::DEFAULT_IDLE_GRACE.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    /// 从环境变量加载调度参数
    pub fn from_env() -> Self {
        use crate::env::{scheduler, EnvVar};

        let mut config = Self::default();

        if let Some(Ok(timeout)) = scheduler::IdleTimeout::get_if_set() {
            config.idle_timeout_ms = timeout.as_millis() as u64;
        }

        if let Some(Ok(window)) = scheduler::QuietWindow::get_if_set() {
            config.quiet_window_ms = window.as_millis() as u64;
        }

        if let Some(Ok(delay)) = scheduler::FallbackDelay::get_if_set() {
            config.fallback_delay_ms = delay.as_millis() as u64;
        }

        config
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }
}

/// 设置存储（由选项/弹窗界面写入，流水线只读）
pub trait SettingsStore {
    fn load(&self) -> ResolveResult<Settings>;
    fn save(&self, settings: &Settings) -> ResolveResult<()>;
}

/// 基于文件的设置存储：`.toml` 按 TOML 解析，其余按 JSON 解析
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            path: PathBuf::from(expanded.as_ref()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_toml(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false)
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> ResolveResult<Settings> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ResolveError::SettingsUnavailable(format!("读取 {} 失败: {}", self.path.display(), e))
        })?;

        if self.is_toml() {
            Ok(toml::from_str(&content)?)
        } else {
            serde_json::from_str(&content)
                .map_err(|e| ResolveError::ConfigError(format!("解析JSON设置失败: {}", e)))
        }
    }

    fn save(&self, settings: &Settings) -> ResolveResult<()> {
        let content = if self.is_toml() {
            toml::to_string_pretty(settings)
                .map_err(|e| ResolveError::ConfigError(format!("序列化设置失败: {}", e)))?
        } else {
            serde_json::to_string_pretty(settings)
                .map_err(|e| ResolveError::ConfigError(format!("序列化设置失败: {}", e)))?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// 进程内设置存储
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RefCell<Option<Settings>>,
    unavailable: bool,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RefCell::new(Some(settings)),
            unavailable: false,
        }
    }

    /// 模拟读取失败的存储
    pub fn unavailable() -> Self {
        Self {
            settings: RefCell::new(None),
            unavailable: true,
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> ResolveResult<Settings> {
        if self.unavailable {
            return Err(ResolveError::SettingsUnavailable("存储不可用".to_string()));
        }
        Ok(self.settings.borrow().clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> ResolveResult<()> {
        if self.unavailable {
            return Err(ResolveError::SettingsUnavailable("存储不可用".to_string()));
        }
        *self.settings.borrow_mut() = Some(settings.clone());
        Ok(())
    }
}

/// 配置管理器
pub struct ConfigManager {
    settings: Settings,
    pipeline: PipelineConfig,
}

impl ConfigManager {
    /// 从存储读取设置快照，失败时回退到默认值
    pub fn load(store: &dyn SettingsStore) -> Self {
        let mut settings = match store.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("读取设置失败，使用默认设置: {}", e);
                Settings::default()
            }
        };

        settings.apply_env_overrides();

        if let Err(e) = settings.validate() {
            tracing::warn!("{}，回退到默认 API 地址", e);
            settings.api_url = constants::DEFAULT_API_URL.to_string();
        }

        Self {
            settings,
            pipeline: PipelineConfig::from_env(),
        }
    }

    /// 查找默认位置的设置文件并加载
    pub fn discover() -> Self {
        Self::load_dotenv();

        for path in constants::SETTINGS_PATHS {
            let store = FileSettingsStore::new(path);
            if store.path().exists() {
                tracing::info!("加载设置文件: {}", store.path().display());
                return Self::load(&store);
            }
        }

        tracing::debug!("未找到设置文件，使用默认设置");
        Self::load(&MemorySettingsStore::default())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut PipelineConfig {
        &mut self.pipeline
    }

    /// 生成示例设置文件
    pub fn generate_example_settings(path: &str) -> ResolveResult<()> {
        FileSettingsStore::new(path).save(&Settings::default())
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert_eq!(settings.filter_mode, FilterMode::Blocklist);
        assert!(settings.domain_list.is_empty());
        assert!(settings.match_subdomains);
        assert_eq!(settings.api_url, constants::DEFAULT_API_URL);
    }

    #[test]
    fn test_deserialize_store_keys_with_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"filterMode":"allowlist","domainList":["Trusted.com"]}"#)
                .unwrap();
        assert_eq!(settings.filter_mode, FilterMode::Allowlist);
        assert_eq!(settings.domain_list, vec!["Trusted.com".to_string()]);
        assert!(settings.enabled);
        assert!(settings.match_subdomains);
    }

    #[test]
    fn test_add_and_remove_domain_case_insensitive() {
        let mut settings = Settings::default();
        assert!(settings.add_domain("Example.com"));
        assert!(!settings.add_domain("EXAMPLE.COM"));
        assert_eq!(settings.domain_list, vec!["example.com".to_string()]);
        assert!(settings.remove_domain("ExAmPlE.com"));
        assert!(settings.domain_list.is_empty());
        assert!(!settings.remove_domain("example.com"));
    }

    #[test]
    fn test_toggle_site_blocklist() {
        let mut settings = Settings::default();
        assert!(settings.is_in_scope("news.com"));
        assert!(!settings.toggle_site("news.com"));
        assert_eq!(settings.domain_list, vec!["news.com".to_string()]);
        assert!(settings.toggle_site("news.com"));
        assert!(settings.domain_list.is_empty());
    }

    #[test]
    fn test_toggle_site_allowlist() {
        let mut settings = Settings {
            filter_mode: FilterMode::Allowlist,
            ..Settings::default()
        };
        assert!(!settings.is_in_scope("news.com"));
        assert!(settings.toggle_site("news.com"));
        assert!(!settings.toggle_site("news.com"));
        assert!(settings.domain_list.is_empty());
    }

    #[test]
    fn test_toggle_enabled() {
        let mut settings = Settings::default();
        assert!(!settings.toggle_enabled());
        assert!(!settings.is_in_scope("anything.com"));
    }

    #[test]
    fn test_filter_mode_from_str() {
        assert_eq!("Allowlist".parse::<FilterMode>().unwrap(), FilterMode::Allowlist);
        assert!("denylist".parse::<FilterMode>().is_err());
    }

    #[test]
    fn test_validate_api_url() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());
        settings.api_url = "ftp://x".to_string();
        assert!(settings.validate().is_err());
        settings.api_url = "not a url".to_string();
        assert!(settings.validate().is_err());

        // 协议大小写不敏感
        settings.api_url = "HTTPS://Resolver.Example/resolve".to_string();
        assert!(settings.validate().is_ok());
        settings.api_url = "Http://localhost:8080/resolve".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_unavailable_store_falls_back_to_defaults() {
        let manager = ConfigManager::load(&MemorySettingsStore::unavailable());
        assert!(manager.settings().enabled);
        assert_eq!(manager.settings().filter_mode, FilterMode::Blocklist);
    }

    #[test]
    fn test_invalid_api_url_falls_back() {
        let store = MemorySettingsStore::new(Settings {
            api_url: "not-a-url".to_string(),
            ..Settings::default()
        });
        let manager = ConfigManager::load(&store);
        assert_eq!(manager.settings().api_url, constants::DEFAULT_API_URL);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySettingsStore::default();
        let mut settings = Settings::default();
        settings.add_domain("a.com");
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_pipeline_config_durations() {
        let config = PipelineConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(2));
        assert_eq!(config.quiet_window(), Duration::from_millis(500));
    }
}
