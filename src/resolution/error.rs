//! 链接解析模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

use crate::core::LinkLensError;

/// 链接解析错误类型
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 设置存储不可用
    #[error("设置读取失败: {0}")]
    SettingsUnavailable(String),

    /// 网络错误（传输层）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 解析服务返回非 2xx 状态
    #[error("解析服务返回状态 {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 响应体格式错误
    #[error("响应格式无效: {0}")]
    InvalidResponse(String),

    /// IO 错误
    #[error("IO错误: {0}")]
    IoError(String),
}

impl ResolveError {
    /// 批次失败时是否重新开放其中的链接；不可重试的错误按无标题处理
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::NetworkError(_) => true,
            ResolveError::HttpStatus { .. } => true,
            ResolveError::InvalidResponse(_) => true,
            ResolveError::IoError(_) => true,
            ResolveError::ConfigError(_) => false,
            ResolveError::SettingsUnavailable(_) => false,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolveError::ConfigError(_) => ErrorCategory::Configuration,
            ResolveError::SettingsUnavailable(_) => ErrorCategory::Configuration,
            ResolveError::NetworkError(_) => ErrorCategory::Network,
            ResolveError::HttpStatus { .. } => ErrorCategory::Service,
            ResolveError::InvalidResponse(_) => ErrorCategory::Parsing,
            ResolveError::IoError(_) => ErrorCategory::Io,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let msg = format!("{} (上下文: {})", self, context);
        match self {
            ResolveError::ConfigError(_) => ResolveError::ConfigError(msg),
            ResolveError::SettingsUnavailable(_) => ResolveError::SettingsUnavailable(msg),
            ResolveError::NetworkError(_) => ResolveError::NetworkError(msg),
            ResolveError::HttpStatus { status, .. } => ResolveError::HttpStatus { status, body: msg },
            ResolveError::InvalidResponse(_) => ResolveError::InvalidResponse(msg),
            ResolveError::IoError(_) => ResolveError::IoError(msg),
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Service,
    Parsing,
    Io,
}

/// 转换为LinkLensError
impl From<ResolveError> for LinkLensError {
    fn from(error: ResolveError) -> Self {
        LinkLensError::new(&error.to_string())
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ResolveError::InvalidResponse(error.to_string())
        } else {
            ResolveError::NetworkError(error.to_string())
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(error: std::io::Error) -> Self {
        ResolveError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(error: serde_json::Error) -> Self {
        ResolveError::InvalidResponse(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for ResolveError {
    fn from(error: toml::de::Error) -> Self {
        ResolveError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_batches_are_retryable() {
        assert!(ResolveError::NetworkError("refused".into()).is_retryable());
        assert!(ResolveError::HttpStatus { status: 503, body: String::new() }.is_retryable());
        assert!(ResolveError::InvalidResponse("eof".into()).is_retryable());
        assert!(!ResolveError::ConfigError("bad".into()).is_retryable());
    }

    #[test]
    fn test_category() {
        assert_eq!(
            ResolveError::HttpStatus { status: 500, body: String::new() }.category(),
            ErrorCategory::Service
        );
        assert_eq!(
            ResolveError::SettingsUnavailable("x".into()).category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let err = ResolveError::NetworkError("timeout".into()).with_context("batch 3");
        assert!(matches!(err, ResolveError::NetworkError(_)));
        assert!(err.to_string().contains("batch 3"));

        let err = ResolveError::HttpStatus { status: 502, body: "bad gateway".into() }
            .with_context("batch 4");
        assert!(matches!(err, ResolveError::HttpStatus { status: 502, .. }));
    }

    #[test]
    fn test_into_linklens_error() {
        let err: LinkLensError = ResolveError::ConfigError("apiUrl".into()).into();
        assert!(err.to_string().contains("apiUrl"));
    }
}
