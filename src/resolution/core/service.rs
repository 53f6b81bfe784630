//! 远程解析服务客户端
//!
//! 每个批次发送一次 `POST <apiUrl>`，请求体为 `{"urls": [...]}`。
//! 响应中缺失的字段按空映射处理；非 2xx、传输错误和无法解析的响应体
//! 都视为整个批次失败，由调用方释放等待状态。客户端本身不做重试。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resolution::error::{ResolveError, ResolveResult};

/// 单个链接的解析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDetails {
    pub title: String,
    pub description: Option<String>,
    pub platform: Option<String>,
}

/// 一个批次的解析结果（URL -> 详情），只包含找到标题的 URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionResult {
    entries: HashMap<String, LinkDetails>,
}

impl ResolutionResult {
    pub fn new(entries: HashMap<String, LinkDetails>) -> Self {
        Self { entries }
    }

    pub fn get(&self, url: &str) -> Option<&LinkDetails> {
        self.entries.get(url)
    }

    pub fn entries(&self) -> &HashMap<String, LinkDetails> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 由服务响应构建；空标题视为未解析
    pub fn from_response(response: ResolveResponse) -> Self {
        let mut details = response.details.unwrap_or_default();

        let entries = response
            .titles
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(url, title)| {
                let title = title?.trim().to_string();
                if title.is_empty() {
                    return None;
                }
                let extra = details.remove(&url).unwrap_or_default();
                Some((
                    url,
                    LinkDetails {
                        title,
                        description: extra.description.filter(|d| !d.trim().is_empty()),
                        platform: extra.platform.filter(|p| !p.trim().is_empty()),
                    },
                ))
            })
            .collect();

        Self { entries }
    }
}

/// 请求体
#[derive(Debug, Serialize)]
pub struct ResolveRequest<'a> {
    pub urls: &'a [String],
}

/// 响应体
#[derive(Debug, Default, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub titles: Option<HashMap<String, Option<String>>>,
    #[serde(default)]
    pub details: Option<HashMap<String, DetailEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailEntry {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 解析服务
#[async_trait(?Send)]
pub trait ResolverClient {
    /// 解析一批去重后的 URL
    async fn resolve(&self, urls: &[String]) -> ResolveResult<ResolutionResult>;

    fn name(&self) -> &str {
        "resolver"
    }
}

/// 基于 HTTP 的解析服务客户端
pub struct HttpResolverClient {
    client: reqwest::Client,
    api_url: String,
}

impl HttpResolverClient {
    pub fn new(api_url: &str) -> ResolveResult<Self> {
        Self::with_user_agent(api_url, None)
    }

    pub fn with_user_agent(api_url: &str, user_agent: Option<&str>) -> ResolveResult<Self> {
        let user_agent = user_agent
            .map(str::to_string)
            .unwrap_or_else(|| format!("linklens/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ResolveError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self::with_client(client, api_url))
    }

    pub fn with_client(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim().to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait(?Send)]
impl ResolverClient for HttpResolverClient {
    async fn resolve(&self, urls: &[String]) -> ResolveResult<ResolutionResult> {
        if urls.is_empty() {
            return Ok(ResolutionResult::default());
        }

        tracing::debug!("发送解析请求: {} 个URL -> {}", urls.len(), self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&ResolveRequest { urls })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ResolveResponse = serde_json::from_str(&body)?;

        Ok(ResolutionResult::from_response(parsed))
    }

    fn name(&self) -> &str {
        "http"
    }
}
