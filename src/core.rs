use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use encoding_rs::Encoding;
use markup5ever_rcdom::RcDom;
use url::Url;

use crate::parsers::html::{get_base_url, get_charset, get_title, html_to_dom, serialize_document};
use crate::parsers::LiveDocument;
use crate::resolution::config::{
    ConfigManager, FileSettingsStore, PipelineConfig, Settings,
};
use crate::resolution::core::{HttpResolverClient, LinkPipeline, PipelineStats, ResolverClient};
use crate::utils::url::resolve_url;

/// Represents errors that can occur while annotating a document
#[derive(Debug)]
pub struct LinkLensError {
    details: String,
}

impl LinkLensError {
    pub fn new(msg: &str) -> LinkLensError {
        LinkLensError {
            details: msg.to_string(),
        }
    }
}

impl fmt::Display for LinkLensError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl Error for LinkLensError {
    fn description(&self) -> &str {
        &self.details
    }
}

/// Configuration options for annotating a document
///
/// Values left as `None` fall back to the settings file, the environment and
/// finally the built-in defaults.
#[derive(Default, Clone, Debug)]
pub struct LinkLensOptions {
    pub api_url: Option<String>,
    pub base_url: Option<String>,
    pub config_path: Option<String>,
    pub encoding: Option<String>,
    pub silent: bool,
    pub timeout: u64,
    pub user_agent: Option<String>,
    pub quiet_window_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

impl LinkLensOptions {
    /// 读取设置快照：显式指定的设置文件优先，否则查找默认位置
    pub fn load_settings(&self) -> Settings {
        let mut manager = match &self.config_path {
            Some(path) => ConfigManager::load(&FileSettingsStore::new(path)),
            None => ConfigManager::discover(),
        };

        if let Some(api_url) = &self.api_url {
            manager.settings_mut().api_url = api_url.trim().to_string();
        }

        manager.settings().clone()
    }

    /// 调度参数：环境变量之上叠加命令行覆盖
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::from_env();
        if let Some(ms) = self.quiet_window_ms {
            config.quiet_window_ms = ms;
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.idle_timeout_ms = ms;
        }
        config
    }
}

/// 处理结果
#[derive(Debug)]
pub struct AnnotatedDocument {
    pub data: Vec<u8>,
    pub title: Option<String>,
    /// 页面不在处理范围内时为 `None`
    pub stats: Option<PipelineStats>,
}

const ANSI_COLOR_RED: &str = "\x1b[31m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";
// All known non-"text/..." plaintext media types
const PLAINTEXT_MEDIA_TYPES: &[&str] = &[
    "application/xhtml+xml", // .xhtml
    "application/xml",       // .xml
];

/// Annotates raw link text in an HTML document held in memory
///
/// Runs the resolution pipeline until it settles and serializes the document
/// back in its own encoding. Must be awaited inside a `tokio::task::LocalSet`.
pub async fn annotate_document_from_data(
    input_data: Vec<u8>,
    input_encoding: Option<String>,
    input_target: Option<String>,
    settings: &Settings,
    config: &PipelineConfig,
    client: Rc<dyn ResolverClient>,
    options: &LinkLensOptions,
) -> Result<AnnotatedDocument, LinkLensError> {
    if let Some(encoding) = input_encoding.as_ref().or(options.encoding.as_ref()) {
        if Encoding::for_label_no_replacement(encoding.as_bytes()).is_none() {
            return Err(LinkLensError::new(&format!(
                "unknown encoding \"{}\"",
                encoding
            )));
        }
    }

    let (dom, document_encoding) =
        decode_document(&input_data, input_encoding.or_else(|| options.encoding.clone()))?;
    let page_url = determine_page_url(&input_target, &dom, options)?;

    let document = LiveDocument::new(dom, page_url);
    let stats = match LinkPipeline::start(&document, settings, client, config, None) {
        Some(pipeline) => {
            pipeline.settled().await;
            let stats = pipeline.stats();
            if !options.silent {
                print_info_message(&format!(
                    "Resolved {} link(s) in {} batch(es)",
                    stats.links_applied, stats.batches_sent
                ));
            }
            Some(stats)
        }
        None => None,
    };

    let dom = document.into_dom();
    let title = get_title(&dom.document);
    let data = serialize_document(dom, document_encoding)
        .map_err(|e| LinkLensError::new(&format!("Failed to serialize document: {e}")))?;

    Ok(AnnotatedDocument { data, title, stats })
}

/// Annotates a document from a URL or file path
pub async fn annotate_document(
    target: &str,
    options: &LinkLensOptions,
) -> Result<AnnotatedDocument, LinkLensError> {
    let settings = options.load_settings();
    let config = options.pipeline_config();
    let client = HttpResolverClient::with_user_agent(&settings.api_url, options.user_agent.as_deref())?;

    let (input_data, input_encoding, target_url) =
        if target.starts_with("http://") || target.starts_with("https://") {
            let parsed_url =
                Url::parse(target).map_err(|e| LinkLensError::new(&format!("Invalid URL: {e}")))?;
            let (data, charset) = fetch_document(&parsed_url, options).await?;
            (data, charset, Some(parsed_url))
        } else {
            // 本地文件路径
            let path = Path::new(target);
            if !path.exists() {
                return Err(LinkLensError::new(&format!("File not found: {target}")));
            }

            let data = fs::read(path)
                .map_err(|e| LinkLensError::new(&format!("Failed to read file: {e}")))?;
            let file_url = fs::canonicalize(path)
                .ok()
                .and_then(|p| Url::from_file_path(p).ok());
            (data, None, file_url)
        };

    annotate_document_from_data(
        input_data,
        input_encoding,
        target_url.map(|u| u.to_string()),
        &settings,
        &config,
        Rc::new(client),
        options,
    )
    .await
}

async fn fetch_document(
    url: &Url,
    options: &LinkLensOptions,
) -> Result<(Vec<u8>, Option<String>), LinkLensError> {
    let mut builder = reqwest::Client::builder();
    if options.timeout > 0 {
        builder = builder.timeout(Duration::from_secs(options.timeout));
    }
    if let Some(user_agent) = &options.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    let client = builder
        .build()
        .map_err(|e| LinkLensError::new(&format!("Failed to create HTTP client: {e}")))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| LinkLensError::new(&format!("Failed to fetch URL: {e}")))?;

    if !response.status().is_success() {
        return Err(LinkLensError::new(&format!(
            "Failed to fetch URL: server responded with {}",
            response.status()
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();
    let (media_type, charset, _) = parse_content_type(&content_type);
    if !media_type.is_empty() && !is_plaintext_media_type(&media_type) {
        return Err(LinkLensError::new(&format!(
            "Unsupported media type: {media_type}"
        )));
    }

    let data = response
        .bytes()
        .await
        .map_err(|e| LinkLensError::new(&format!("Failed to read response: {e}")))?;

    let charset = Some(charset).filter(|c| !c.is_empty());
    Ok((data.to_vec(), charset))
}

/// 解析文档并按 `<meta>` 声明的字符集重新解码
fn decode_document(
    input_data: &[u8],
    input_encoding: Option<String>,
) -> Result<(RcDom, String), LinkLensError> {
    let mut document_encoding = input_encoding.unwrap_or_else(|| "utf-8".to_string());

    let mut dom = html_to_dom(input_data, document_encoding.clone())
        .map_err(|e| LinkLensError::new(&format!("Failed to parse document: {e}")))?;

    if let Some(html_charset) = get_charset(&dom.document) {
        if !html_charset.is_empty() {
            if let Some(document_charset) =
                Encoding::for_label_no_replacement(html_charset.as_bytes())
            {
                document_encoding = document_charset.name().to_string();
                dom = html_to_dom(input_data, document_encoding.clone())
                    .map_err(|e| LinkLensError::new(&format!("Failed to parse document: {e}")))?;
            }
        }
    }

    Ok((dom, document_encoding))
}

/// 页面 URL：显式的 base URL 优先，其次是目标地址（叠加文档中的 `<base>`）
fn determine_page_url(
    input_target: &Option<String>,
    dom: &RcDom,
    options: &LinkLensOptions,
) -> Result<Url, LinkLensError> {
    if let Some(custom_base_url) = options.base_url.as_deref().filter(|s| !s.is_empty()) {
        return Url::parse(custom_base_url).map_err(|e| {
            LinkLensError::new(&format!("Failed to parse base URL \"{custom_base_url}\": {e}"))
        });
    }

    let page_url = match input_target {
        Some(target) => Url::parse(target)
            .map_err(|e| LinkLensError::new(&format!("Failed to parse target URL: {e}")))?,
        None => Url::parse("about:blank")
            .map_err(|e| LinkLensError::new(&format!("Failed to parse target URL: {e}")))?,
    };

    // 文件或空白页上的 <base> 决定了链接所属的站点
    if page_url.host_str().is_none() {
        if let Some(existing_base_url) = get_base_url(&dom.document) {
            return Ok(resolve_url(&page_url, &existing_base_url));
        }
    }

    Ok(page_url)
}

/// Parses Content-Type header value
pub fn parse_content_type(content_type: &str) -> (String, String, bool) {
    let mut media_type = String::new();
    let mut charset = String::new();
    let mut is_base64 = false;

    let parts: Vec<&str> = content_type.split(';').collect();

    if !parts.is_empty() {
        media_type = parts[0].trim().to_lowercase();
    }

    for part in parts.iter().skip(1) {
        let part = part.trim();
        if part.to_lowercase().starts_with("charset=") {
            charset = part[8..].trim_matches('"').to_string();
        } else if part == "base64" {
            is_base64 = true;
        }
    }

    (media_type, charset, is_base64)
}

/// Checks if the given media type represents plaintext content
pub fn is_plaintext_media_type(media_type: &str) -> bool {
    media_type.starts_with("text/") || PLAINTEXT_MEDIA_TYPES.contains(&media_type)
}

/// Prints an error message to stderr, in red when stderr is a terminal
pub fn print_error_message(msg: &str) {
    use crate::env::{core::NoColor, EnvVar};

    if atty::is(atty::Stream::Stderr) && !NoColor::get_or_default(false) {
        eprintln!("{ANSI_COLOR_RED}{msg}{ANSI_COLOR_RESET}");
    } else {
        eprintln!("{msg}");
    }
}

/// Prints an info message to stderr
pub fn print_info_message(msg: &str) {
    eprintln!("{msg}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::core::{LinkDetails, ResolutionResult};
    use crate::resolution::error::ResolveResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::task::LocalSet;

    struct TitleResolver;

    #[async_trait(?Send)]
    impl ResolverClient for TitleResolver {
        async fn resolve(&self, urls: &[String]) -> ResolveResult<ResolutionResult> {
            let mut entries = HashMap::new();
            for url in urls {
                entries.insert(
                    url.clone(),
                    LinkDetails {
                        title: format!("Title of {}", crate::utils::get_domain(url)),
                        description: None,
                        platform: None,
                    },
                );
            }
            Ok(ResolutionResult::new(entries))
        }
    }

    fn fast() -> PipelineConfig {
        PipelineConfig {
            idle_timeout_ms: 50,
            quiet_window_ms: 5,
            fallback_delay_ms: 1,
            idle_grace_ms: 5,
        }
    }

    fn quiet() -> LinkLensOptions {
        LinkLensOptions {
            silent: true,
            ..LinkLensOptions::default()
        }
    }

    #[test]
    fn test_linklens_error_display() {
        let error = LinkLensError::new("test error");
        assert_eq!(error.to_string(), "test error");
    }

    #[test]
    fn test_parse_content_type() {
        let (media_type, charset, is_base64) = parse_content_type("text/html; charset=\"UTF-8\"");
        assert_eq!(media_type, "text/html");
        assert_eq!(charset, "UTF-8");
        assert!(!is_base64);

        let (media_type, charset, _) = parse_content_type("application/xhtml+xml");
        assert_eq!(media_type, "application/xhtml+xml");
        assert!(charset.is_empty());
    }

    #[test]
    fn test_plaintext_media_types() {
        assert!(is_plaintext_media_type("text/html"));
        assert!(is_plaintext_media_type("application/xhtml+xml"));
        assert!(!is_plaintext_media_type("image/png"));
    }

    #[test]
    fn test_pipeline_config_cli_overrides() {
        let options = LinkLensOptions {
            quiet_window_ms: Some(42),
            idle_timeout_ms: Some(7),
            ..LinkLensOptions::default()
        };
        let config = options.pipeline_config();
        assert_eq!(config.quiet_window_ms, 42);
        assert_eq!(config.idle_timeout_ms, 7);
    }

    #[tokio::test]
    async fn test_annotate_document_from_data() {
        LocalSet::new()
            .run_until(async {
                let html = b"<html><head><title>Links</title></head><body><a href=\"https://example.com\">example.com</a><a href=\"/about\">About</a></body></html>";
                let result = annotate_document_from_data(
                    html.to_vec(),
                    None,
                    Some("https://blog.example.org/post".to_string()),
                    &Settings::default(),
                    &fast(),
                    Rc::new(TitleResolver),
                    &quiet(),
                )
                .await
                .unwrap();

                let output = String::from_utf8(result.data).unwrap();
                assert!(output.contains(">Title of example.com</a>"));
                assert!(output.contains(">About</a>"));
                assert_eq!(result.title.as_deref(), Some("Links"));
                assert_eq!(result.stats.unwrap().links_applied, 1);
            })
            .await;
    }

    #[tokio::test]
    async fn test_out_of_scope_document_is_untouched() {
        LocalSet::new()
            .run_until(async {
                let mut settings = Settings::default();
                settings.add_domain("blog.example.org");

                let result = annotate_document_from_data(
                    b"<a>example.com</a>".to_vec(),
                    None,
                    Some("https://blog.example.org/".to_string()),
                    &settings,
                    &fast(),
                    Rc::new(TitleResolver),
                    &quiet(),
                )
                .await
                .unwrap();

                assert!(result.stats.is_none());
                assert!(String::from_utf8(result.data).unwrap().contains(">example.com</a>"));
            })
            .await;
    }

    #[tokio::test]
    async fn test_unknown_encoding_is_rejected() {
        let options = LinkLensOptions {
            encoding: Some("utf-42".to_string()),
            ..quiet()
        };
        let result = annotate_document_from_data(
            b"<a>example.com</a>".to_vec(),
            None,
            None,
            &Settings::default(),
            &fast(),
            Rc::new(TitleResolver),
            &options,
        )
        .await;
        assert!(result.unwrap_err().to_string().contains("unknown encoding"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let options = LinkLensOptions {
            config_path: Some("/nonexistent/linklens.toml".to_string()),
            ..quiet()
        };
        let result = annotate_document("/nonexistent/page.html", &options).await;
        assert!(result.unwrap_err().to_string().contains("File not found"));
    }
}
