//! URL 分类与规范化工具
//!
//! 判断链接文本是否为"裸 URL"、识别特殊平台（视频站点），
//! 并为链接生成统一的缓存键。

use once_cell::sync::Lazy;
use regex::Regex;

pub use url::Url;

/// 裸 URL 形状：可选协议、至少一个点的主机名、2位以上字母的顶级域、可选端口和路径
static RAW_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?([\w.-]+)\.([a-z]{2,})(:\d+)?(/\S*)?$")
        .expect("raw URL pattern is valid")
});

/// YouTube 的 watch/embed/shorts/live 路径以及 youtu.be 短链
static YOUTUBE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|live|shorts)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("youtube pattern is valid")
});

/// 需要特殊标签前缀的已知平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialPlatform {
    YouTube,
}

impl SpecialPlatform {
    /// 链接文本前缀中使用的标签
    pub fn label(&self) -> &'static str {
        match self {
            SpecialPlatform::YouTube => "YT",
        }
    }

    /// 提供给提示层的平台名
    pub fn name(&self) -> &'static str {
        match self {
            SpecialPlatform::YouTube => "youtube",
        }
    }
}

/// 检查文本是否整体是一个裸 URL（而不是包含 URL 的句子）
pub fn is_candidate_text(text: &str) -> bool {
    RAW_URL_REGEX.is_match(text.trim())
}

/// 检查 URL 是否属于已知的视频平台
pub fn is_special_platform(url: &str) -> bool {
    special_platform(url).is_some()
}

/// 返回 URL 匹配的特殊平台
pub fn special_platform(url: &str) -> Option<SpecialPlatform> {
    if YOUTUBE_REGEX.is_match(url) {
        Some(SpecialPlatform::YouTube)
    } else {
        None
    }
}

/// 生成链接的规范化 URL 字符串
///
/// 优先使用相对于页面基础 URL 解析后的 `href`（仅限 http/https）；
/// 没有可用 `href` 时退回到链接文本本身，缺少协议时补全 `https://`。
pub fn normalize_link_url(href: Option<&str>, text: &str, base_url: &Url) -> Option<String> {
    if let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) {
        if let Ok(resolved) = base_url.join(href) {
            if is_http_scheme(&resolved) {
                return Some(resolved.to_string());
            }
        }
        return None;
    }

    let text = text.trim();
    if !is_candidate_text(text) {
        return None;
    }

    let with_scheme = if is_url_and_has_protocol(text) {
        text.to_string()
    } else {
        format!("https://{}", text)
    };

    Url::parse(&with_scheme)
        .ok()
        .filter(is_http_scheme)
        .map(|u| u.to_string())
}

/// 提取 URL 的主机名（小写），解析失败时返回空字符串
pub fn get_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

/// 去掉协议、`www.` 前缀和末尾斜杠，用于展示和比较
pub fn normalize_url(url: &str) -> String {
    let mut s = url.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = strip_prefix_ignore_case(s, prefix) {
            s = rest;
            break;
        }
    }
    if let Some(rest) = strip_prefix_ignore_case(s, "www.") {
        s = rest;
    }
    s.strip_suffix('/').unwrap_or(s).to_string()
}

// 前缀为 ASCII；`get` 在字符边界之外返回 None
fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &s[prefix.len()..])
}

/// 检查字符串是否以 http(s) 协议开头
pub fn is_url_and_has_protocol(input: &str) -> bool {
    let lower = input.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// 相对 URL 解析，失败时保留基础 URL
pub fn resolve_url(from: &Url, to: &str) -> Url {
    match from.join(to) {
        Ok(resolved) => resolved,
        Err(_) => from.clone(),
    }
}

fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_text_full_urls() {
        assert!(is_candidate_text("https://example.com"));
        assert!(is_candidate_text("http://test.org/path?query=1"));
        assert!(is_candidate_text("https://localhost.dev:8080/a"));
    }

    #[test]
    fn test_candidate_text_without_protocol() {
        assert!(is_candidate_text("example.com"));
        assert!(is_candidate_text("example.com/path"));
        assert!(is_candidate_text("sub.domain.co.uk/page"));
        assert!(is_candidate_text("youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_candidate_text_rejects_prose() {
        assert!(!is_candidate_text("Click here"));
        assert!(!is_candidate_text("My Website"));
        assert!(!is_candidate_text("Visit google.com for more"));
        assert!(!is_candidate_text(""));
        assert!(!is_candidate_text("example.c"));
    }

    #[test]
    fn test_candidate_text_trims_and_ignores_case() {
        assert!(is_candidate_text("  https://example.com  "));
        assert!(is_candidate_text("\nEXAMPLE.COM/Path\t"));
        assert!(is_candidate_text("HTTPS://Example.ORG"));
    }

    #[test]
    fn test_special_platform_youtube_shapes() {
        assert!(is_special_platform("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_special_platform("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_special_platform("https://youtube.com/shorts/12345678901"));
        assert!(is_special_platform("https://youtube.com/live/12345678901"));
        assert!(is_special_platform("https://www.youtube.com/embed/dQw4w9WgXcQ"));
        assert!(is_special_platform("https://YOUTU.BE/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_special_platform_rejects_others() {
        assert!(!is_special_platform("https://google.com"));
        assert!(!is_special_platform("https://vimeo.com/123"));
        assert!(!is_special_platform("https://youtu.be/short"));
        assert_eq!(special_platform("https://example.com/watch?v=1"), None);
    }

    #[test]
    fn test_special_platform_label() {
        let platform = special_platform("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(platform.label(), "YT");
        assert_eq!(platform.name(), "youtube");
    }

    #[test]
    fn test_normalize_link_url_prefers_href() {
        let base = Url::parse("https://page.example/articles/1").unwrap();
        assert_eq!(
            normalize_link_url(Some("https://youtu.be/dQw4w9WgXcQ"), "youtu.be/dQw4w9WgXcQ", &base),
            Some("https://youtu.be/dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            normalize_link_url(Some("/other"), "page.example/other", &base),
            Some("https://page.example/other".to_string())
        );
    }

    #[test]
    fn test_normalize_link_url_skips_non_http_href() {
        let base = Url::parse("https://page.example/").unwrap();
        assert_eq!(normalize_link_url(Some("mailto:a@b.com"), "b.com", &base), None);
        assert_eq!(normalize_link_url(Some("javascript:void(0)"), "x.com", &base), None);
    }

    #[test]
    fn test_normalize_link_url_falls_back_to_text() {
        let base = Url::parse("https://page.example/").unwrap();
        assert_eq!(
            normalize_link_url(None, " example.com/path ", &base),
            Some("https://example.com/path".to_string())
        );
        assert_eq!(
            normalize_link_url(Some("  "), "http://example.com", &base),
            Some("http://example.com/".to_string())
        );
        assert_eq!(normalize_link_url(None, "Click here", &base), None);
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(get_domain("https://Sub.Example.com/path"), "sub.example.com");
        assert_eq!(get_domain("not a url"), "");
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("https://www.example.com/"), "example.com");
        assert_eq!(normalize_url("http://example.com"), "example.com");
        assert_eq!(normalize_url("example.com/a/"), "example.com/a");
    }

    #[test]
    fn test_normalize_url_non_ascii() {
        assert_eq!(normalize_url("日本語https://x.com"), "日本語https://x.com");
        assert_eq!(normalize_url("wü.example/"), "wü.example");
        assert_eq!(normalize_url("HTTPS://WWW.例え.jp/"), "例え.jp");
        assert_eq!(normalize_url("ö"), "ö");
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/a/b").unwrap();
        assert_eq!(resolve_url(&base, "c").as_str(), "https://example.com/a/c");
    }
}
