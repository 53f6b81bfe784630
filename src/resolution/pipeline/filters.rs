//! 域名过滤策略
//!
//! 判断当前页面域名是否在处理范围内。页面启动时调用一次，
//! 弹窗的"在此站点启用"开关也复用同一函数。

use crate::resolution::config::{FilterMode, Settings};

/// 页面域名是否在处理范围内
pub fn is_in_scope(page_domain: &str, settings: &Settings) -> bool {
    if !settings.enabled {
        return false;
    }

    let listed = is_listed(page_domain, &settings.domain_list, settings.match_subdomains);

    match settings.filter_mode {
        FilterMode::Allowlist => listed,
        FilterMode::Blocklist => !listed,
    }
}

/// 域名是否命中列表（精确匹配，或开启子域名匹配时的后缀匹配）
pub fn is_listed(page_domain: &str, domain_list: &[String], match_subdomains: bool) -> bool {
    let domain = page_domain.trim().to_lowercase();
    if domain.is_empty() {
        return false;
    }

    domain_list.iter().any(|item| {
        let item = item.trim().to_lowercase();
        if item.is_empty() {
            return false;
        }
        if domain == item {
            return true;
        }
        // 只接受真正的子域名："." + item 作为后缀
        match_subdomains
            && domain.len() > item.len() + 1
            && domain.ends_with(&item)
            && domain.as_bytes()[domain.len() - item.len() - 1] == b'.'
    })
}
