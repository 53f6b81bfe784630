//! HTML 文档元数据处理模块
//!
//! 提供链接解析所需的少量文档元数据：
//! - 获取 `<base>` URL，用于解析相对链接
//! - 处理字符编码声明
//! - 提取文档标题

use markup5ever_rcdom::{Handle, NodeData};

use crate::core::parse_content_type;

use super::dom::{find_nodes, get_node_attr};

/// 获取文档的 base URL
///
/// 从 HTML 文档的 `<head>` 部分查找 `<base>` 标签并提取其 `href` 属性值。
/// 根据 HTML 规范，只有第一个 `<base>` 标签有效，其余的将被忽略。
pub fn get_base_url(handle: &Handle) -> Option<String> {
    if let Some(base_node) = find_nodes(handle, vec!["html", "head", "base"]).first() {
        // 只有第一个 base 标签起作用（忽略其余的，如果有的话）
        get_node_attr(base_node, "href")
    } else {
        None
    }
}

/// 获取文档字符编码
///
/// 支持 `<meta charset="utf-8">` 和
/// `<meta http-equiv="content-type" content="text/html; charset=utf-8">` 两种格式。
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, vec!["html", "head", "meta"]).iter() {
        if let Some(meta_charset_node_attr_value) = get_node_attr(meta_node, "charset") {
            return Some(meta_charset_node_attr_value);
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(meta_content_type_node_attr_value) = get_node_attr(meta_node, "content") {
                let (_media_type, charset, _is_base64) =
                    parse_content_type(&meta_content_type_node_attr_value);
                return Some(charset);
            }
        }
    }

    None
}

/// 获取文档标题
pub fn get_title(node: &Handle) -> Option<String> {
    for title_node in find_nodes(node, vec!["html", "head", "title"]).iter() {
        for child_node in title_node.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child_node.data {
                return Some(contents.borrow().to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::html_to_dom;

    #[test]
    fn test_get_base_url_first_wins() {
        let dom = html_to_dom(
            b"<html><head><base href=\"https://a.com/\"><base href=\"https://b.com/\"></head></html>",
            "utf-8".to_string(),
        )
        .unwrap();
        assert_eq!(get_base_url(&dom.document), Some("https://a.com/".to_string()));
    }

    #[test]
    fn test_get_charset_both_forms() {
        let html5 = html_to_dom(b"<html><head><meta charset=\"GB2312\"></head></html>", String::new()).unwrap();
        assert_eq!(get_charset(&html5.document), Some("GB2312".to_string()));

        let html4 = html_to_dom(
            b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head></html>",
            String::new(),
        )
        .unwrap();
        assert_eq!(get_charset(&html4.document), Some("windows-1252".to_string()));
    }

    #[test]
    fn test_get_title() {
        let dom = html_to_dom(b"<html><head><title>Hello</title></head></html>", String::new()).unwrap();
        assert_eq!(get_title(&dom.document), Some("Hello".to_string()));
    }
}
