use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: String) -> std::io::Result<RcDom> {
    let s: String;

    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        s = string.to_string();
    } else {
        s = String::from_utf8_lossy(data).to_string();
    }

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: Vec<&str>) -> Vec<Handle> {
    if node_names.is_empty() {
        return Vec::new();
    }

    let mut found_nodes = Vec::new();
    let node_name = node_names[0];

    if node_names.len() == 1 {
        if let NodeData::Element { ref name, .. } = node.data {
            if &*name.local == node_name {
                found_nodes.push(node.clone());
            }
        }

        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    } else if let NodeData::Element { ref name, .. } = node.data {
        if &*name.local == node_name {
            let mut new_node_names = node_names;
            new_node_names.remove(0);
            found_nodes.append(&mut find_nodes(node, new_node_names));
        } else {
            for child_node in node.children.borrow().iter() {
                found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
            }
        }
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    }

    found_nodes
}

/// 查找节点自身及其子树中的所有 `<a>` 元素（文档顺序）
pub fn find_anchors(node: &Handle) -> Vec<Handle> {
    find_nodes(node, vec!["a"])
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    child.parent.set(weak.clone());
    weak.and_then(|node| node.upgrade())
}

/// 检查节点是否仍然挂在文档根节点下
pub fn is_connected(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if let NodeData::Document = current.data {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::LocalName;

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    let _ = &attrs_mut[i].value.clear();
                    let _ = &attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 获取节点的文本内容（所有后代文本节点拼接）
pub fn get_node_text(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, buf: &mut String) {
    match &node.data {
        NodeData::Text { contents } => buf.push_str(&contents.borrow()),
        NodeData::Element { .. } | NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, buf);
            }
        }
        _ => {}
    }
}

/// 用单个文本节点替换元素的全部子节点
pub fn set_node_text(node: &Handle, text: &str) {
    for child in node.children.borrow_mut().drain(..) {
        child.parent.set(None);
    }

    let text_node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    });
    append_child(node, text_node);
}

/// 将节点追加为父节点的最后一个子节点
pub fn append_child(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 将节点从其父节点上摘除
pub fn detach(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8".to_string()).unwrap()
    }

    #[test]
    fn test_find_anchors_in_document_order() {
        let dom = dom("<body><a href=\"/1\">one</a><div><a href=\"/2\">two</a></div></body>");
        let anchors = find_anchors(&dom.document);
        assert_eq!(anchors.len(), 2);
        assert_eq!(get_node_attr(&anchors[0], "href"), Some("/1".to_string()));
        assert_eq!(get_node_attr(&anchors[1], "href"), Some("/2".to_string()));
    }

    #[test]
    fn test_node_text_concatenates_descendants() {
        let dom = dom("<body><a><b>exa</b>mple.com</a></body>");
        let anchor = find_anchors(&dom.document).remove(0);
        assert_eq!(get_node_text(&anchor), "example.com");
    }

    #[test]
    fn test_set_node_text_replaces_children() {
        let dom = dom("<body><a><b>exa</b>mple.com</a></body>");
        let anchor = find_anchors(&dom.document).remove(0);
        set_node_text(&anchor, "Example Domain");
        assert_eq!(get_node_text(&anchor), "Example Domain");
        assert_eq!(anchor.children.borrow().len(), 1);
    }

    #[test]
    fn test_set_and_remove_attr() {
        let dom = dom("<body><a href=\"/x\">x</a></body>");
        let anchor = find_anchors(&dom.document).remove(0);
        set_node_attr(&anchor, "title", Some("Hello".to_string()));
        assert_eq!(get_node_attr(&anchor, "title"), Some("Hello".to_string()));
        set_node_attr(&anchor, "title", Some("World".to_string()));
        assert_eq!(get_node_attr(&anchor, "title"), Some("World".to_string()));
        set_node_attr(&anchor, "title", None);
        assert_eq!(get_node_attr(&anchor, "title"), None);
    }

    #[test]
    fn test_parent_lookup_keeps_link() {
        let dom = dom("<body><a>x</a></body>");
        let anchor = find_anchors(&dom.document).remove(0);
        let first = get_parent_node(&anchor);
        let second = get_parent_node(&anchor);
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(get_node_name(&second.unwrap()), Some("body"));
    }

    #[test]
    fn test_connected_and_detach() {
        let dom = dom("<body><div><a>x</a></div></body>");
        let anchor = find_anchors(&dom.document).remove(0);
        assert!(is_connected(&anchor));

        let div = get_parent_node(&anchor).unwrap();
        detach(&div);
        assert!(!is_connected(&anchor));
        assert!(find_anchors(&dom.document).is_empty());
    }
}
