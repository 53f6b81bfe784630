use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts};
use markup5ever_rcdom::{RcDom, SerializableHandle};

/// 序列化文档
pub fn serialize_document(dom: RcDom, document_encoding: String) -> std::io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let s: &str = &String::from_utf8_lossy(&buf);
            let (data, _, _) = encoding.encode(s);
            buf = data.to_vec();
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::html_to_dom;

    #[test]
    fn test_serialize_round_trips_links() {
        let dom = html_to_dom(
            b"<html><head></head><body><a href=\"https://a.com\">a.com</a></body></html>",
            "utf-8".to_string(),
        )
        .unwrap();
        let out = serialize_document(dom, "utf-8".to_string()).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<a href=\"https://a.com\">a.com</a>"));
    }

    #[test]
    fn test_serialize_with_legacy_encoding() {
        let dom = html_to_dom("<p>café</p>".as_bytes(), "utf-8".to_string()).unwrap();
        let out = serialize_document(dom, "windows-1252".to_string()).unwrap();
        assert!(out.windows(4).any(|w| w == b"caf\xE9"));
    }
}
