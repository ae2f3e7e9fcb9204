//! DOM 辅助函数
//!
//! 基于 html5ever / markup5ever_rcdom 的文档解析、序列化和节点操作

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// 将 HTML 字符串解析为 DOM
pub fn html_to_dom(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .unwrap_or_else(|_| RcDom::default())
}

/// 序列化文档为 HTML 字符串
pub fn serialize_document(dom: &RcDom) -> String {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.clone().into();
    if let Err(e) = serialize(&mut buf, &serializable, SerializeOpts::default()) {
        tracing::error!("DOM序列化失败: {}", e);
        return String::new();
    }

    String::from_utf8_lossy(&buf).into_owned()
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

/// 设置节点属性；`attr_value` 为 None 时移除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{namespace_url, ns, LocalName};

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
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value.clone() {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 读取文本节点内容
pub fn get_text_content(node: &Handle) -> Option<String> {
    match node.data {
        NodeData::Text { ref contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 覆盖文本节点内容
pub fn set_text_content(node: &Handle, text: &str) -> bool {
    if let NodeData::Text { ref contents } = node.data {
        let mut content_ref = contents.borrow_mut();
        content_ref.clear();
        content_ref.push_slice(text);
        true
    } else {
        false
    }
}

/// 查找文档的 html 根元素
pub fn get_html_element(dom: &RcDom) -> Option<Handle> {
    get_child_node_by_name(&dom.document, "html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_round_trip() {
        let dom = html_to_dom("<html><body><p>Hello</p></body></html>");
        let out = serialize_document(&dom);
        assert!(out.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_set_and_get_node_attr() {
        let dom = html_to_dom("<html><body></body></html>");
        let html = get_html_element(&dom).unwrap();

        set_node_attr(&html, "lang", Some("fr".to_string()));
        assert_eq!(get_node_attr(&html, "lang"), Some("fr".to_string()));

        set_node_attr(&html, "lang", None);
        assert_eq!(get_node_attr(&html, "lang"), None);
    }

    #[test]
    fn test_set_text_content() {
        let dom = html_to_dom("<html><body><p>original</p></body></html>");
        let html = get_html_element(&dom).unwrap();
        let body = get_child_node_by_name(&html, "body").unwrap();
        let p = get_child_node_by_name(&body, "p").unwrap();
        let text = p.children.borrow()[0].clone();

        assert!(set_text_content(&text, "replaced"));
        assert_eq!(get_text_content(&text), Some("replaced".to_string()));
        // 元素节点不可当作文本节点写入
        assert!(!set_text_content(&p, "nope"));
    }

}
