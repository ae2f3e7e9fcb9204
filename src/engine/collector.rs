//! 文本收集器
//!
//! 递归遍历 DOM，枚举可翻译的文本节点和属性值。跳过列表中的容器元素
//! （脚本、样式、代码块等）整棵子树不进入工作清单。

use std::collections::HashSet;

use markup5ever_rcdom::{Handle, NodeData};

use crate::config::constants;
use crate::dom::get_node_attr;

/// 工作单元标识：节点指针 + 可选属性名
///
/// 同一个元素节点可能同时贡献多个属性单元，文本单元只来自文本节点，
/// 因此 (指针, 属性名) 足以唯一标识一个可翻译位置。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitId {
    pub node_ptr: usize,
    pub attr: Option<String>,
}

/// 可翻译工作单元
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub node: Handle,
    /// None 表示文本节点内容，Some 表示元素属性值
    pub attr: Option<String>,
    pub text: String,
}

impl TextUnit {
    pub fn id(&self) -> UnitId {
        UnitId {
            node_ptr: std::rc::Rc::as_ptr(&self.node) as usize,
            attr: self.attr.clone(),
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 文本过滤器：判断一段文本是否值得送去翻译
pub struct TextFilter {
    min_text_length: usize,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self {
            min_text_length: constants::MIN_TEXT_LENGTH,
        }
    }
}

impl TextFilter {
    pub fn should_translate(&self, text: &str) -> bool {
        let trimmed = text.trim();

        if trimmed.len() < self.min_text_length {
            return false;
        }

        // 不含字母的文本（纯数字、纯符号、空白）没有翻译价值
        if !trimmed.chars().any(|c| c.is_alphabetic()) {
            return false;
        }

        if self.is_url(trimmed) || self.is_email(trimmed) || self.is_code_like(trimmed) {
            return false;
        }

        true
    }

    fn is_url(&self, text: &str) -> bool {
        text.starts_with("http://")
            || text.starts_with("https://")
            || text.starts_with("ftp://")
            || text.starts_with("www.")
    }

    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || text.contains(char::is_whitespace) {
            return false;
        }
        match text.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }

    fn is_code_like(&self, text: &str) -> bool {
        let special_chars = text
            .chars()
            .filter(|&c| {
                matches!(
                    c,
                    '{' | '}' | '[' | ']' | '(' | ')' | ';' | '=' | '<' | '>' | '/' | '\\'
                )
            })
            .count();

        special_chars as f32 > text.len() as f32 * constants::SPECIAL_CHAR_THRESHOLD
    }
}

/// DOM 文本收集器
pub struct TextCollector {
    filter: TextFilter,
    skip_elements: HashSet<String>,
    collect_attributes: Vec<String>,
}

impl Default for TextCollector {
    fn default() -> Self {
        Self {
            filter: TextFilter::default(),
            skip_elements: constants::SKIP_ELEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            collect_attributes: constants::TRANSLATABLE_ATTRS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl TextCollector {
    /// 收集根节点下所有可翻译单元，按文档顺序返回，同一单元只出现一次
    pub fn collect(&self, root: &Handle) -> Vec<TextUnit> {
        let mut units = Vec::new();
        let mut seen: HashSet<UnitId> = HashSet::new();
        self.collect_recursive(root, &mut units, &mut seen);
        units
    }

    fn collect_recursive(
        &self,
        node: &Handle,
        units: &mut Vec<TextUnit>,
        seen: &mut HashSet<UnitId>,
    ) {
        match node.data {
            NodeData::Text { ref contents } => {
                let text = contents.borrow().to_string();
                if self.filter.should_translate(&text) {
                    self.push_unit(
                        TextUnit {
                            node: node.clone(),
                            attr: None,
                            text,
                        },
                        units,
                        seen,
                    );
                }
            }
            NodeData::Element { ref name, .. } => {
                let tag_name = name.local.as_ref().to_lowercase();
                if self.skip_elements.contains(&tag_name) {
                    return;
                }

                for attr_name in &self.collect_attributes {
                    if let Some(value) = get_node_attr(node, attr_name) {
                        if self.filter.should_translate(&value) {
                            self.push_unit(
                                TextUnit {
                                    node: node.clone(),
                                    attr: Some(attr_name.clone()),
                                    text: value,
                                },
                                units,
                                seen,
                            );
                        }
                    }
                }

                for child in node.children.borrow().iter() {
                    self.collect_recursive(child, units, seen);
                }
            }
            _ => {
                for child in node.children.borrow().iter() {
                    self.collect_recursive(child, units, seen);
                }
            }
        }
    }

    fn push_unit(&self, unit: TextUnit, units: &mut Vec<TextUnit>, seen: &mut HashSet<UnitId>) {
        if seen.insert(unit.id()) {
            units.push(unit);
        }
    }
}
