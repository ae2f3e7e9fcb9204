//! 语言状态控制器
//!
//! 维护当前目标语言与 RTL 判定，向订阅者广播语言切换事件，并把
//! `lang` / `dir` 属性写回文档根元素。语言偏好持久化为数据目录下的
//! 一个小 JSON 文件，读不到就退回默认语言。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use markup5ever_rcdom::RcDom;
use serde::{Deserialize, Serialize};

use crate::config::constants;
use crate::dom::{get_html_element, set_node_attr};

/// 判断语言代码是否书写方向从右到左
///
/// 只看主语言子标签，`ar-EG` 与 `ar` 同样判定为 RTL。
pub fn is_rtl(lang: &str) -> bool {
    let primary = lang.split(['-', '_']).next().unwrap_or(lang);
    constants::RTL_LANGUAGES
        .iter()
        .any(|l| l.eq_ignore_ascii_case(primary))
}

/// 语言切换事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageChange {
    pub previous: String,
    pub current: String,
    /// 新语言是否 RTL
    pub rtl: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagePreference {
    language: String,
}

type ChangeCallback = Box<dyn Fn(&LanguageChange) + Send + Sync>;

/// 语言控制器
pub struct LanguageController {
    default_language: String,
    current: RwLock<String>,
    preference_path: PathBuf,
    subscribers: Mutex<Vec<ChangeCallback>>,
}

impl LanguageController {
    /// 创建控制器：存在已保存的偏好时优先使用，否则用默认语言
    pub fn open<P: AsRef<Path>>(data_dir: P, default_language: &str) -> Self {
        let preference_path = data_dir.as_ref().join("language-preference.json");
        let current = load_preference(&preference_path)
            .unwrap_or_else(|| default_language.to_string());

        Self {
            default_language: default_language.to_string(),
            current: RwLock::new(current),
            preference_path,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> String {
        self.current.read().unwrap().clone()
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn current_is_rtl(&self) -> bool {
        is_rtl(&self.current())
    }

    /// 订阅语言切换事件
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&LanguageChange) + Send + Sync + 'static,
    {
        self.subscribers.lock().unwrap().push(Box::new(callback));
    }

    /// 切换当前语言
    ///
    /// 语言未变化时不广播也不落盘。偏好写盘失败只记日志，
    /// 本会话内的语言状态不受影响。
    pub fn set_language(&self, lang: &str) -> Option<LanguageChange> {
        let previous = {
            let mut current = self.current.write().unwrap();
            if current.as_str() == lang {
                return None;
            }
            std::mem::replace(&mut *current, lang.to_string())
        };

        let change = LanguageChange {
            previous,
            current: lang.to_string(),
            rtl: is_rtl(lang),
        };

        self.save_preference(lang);
        self.notify(&change);
        Some(change)
    }

    /// 回到默认语言
    pub fn reset(&self) -> Option<LanguageChange> {
        let default = self.default_language.clone();
        self.set_language(&default)
    }

    /// 把当前语言写入文档根元素的 `lang` 和 `dir` 属性
    pub fn apply_document_attrs(&self, dom: &RcDom) {
        let current = self.current();
        if let Some(html) = get_html_element(dom) {
            set_node_attr(&html, "lang", Some(current.clone()));
            let dir = if is_rtl(&current) { "rtl" } else { "ltr" };
            set_node_attr(&html, "dir", Some(dir.to_string()));
        }
    }

    fn save_preference(&self, lang: &str) {
        let preference = LanguagePreference {
            language: lang.to_string(),
        };

        let result = (|| -> crate::error::TranslationResult<()> {
            if let Some(parent) = self.preference_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string(&preference)?;
            fs::write(&self.preference_path, json)?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!("语言偏好保存失败: {}", e);
        }
    }

    fn notify(&self, change: &LanguageChange) {
        let subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            subscriber(change);
        }
    }
}

fn load_preference(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<LanguagePreference>(&content) {
        Ok(preference) if !preference.language.trim().is_empty() => Some(preference.language),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("语言偏好文件无法解析，使用默认语言: {}", e);
            None
        }
    }
}
