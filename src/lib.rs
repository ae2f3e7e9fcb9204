//! translix: 带翻译记忆的渐进式 HTML 翻译引擎
//!
//! 核心组件：
//! - [`memory::TranslationMemory`]: 以 (源文本, 语言对) 为键的翻译记忆库，
//!   带使用元数据、容量淘汰和节流持久化
//! - [`client::LibreClient`]: LibreTranslate 风格的 HTTP 客户端，
//!   所有失败都降级为返回原文
//! - [`engine::ProgressiveTranslator`]: 渐进式 DOM 翻译器，分批落地、
//!   广播进度、支持取消与原文恢复
//! - [`language::LanguageController`]: 语言状态与 RTL 方向控制
//!
//! 最简单的用法是一步到位的门面函数：
//!
//! ```no_run
//! use translix::{translate_html_blocking, TranslationConfig};
//!
//! let config = TranslationConfig::default_with_lang("fr", None);
//! let translated = translate_html_blocking("<p>Hello world</p>", &config).unwrap();
//! println!("{}", translated);
//! ```

pub mod client;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod language;
pub mod memory;

use std::sync::Arc;

pub use client::{LibreClient, TranslateProvider};
pub use config::TranslationConfig;
pub use engine::{PassOutcome, PassStats, ProgressEvent, ProgressiveTranslator};
pub use error::{TranslationError, TranslationResult};
pub use language::{is_rtl, LanguageChange, LanguageController};
pub use memory::{MemoryConfig, TranslationMemory};

/// 翻译一段完整的 HTML 文档并返回序列化结果
///
/// 组装记忆库、客户端和渐进式翻译器各跑一遍，最后把 `lang` / `dir`
/// 属性写到根元素上。服务不可用时返回内容与输入等价的文档。
pub async fn translate_html(html: &str, config: &TranslationConfig) -> TranslationResult<String> {
    config.validate()?;

    let memory = Arc::new(TranslationMemory::open(
        &config.data_dir,
        MemoryConfig {
            max_entries: config.max_entries,
            evict_fraction: config.evict_fraction,
            max_source_chars: config.max_source_chars,
            persist_throttle: config.persist_throttle(),
        },
    ));

    let client = LibreClient::new(config)?;
    let translator = ProgressiveTranslator::new(client, memory.clone(), config);

    let dom = dom::html_to_dom(html);
    translator
        .translate_pass(&dom, &config.source_lang, &config.target_lang)
        .await;

    let controller = LanguageController::open(&config.data_dir, &config.source_lang);
    controller.set_language(&config.target_lang);
    controller.apply_document_attrs(&dom);

    memory.flush();
    Ok(dom::serialize_document(&dom))
}

/// [`translate_html`] 的阻塞版本，内部自带单线程运行时
pub fn translate_html_blocking(html: &str, config: &TranslationConfig) -> TranslationResult<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TranslationError::InternalError(format!("运行时创建失败: {}", e)))?;

    runtime.block_on(translate_html(html, config))
}
