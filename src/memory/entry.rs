//! 翻译记忆条目

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 记忆库条目
///
/// 携带使用元数据：`use_count` 在每次命中和重复写入时递增，
/// `last_used_at` 随之刷新，两者共同决定淘汰排序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub key: String,
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub use_count: u64,
}

impl TranslationEntry {
    /// 创建新条目；新条目视为已被产生它的翻译过程使用过一次
    pub fn new(
        key: String,
        source_text: String,
        translated_text: String,
        source_lang: String,
        target_lang: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            source_text,
            translated_text,
            source_lang,
            target_lang,
            created_at: now,
            last_used_at: now,
            use_count: 1,
        }
    }

    /// 命中时更新使用元数据
    pub fn touch(&mut self) {
        self.use_count += 1;
        self.last_used_at = Utc::now();
    }

    /// 估算条目占用的存储字节数
    pub fn size_estimate(&self) -> usize {
        self.key.len()
            + self.source_text.len()
            + self.translated_text.len()
            + self.source_lang.len()
            + self.target_lang.len()
            // 时间戳与计数的序列化开销
            + 64
    }
}
