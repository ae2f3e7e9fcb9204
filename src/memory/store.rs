//! 翻译记忆库
//!
//! 内存映射为会话期间的权威状态，快照文件为持久化副本。所有读写守卫
//! （空文本、超长文本、无效翻译）都在这里执行；持久化失败只记录日志，
//! 永不打断翻译流程。

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::constants;
use crate::memory::entry::TranslationEntry;
use crate::memory::eviction::{plan_eviction, EvictionConfig};
use crate::memory::key::derive_key;
use crate::memory::snapshot::SnapshotStore;

/// 记忆库配置
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// 条目数上限
    pub max_entries: usize,
    /// 单次淘汰比例
    pub evict_fraction: f32,
    /// 源文本最大字符数，超长文本不入库
    pub max_source_chars: usize,
    /// 持久化节流窗口，窗口内的多次写入合并为一次落盘
    pub persist_throttle: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: constants::DEFAULT_MAX_ENTRIES,
            evict_fraction: constants::DEFAULT_EVICT_FRACTION,
            max_source_chars: constants::DEFAULT_MAX_SOURCE_CHARS,
            persist_throttle: constants::DEFAULT_PERSIST_THROTTLE,
        }
    }
}

/// 条目摘要，用于统计报告
#[derive(Debug, Clone)]
pub struct EntrySummary {
    pub key: String,
    pub source_text: String,
    pub use_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl From<&TranslationEntry> for EntrySummary {
    fn from(entry: &TranslationEntry) -> Self {
        Self {
            key: entry.key.clone(),
            source_text: entry.source_text.clone(),
            use_count: entry.use_count,
            created_at: entry.created_at,
            last_used_at: entry.last_used_at,
        }
    }
}

/// 记忆库统计信息
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub size_estimate: usize,
    pub oldest_entry: Option<EntrySummary>,
    pub newest_entry: Option<EntrySummary>,
    pub most_used_entry: Option<EntrySummary>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner {
    entries: HashMap<String, TranslationEntry>,
    dirty: bool,
    last_persist: Instant,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// 翻译记忆库
pub struct TranslationMemory {
    inner: RwLock<Inner>,
    snapshot: SnapshotStore,
    config: MemoryConfig,
}

impl TranslationMemory {
    /// 打开记忆库：读取一次快照，损坏的快照按空库处理
    pub fn open<P: AsRef<Path>>(data_dir: P, config: MemoryConfig) -> Self {
        let snapshot = SnapshotStore::new(data_dir);
        let entries = snapshot.load();

        tracing::info!("翻译记忆库已打开: {} 个条目", entries.len());

        Self {
            inner: RwLock::new(Inner {
                entries,
                dirty: false,
                last_persist: Instant::now(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            snapshot,
            config,
        }
    }

    /// 查询翻译
    ///
    /// 命中时递增 `use_count` 并刷新 `last_used_at`（可观察副作用），
    /// 未命中返回 None。空字符串是合法译文，不能用作缺失信号。
    pub fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<String> {
        let key = derive_key(text, source_lang, target_lang);
        let mut inner = self.inner.write().unwrap();

        let translated = match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.touch();
                let translated = entry.translated_text.clone();
                inner.hits += 1;
                inner.dirty = true;
                Some(translated)
            }
            None => {
                inner.misses += 1;
                None
            }
        };

        if translated.is_some() {
            self.maybe_persist(&mut inner);
        }
        translated
    }

    /// 写入翻译
    ///
    /// 静默拒绝：空源文本、空译文、超长源文本、以及 trim 后与原文相同的
    /// “空转”译文（存它们浪费容量，且多半意味着服务端翻译失败）。
    pub fn put(&self, text: &str, translated: &str, source_lang: &str, target_lang: &str) {
        if text.is_empty() || translated.is_empty() {
            return;
        }
        if text.chars().count() > self.config.max_source_chars {
            tracing::debug!("源文本超长，不入库: {} 字符", text.chars().count());
            return;
        }
        if translated.trim() == text.trim() {
            return;
        }

        let key = derive_key(text, source_lang, target_lang);
        let mut inner = self.inner.write().unwrap();

        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.translated_text = translated.to_string();
                entry.touch();
            }
            None => {
                let entry = TranslationEntry::new(
                    key.clone(),
                    text.to_string(),
                    translated.to_string(),
                    source_lang.to_string(),
                    target_lang.to_string(),
                );
                inner.entries.insert(key.clone(), entry);
            }
        }
        inner.dirty = true;

        self.run_eviction(&mut inner, &key);
        self.maybe_persist(&mut inner);
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 聚合统计，仅用于诊断界面，不在热路径上
    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.read().unwrap();

        let oldest = inner.entries.values().min_by_key(|e| e.created_at);
        let newest = inner.entries.values().max_by_key(|e| e.created_at);
        let most_used = inner
            .entries
            .values()
            .max_by(|a, b| a.use_count.cmp(&b.use_count).then(a.last_used_at.cmp(&b.last_used_at)));

        MemoryStats {
            total_entries: inner.entries.len(),
            size_estimate: inner.entries.values().map(|e| e.size_estimate()).sum(),
            oldest_entry: oldest.map(EntrySummary::from),
            newest_entry: newest.map(EntrySummary::from),
            most_used_entry: most_used.map(EntrySummary::from),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// 清空记忆库及其持久化文件，立即生效
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.entries.clear();
        inner.dirty = false;

        if let Err(e) = self.snapshot.remove() {
            tracing::warn!("持久化文件删除失败: {}", e);
        }
    }

    /// 强制立即持久化，绕过节流窗口
    ///
    /// 多进程共享同一快照文件时为最后写入者胜出。
    pub fn flush(&self) {
        let mut inner = self.inner.write().unwrap();
        self.persist(&mut inner);
    }

    /// 节流持久化：只有距上次落盘超过窗口时才真正写出
    fn maybe_persist(&self, inner: &mut Inner) {
        if inner.dirty && inner.last_persist.elapsed() >= self.config.persist_throttle {
            self.persist(inner);
        }
    }

    fn persist(&self, inner: &mut Inner) {
        if !inner.dirty {
            inner.last_persist = Instant::now();
            return;
        }

        match self.snapshot.save(&inner.entries) {
            Ok(()) => {
                inner.dirty = false;
            }
            Err(e) => {
                // 内存状态仍然权威，本会话继续工作
                tracing::warn!("快照写出失败，内存缓存继续生效: {}", e);
            }
        }
        inner.last_persist = Instant::now();
    }

    /// 丢弃时刷出节流窗口内尚未落盘的写入
    ///
    /// 节流只是推迟落盘，不能变成丢弃：一阵写入之后进入空闲直到
    /// 进程结束的会话同样要留下快照。
    fn flush_on_drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !inner.dirty {
            return;
        }

        match self.snapshot.save(&inner.entries) {
            Ok(()) => {
                inner.dirty = false;
            }
            Err(e) => {
                tracing::warn!("关闭时快照写出失败: {}", e);
            }
        }
    }

    fn run_eviction(&self, inner: &mut Inner, protected_key: &str) {
        let eviction_config = EvictionConfig {
            max_entries: self.config.max_entries,
            evict_fraction: self.config.evict_fraction,
        };

        let victims = plan_eviction(&inner.entries, &eviction_config, Some(protected_key));
        if victims.is_empty() {
            return;
        }

        tracing::debug!("淘汰 {} 个低价值条目", victims.len());
        for key in &victims {
            inner.entries.remove(key);
        }
        inner.evictions += victims.len() as u64;
        inner.dirty = true;
    }
}

impl Drop for TranslationMemory {
    fn drop(&mut self) {
        self.flush_on_drop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(dir: &Path) -> TranslationMemory {
        TranslationMemory::open(
            dir,
            MemoryConfig {
                persist_throttle: Duration::from_secs(0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("Hello", "Bonjour", "en", "fr");
        assert_eq!(memory.get("Hello", "en", "fr"), Some("Bonjour".to_string()));
    }

    #[test]
    fn test_noop_translation_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("Hello", "Hello", "en", "fr");
        memory.put("Hello", "  Hello  ", "en", "fr");
        assert_eq!(memory.get("Hello", "en", "fr"), None);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_empty_and_oversized_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("", "Bonjour", "en", "fr");
        memory.put("Hello", "", "en", "fr");
        memory.put(&"x".repeat(2000), "y", "en", "fr");
        assert!(memory.is_empty());
    }

    #[test]
    fn test_hit_increments_use_count() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("Hello", "Bonjour", "en", "fr");
        let first = memory.get("Hello", "en", "fr");
        let second = memory.get("Hello", "en", "fr");

        assert_eq!(first, second);
        let stats = memory.stats();
        // 插入 1 次 + 命中 2 次
        assert_eq!(stats.most_used_entry.unwrap().use_count, 3);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_language_pairs_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("Hello", "Bonjour", "en", "fr");
        assert_eq!(memory.get("Hello", "en", "de"), None);
        assert_eq!(memory.get("Hello", "fr", "en"), None);
    }

    #[test]
    fn test_drop_persists_throttled_writes() {
        let dir = tempfile::tempdir().unwrap();

        {
            let memory = TranslationMemory::open(
                dir.path(),
                MemoryConfig {
                    persist_throttle: Duration::from_secs(600),
                    ..Default::default()
                },
            );
            memory.put("Hello", "Bonjour", "en", "fr");
            // 节流窗口内，显式不调用 flush
            assert!(!dir.path().join("translation-memory.json").exists());
        }

        let memory = memory(dir.path());
        assert_eq!(memory.get("Hello", "en", "fr"), Some("Bonjour".to_string()));
    }

    #[test]
    fn test_clear_empties_store_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let memory = memory(dir.path());

        memory.put("Hello", "Bonjour", "en", "fr");
        memory.flush();
        memory.clear();

        assert!(memory.is_empty());
        assert!(!dir.path().join("translation-memory.json").exists());
    }
}
