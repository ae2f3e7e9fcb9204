//! 淘汰策略
//!
//! 按 (use_count, last_used_at) 升序排名，超容量时移除排名最低的一批条目

use std::collections::HashMap;

use crate::memory::entry::TranslationEntry;

/// 淘汰策略配置
#[derive(Debug, Clone)]
pub struct EvictionConfig {
    /// 条目数上限
    pub max_entries: usize,
    /// 单次淘汰比例，留出余量避免下一次插入立即再触发
    pub evict_fraction: f32,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::config::constants::DEFAULT_MAX_ENTRIES,
            evict_fraction: crate::config::constants::DEFAULT_EVICT_FRACTION,
        }
    }
}

/// 计算需要淘汰的键列表
///
/// 仅当条目数超过 `max_entries` 时返回非空结果。排序对条目总数做一次
/// 完整排序，O(n log n)；容量有上界，可接受。`protected_key`（刚插入
/// 的条目）在本轮永不淘汰。
pub fn plan_eviction(
    entries: &HashMap<String, TranslationEntry>,
    config: &EvictionConfig,
    protected_key: Option<&str>,
) -> Vec<String> {
    if entries.len() <= config.max_entries {
        return Vec::new();
    }

    // 一次淘汰上限的 evict_fraction（四舍五入），留出余量避免下一次
    // 插入立即再触发；至少要把超出部分清掉
    let margin = ((config.max_entries as f32) * config.evict_fraction).round() as usize;
    let over = entries.len() - config.max_entries;
    let mut to_remove = over.max(margin).max(1);

    let mut ranked: Vec<&TranslationEntry> = entries
        .values()
        .filter(|e| Some(e.key.as_str()) != protected_key)
        .collect();
    ranked.sort_by(|a, b| {
        a.use_count
            .cmp(&b.use_count)
            .then_with(|| a.last_used_at.cmp(&b.last_used_at))
    });

    to_remove = to_remove.min(ranked.len());
    ranked[..to_remove].iter().map(|e| e.key.clone()).collect()
}
