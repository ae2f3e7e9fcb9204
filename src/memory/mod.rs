//! 翻译记忆库
//!
//! 以 (源文本, 源语言, 目标语言) 为键缓存翻译结果，带使用元数据、
//! 容量淘汰和节流持久化：
//! - **key**: 缓存键派生（blake3 指纹）
//! - **entry**: 条目类型与使用元数据
//! - **eviction**: 按使用频度/新近度排名的淘汰策略
//! - **snapshot**: JSON 快照持久化
//! - **store**: 对外的记忆库组件，持有内存状态与快照生命周期

pub mod entry;
pub mod eviction;
pub mod key;
pub mod snapshot;
pub mod store;

pub use entry::TranslationEntry;
pub use eviction::EvictionConfig;
pub use key::derive_key;
pub use snapshot::SnapshotStore;
pub use store::{EntrySummary, MemoryConfig, MemoryStats, TranslationMemory};
