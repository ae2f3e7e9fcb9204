//! 记忆库快照持久化
//!
//! 单个命名空间化的 JSON 文件保存整张键值映射；启动时读取一次，
//! 之后按节流计划或显式 flush 写回。多进程共享同一文件时为
//! 最后写入者胜出，不提供事务保证。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TranslationResult;
use crate::memory::entry::TranslationEntry;

/// 快照文件格式版本号，不兼容的旧格式按空库处理
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, TranslationEntry>,
}

/// 快照存储
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join("translation-memory.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载快照；文件缺失或损坏时返回空映射，绝不向上抛错中断启动
    pub fn load(&self) -> HashMap<String, TranslationEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return HashMap::new();
            }
            Err(e) => {
                tracing::warn!("快照读取失败，按空记忆库处理: {}", e);
                return HashMap::new();
            }
        };

        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => {
                tracing::debug!("快照已加载: {} 个条目", snapshot.entries.len());
                snapshot.entries
            }
            Ok(snapshot) => {
                tracing::warn!(
                    "快照版本不兼容 (文件 v{}，当前 v{})，按空记忆库处理",
                    snapshot.version,
                    SNAPSHOT_VERSION
                );
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!("快照内容无法解析，按空记忆库处理: {}", e);
                HashMap::new()
            }
        }
    }

    /// 写出快照；先写临时文件再原子替换，避免中途崩溃留下半个文件
    pub fn save(&self, entries: &HashMap<String, TranslationEntry>) -> TranslationResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries: entries.clone(),
        };
        let json = serde_json::to_string(&snapshot)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("快照已写出: {} 个条目", entries.len());
        Ok(())
    }

    /// 删除持久化文件
    pub fn remove(&self) -> TranslationResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
