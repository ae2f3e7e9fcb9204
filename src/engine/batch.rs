//! 批次划分
//!
//! 把工作清单切成固定大小的批次。批次大小在一次遍历开始时就固定下来，
//! 遍历过程中不随内容动态调整，保证进度汇报的分母稳定。

use crate::engine::collector::TextUnit;

/// 一个翻译批次
#[derive(Debug)]
pub struct Batch {
    /// 批次序号，从 0 开始
    pub id: usize,
    pub units: Vec<TextUnit>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.units.iter().map(|u| u.char_count()).sum()
    }
}

/// 按固定大小划分批次，保持输入顺序
pub fn create_batches(units: Vec<TextUnit>, batch_size: usize) -> Vec<Batch> {
    debug_assert!(batch_size > 0);

    let mut batches = Vec::with_capacity(units.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);

    for unit in units {
        current.push(unit);
        if current.len() == batch_size {
            batches.push(Batch {
                id: batches.len(),
                units: std::mem::replace(&mut current, Vec::with_capacity(batch_size)),
            });
        }
    }

    if !current.is_empty() {
        batches.push(Batch {
            id: batches.len(),
            units: current,
        });
    }

    batches
}
