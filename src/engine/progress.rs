//! 进度通知
//!
//! 每个批次落地后向订阅者广播一次进度事件。百分比四舍五入到整数，
//! 遍历完成时保证收到 100。

use std::sync::Mutex;

/// 进度事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 已落地的单元数（含命中、新译和降级回退）
    pub processed: usize,
    /// 本次遍历开始时固定的总数
    pub total: usize,
    /// 四舍五入后的整数百分比
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((processed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            processed,
            total,
            percent,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// 进度订阅表
#[derive(Default)]
pub struct ProgressNotifier {
    listeners: Mutex<Vec<ProgressCallback>>,
}

impl ProgressNotifier {
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Box::new(callback));
    }

    pub fn emit(&self, event: ProgressEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(event);
        }
    }
}
