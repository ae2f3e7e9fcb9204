//! 渐进式 DOM 翻译引擎
//!
//! 一次“遍历”(pass) 的生命周期：
//! 1. 枚举文档中所有可翻译单元，总数在此刻固定；
//! 2. 按固定大小切批，逐批翻译：先查记忆库，未命中再请求后端；
//! 3. 每批落地后广播一次进度事件，并让出调度给宿主；
//! 4. 每批应用前核对代际计数器，过期的遍历静默丢弃剩余结果。
//!
//! 每个单元第一次被处理时记录其原始文本，revert 只依赖这份登记，
//! 不需要后端和记忆库参与。

pub mod batch;
pub mod collector;
pub mod progress;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::future::join_all;
use markup5ever_rcdom::RcDom;

use crate::client::TranslateProvider;
use crate::config::TranslationConfig;
use crate::dom::{set_node_attr, set_text_content};
use crate::memory::TranslationMemory;

pub use batch::{create_batches, Batch};
pub use collector::{TextCollector, TextUnit, UnitId};
pub use progress::{ProgressEvent, ProgressNotifier};

/// 单元登记表条目：原文只在第一次处理时捕获，之后不再覆盖
struct UnitRecord {
    node: markup5ever_rcdom::Handle,
    attr: Option<String>,
    original: String,
    translated: bool,
}

/// 一次遍历的统计
#[derive(Debug, Clone, Default)]
pub struct PassStats {
    /// 遍历开始时固定的单元总数
    pub total: usize,
    /// 已落地的单元数
    pub processed: usize,
    /// 记忆库命中数
    pub cache_hits: u64,
    /// 后端新译数
    pub fresh: u64,
    /// 降级回退到原文的单元数
    pub fallbacks: u64,
    pub elapsed: Duration,
}

/// 遍历结果
#[derive(Debug)]
pub enum PassOutcome {
    /// 遍历完整结束
    Completed(PassStats),
    /// 被更新的遍历取代，剩余批次的结果已丢弃
    Superseded(PassStats),
}

impl PassOutcome {
    pub fn stats(&self) -> &PassStats {
        match self {
            PassOutcome::Completed(stats) | PassOutcome::Superseded(stats) => stats,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, PassOutcome::Superseded(_))
    }
}

/// 渐进式翻译器
///
/// 对后端泛型：生产路径注入 [`crate::client::LibreClient`]，
/// 测试注入内存假后端。
pub struct ProgressiveTranslator<P: TranslateProvider> {
    provider: P,
    memory: std::sync::Arc<TranslationMemory>,
    collector: TextCollector,
    registry: Mutex<HashMap<UnitId, UnitRecord>>,
    /// 代际计数器：每次新遍历或 revert 都递增，旧遍历据此自我作废
    generation: AtomicU64,
    progress: ProgressNotifier,
    batch_size: usize,
    batch_yield: Duration,
}

impl<P: TranslateProvider> ProgressiveTranslator<P> {
    pub fn new(
        provider: P,
        memory: std::sync::Arc<TranslationMemory>,
        config: &TranslationConfig,
    ) -> Self {
        Self {
            provider,
            memory,
            collector: TextCollector::default(),
            registry: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            progress: ProgressNotifier::default(),
            batch_size: config.batch_size,
            batch_yield: config.batch_yield(),
        }
    }

    /// 订阅进度事件
    pub fn subscribe_progress<F>(&self, callback: F)
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress.subscribe(callback);
    }

    /// 使所有在途遍历作废，不触碰文档内容
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// 清空单元登记表，换新文档前调用
    pub fn reset(&self) {
        self.invalidate();
        self.registry.lock().unwrap().clear();
    }

    /// 执行一次完整遍历
    ///
    /// 遍历期间启动的新遍历（或 revert）会让本次遍历在下一个批次
    /// 边界自行退出，已落地的批次保持原样。
    pub async fn translate_pass(
        &self,
        dom: &RcDom,
        source_lang: &str,
        target_lang: &str,
    ) -> PassOutcome {
        let pass_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();

        // 新遍历重新翻译一切（目标语言可能变了），清掉旧的完成标记
        {
            let mut registry = self.registry.lock().unwrap();
            for record in registry.values_mut() {
                record.translated = false;
            }
        }

        let units = self.collector.collect(&dom.document);
        let mut stats = PassStats {
            total: units.len(),
            ..Default::default()
        };

        if units.is_empty() {
            self.progress.emit(ProgressEvent::new(0, 0));
            stats.elapsed = started.elapsed();
            return PassOutcome::Completed(stats);
        }

        tracing::debug!(
            "开始翻译遍历: {} 个单元, {} -> {}",
            units.len(),
            source_lang,
            target_lang
        );

        let batches = create_batches(units, self.batch_size);
        let batch_count = batches.len();

        for batch in batches {
            if self.generation.load(Ordering::SeqCst) != pass_gen {
                stats.elapsed = started.elapsed();
                tracing::debug!("遍历已过期，提前退出 (批次 {}/{})", batch.id, batch_count);
                return PassOutcome::Superseded(stats);
            }

            self.run_batch(batch, source_lang, target_lang, pass_gen, &mut stats)
                .await;

            if self.generation.load(Ordering::SeqCst) != pass_gen {
                stats.elapsed = started.elapsed();
                return PassOutcome::Superseded(stats);
            }

            self.progress
                .emit(ProgressEvent::new(stats.processed, stats.total));

            // 批次之间让出调度，宿主可以继续渲染
            if stats.processed < stats.total {
                tokio::time::sleep(self.batch_yield).await;
            }
        }

        stats.elapsed = started.elapsed();
        tracing::info!(
            "翻译遍历完成: {} 个单元, 命中 {}, 新译 {}, 回退 {}, 耗时 {:?}",
            stats.total,
            stats.cache_hits,
            stats.fresh,
            stats.fallbacks,
            stats.elapsed
        );
        PassOutcome::Completed(stats)
    }

    /// 翻译并落地一个批次；结果应用前再核对一次代际
    async fn run_batch(
        &self,
        batch: Batch,
        source_lang: &str,
        target_lang: &str,
        pass_gen: u64,
        stats: &mut PassStats,
    ) {
        tracing::debug!(
            "批次 {}: {} 个单元, {} 字符",
            batch.id,
            batch.len(),
            batch.char_count()
        );

        // 第一次见到某个单元时登记其原文，供 revert 和重复遍历使用
        let mut work: Vec<(TextUnit, String, Option<String>)> =
            Vec::with_capacity(batch.len());
        {
            let mut registry = self.registry.lock().unwrap();
            for unit in batch.units {
                let id = unit.id();
                let original = match registry.get(&id) {
                    Some(record) => record.original.clone(),
                    None => {
                        registry.insert(
                            id,
                            UnitRecord {
                                node: unit.node.clone(),
                                attr: unit.attr.clone(),
                                original: unit.text.clone(),
                                translated: false,
                            },
                        );
                        unit.text.clone()
                    }
                };
                let cached = self.memory.get(&original, source_lang, target_lang);
                work.push((unit, original, cached));
            }
        }

        // 只有记忆库未命中的单元才请求后端
        let misses: Vec<(usize, String)> = work
            .iter()
            .enumerate()
            .filter(|(_, (_, _, cached))| cached.is_none())
            .map(|(i, (_, original, _))| (i, original.clone()))
            .collect();

        let futures = misses.iter().map(|(_, original)| {
            self.provider
                .translate_text(original, source_lang, target_lang)
        });
        let fresh_results = join_all(futures).await;

        if self.generation.load(Ordering::SeqCst) != pass_gen {
            return;
        }

        let mut fresh_by_index: HashMap<usize, String> = HashMap::with_capacity(misses.len());
        for ((index, _), result) in misses.into_iter().zip(fresh_results) {
            fresh_by_index.insert(index, result);
        }

        let mut registry = self.registry.lock().unwrap();
        for (index, (unit, original, cached)) in work.into_iter().enumerate() {
            let (text, from_cache) = match cached {
                Some(cached) => (cached, true),
                None => (fresh_by_index.remove(&index).unwrap_or_else(|| original.clone()), false),
            };

            self.apply_unit(&unit, &text);

            if from_cache {
                stats.cache_hits += 1;
            } else if text != original {
                stats.fresh += 1;
                self.memory.put(&original, &text, source_lang, target_lang);
            } else {
                // 后端降级契约：失败时原样返回，原文落地也算处理完成
                stats.fallbacks += 1;
            }

            if let Some(record) = registry.get_mut(&unit.id()) {
                record.translated = true;
            }
            stats.processed += 1;
        }
    }

    fn apply_unit(&self, unit: &TextUnit, text: &str) {
        match &unit.attr {
            Some(attr) => set_node_attr(&unit.node, attr, Some(text.to_string())),
            None => {
                set_text_content(&unit.node, text);
            }
        }
    }

    /// 同步恢复所有已登记单元的原文，返回恢复的单元数
    ///
    /// 同时使在途遍历作废，避免迟到的批次把译文写回去。
    pub fn revert_pass(&self) -> usize {
        self.invalidate();

        let mut registry = self.registry.lock().unwrap();
        let mut restored = 0;

        for record in registry.values_mut() {
            match &record.attr {
                Some(attr) => {
                    set_node_attr(&record.node, attr, Some(record.original.clone()));
                }
                None => {
                    set_text_content(&record.node, &record.original);
                }
            }
            if record.translated {
                restored += 1;
            }
            record.translated = false;
        }

        tracing::debug!("已恢复 {} 个单元的原文", restored);
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{html_to_dom, serialize_document};
    use crate::memory::MemoryConfig;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// 假后端：大写转换，可选延迟，记录调用次数
    struct MockProvider {
        delay: Duration,
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    impl TranslateProvider for MockProvider {
        async fn is_available(&self) -> bool {
            !self.fail
        }

        async fn translate_text(&self, text: &str, _source: &str, _target: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                // 与生产客户端一致的降级契约
                text.to_string()
            } else {
                text.to_uppercase()
            }
        }

        async fn translate_html(&self, html: &str, _source: &str, _target: &str) -> String {
            html.to_string()
        }
    }

    fn translator(provider: MockProvider) -> (ProgressiveTranslator<MockProvider>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let memory = Arc::new(TranslationMemory::open(
            dir.path(),
            MemoryConfig {
                persist_throttle: Duration::ZERO,
                ..Default::default()
            },
        ));
        let config = TranslationConfig::default_with_lang("fr", None);
        (ProgressiveTranslator::new(provider, memory, &config), dir)
    }

    fn paragraphs(count: usize) -> RcDom {
        let body: String = (0..count)
            .map(|i| format!("<p>paragraph number {}</p>", i))
            .collect();
        html_to_dom(&format!("<html><body>{}</body></html>", body))
    }

    #[tokio::test]
    async fn test_pass_translates_all_units() {
        let (translator, _dir) = translator(MockProvider::new());
        let dom = paragraphs(3);

        let outcome = translator.translate_pass(&dom, "en", "fr").await;

        let stats = outcome.stats();
        assert!(!outcome.is_superseded());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.fresh, 3);

        let html = serialize_document(&dom);
        assert!(html.contains("PARAGRAPH NUMBER 0"));
        assert!(html.contains("PARAGRAPH NUMBER 2"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let (translator, _dir) = translator(MockProvider::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        translator.subscribe_progress(move |e| sink.lock().unwrap().push(e));

        let dom = paragraphs(12);
        translator.translate_pass(&dom, "en", "fr").await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].processed < w[1].processed));
        assert_eq!(events.last().unwrap().percent, 100);
        assert!(events.iter().all(|e| e.total == 12));
    }

    #[tokio::test]
    async fn test_cache_hits_skip_backend() {
        let (translator, _dir) = translator(MockProvider::new());
        let dom = paragraphs(3);

        for i in 0..3 {
            translator.memory.put(
                &format!("paragraph number {}", i),
                &format!("paragraphe numéro {}", i),
                "en",
                "fr",
            );
        }

        let outcome = translator.translate_pass(&dom, "en", "fr").await;

        let stats = outcome.stats();
        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.fresh, 0);
        assert_eq!(translator.provider.calls.load(Ordering::SeqCst), 0);
        assert!(serialize_document(&dom).contains("paragraphe numéro 1"));
    }

    #[tokio::test]
    async fn test_failed_backend_falls_back_and_still_progresses() {
        let (translator, _dir) = translator(MockProvider::failing());
        let dom = paragraphs(4);
        let before = serialize_document(&dom);

        let outcome = translator.translate_pass(&dom, "en", "fr").await;

        let stats = outcome.stats();
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.fallbacks, 4);
        assert_eq!(stats.fresh, 0);
        assert_eq!(serialize_document(&dom), before);
        assert!(translator.memory.is_empty());
    }

    #[tokio::test]
    async fn test_revert_restores_exact_original() {
        let (translator, _dir) = translator(MockProvider::new());
        let dom = html_to_dom(
            r#"<html><body><h1>Main title</h1><p title="Tooltip text">Body text</p></body></html>"#,
        );
        let before = serialize_document(&dom);

        translator.translate_pass(&dom, "en", "fr").await;
        assert_ne!(serialize_document(&dom), before);

        let restored = translator.revert_pass();
        assert!(restored > 0);
        assert_eq!(serialize_document(&dom), before);
    }

    #[tokio::test]
    async fn test_stale_pass_is_superseded() {
        let (translator, _dir) = translator(MockProvider::slow(Duration::from_millis(100)));
        let dom = paragraphs(10);

        let first = translator.translate_pass(&dom, "en", "fr");
        let second = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            translator.translate_pass(&dom, "en", "de").await
        };

        let (first, second) = tokio::join!(first, second);

        assert!(first.is_superseded());
        assert!(first.stats().processed < first.stats().total);
        assert!(!second.is_superseded());
        assert_eq!(second.stats().processed, 10);
    }

    #[tokio::test]
    async fn test_revert_cancels_inflight_pass() {
        let (translator, _dir) = translator(MockProvider::slow(Duration::from_millis(100)));
        let dom = paragraphs(10);
        let before = serialize_document(&dom);

        let pass = translator.translate_pass(&dom, "en", "fr");
        let revert = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            translator.revert_pass()
        };

        let (outcome, _) = tokio::join!(pass, revert);

        assert!(outcome.is_superseded());
        assert_eq!(serialize_document(&dom), before);
    }

    #[tokio::test]
    async fn test_empty_document_completes_immediately() {
        let (translator, _dir) = translator(MockProvider::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        translator.subscribe_progress(move |e| sink.lock().unwrap().push(e));

        let dom = html_to_dom("<html><body></body></html>");
        let outcome = translator.translate_pass(&dom, "en", "fr").await;

        assert!(!outcome.is_superseded());
        assert_eq!(outcome.stats().total, 0);
        assert_eq!(events.lock().unwrap().last().unwrap().percent, 100);
    }

    #[tokio::test]
    async fn test_fresh_translations_populate_memory() {
        let (translator, _dir) = translator(MockProvider::new());
        let dom = paragraphs(2);

        translator.translate_pass(&dom, "en", "fr").await;

        assert_eq!(
            translator.memory.get("paragraph number 0", "en", "fr"),
            Some("PARAGRAPH NUMBER 0".to_string())
        );
        assert_eq!(translator.memory.len(), 2);
    }
}
