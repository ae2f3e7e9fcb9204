//! 集成测试公共设施

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use translix::TranslateProvider;

/// 假翻译后端：给文本加上目标语言前缀，记录调用次数
///
/// 与生产客户端遵守同一降级契约：`fail` 模式下原样返回输入。
/// 计数器共享引用，后端交给翻译器后测试仍可读取。
pub struct MockBackend {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl TranslateProvider for MockBackend {
    async fn is_available(&self) -> bool {
        !self.fail
    }

    async fn translate_text(&self, text: &str, _source: &str, target: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            text.to_string()
        } else {
            format!("[{}] {}", target, text)
        }
    }

    async fn translate_html(&self, html: &str, _source: &str, target: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            html.to_string()
        } else {
            format!("[{}] {}", target, html)
        }
    }
}

/// 典型的待翻译页面：正文、可翻译属性和必须跳过的子树
pub fn sample_page() -> &'static str {
    r#"<html><head><title>Page title</title><style>.x { color: red }</style></head>
<body>
<h1>Welcome back</h1>
<p title="Helpful tooltip">First paragraph of content</p>
<p>Second paragraph of content</p>
<img alt="A mountain lake">
<script>var ignored = "do not touch";</script>
<pre>fn main() {}</pre>
</body></html>"#
}

/// 零节流的记忆库配置，测试里每次写入立即落盘
pub fn instant_memory_config() -> translix::MemoryConfig {
    translix::MemoryConfig {
        persist_throttle: Duration::ZERO,
        ..Default::default()
    }
}
