//! translix 命令行入口
//!
//! 读取一个 HTML 文件（或标准输入），渐进式翻译后写出结果。
//! 日志级别通过 RUST_LOG 控制，进度打印到标准错误。

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use translix::engine::ProgressiveTranslator;
use translix::{
    LanguageController, LibreClient, MemoryConfig, TranslationConfig, TranslationMemory,
    TranslationResult,
};

#[derive(Parser)]
#[command(name = "translix", version, about = "渐进式 HTML 翻译工具")]
struct Cli {
    /// 输入 HTML 文件，"-" 表示标准输入
    input: String,

    /// 目标语言代码
    #[arg(short, long, default_value = "zh")]
    target_lang: String,

    /// 源语言代码
    #[arg(short, long, default_value = "en")]
    source_lang: String,

    /// 翻译服务地址
    #[arg(long)]
    api_url: Option<String>,

    /// 数据目录（翻译记忆与语言偏好）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 每批翻译的单元数
    #[arg(long)]
    batch_size: Option<usize>,

    /// 输出文件，缺省写到标准输出
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 翻译前清空翻译记忆
    #[arg(long)]
    clear_memory: bool,

    /// 结束时打印记忆库统计
    #[arg(long)]
    stats: bool,
}

impl Cli {
    fn to_config(&self) -> TranslationConfig {
        let mut config = TranslationConfig::load();
        config.target_lang = self.target_lang.clone();
        config.source_lang = self.source_lang.clone();
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        config
    }
}

fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut html = String::new();
        std::io::stdin().read_to_string(&mut html)?;
        Ok(html)
    } else {
        std::fs::read_to_string(input)
    }
}

async fn run(cli: &Cli, config: &TranslationConfig, html: &str) -> TranslationResult<String> {
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

    if cli.clear_memory {
        memory.clear();
        tracing::info!("翻译记忆已清空");
    }

    let client = LibreClient::new(config)?;
    let translator = ProgressiveTranslator::new(client, memory.clone(), config);
    translator.subscribe_progress(|event| {
        eprintln!(
            "翻译进度: {}/{} ({}%)",
            event.processed, event.total, event.percent
        );
    });

    let dom = translix::dom::html_to_dom(html);
    let outcome = translator
        .translate_pass(&dom, &config.source_lang, &config.target_lang)
        .await;
    tracing::info!(
        "遍历结束: 命中 {}, 新译 {}, 回退 {}",
        outcome.stats().cache_hits,
        outcome.stats().fresh,
        outcome.stats().fallbacks
    );

    let controller = LanguageController::open(&config.data_dir, &config.source_lang);
    controller.set_language(&config.target_lang);
    controller.apply_document_attrs(&dom);

    memory.flush();

    if cli.stats {
        let stats = memory.stats();
        eprintln!(
            "记忆库: {} 条, 约 {} 字节, 命中 {}, 未命中 {}, 淘汰 {}",
            stats.total_entries, stats.size_estimate, stats.hits, stats.misses, stats.evictions
        );
    }

    Ok(translix::dom::serialize_document(&dom))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.to_config();

    let html = match read_input(&cli.input) {
        Ok(html) => html,
        Err(e) => {
            eprintln!("无法读取输入 {}: {}", cli.input, e);
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("运行时创建失败: {}", e);
            process::exit(1);
        }
    };

    match runtime.block_on(run(&cli, &config, &html)) {
        Ok(result) => {
            let written = match &cli.output {
                Some(path) => std::fs::write(path, &result).map_err(|e| e.to_string()),
                None => {
                    print!("{}", result);
                    Ok(())
                }
            };
            if let Err(e) = written {
                eprintln!("输出写入失败: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("翻译失败: {}", e);
            process::exit(1);
        }
    }
}
