//! 翻译配置管理
//!
//! 提供统一的配置接口，支持配置文件、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 翻译记忆库相关
    pub const DEFAULT_MAX_ENTRIES: usize = 2000;
    pub const DEFAULT_EVICT_FRACTION: f32 = 0.2;
    pub const DEFAULT_MAX_SOURCE_CHARS: usize = 1000;
    pub const DEFAULT_PERSIST_THROTTLE: Duration = Duration::from_secs(2);

    // 渐进式翻译相关
    pub const DEFAULT_BATCH_SIZE: usize = 5;
    pub const BATCH_YIELD_MS: u64 = 10;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;
    pub const SPECIAL_CHAR_THRESHOLD: f32 = 0.33;

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:5000";
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const PROBE_CACHE_TTL: Duration = Duration::from_secs(30);

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] =
        &["title", "alt", "placeholder", "aria-label", "aria-description"];

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "meta", "link", "head", "svg", "math",
        "canvas", "video", "audio", "embed", "object", "iframe", "textarea",
    ];

    // 从右到左书写的语言
    pub const RTL_LANGUAGES: &[&str] = &["ar", "he", "fa", "ur", "yi", "ps", "sd", "ckb", "dv"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &["translix.toml", ".translix.toml"];
}

/// 翻译配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 语言设置
    pub source_lang: String,
    pub target_lang: String,

    // API设置
    pub api_url: String,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,

    // 记忆库设置
    pub max_entries: usize,
    pub evict_fraction: f32,
    pub max_source_chars: usize,
    pub persist_throttle_secs: u64,
    pub data_dir: PathBuf,

    // 渐进式翻译设置
    pub batch_size: usize,
    pub batch_yield_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "zh".to_string(),
            api_url: constants::DEFAULT_API_URL.to_string(),
            probe_timeout_secs: constants::DEFAULT_PROBE_TIMEOUT.as_secs(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_entries: constants::DEFAULT_MAX_ENTRIES,
            evict_fraction: constants::DEFAULT_EVICT_FRACTION,
            max_source_chars: constants::DEFAULT_MAX_SOURCE_CHARS,
            persist_throttle_secs: constants::DEFAULT_PERSIST_THROTTLE.as_secs(),
            data_dir: PathBuf::from(".translix"),
            batch_size: constants::DEFAULT_BATCH_SIZE,
            batch_yield_ms: constants::BATCH_YIELD_MS,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, api_url: Option<&str>) -> Self {
        let mut config = Self::default();
        config.target_lang = target_lang.to_string();
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_entries == 0 {
            return Err(TranslationError::ConfigError(
                "记忆库容量不能为0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.evict_fraction) {
            return Err(TranslationError::ConfigError(
                "淘汰比例必须在 [0, 1) 区间内".to_string(),
            ));
        }

        if self.source_lang == self.target_lang {
            return Err(TranslationError::ConfigError(
                "源语言与目标语言相同".to_string(),
            ));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TRANSLIX_API_URL") {
            tracing::info!("环境变量覆盖 API URL: {}", url);
            self.api_url = url;
        }

        if let Ok(lang) = std::env::var("TRANSLIX_TARGET_LANG") {
            self.target_lang = lang;
        }

        if let Ok(lang) = std::env::var("TRANSLIX_SOURCE_LANG") {
            self.source_lang = lang;
        }

        if let Ok(dir) = std::env::var("TRANSLIX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(size) = std::env::var("TRANSLIX_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                self.batch_size = size;
            }
        }

        if let Ok(max) = std::env::var("TRANSLIX_MAX_ENTRIES") {
            if let Ok(max) = max.parse() {
                self.max_entries = max;
            }
        }
    }

    /// 从TOML文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 加载配置：按搜索路径查找配置文件，叠加环境变量，最后回落到默认值
    pub fn load() -> Self {
        for path in constants::CONFIG_PATHS {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(mut config) => {
                        tracing::debug!("已加载配置文件: {}", path);
                        config.apply_env_overrides();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("配置文件 {} 加载失败，忽略: {}", path, e);
                    }
                }
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn persist_throttle(&self) -> Duration {
        Duration::from_secs(self.persist_throttle_secs)
    }

    pub fn batch_yield(&self) -> Duration {
        Duration::from_millis(self.batch_yield_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TranslationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = TranslationConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_language_pair_rejected() {
        let mut config = TranslationConfig::default();
        config.source_lang = "fr".to_string();
        config.target_lang = "fr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_evict_fraction_bounds() {
        let mut config = TranslationConfig::default();
        config.evict_fraction = 1.0;
        assert!(config.validate().is_err());
        config.evict_fraction = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_with_lang() {
        let config = TranslationConfig::default_with_lang("ja", Some("http://api.test"));
        assert_eq!(config.target_lang, "ja");
        assert_eq!(config.api_url, "http://api.test");
    }

    #[test]
    fn test_from_toml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translix.toml");
        std::fs::write(&path, "target_lang = \"fr\"\nbatch_size = 8\n").unwrap();

        let config = TranslationConfig::from_file(&path).unwrap();
        assert_eq!(config.target_lang, "fr");
        assert_eq!(config.batch_size, 8);
        // 未指定字段保持默认
        assert_eq!(config.max_entries, constants::DEFAULT_MAX_ENTRIES);
    }
}
