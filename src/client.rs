//! 翻译服务客户端
//!
//! 封装 LibreTranslate 风格的 HTTP 接口：`POST /translate` 接受
//! `{q, source, target, format}`，返回 `{translatedText}`；`GET /languages`
//! 仅用于可用性探测。
//!
//! 该组件位于面向用户的渲染路径上，因此刻意吞掉所有失败模式：
//! 服务故障只会退化为“显示原文”，绝不向调用方抛错。

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{constants, TranslationConfig};
use crate::error::{TranslationError, TranslationResult};

/// 翻译后端接口
///
/// 渐进式翻译引擎只依赖这一接缝，测试可以注入假后端。
/// 实现必须遵守降级契约：任何失败都返回原文，而不是错误。
pub trait TranslateProvider: Send + Sync {
    /// 探测服务是否可用；超时、网络故障、非成功响应一律返回 false
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// 翻译纯文本；失败时原样返回 `text`
    fn translate_text(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> impl Future<Output = String> + Send;

    /// 翻译 HTML 片段，要求服务端保持标记结构；失败时原样返回 `html`
    fn translate_html(
        &self,
        html: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> impl Future<Output = String> + Send;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// LibreTranslate 客户端
pub struct LibreClient {
    http: reqwest::Client,
    translate_url: Url,
    languages_url: Url,
    probe_timeout: Duration,
    /// 探测结果短期缓存，避免每个文本节点都打一次 /languages
    probe_cache: Mutex<Option<(Instant, bool)>>,
    probe_cache_ttl: Duration,
}

impl LibreClient {
    /// 根据配置创建客户端
    pub fn new(config: &TranslationConfig) -> TranslationResult<Self> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| TranslationError::ConfigError(format!("API地址无效: {}", e)))?;

        // 允许配置直接给出 /translate 端点，也允许只给服务根地址
        let (translate_url, languages_url) = if base.path().ends_with("/translate") {
            let mut languages = base.clone();
            languages.set_path(&base.path().replace("/translate", "/languages"));
            (base, languages)
        } else {
            let translate = base
                .join("translate")
                .map_err(|e| TranslationError::ConfigError(format!("API地址无效: {}", e)))?;
            let languages = base
                .join("languages")
                .map_err(|e| TranslationError::ConfigError(format!("API地址无效: {}", e)))?;
            (translate, languages)
        };

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TranslationError::InternalError(format!("HTTP客户端创建失败: {}", e)))?;

        Ok(Self {
            http,
            translate_url,
            languages_url,
            probe_timeout: config.probe_timeout(),
            probe_cache: Mutex::new(None),
            probe_cache_ttl: constants::PROBE_CACHE_TTL,
        })
    }

    /// 发起一次翻译请求，返回结构化错误供上层降级处理
    async fn translate_raw(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        format: &str,
    ) -> TranslationResult<String> {
        let request = TranslateRequest {
            q: text,
            source: source_lang,
            target: target_lang,
            format,
        };

        let response = self
            .http
            .post(self.translate_url.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslationError::ServiceError(format!(
                "翻译服务返回 {}",
                response.status()
            )));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(format!("响应解析失败: {}", e)))?;

        Ok(body.translated_text)
    }

    /// 统一的降级包装：失败时记录日志并回退到原文
    async fn translate_or_fallback(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        format: &str,
    ) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        if !self.is_available().await {
            tracing::debug!("翻译服务不可用，回退到原文");
            return text.to_string();
        }

        match self.translate_raw(text, source_lang, target_lang, format).await {
            Ok(translated) if !translated.is_empty() => translated,
            Ok(_) => {
                tracing::debug!("翻译服务返回空结果，回退到原文");
                text.to_string()
            }
            Err(e) => {
                tracing::warn!("翻译请求失败，回退到原文: {}", e);
                text.to_string()
            }
        }
    }

    async fn probe(&self) -> bool {
        let probe = self.http.get(self.languages_url.clone()).send();

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(response)) => response.status().is_success(),
            Ok(Err(e)) => {
                tracing::debug!("可用性探测失败: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!("可用性探测超时 ({:?})", self.probe_timeout);
                false
            }
        }
    }
}

impl TranslateProvider for LibreClient {
    async fn is_available(&self) -> bool {
        {
            let cache = self.probe_cache.lock().unwrap();
            if let Some((at, available)) = *cache {
                if at.elapsed() < self.probe_cache_ttl {
                    return available;
                }
            }
        }

        let available = self.probe().await;
        *self.probe_cache.lock().unwrap() = Some((Instant::now(), available));
        available
    }

    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        self.translate_or_fallback(text, source_lang, target_lang, "text")
            .await
    }

    async fn translate_html(&self, html: &str, source_lang: &str, target_lang: &str) -> String {
        self.translate_or_fallback(html, source_lang, target_lang, "html")
            .await
    }
}
