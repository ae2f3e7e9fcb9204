//! 统一错误处理
//!
//! 提供结构化错误类型和错误分类机制

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 持久化错误
    #[error("持久化错误: {0}")]
    PersistenceError(String),

    /// 翻译服务错误
    #[error("翻译服务错误: {0}")]
    ServiceError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ServiceError(_) => true,
            TranslationError::PersistenceError(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::PersistenceError(_) => ErrorSeverity::Warning,
            TranslationError::ServiceError(_) => ErrorSeverity::Error,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::PersistenceError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("请求超时: {}", error))
        } else {
            TranslationError::NetworkError(format!("请求失败: {}", error))
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;
