use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有这里的错误会终止一次合并请求；服务调用失败（`ServiceError`）
/// 在生成器内部被吸收并降级为兜底处理，不会出现在这里。
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入文件无法读取
    #[error("输入文件错误: {0}")]
    Input(#[from] InputReadError),
    /// 替换后的文档无法写出
    #[error("文档编辑错误: {0}")]
    Apply(#[from] ApplyError),
    /// 兜底文档无法生成
    #[error("兜底处理错误: {0}")]
    Fallback(#[from] FallbackError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 文档容器（DOCX）读写错误
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("文件读写失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("DOCX 压缩包损坏: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML 解析失败: {0}")]
    Xml(String),
    #[error("文档缺少部件: {0}")]
    MissingPart(String),
}

/// 输入文件读取错误
#[derive(Debug, Error)]
pub enum InputReadError {
    #[error("文件不存在: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("不支持的文件类型 '{extension}': {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("无法读取 DOCX 文件 {}: {source}", path.display())]
    Docx {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("无法读取 PDF 文件 {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },
    #[error("文件内容为空，无法读取: {}", path.display())]
    Empty { path: PathBuf },
}

/// 文本生成服务调用错误
///
/// 全部为非致命错误：可重试的错误在重试上限内重试，其余直接视为"无结果"。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("未配置 API 密钥")]
    MissingApiKey,
    #[error("请求频率限制 (HTTP {status})")]
    RateLimited { status: u16 },
    #[error("服务端错误 (HTTP {status})")]
    Server { status: u16 },
    #[error("客户端请求错误 (HTTP {status}): {details}")]
    Client { status: u16, details: String },
    #[error("请求超时")]
    Timeout,
    #[error("网络传输失败: {0}")]
    Transport(String),
    #[error("返回结果中没有候选内容: {0}")]
    NoCandidates(String),
    #[error("返回内容无法解析: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// 是否值得再试一次
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ServiceError::MissingApiKey | ServiceError::NoCandidates(_)
        )
    }
}

/// 把替换指令写入文档时的错误
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("没有可用的替换指令")]
    EmptyInstructions,
    #[error("无法打开基础文档: {0}")]
    Load(#[source] DocumentError),
    #[error("无法保存输出文档: {0}")]
    Save(#[source] DocumentError),
}

/// 兜底文档生成错误
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("无法保存兜底文档: {0}")]
    Save(#[source] DocumentError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("配置文件解析失败 {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::RateLimited { status: 429 }.is_retryable());
        assert!(ServiceError::Server { status: 503 }.is_retryable());
        assert!(ServiceError::Timeout.is_retryable());
        assert!(ServiceError::MalformedResponse("x".into()).is_retryable());
        assert!(!ServiceError::NoCandidates("blocked".into()).is_retryable());
        assert!(!ServiceError::MissingApiKey.is_retryable());
    }

    #[test]
    fn test_app_error_wraps_input_error() {
        let err: AppError = InputReadError::Empty {
            path: PathBuf::from("base.docx"),
        }
        .into();
        assert!(err.to_string().contains("base.docx"));
    }
}
