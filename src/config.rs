use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 文本生成服务配置 ---
    pub gemini_api_key: String,
    pub gemini_api_base_url: String,
    pub gemini_model: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 最多尝试次数
    pub max_attempts: u32,
    /// 每份输入发送给服务的最大字符数，超出部分被截断
    pub max_input_chars: usize,
    // --- 重试等待 ---
    pub rate_limit_delay_secs: u64,
    pub server_error_delay_secs: u64,
    pub backoff_unit_secs: u64,
    /// 处理结束后删除两份输入文件
    pub cleanup_inputs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-1.5-pro-latest".to_string(),
            request_timeout_secs: 120,
            max_attempts: 3,
            max_input_chars: 30_000,
            rate_limit_delay_secs: 10,
            server_error_delay_secs: 5,
            backoff_unit_secs: 1,
            cleanup_inputs: false,
        }
    }
}

// 密钥不能出现在日志里
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.gemini_api_key.is_empty() {
            "<未设置>"
        } else {
            "<已隐藏>"
        };
        f.debug_struct("Config")
            .field("gemini_api_key", &key)
            .field("gemini_api_base_url", &self.gemini_api_base_url)
            .field("gemini_model", &self.gemini_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("max_input_chars", &self.max_input_chars)
            .field("rate_limit_delay_secs", &self.rate_limit_delay_secs)
            .field("server_error_delay_secs", &self.server_error_delay_secs)
            .field("backoff_unit_secs", &self.backoff_unit_secs)
            .field("cleanup_inputs", &self.cleanup_inputs)
            .finish()
    }
}

impl Config {
    /// 配置文件路径所在的环境变量
    pub const CONFIG_PATH_VAR: &'static str = "SMART_CP_CONFIG";

    /// 默认配置叠加环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载（未出现的字段取默认值）
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 程序入口使用的加载方式：
    /// `SMART_CP_CONFIG` 指向的文件（如有），再叠加环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(Self::CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            gemini_api_key: env_string("GEMINI_API_KEY").unwrap_or(self.gemini_api_key),
            gemini_api_base_url: env_string("GEMINI_API_BASE_URL")
                .unwrap_or(self.gemini_api_base_url),
            gemini_model: env_string("GEMINI_MODEL").unwrap_or(self.gemini_model),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.request_timeout_secs),
            max_attempts: env_parse("MAX_ATTEMPTS", "u32")?.unwrap_or(self.max_attempts),
            max_input_chars: env_parse("MAX_INPUT_CHARS", "usize")?
                .unwrap_or(self.max_input_chars),
            rate_limit_delay_secs: env_parse("RATE_LIMIT_DELAY_SECS", "u64")?
                .unwrap_or(self.rate_limit_delay_secs),
            server_error_delay_secs: env_parse("SERVER_ERROR_DELAY_SECS", "u64")?
                .unwrap_or(self.server_error_delay_secs),
            backoff_unit_secs: env_parse("BACKOFF_UNIT_SECS", "u64")?
                .unwrap_or(self.backoff_unit_secs),
            cleanup_inputs: env_parse("CLEANUP_INPUTS", "bool")?.unwrap_or(self.cleanup_inputs),
        })
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok()
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
