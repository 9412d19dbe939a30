/// 文本生成服务客户端
///
/// 封装与 Gemini `generateContent` 接口之间的 HTTP 往返。
/// 这里只负责"发出去、收回来"，状态码的含义由指令服务判断。
use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ServiceError;

/// 一次 HTTP 往返的原始结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 发送请求的能力
///
/// 只有超时和网络层失败以 `Err` 返回（`ServiceError::Timeout` /
/// `ServiceError::Transport`），任何 HTTP 状态码都以 `Ok` 返回。
pub trait GenerationTransport: Send + Sync {
    fn post(&self, payload: &Value) -> impl Future<Output = Result<TransportResponse, ServiceError>> + Send;

    /// 是否具备发请求的条件（例如已配置密钥）
    fn is_ready(&self) -> bool {
        true
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    ///
    /// 密钥在这里注入，之后只出现在请求头中，不会进入日志。
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.gemini_api_base_url.trim_end_matches('/'),
            config.gemini_model
        );

        Ok(Self {
            http,
            endpoint,
            api_key: config.gemini_api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GenerationTransport for GeminiClient {
    async fn post(&self, payload: &Value) -> Result<TransportResponse, ServiceError> {
        debug!("POST {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        debug!("响应状态: {}, 长度: {} 字节", status, body.len());

        Ok(TransportResponse { status, body })
    }

    fn is_ready(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout
    } else {
        // 不带 URL，避免把端点参数写进日志
        ServiceError::Transport(err.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_built_from_config() {
        let config = Config {
            gemini_api_base_url: "https://example.test/v1beta/".to_string(),
            gemini_model: "gemini-test".to_string(),
            ..Default::default()
        };
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_client_without_key_is_not_ready() {
        let client = GeminiClient::new(&Config::default()).unwrap();
        assert!(!client.is_ready());

        let config = Config {
            gemini_api_key: "k".to_string(),
            ..Default::default()
        };
        assert!(GeminiClient::new(&config).unwrap().is_ready());
    }

    #[test]
    fn test_success_range() {
        assert!(TransportResponse::new(200, "{}").is_success());
        assert!(!TransportResponse::new(429, "").is_success());
        assert!(!TransportResponse::new(503, "").is_success());
    }

    /// 需要真实密钥：GEMINI_API_KEY=... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_round_trip() {
        let _ = tracing_subscriber::fmt::try_init();
        let config = Config::from_env().unwrap();
        let client = GeminiClient::new(&config).unwrap();

        let payload = serde_json::json!({
            "contents": [{"parts": [{"text": "Reply with the word OK."}]}]
        });
        let response = client.post(&payload).await.unwrap();
        println!("status={} body={}", response.status, response.body);
        assert!(response.is_success());
    }
}
