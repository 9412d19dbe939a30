//! 替换指令生成服务 - 业务能力层
//!
//! 只负责"从两份文本得到一组替换指令"，不接触任何文档。
//!
//! ## 流程
//! 1. 两份输入各自截断到字符上限（超出部分直接丢弃，只记日志）
//! 2. 构造带 JSON schema 约束的请求，发送给文本生成服务
//! 3. 按失败类型等待并重试，直到成功或用完尝试次数
//!
//! 拿不到可用结果时返回 `None`，由调用方降级到兜底处理，这是正常分支而不是异常。

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::clients::{GeminiClient, GenerationTransport, TransportResponse};
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::InstructionSet;
use crate::services::retry_policy::{RetryPolicy, Sleeper, TokioSleeper};
use crate::utils::logging::truncate_text;

const SYSTEM_PROMPT: &str = "You are an expert maritime paralegal. Compare the 'Base CP' and 'Recap' documents \
and create a JSON object listing text from Base CP that should be replaced \
with updated text from Recap. Preserve exact multi-line formatting in 'old_text'.";

const BASE_HEADER: &str = "--- BASE CHARTER PARTY TEXT ---";
const RECAP_HEADER: &str = "--- RECAP DOCUMENT TEXT ---";

/// 替换指令生成器
///
/// 职责：
/// - 截断输入、构造请求
/// - 区分失败类型并按策略重试
/// - 解析服务返回的结构化 JSON
pub struct InstructionGenerator<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
    max_input_chars: usize,
}

impl InstructionGenerator<GeminiClient, TokioSleeper> {
    /// 按配置创建连接 Gemini 的生成器
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Ok(Self::new(
            GeminiClient::new(config)?,
            TokioSleeper,
            RetryPolicy::from_config(config),
            config.max_input_chars,
        ))
    }
}

impl<T: GenerationTransport, S: Sleeper> InstructionGenerator<T, S> {
    pub fn new(transport: T, sleeper: S, policy: RetryPolicy, max_input_chars: usize) -> Self {
        Self {
            transport,
            sleeper,
            policy,
            max_input_chars,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// 生成替换指令
    ///
    /// # 返回
    /// 成功解析出指令集时返回 `Some`（可能为空，由应用阶段判定失败），否则 `None`
    pub async fn generate(&self, base_text: &str, recap_text: &str) -> Option<InstructionSet> {
        if !self.transport.is_ready() {
            error!("❌ {}", ServiceError::MissingApiKey);
            return None;
        }

        info!("🔗 正在连接文本生成服务...");
        let base_text = truncate_input("Base CP", base_text, self.max_input_chars);
        let recap_text = truncate_input("Recap", recap_text, self.max_input_chars);
        let payload = build_payload(&base_text, &recap_text);

        let max_attempts = self.policy.max_attempts;
        for attempt in 0..max_attempts {
            info!("📤 发送 API 请求 (第 {}/{} 次)...", attempt + 1, max_attempts);

            let err = match self.request_once(&payload).await {
                Ok(instructions) => {
                    if instructions.is_empty() {
                        warn!("⚠️ API 返回的替换列表为空");
                    } else {
                        info!("✓ 成功解析 {} 条替换指令", instructions.len());
                    }
                    return Some(instructions);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!("❌ API 未返回可用结果: {}", err);
                return None;
            }
            log_failure(&err);

            if self.policy.has_next(attempt) {
                let delay = self.policy.delay_after(&err, attempt);
                info!("⏳ {:.0} 秒后重试...", delay.as_secs_f64());
                self.sleeper.sleep(delay).await;
            } else {
                error!("❌ API 在 {} 次尝试后仍然失败", max_attempts);
            }
        }

        None
    }

    async fn request_once(&self, payload: &Value) -> Result<InstructionSet, ServiceError> {
        let response = self.transport.post(payload).await?;
        check_status(&response)?;
        debug!("API 响应接收成功");
        parse_response(&response.body)
    }
}

/// 构造 `generateContent` 请求体
pub fn build_payload(base_text: &str, recap_text: &str) -> Value {
    let combined_text = format!(
        "{}\n{}\n\n{}\n{}",
        BASE_HEADER, base_text, RECAP_HEADER, recap_text
    );

    json!({
        "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
        "contents": [{"parts": [{"text": combined_text}]}],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "replacements": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "old_text": {"type": "STRING"},
                        "new_text": {"type": "STRING"}
                    },
                    "required": ["old_text", "new_text"]
                }
            }
        }
    })
}

/// 超过上限的输入只保留前 `max_chars` 个字符
fn truncate_input<'a>(label: &str, text: &'a str, max_chars: usize) -> Cow<'a, str> {
    let total = text.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(text);
    }
    warn!(
        "⚠️ {} 文本过长 ({} 字符)，截断至 {} 字符",
        label, total, max_chars
    );
    Cow::Owned(text.chars().take(max_chars).collect())
}

fn check_status(response: &TransportResponse) -> Result<(), ServiceError> {
    match response.status {
        _ if response.is_success() => Ok(()),
        429 => Err(ServiceError::RateLimited {
            status: response.status,
        }),
        status if status >= 500 => Err(ServiceError::Server { status }),
        status => Err(ServiceError::Client {
            status,
            details: error_details(&response.body),
        }),
    }
}

/// 尽量从错误响应里取出 `error.message`
fn error_details(body: &str) -> String {
    serde_json::from_str::<GenerateContentResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| truncate_text(body, 200))
}

fn log_failure(err: &ServiceError) {
    match err {
        ServiceError::RateLimited { .. } => warn!("⚠️ 触发频率限制，等待后重试..."),
        ServiceError::Server { status } => warn!("⚠️ 服务端错误 (HTTP {})，等待后重试...", status),
        ServiceError::Client { status, details } => {
            error!("HTTP 错误 {}，详情: {}", status, details)
        }
        ServiceError::Timeout => error!("请求超时"),
        other => error!("请求失败: {}", other),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// 解析服务响应体
///
/// - 没有候选：不重试，直接视为无结果
/// - 候选里没有文本或文本不是预期的 JSON：可重试
/// - 指令列表为空：照常返回，交给应用阶段处理
fn parse_response(body: &str) -> Result<InstructionSet, ServiceError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

    let Some(candidate) = response.candidates.first() else {
        let reason = response
            .error
            .and_then(|error| error.message)
            .or_else(|| {
                response
                    .prompt_feedback
                    .and_then(|feedback| feedback.block_reason)
            })
            .unwrap_or_else(|| "API returned no candidates.".to_string());
        return Err(ServiceError::NoCandidates(reason));
    };

    let text = candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.as_deref())
        .ok_or_else(|| ServiceError::MalformedResponse("候选内容中没有文本".to_string()))?;

    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ServiceError::MalformedResponse(e.to_string()))
}

/// 去掉可能包裹在外面的 Markdown 代码块
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // 跳过 ```json 这样的语言标记
    match inner.find('\n') {
        Some(newline) if !inner[..newline].trim_start().starts_with('{') => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}
