//! 业务能力层
//!
//! 每个模块只提供一种能力，不关心调用顺序：
//! - `normalizer` / `run_rewriter`：文本归一化与段落内 Run 改写
//! - `replacement_service`：把指令集应用到整份文档
//! - `instruction_service` / `retry_policy`：调用文本生成服务得到指令
//! - `fallback_composer`：拿不到指令时的兜底文档
//! - `text_extractor`：读取输入文件的纯文本

pub mod fallback_composer;
pub mod instruction_service;
pub mod normalizer;
pub mod replacement_service;
pub mod retry_policy;
pub mod run_rewriter;
pub mod text_extractor;

pub use instruction_service::InstructionGenerator;
pub use retry_policy::{RetryPolicy, Sleeper, TokioSleeper};
