//! 单次合并处理器 - 编排层
//!
//! ## 职责
//!
//! 处理一次 Base CP + Recap 的合并请求，只做调度，不做具体业务判断。
//!
//! ## 状态流转
//!
//! ```text
//! ReadingInputs → GeneratingInstructions ─┬→ Applying ────┬→ Done
//!                                         └→ FallingBack ─┘
//!        (任一阶段出错) ─────────────────────────────────────→ Failed
//! ```
//!
//! 生成服务没有结果不算失败，会转入兜底。读不到输入、返回的替换列表为空、
//! 写不出文档时，整个请求失败。

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::clients::{GeminiClient, GenerationTransport};
use crate::config::Config;
use crate::error::{AppResult, InputReadError, ServiceError};
use crate::models::InstructionSet;
use crate::services::fallback_composer;
use crate::services::replacement_service::edit_document;
use crate::services::text_extractor::extract_text;
use crate::services::{InstructionGenerator, Sleeper, TokioSleeper};

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    ReadingInputs,
    GeneratingInstructions,
    Applying,
    FallingBack,
    Done,
    Failed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeState::ReadingInputs => "读取输入",
            MergeState::GeneratingInstructions => "生成指令",
            MergeState::Applying => "应用替换",
            MergeState::FallingBack => "兜底处理",
            MergeState::Done => "完成",
            MergeState::Failed => "失败",
        };
        f.write_str(name)
    }
}

/// 产出文档的方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MergeMode {
    /// 在 Base CP 上原位替换
    Applied { changes: usize },
    /// 两份文本拼接成新文档
    Fallback,
}

impl MergeMode {
    pub fn label(&self) -> &'static str {
        match self {
            MergeMode::Applied { .. } => "原位替换",
            MergeMode::Fallback => "兜底拼接",
        }
    }
}

/// 一次成功处理的结果
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub mode: MergeMode,
    pub instructions: InstructionSet,
    pub output_path: PathBuf,
    /// 经历过的阶段，按顺序
    pub states: Vec<MergeState>,
}

impl MergeOutcome {
    /// 实际写入文档的变更数，兜底模式为 0
    pub fn applied_changes(&self) -> usize {
        match self.mode {
            MergeMode::Applied { changes } => changes,
            MergeMode::Fallback => 0,
        }
    }
}

/// 状态记录，每次流转都写日志
struct StateTrail {
    states: Vec<MergeState>,
}

impl StateTrail {
    fn start() -> Self {
        info!("🔄 状态: {}", MergeState::ReadingInputs);
        Self {
            states: vec![MergeState::ReadingInputs],
        }
    }

    fn current(&self) -> MergeState {
        self.states
            .last()
            .copied()
            .unwrap_or(MergeState::ReadingInputs)
    }

    fn advance(&mut self, next: MergeState) {
        info!("🔄 状态: {} → {}", self.current(), next);
        self.states.push(next);
    }
}

/// 处理结束时删除输入文件
///
/// 不管成功还是出错都会执行；删除失败只记日志。
pub struct InputCleanup {
    paths: Vec<PathBuf>,
}

impl InputCleanup {
    pub fn new(paths: &[&Path]) -> Self {
        Self {
            paths: paths.iter().map(|path| path.to_path_buf()).collect(),
        }
    }
}

impl Drop for InputCleanup {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => info!("🧹 已删除输入文件: {}", path.display()),
                Err(e) => warn!("⚠️ 无法删除输入文件 {}: {}", path.display(), e),
            }
        }
    }
}

/// 合并处理器
pub struct MergeProcessor<T, S = TokioSleeper> {
    generator: InstructionGenerator<T, S>,
    cleanup_inputs: bool,
}

impl MergeProcessor<GeminiClient, TokioSleeper> {
    /// 按配置创建，连接 Gemini
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        Ok(Self::with_generator(
            InstructionGenerator::from_config(config)?,
            config.cleanup_inputs,
        ))
    }
}

impl<T: GenerationTransport, S: Sleeper> MergeProcessor<T, S> {
    pub fn with_generator(generator: InstructionGenerator<T, S>, cleanup_inputs: bool) -> Self {
        Self {
            generator,
            cleanup_inputs,
        }
    }

    pub fn generator(&self) -> &InstructionGenerator<T, S> {
        &self.generator
    }

    /// 处理一次合并请求
    ///
    /// # 参数
    /// - `base_path`: Base CP（`.docx` 或 `.pdf`；原位替换只支持 `.docx`）
    /// - `recap_path`: Recap（`.docx` 或 `.pdf`）
    /// - `output_path`: 输出 `.docx` 路径
    ///
    /// # 返回
    /// 处理方式和使用的指令集；0 次变更也算成功
    pub async fn process(
        &self,
        base_path: &Path,
        recap_path: &Path,
        output_path: &Path,
    ) -> AppResult<MergeOutcome> {
        let _cleanup = self
            .cleanup_inputs
            .then(|| InputCleanup::new(&[base_path, recap_path]));

        let mut trail = StateTrail::start();
        let result = self.run(base_path, recap_path, output_path, &mut trail).await;

        match result {
            Ok((mode, instructions)) => {
                trail.advance(MergeState::Done);
                Ok(MergeOutcome {
                    mode,
                    instructions,
                    output_path: output_path.to_path_buf(),
                    states: trail.states,
                })
            }
            Err(e) => {
                error!("❌ 处理失败: {}", e);
                trail.advance(MergeState::Failed);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        base_path: &Path,
        recap_path: &Path,
        output_path: &Path,
        trail: &mut StateTrail,
    ) -> AppResult<(MergeMode, InstructionSet)> {
        let base_text = read_input(base_path)?;
        let recap_text = read_input(recap_path)?;

        trail.advance(MergeState::GeneratingInstructions);
        match self.generator.generate(&base_text, &recap_text).await {
            Some(instructions) => {
                info!("✓ 已获得 {} 条替换指令", instructions.len());
                trail.advance(MergeState::Applying);
                let changes = edit_document(base_path, &instructions, output_path)?;
                Ok((MergeMode::Applied { changes }, instructions))
            }
            None => {
                warn!("⚠️ 未能获得替换指令，改用兜底方式");
                trail.advance(MergeState::FallingBack);
                let instructions =
                    fallback_composer::compose_to_file(&base_text, &recap_text, output_path)?;
                Ok((MergeMode::Fallback, instructions))
            }
        }
    }
}

/// 读取并检查非空
fn read_input(path: &Path) -> Result<String, InputReadError> {
    let text = extract_text(path)?;
    if text.trim().is_empty() {
        return Err(InputReadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

/// 便捷入口：按配置创建处理器并处理一次
pub async fn process_documents(
    config: &Config,
    base_path: &Path,
    recap_path: &Path,
    output_path: &Path,
) -> anyhow::Result<MergeOutcome> {
    let processor = MergeProcessor::new(config)?;
    Ok(processor.process(base_path, recap_path, output_path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::TransportResponse;
    use crate::document::Document;
    use crate::error::{AppError, ApplyError};
    use crate::services::RetryPolicy;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 每次都返回同一响应
    struct FixedTransport {
        response: TransportResponse,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: TransportResponse::new(status, body),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GenerationTransport for FixedTransport {
        async fn post(&self, _payload: &Value) -> Result<TransportResponse, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn processor(transport: FixedTransport, cleanup: bool) -> MergeProcessor<FixedTransport, NoSleep> {
        MergeProcessor::with_generator(
            InstructionGenerator::new(transport, NoSleep, RetryPolicy::default(), 30_000),
            cleanup,
        )
    }

    fn write_docx(path: &Path, lines: &[&str]) {
        let mut doc = Document::blank().unwrap();
        for line in lines {
            doc.add_paragraph(*line);
        }
        doc.save(path).unwrap();
    }

    fn plan_body(old: &str, new: &str) -> String {
        let plan = serde_json::json!({"replacements": [{"old_text": old, "new_text": new}]});
        serde_json::json!({"candidates": [{"content": {"parts": [{"text": plan.to_string()}]}}]})
            .to_string()
    }

    #[tokio::test]
    async fn test_applied_path() {
        let dir = tempfile::tempdir().unwrap();
        let (base, recap, output) = (
            dir.path().join("base.docx"),
            dir.path().join("recap.docx"),
            dir.path().join("out.docx"),
        );
        write_docx(&base, &["Freight: USD 10,000 per day"]);
        write_docx(&recap, &["Freight revised to USD 12,500 per day"]);

        let processor = processor(
            FixedTransport::new(200, &plan_body("USD 10,000 per day", "USD 12,500 per day")),
            false,
        );
        let outcome = processor.process(&base, &recap, &output).await.unwrap();

        assert_eq!(outcome.mode, MergeMode::Applied { changes: 1 });
        assert_eq!(
            outcome.states,
            vec![
                MergeState::ReadingInputs,
                MergeState::GeneratingInstructions,
                MergeState::Applying,
                MergeState::Done
            ]
        );
        assert_eq!(
            Document::open(&output).unwrap().plain_text(),
            "Freight: USD 12,500 per day"
        );
        assert!(base.exists());
    }

    #[tokio::test]
    async fn test_empty_plan_fails_in_apply_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (base, recap, output) = (
            dir.path().join("base.docx"),
            dir.path().join("recap.docx"),
            dir.path().join("out.docx"),
        );
        write_docx(&base, &["Laycan 1-5 May"]);
        write_docx(&recap, &["Laycan 10-15 June"]);

        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": r#"{"replacements": []}"#}]}}]
        })
        .to_string();
        let processor = processor(FixedTransport::new(200, &body), false);
        let err = processor.process(&base, &recap, &output).await.unwrap_err();

        assert!(matches!(err, AppError::Apply(ApplyError::EmptyInstructions)));
        assert_eq!(processor.generator_calls(), 1);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_fallback_path() {
        let dir = tempfile::tempdir().unwrap();
        let (base, recap, output) = (
            dir.path().join("base.docx"),
            dir.path().join("recap.docx"),
            dir.path().join("out.docx"),
        );
        write_docx(&base, &["Laycan 1-5 May"]);
        write_docx(&recap, &["Laycan 10-15 June"]);

        let processor = processor(FixedTransport::new(503, ""), false);
        let outcome = processor.process(&base, &recap, &output).await.unwrap();

        assert_eq!(outcome.mode, MergeMode::Fallback);
        assert_eq!(outcome.applied_changes(), 0);
        assert_eq!(outcome.instructions, fallback_composer::fallback_instructions());
        assert_eq!(processor.generator_calls(), 3);
        assert!(outcome.states.contains(&MergeState::FallingBack));

        let text = Document::open(&output).unwrap().plain_text();
        assert!(text.starts_with("Generated Charter Party"));
        assert!(text.contains("Laycan 10-15 June"));
    }

    #[tokio::test]
    async fn test_empty_input_fails_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let (base, recap, output) = (
            dir.path().join("base.docx"),
            dir.path().join("recap.docx"),
            dir.path().join("out.docx"),
        );
        write_docx(&base, &["  "]);
        write_docx(&recap, &["Laycan 10-15 June"]);

        let processor = processor(FixedTransport::new(200, "{}"), false);
        let err = processor.process(&base, &recap, &output).await.unwrap_err();

        assert!(matches!(err, AppError::Input(InputReadError::Empty { .. })));
        assert_eq!(processor.generator_calls(), 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_inputs_even_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (base, recap, output) = (
            dir.path().join("base.docx"),
            dir.path().join("recap.txt"),
            dir.path().join("out.docx"),
        );
        write_docx(&base, &["Laycan 1-5 May"]);
        std::fs::write(&recap, "plain text").unwrap();

        let processor = processor(FixedTransport::new(200, "{}"), true);
        let err = processor.process(&base, &recap, &output).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Input(InputReadError::UnsupportedFormat { .. })
        ));
        assert!(!base.exists());
        assert!(!recap.exists());
    }

    #[test]
    fn test_outcome_serializes_mode() {
        let outcome = MergeOutcome {
            mode: MergeMode::Applied { changes: 2 },
            instructions: InstructionSet::default(),
            output_path: PathBuf::from("out.docx"),
            states: vec![MergeState::Done],
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["mode"]["mode"], "applied");
        assert_eq!(value["mode"]["changes"], 2);
    }

    impl MergeProcessor<FixedTransport, NoSleep> {
        fn generator_calls(&self) -> usize {
            self.generator().transport().calls.load(Ordering::SeqCst)
        }
    }
}
