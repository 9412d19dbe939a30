//! 兜底文档生成 - 业务能力层
//!
//! 拿不到替换指令时，把两份文本原样拼进一份新文档，保证调用方总有产出。

use std::path::Path;

use tracing::{error, info};

use crate::document::Document;
use crate::error::{DocumentError, FallbackError};
use crate::models::{InstructionSet, ReplacementInstruction};

const TITLE: &str = "Generated Charter Party";
const BASE_HEADING: &str = "Base Charter Party Content";
const RECAP_HEADING: &str = "Recap Content";

/// 兜底模式下返回给调用方的占位指令
pub fn fallback_instructions() -> InstructionSet {
    InstructionSet::new(vec![ReplacementInstruction::new(
        "API processing failed",
        "Used fallback processing method",
    )])
}

/// 在内存中拼出兜底文档
pub fn compose(base_text: &str, recap_text: &str) -> Result<(Document, InstructionSet), DocumentError> {
    let mut doc = Document::blank()?;

    doc.add_heading(TITLE, 0);
    doc.add_paragraph("This document was generated by combining the Base CP and Recap documents.");
    doc.add_paragraph("Note: API processing failed, so this is a simple concatenation.");

    add_section(&mut doc, BASE_HEADING, base_text, "Could not read Base CP content.");
    add_section(&mut doc, RECAP_HEADING, recap_text, "Could not read Recap content.");

    Ok((doc, fallback_instructions()))
}

fn add_section(doc: &mut Document, heading: &str, text: &str, missing_note: &str) {
    doc.add_heading(heading, 1);
    if text.trim().is_empty() {
        doc.add_paragraph(missing_note);
        return;
    }
    for line in text.split('\n').filter(|line| !line.trim().is_empty()) {
        doc.add_paragraph(line);
    }
}

/// 生成兜底文档并保存
///
/// # 返回
/// 占位指令集（恰好一条）
pub fn compose_to_file(
    base_text: &str,
    recap_text: &str,
    output_path: &Path,
) -> Result<InstructionSet, FallbackError> {
    info!("🧩 使用兜底方式生成文档...");

    let result = compose(base_text, recap_text).and_then(|(doc, instructions)| {
        doc.save(output_path)?;
        Ok(instructions)
    });

    match result {
        Ok(instructions) => {
            info!("✓ 兜底文档已生成: {}", output_path.display());
            Ok(instructions)
        }
        Err(e) => {
            error!("❌ 兜底处理也失败了: {}", e);
            Err(FallbackError::Save(e))
        }
    }
}
