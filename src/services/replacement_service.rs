//! 文档级替换 - 业务能力层
//!
//! 把一组替换指令逐条应用到整份文档（正文段落 + 表格单元格）。

use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::ApplyError;
use crate::models::InstructionSet;
use crate::services::normalizer::{normalize, normalized_contains};
use crate::services::run_rewriter::replace_in_paragraph;
use crate::utils::logging::truncate_text;

/// 把指令集应用到文档
///
/// 匹配规则：
/// - 正文段落：归一化后的 `old_text` 出现在归一化后的段落文本中即计一次变更
///   （即使随后逐字匹配失败、段落实际未改动）。
/// - 表格：先用归一化后的单元格文本粗筛，再要求单元格内的段落逐字包含
///   `old_text`，满足时才改写并计数。
///
/// 一条指令会作用于所有匹配的位置，而不仅是第一个。
///
/// # 返回
/// 变更计数
pub fn apply_instructions(doc: &mut Document, instructions: &InstructionSet) -> Result<usize, ApplyError> {
    if instructions.is_empty() {
        warn!("⚠️ 没有找到替换指令");
        return Err(ApplyError::EmptyInstructions);
    }

    let mut changes = 0;

    for instruction in instructions {
        if !instruction.is_applicable() {
            debug!("跳过不完整的指令: {:?}", instruction);
            continue;
        }

        let old_text = instruction.old_text.as_str();
        let new_text = instruction.new_text.as_str();
        let normalized_old = normalize(old_text);
        info!("🔁 替换: '{}'", truncate_text(&normalized_old, 40));

        for paragraph in doc.paragraphs_mut() {
            if normalize(&paragraph.text()).contains(&normalized_old) {
                replace_in_paragraph(paragraph, old_text, new_text);
                changes += 1;
            }
        }

        for table in doc.tables_mut() {
            for cell in table.cells_mut() {
                if !normalized_contains(&cell.text(), old_text) {
                    continue;
                }
                for paragraph in cell.paragraphs_mut() {
                    if paragraph.text().contains(old_text) {
                        replace_in_paragraph(paragraph, old_text, new_text);
                        changes += 1;
                    }
                }
            }
        }
    }

    Ok(changes)
}

/// 打开基础文档、应用指令并保存到输出路径
///
/// # 返回
/// 变更计数；0 次变更也是成功
pub fn edit_document(
    base_path: &Path,
    instructions: &InstructionSet,
    output_path: &Path,
) -> Result<usize, ApplyError> {
    info!("📝 开始编辑 Word 文档...");
    if instructions.is_empty() {
        warn!("⚠️ 没有找到替换指令");
        return Err(ApplyError::EmptyInstructions);
    }

    let mut doc = Document::open(base_path).map_err(ApplyError::Load)?;
    let changes = apply_instructions(&mut doc, instructions)?;
    doc.save(output_path).map_err(ApplyError::Save)?;

    info!(
        "✓ 已生成更新后的文档: '{}'，共 {} 处变更",
        output_path.display(),
        changes
    );
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Paragraph, Run, StyleHandle, Table, TableCell, TableRow};
    use crate::models::ReplacementInstruction;

    fn doc_with(blocks: Vec<Block>) -> Document {
        let mut doc = Document::blank().unwrap();
        for block in blocks {
            doc.push_block(block);
        }
        doc
    }

    fn set(pairs: &[(&str, &str)]) -> InstructionSet {
        InstructionSet::new(
            pairs
                .iter()
                .map(|(old, new)| ReplacementInstruction::new(*old, *new))
                .collect(),
        )
    }

    fn cell(texts: &[&str]) -> TableCell {
        TableCell::new(texts.iter().map(|text| Paragraph::with_text(*text)).collect())
    }

    #[test]
    fn test_freight_scenario() {
        let mut doc = doc_with(vec![Block::Paragraph(Paragraph::from_runs(vec![
            Run::new("Freight: ", StyleHandle::from_properties_xml("<w:rPr><w:b/></w:rPr>")),
            Run::new("USD 10,000 per day", StyleHandle::none()),
        ]))]);

        let changes = apply_instructions(&mut doc, &set(&[("USD 10,000 per day", "USD 12,500 per day")])).unwrap();

        assert_eq!(changes, 1);
        let paragraph = doc.paragraphs().next().unwrap();
        assert_eq!(paragraph.text(), "Freight: USD 12,500 per day");
        assert_eq!(paragraph.runs().len(), 2);
    }

    #[test]
    fn test_every_matching_paragraph_is_rewritten() {
        let mut doc = doc_with(vec![
            Block::Paragraph(Paragraph::with_text("Charterers: ACME Trading")),
            Block::Paragraph(Paragraph::with_text("Owners: Blue Seas")),
            Block::Paragraph(Paragraph::with_text("Notices to ACME Trading")),
        ]);

        let changes = apply_instructions(&mut doc, &set(&[("ACME Trading", "Zenith Commodities")])).unwrap();

        assert_eq!(changes, 2);
        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(
            texts,
            vec!["Charterers: Zenith Commodities", "Owners: Blue Seas", "Notices to Zenith Commodities"]
        );
    }

    #[test]
    fn test_body_counts_normalized_match_even_without_verbatim_hit() {
        let mut doc = doc_with(vec![Block::Paragraph(Paragraph::with_text("Freight: USD 10,000\nper day"))]);

        let changes = apply_instructions(&mut doc, &set(&[("USD 10,000 per day", "USD 12,500 per day")])).unwrap();

        assert_eq!(changes, 1);
        assert_eq!(doc.paragraphs().next().unwrap().text(), "Freight: USD 10,000\nper day");
    }

    #[test]
    fn test_table_cells_require_verbatim_paragraph_match() {
        let table = Table::new(vec![TableRow::new(vec![
            cell(&["Demurrage", "USD 20,000 pdpr"]),
            cell(&["USD 20,000", "pdpr"]),
        ])]);
        let mut doc = doc_with(vec![Block::Table(table)]);

        let changes = apply_instructions(&mut doc, &set(&[("USD 20,000 pdpr", "USD 25,000 pdpr")])).unwrap();

        // 第二个单元格粗筛命中，但没有任何段落逐字包含，不计数
        assert_eq!(changes, 1);
        let cells: Vec<String> = doc.tables().next().unwrap().cells().map(TableCell::text).collect();
        assert_eq!(cells, vec!["Demurrage\nUSD 25,000 pdpr", "USD 20,000\npdpr"]);
    }

    #[test]
    fn test_incomplete_instructions_are_skipped() {
        let mut doc = doc_with(vec![Block::Paragraph(Paragraph::with_text("Laycan 1-5 May"))]);

        let changes = apply_instructions(&mut doc, &set(&[("Laycan 1-5 May", ""), ("", "Laycan 10-15 June")])).unwrap();

        assert_eq!(changes, 0);
        assert_eq!(doc.paragraphs().next().unwrap().text(), "Laycan 1-5 May");
    }

    #[test]
    fn test_unmatched_instruction_reports_zero() {
        let mut doc = doc_with(vec![Block::Paragraph(Paragraph::with_text("Laycan 1-5 May"))]);
        let changes = apply_instructions(&mut doc, &set(&[("Ice clause", "Ice clause deleted")])).unwrap();
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_empty_instruction_set_fails() {
        let mut doc = Document::blank().unwrap();
        assert!(matches!(
            apply_instructions(&mut doc, &InstructionSet::default()),
            Err(ApplyError::EmptyInstructions)
        ));
    }

    #[test]
    fn test_edit_document_reports_missing_base() {
        let dir = tempfile::tempdir().unwrap();
        let result = edit_document(
            &dir.path().join("missing.docx"),
            &set(&[("a", "b")]),
            &dir.path().join("out.docx"),
        );
        assert!(matches!(result, Err(ApplyError::Load(_))));
    }
}
