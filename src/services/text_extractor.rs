//! 输入文本提取
//!
//! 按扩展名分派：`.docx` 走文档模型，`.pdf` 走 unpdf。

use std::path::Path;

use tracing::{debug, info};

use crate::document::Document;
use crate::error::InputReadError;

/// 读取文件的纯文本
///
/// # 参数
/// - `path`: `.docx` 或 `.pdf` 文件路径（扩展名不区分大小写）
///
/// # 返回
/// 每段一行的文本；DOCX 包含表格单元格中的段落
pub fn extract_text(path: &Path) -> Result<String, InputReadError> {
    if !path.is_file() {
        return Err(InputReadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = match extension.as_str() {
        "docx" => Document::open(path)
            .map(|doc| doc.plain_text())
            .map_err(|source| InputReadError::Docx {
                path: path.to_path_buf(),
                source,
            })?,
        "pdf" => unpdf::extract_text(path).map_err(|e| InputReadError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        _ => {
            return Err(InputReadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            })
        }
    };

    info!(
        "📖 已读取 {} ({} 字符)",
        path.display(),
        text.chars().count()
    );
    debug!("前 80 字符: {}", crate::utils::logging::truncate_text(&text, 80));
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Paragraph, Table, TableCell, TableRow};

    #[test]
    fn test_docx_text_includes_table_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.DOCX");

        let mut doc = Document::blank().unwrap();
        doc.add_paragraph("Vessel: MV Example");
        doc.push_block(Block::Table(Table::new(vec![TableRow::new(vec![
            TableCell::new(vec![Paragraph::with_text("Freight")]),
            TableCell::new(vec![Paragraph::with_text("USD 10,000 per day")]),
        ])])));
        doc.save(&path).unwrap();

        let text = extract_text(&path).unwrap();
        assert_eq!(text, "Vessel: MV Example\nFreight\nUSD 10,000 per day");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.docx");
        assert!(matches!(extract_text(&path), Err(InputReadError::NotFound { .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recap.txt");
        std::fs::write(&path, "Freight USD 12,500").unwrap();

        match extract_text(&path) {
            Err(InputReadError::UnsupportedFormat { extension, .. }) => assert_eq!(extension, "txt"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_docx_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(extract_text(&path), Err(InputReadError::Docx { .. })));
    }

    #[test]
    fn test_invalid_pdf_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-garbage").unwrap();
        assert!(matches!(extract_text(&path), Err(InputReadError::Pdf { .. })));
    }
}
