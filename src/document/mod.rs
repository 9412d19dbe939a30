//! 文档层（基础设施）
//!
//! 持有文档这一"稀缺资源"：加载、遍历块、追加段落、保存。
//! 上层只通过 [`Document`] 操作段落和 Run，不接触容器格式。

mod docx;
pub mod model;
mod template;

use std::fmt;
use std::path::Path;

use tracing::debug;

pub use model::{Block, Paragraph, Run, StyleHandle, Table, TableCell, TableRow};

use crate::error::DocumentError;
use docx::Package;

/// 一份 DOCX 文档
///
/// 一次请求独占一个实例，不跨请求共享。
pub struct Document {
    blocks: Vec<Block>,
    /// `blocks` 中来自源文件的块数，之后的都是新追加的
    sourced_blocks: usize,
    package: Package,
}

impl Document {
    /// 新建空白文档
    pub fn blank() -> Result<Self, DocumentError> {
        let (package, blocks) = Package::blank()?;
        Ok(Self::assemble(package, blocks))
    }

    /// 从文件打开
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        debug!("打开文档: {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let (package, blocks) = Package::read(bytes)?;
        Ok(Self::assemble(package, blocks))
    }

    fn assemble(package: Package, blocks: Vec<Block>) -> Self {
        Self {
            sourced_blocks: blocks.len(),
            blocks,
            package,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// 正文直属段落
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            Block::Table(_) => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            Block::Table(_) => None,
        })
    }

    /// 正文直属表格
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Paragraph(_) => None,
        })
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Paragraph(_) => None,
        })
    }

    /// 追加标题。`level` 为 0 时使用 `Title` 样式，否则 `Heading{level}`
    pub fn add_heading(&mut self, text: impl Into<String>, level: u8) {
        let style_id = match level {
            0 => "Title".to_string(),
            n => format!("Heading{}", n),
        };
        self.push_block(Block::Paragraph(Paragraph::with_text(text).styled(style_id)));
    }

    pub fn add_paragraph(&mut self, text: impl Into<String>) {
        self.push_block(Block::Paragraph(Paragraph::with_text(text)));
    }

    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// 纯文本：正文段落与表格单元格段落按文档顺序，每段一行
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(paragraph) => lines.push(paragraph.text()),
                Block::Table(table) => {
                    for cell in table.cells() {
                        lines.extend(cell.paragraphs().iter().map(Paragraph::text));
                    }
                }
            }
        }
        lines.join("\n")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        self.package.write(&self.blocks, self.sourced_blocks)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        debug!("文档已保存: {}", path.display());
        Ok(())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("blocks", &self.blocks)
            .field("sourced_blocks", &self.sourced_blocks)
            .finish_non_exhaustive()
    }
}
