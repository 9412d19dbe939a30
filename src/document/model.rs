//! 富文本文档的内存模型
//!
//! 文档 → 块（段落 / 表格）→ 段落 → 文本片段（Run）。
//! 一个 Run 只有两样东西：文本和样式句柄。样式句柄对上层完全不透明，
//! 重写文本时原样带过，从不解析、不重建。

/// Run 的样式句柄
///
/// 从文件加载的 Run 持有其原始的 `w:rPr` 片段；内存中新建的 Run 没有样式。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleHandle(Option<String>);

impl StyleHandle {
    /// 无样式
    pub fn none() -> Self {
        Self(None)
    }

    /// 用一段原始的 run 属性 XML（`<w:rPr>...</w:rPr>`）构造
    pub fn from_properties_xml(xml: impl Into<String>) -> Self {
        Self(Some(xml.into()))
    }

    pub(crate) fn properties_xml(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// 同一样式下的一段连续文本
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    text: String,
    style: StyleHandle,
    /// 在源文件中的位置（内存新建的 Run 为 None）
    pub(crate) origin: Option<usize>,
}

impl Run {
    pub fn new(text: impl Into<String>, style: StyleHandle) -> Self {
        Self {
            text: text.into(),
            style,
            origin: None,
        }
    }

    pub(crate) fn sourced(text: String, style: StyleHandle, origin: usize) -> Self {
        Self {
            text,
            style,
            origin: Some(origin),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn style(&self) -> &StyleHandle {
        &self.style
    }
}

/// 段落
///
/// 不变量：所有 Run 文本拼接起来就是段落文本。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    runs: Vec<Run>,
    style_id: Option<String>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单个无样式 Run 组成的段落
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::from_runs(vec![Run::new(text, StyleHandle::none())])
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        Self {
            runs,
            style_id: None,
        }
    }

    /// 设置段落样式（如 `Title`、`Heading1`）
    pub fn styled(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// 只能改 Run 的内容，不能增删 Run
    pub fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    pub fn style_id(&self) -> Option<&str> {
        self.style_id.as_deref()
    }

    pub(crate) fn set_style_id(&mut self, style_id: String) {
        self.style_id = Some(style_id);
    }

    pub(crate) fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(Run::text).collect()
    }

    pub fn is_heading(&self) -> bool {
        self.style_id()
            .map_or(false, |id| id == "Title" || id.starts_with("Heading"))
    }
}

/// 表格单元格
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    paragraphs: Vec<Paragraph>,
}

impl TableCell {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self { paragraphs }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn paragraphs_mut(&mut self) -> &mut [Paragraph] {
        &mut self.paragraphs
    }

    pub(crate) fn push_paragraph(&mut self, paragraph: Paragraph) {
        self.paragraphs.push(paragraph);
    }

    /// 各段落文本以换行连接
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[TableCell] {
        &self.cells
    }

    pub(crate) fn push_cell(&mut self, cell: TableCell) {
        self.cells.push(cell);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<TableRow>,
}

impl Table {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub(crate) fn push_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    /// 按行优先顺序遍历所有单元格
    pub fn cells(&self) -> impl Iterator<Item = &TableCell> {
        self.rows.iter().flat_map(|row| row.cells.iter())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut TableCell> {
        self.rows.iter_mut().flat_map(|row| row.cells.iter_mut())
    }
}

/// 文档正文中的一个块
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}
