//! DOCX 容器读写
//!
//! DOCX 是一个 zip 包，正文在 `word/document.xml`。正文 XML 以事件流的形式
//! 保存在内存中，保存时原样写回，只改动文本发生变化的 Run 的文本内容元素，
//! 其余部件（样式、页眉、图片……）逐字节复制。
//!
//! Run 的文本由 `w:t` 拼接而成，`w:tab` 记作 `\t`，换行类的 `w:br` 和 `w:cr`
//! 记作 `\n`。分页符、分栏符、域代码、图片等其他子元素不算文本，原样保留。

use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Cursor, Read, Write};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::model::{Block, Paragraph, Run, StyleHandle, Table, TableCell, TableRow};
use super::template;
use crate::error::DocumentError;

pub(crate) const MAIN_PART: &str = "word/document.xml";

/// 整个 zip 包
pub(crate) struct Package {
    parts: Vec<Part>,
    main: MainPart,
}

struct Part {
    name: String,
    data: Vec<u8>,
}

impl Package {
    /// 解析 DOCX 字节流，同时返回正文块
    pub(crate) fn read(bytes: &[u8]) -> Result<(Self, Vec<Block>), DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            // 不按 zip 头声明的大小预分配，损坏的文件可能声明任意大小
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            parts.push(Part { name, data });
        }

        Self::from_parts(parts)
    }

    /// 内置模板生成的空白文档
    pub(crate) fn blank() -> Result<(Self, Vec<Block>), DocumentError> {
        let parts = template::PARTS
            .iter()
            .map(|(name, content)| Part {
                name: name.to_string(),
                data: content.as_bytes().to_vec(),
            })
            .collect();
        Self::from_parts(parts)
    }

    fn from_parts(parts: Vec<Part>) -> Result<(Self, Vec<Block>), DocumentError> {
        let main_part = parts
            .iter()
            .find(|part| part.name == MAIN_PART)
            .ok_or_else(|| DocumentError::MissingPart(MAIN_PART.to_string()))?;
        let xml = std::str::from_utf8(&main_part.data).map_err(xml_error)?;
        let (main, blocks) = MainPart::parse(xml)?;
        Ok((Self { parts, main }, blocks))
    }

    /// 重新打包
    ///
    /// `sourced` 是 `blocks` 中来自源文件的前缀长度，其后的块是新追加的。
    pub(crate) fn write(&self, blocks: &[Block], sourced: usize) -> Result<Vec<u8>, DocumentError> {
        let main_xml = self.main.render(blocks, sourced)?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file(part.name.as_str(), options)?;
            if part.name == MAIN_PART {
                zip.write_all(&main_xml)?;
            } else {
                zip.write_all(&part.data)?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// 正文部件：完整事件流 + 每个 Run 在事件流中的位置
struct MainPart {
    events: Vec<Event<'static>>,
    runs: Vec<RunSlot>,
    /// 追加块的插入点（`w:sectPr` 或 `</w:body>`）
    insert_at: usize,
}

struct RunSlot {
    original: String,
    /// 每个文本内容元素（`w:t` / `w:tab` / `w:br` / `w:cr`）的首尾事件下标
    content: Vec<(usize, usize)>,
    /// `</w:r>`（或自闭合 `<w:r/>`）的下标
    end: usize,
    self_closing: bool,
}

enum Patch<'a> {
    Replace { last: usize, text: &'a str },
    Drop { last: usize },
    Insert(&'a str),
    Expand(&'a str),
}

impl MainPart {
    fn parse(xml: &str) -> Result<(Self, Vec<Block>), DocumentError> {
        let mut reader = Reader::from_str(xml);
        let mut events: Vec<Event<'static>> = Vec::new();
        let mut builder = BlockBuilder::default();
        let mut depth = 0usize;

        loop {
            let index = events.len();
            let event = reader.read_event().map_err(xml_error)?;
            match &event {
                Event::Eof => break,
                Event::Start(start) => {
                    builder.open(start, depth, index)?;
                    depth += 1;
                }
                Event::Empty(start) => {
                    builder.open(start, depth, index)?;
                    builder.close(start.name().as_ref(), depth, index, &events, true)?;
                }
                Event::End(end) => {
                    depth = depth.saturating_sub(1);
                    builder.close(end.name().as_ref(), depth, index, &events, false)?;
                }
                Event::Text(text) => builder.text(text, depth)?,
                _ => {}
            }
            events.push(event.into_owned());
        }

        let insert_at = builder
            .insert_at
            .ok_or_else(|| DocumentError::MissingPart("w:body".to_string()))?;

        Ok((
            Self {
                events,
                runs: builder.slots,
                insert_at,
            },
            builder.blocks,
        ))
    }

    fn render(&self, blocks: &[Block], sourced: usize) -> Result<Vec<u8>, DocumentError> {
        let sourced = sourced.min(blocks.len());
        let mut patches: HashMap<usize, Patch<'_>> = HashMap::new();

        for run in collect_runs(&blocks[..sourced]) {
            let Some(slot) = run.origin.and_then(|origin| self.runs.get(origin)) else {
                continue;
            };
            if run.text() == slot.original {
                continue;
            }
            match slot.content.split_first() {
                Some((&(first, last), rest)) => {
                    patches.insert(first, Patch::Replace { last, text: run.text() });
                    for &(start, end) in rest {
                        patches.insert(start, Patch::Drop { last: end });
                    }
                }
                None if slot.self_closing => {
                    patches.insert(slot.end, Patch::Expand(run.text()));
                }
                None => {
                    patches.insert(slot.end, Patch::Insert(run.text()));
                }
            }
        }

        let appended = render_blocks(&blocks[sourced..]);
        let mut writer = Writer::new(Vec::new());
        let mut index = 0;

        while index < self.events.len() {
            if index == self.insert_at && !appended.is_empty() {
                writer.get_mut().extend_from_slice(appended.as_bytes());
            }
            match patches.get(&index) {
                Some(Patch::Replace { last, text }) => {
                    write_run_content(&mut writer, text);
                    index = last + 1;
                    continue;
                }
                Some(Patch::Drop { last }) => {
                    index = last + 1;
                    continue;
                }
                Some(Patch::Insert(text)) => write_run_content(&mut writer, text),
                Some(Patch::Expand(text)) => {
                    if let Event::Empty(start) = &self.events[index] {
                        writer
                            .write_event(Event::Start(start.borrow()))
                            .map_err(xml_error)?;
                        write_run_content(&mut writer, text);
                        writer
                            .write_event(Event::End(start.to_end()))
                            .map_err(xml_error)?;
                        index += 1;
                        continue;
                    }
                }
                None => {}
            }
            writer
                .write_event(self.events[index].borrow())
                .map_err(xml_error)?;
            index += 1;
        }

        Ok(writer.into_inner())
    }
}

/// 解析过程中的嵌套状态
///
/// 只识别正文直属段落、正文直属表格的单元格段落，以及这些段落的直属 `w:r`。
/// 嵌套表格、文本框、超链接里的内容保持原样，不进入模型。
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    slots: Vec<RunSlot>,
    /// `w:body` 子元素所在深度
    body: Option<usize>,
    insert_at: Option<usize>,
    table: Option<TableCx>,
    paragraph: Option<ParagraphCx>,
    run: Option<RunCx>,
}

struct TableCx {
    depth: usize,
    table: Table,
    row: Option<TableRow>,
    cell: Option<TableCell>,
}

struct ParagraphCx {
    depth: usize,
    paragraph: Paragraph,
}

#[derive(Default)]
struct RunCx {
    depth: usize,
    text: String,
    style_start: Option<usize>,
    style: Option<(usize, usize)>,
    open_text: Option<usize>,
    /// 正在读取的 `w:tab` / `w:br` / `w:cr`，以及它代表的字符
    open_mark: Option<(usize, Option<char>)>,
    content: Vec<(usize, usize)>,
}

impl BlockBuilder {
    fn open(&mut self, start: &BytesStart<'_>, depth: usize, index: usize) -> Result<(), DocumentError> {
        let name = start.name();
        let Some(body) = self.body else {
            if name.as_ref() == b"w:body" {
                self.body = Some(depth + 1);
            }
            return Ok(());
        };

        match name.as_ref() {
            b"w:p" if self.paragraph.is_none() && self.paragraph_allowed(depth, body) => {
                self.paragraph = Some(ParagraphCx {
                    depth,
                    paragraph: Paragraph::new(),
                });
            }
            b"w:tbl" if depth == body && self.table.is_none() && self.paragraph.is_none() => {
                self.table = Some(TableCx {
                    depth,
                    table: Table::default(),
                    row: None,
                    cell: None,
                });
            }
            b"w:tr" => {
                if let Some(table) = self.table.as_mut() {
                    if depth == table.depth + 1 {
                        table.row = Some(TableRow::default());
                    }
                }
            }
            b"w:tc" => {
                if let Some(table) = self.table.as_mut() {
                    if depth == table.depth + 2 && table.row.is_some() {
                        table.cell = Some(TableCell::default());
                    }
                }
            }
            b"w:pStyle" => {
                if let Some(cx) = self.paragraph.as_mut() {
                    if depth == cx.depth + 2 {
                        if let Some(style_id) = attribute(start, b"w:val")? {
                            cx.paragraph.set_style_id(style_id);
                        }
                    }
                }
            }
            b"w:r" => {
                let direct_child = self
                    .paragraph
                    .as_ref()
                    .map_or(false, |cx| depth == cx.depth + 1);
                if direct_child && self.run.is_none() {
                    self.run = Some(RunCx {
                        depth,
                        ..Default::default()
                    });
                }
            }
            b"w:rPr" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        run.style_start = Some(index);
                    }
                }
            }
            b"w:t" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        run.open_text = Some(index);
                    }
                }
            }
            b"w:tab" | b"w:br" | b"w:cr" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        run.open_mark = Some((index, content_mark(start)?));
                    }
                }
            }
            b"w:sectPr" if depth == body && self.insert_at.is_none() => {
                self.insert_at = Some(index);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(
        &mut self,
        name: &[u8],
        depth: usize,
        index: usize,
        events: &[Event<'static>],
        self_closing: bool,
    ) -> Result<(), DocumentError> {
        match name {
            b"w:t" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        if let Some(start) = run.open_text.take() {
                            run.content.push((start, index));
                        }
                    }
                }
            }
            b"w:tab" | b"w:br" | b"w:cr" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        if let Some((start, Some(mark))) = run.open_mark.take() {
                            run.text.push(mark);
                            run.content.push((start, index));
                        }
                    }
                }
            }
            b"w:rPr" => {
                if let Some(run) = self.run.as_mut() {
                    if depth == run.depth + 1 {
                        if let Some(start) = run.style_start.take() {
                            run.style = Some((start, index));
                        }
                    }
                }
            }
            b"w:r" if self.run.as_ref().map_or(false, |run| run.depth == depth) => {
                if let Some(run) = self.run.take() {
                    self.finish_run(run, index, events, self_closing)?;
                }
            }
            b"w:p" if self.paragraph.as_ref().map_or(false, |cx| cx.depth == depth) => {
                if let Some(cx) = self.paragraph.take() {
                    match self.table.as_mut().and_then(|table| table.cell.as_mut()) {
                        Some(cell) => cell.push_paragraph(cx.paragraph),
                        None => self.blocks.push(Block::Paragraph(cx.paragraph)),
                    }
                }
            }
            b"w:tc" => {
                if let Some(table) = self.table.as_mut() {
                    if depth == table.depth + 2 {
                        if let (Some(cell), Some(row)) = (table.cell.take(), table.row.as_mut()) {
                            row.push_cell(cell);
                        }
                    }
                }
            }
            b"w:tr" => {
                if let Some(table) = self.table.as_mut() {
                    if depth == table.depth + 1 {
                        if let Some(row) = table.row.take() {
                            table.table.push_row(row);
                        }
                    }
                }
            }
            b"w:tbl" if self.table.as_ref().map_or(false, |table| table.depth == depth) => {
                if let Some(table) = self.table.take() {
                    self.blocks.push(Block::Table(table.table));
                }
            }
            b"w:body" if self.body == Some(depth + 1) && self.insert_at.is_none() => {
                self.insert_at = Some(index);
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &BytesText<'_>, depth: usize) -> Result<(), DocumentError> {
        if let Some(run) = self.run.as_mut() {
            if run.open_text.is_some() && depth == run.depth + 2 {
                run.text.push_str(&text.unescape().map_err(xml_error)?);
            }
        }
        Ok(())
    }

    fn paragraph_allowed(&self, depth: usize, body: usize) -> bool {
        match &self.table {
            None => depth == body,
            Some(table) => table.cell.is_some() && depth == table.depth + 3,
        }
    }

    fn finish_run(
        &mut self,
        run: RunCx,
        end: usize,
        events: &[Event<'static>],
        self_closing: bool,
    ) -> Result<(), DocumentError> {
        let style = match run.style {
            Some((start, last)) => StyleHandle::from_properties_xml(render_fragment(&events[start..=last])?),
            None => StyleHandle::none(),
        };
        let origin = self.slots.len();
        self.slots.push(RunSlot {
            original: run.text.clone(),
            content: run.content,
            end,
            self_closing,
        });
        if let Some(cx) = self.paragraph.as_mut() {
            cx.paragraph.push_run(Run::sourced(run.text, style, origin));
        }
        Ok(())
    }
}

/// `w:tab` 是制表符；`w:cr` 和不带类型（或 `textWrapping`）的 `w:br` 是换行。
/// 分页符、分栏符返回 `None`，不计入文本。
fn content_mark(start: &BytesStart<'_>) -> Result<Option<char>, DocumentError> {
    let mark = match start.name().as_ref() {
        b"w:tab" => Some('\t'),
        b"w:cr" => Some('\n'),
        b"w:br" => match attribute(start, b"w:type")?.as_deref() {
            None | Some("textWrapping") => Some('\n'),
            Some(_) => None,
        },
        _ => None,
    };
    Ok(mark)
}

fn attribute(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, DocumentError> {
    match start.try_get_attribute(key).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

fn render_fragment(events: &[Event<'static>]) -> Result<String, DocumentError> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        writer.write_event(event.borrow()).map_err(xml_error)?;
    }
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn write_run_content(writer: &mut Writer<Vec<u8>>, text: &str) {
    let mut xml = String::new();
    push_run_content(&mut xml, text);
    writer.get_mut().extend_from_slice(xml.as_bytes());
}

/// Run 文本写成 `w:t` 片段，`\t` 写成 `<w:tab/>`，`\n` 写成 `<w:br/>`
fn push_run_content(xml: &mut String, text: &str) {
    let mut chunk_start = 0;
    for (position, ch) in text.char_indices() {
        let element = match ch {
            '\t' => "<w:tab/>",
            '\n' => "<w:br/>",
            _ => continue,
        };
        push_text_element(xml, &text[chunk_start..position]);
        xml.push_str(element);
        chunk_start = position + ch.len_utf8();
    }
    push_text_element(xml, &text[chunk_start..]);
}

fn push_text_element(xml: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    xml.push_str("<w:t xml:space=\"preserve\">");
    xml.push_str(&escape(chunk));
    xml.push_str("</w:t>");
}

fn collect_runs(blocks: &[Block]) -> Vec<&Run> {
    let mut runs = Vec::new();
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => runs.extend(paragraph.runs()),
            Block::Table(table) => {
                for cell in table.cells() {
                    for paragraph in cell.paragraphs() {
                        runs.extend(paragraph.runs());
                    }
                }
            }
        }
    }
    runs
}

/// 内存中新建的块直接拼成 XML
fn render_blocks(blocks: &[Block]) -> String {
    let mut xml = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => push_paragraph(&mut xml, paragraph),
            Block::Table(table) => push_table(&mut xml, table),
        }
    }
    xml
}

fn push_paragraph(xml: &mut String, paragraph: &Paragraph) {
    xml.push_str("<w:p>");
    if let Some(style_id) = paragraph.style_id() {
        xml.push_str("<w:pPr><w:pStyle w:val=\"");
        xml.push_str(&escape(style_id));
        xml.push_str("\"/></w:pPr>");
    }
    for run in paragraph.runs() {
        xml.push_str("<w:r>");
        if let Some(properties) = run.style().properties_xml() {
            xml.push_str(properties);
        }
        push_run_content(xml, run.text());
        xml.push_str("</w:r>");
    }
    xml.push_str("</w:p>");
}

fn push_table(xml: &mut String, table: &Table) {
    let columns = table
        .rows()
        .iter()
        .map(|row| row.cells().len())
        .max()
        .unwrap_or(0);

    xml.push_str("<w:tbl><w:tblPr><w:tblW w:w=\"0\" w:type=\"auto\"/></w:tblPr><w:tblGrid>");
    for _ in 0..columns {
        xml.push_str("<w:gridCol/>");
    }
    xml.push_str("</w:tblGrid>");
    for row in table.rows() {
        xml.push_str("<w:tr>");
        for cell in row.cells() {
            xml.push_str("<w:tc>");
            if cell.paragraphs().is_empty() {
                xml.push_str("<w:p/>");
            }
            for paragraph in cell.paragraphs() {
                push_paragraph(xml, paragraph);
            }
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

fn xml_error(err: impl Display) -> DocumentError {
    DocumentError::Xml(err.to_string())
}
