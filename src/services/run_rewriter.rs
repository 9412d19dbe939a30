//! Run 级文本重写
//!
//! 在段落的拼接文本中替换第一处 `old_text`，然后把新的整段文本按每个 Run
//! 原有的字符数重新切分回去。Run 的个数和样式句柄都不变，只有文本变化。
//!
//! 切分不理解"哪个 Run 原本包含被替换的片段"：如果 `old_text` 跨越了不同样式的
//! Run，样式边界可能在视觉上发生偏移，但不会丢字或重复，总字符数严格守恒。

use crate::document::Paragraph;

/// 替换段落中第一处逐字匹配的 `old_text`
///
/// # 返回
/// 是否真的改写了段落。逐字匹配不到、`old_text` 为空或段落没有 Run 时
/// 都是空操作，返回 `false`。
pub fn replace_in_paragraph(paragraph: &mut Paragraph, old_text: &str, new_text: &str) -> bool {
    if old_text.is_empty() || paragraph.runs().is_empty() {
        return false;
    }

    let full_text = paragraph.text();
    let Some(start) = full_text.find(old_text) else {
        return false;
    };

    let before = &full_text[..start];
    let after = &full_text[start + old_text.len()..];
    let new_full_text = format!("{}{}{}", before, new_text, after);

    let mut chars = new_full_text.chars();
    for run in paragraph.runs_mut() {
        let share = run.text().chars().count();
        let slice: String = chars.by_ref().take(share).collect();
        run.set_text(slice);
    }

    // 新文本更长：剩余部分全部追加到最后一个 Run
    let remainder: String = chars.collect();
    if !remainder.is_empty() {
        if let Some(last) = paragraph.runs_mut().last_mut() {
            last.push_str(&remainder);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Run, StyleHandle};

    fn bold() -> StyleHandle {
        StyleHandle::from_properties_xml("<w:rPr><w:b/></w:rPr>")
    }

    fn italic() -> StyleHandle {
        StyleHandle::from_properties_xml("<w:rPr><w:i/></w:rPr>")
    }

    fn paragraph(parts: &[(&str, StyleHandle)]) -> Paragraph {
        Paragraph::from_runs(
            parts
                .iter()
                .map(|(text, style)| Run::new(*text, style.clone()))
                .collect(),
        )
    }

    fn texts(paragraph: &Paragraph) -> Vec<&str> {
        paragraph.runs().iter().map(|run| run.text()).collect()
    }

    fn styles(paragraph: &Paragraph) -> Vec<StyleHandle> {
        paragraph.runs().iter().map(|run| run.style().clone()).collect()
    }

    #[test]
    fn test_freight_rate_update_keeps_runs() {
        let mut para = paragraph(&[("Freight: ", bold()), ("USD 10,000 per day", StyleHandle::none())]);
        let styles_before = styles(&para);

        assert!(replace_in_paragraph(&mut para, "USD 10,000 per day", "USD 12,500 per day"));

        assert_eq!(para.text(), "Freight: USD 12,500 per day");
        assert_eq!(texts(&para), vec!["Freight: ", "USD 12,500 per day"]);
        assert_eq!(styles(&para), styles_before);
    }

    #[test]
    fn test_longer_text_spills_into_last_run() {
        let mut para = paragraph(&[("Hire ", bold()), ("USD 9k", italic()), (" pd", StyleHandle::none())]);

        assert!(replace_in_paragraph(&mut para, "USD 9k", "USD 9,750 payable 15 days in advance"));

        assert_eq!(texts(&para), vec!["Hire ", "USD 9,", "750 payable 15 days in advance pd"]);
        assert_eq!(para.text(), "Hire USD 9,750 payable 15 days in advance pd");
    }

    #[test]
    fn test_shorter_text_leaves_trailing_runs_empty() {
        let mut para = paragraph(&[("Demurrage ", bold()), ("USD 20,000", italic()), (" pdpr", StyleHandle::none())]);
        let styles_before = styles(&para);

        assert!(replace_in_paragraph(&mut para, "Demurrage USD 20,000 pdpr", "DEM 15k"));

        assert_eq!(texts(&para), vec!["DEM 15k", "", ""]);
        assert_eq!(styles(&para), styles_before);
    }

    #[test]
    fn test_match_spanning_runs_is_redistributed() {
        let mut para = paragraph(&[("Laycan 1-", bold()), ("5 May", italic())]);

        assert!(replace_in_paragraph(&mut para, "1-5 May", "10-15 June"));

        assert_eq!(para.text(), "Laycan 10-15 June");
        assert_eq!(texts(&para), vec!["Laycan 10", "-15 June"]);
    }

    #[test]
    fn test_character_count_is_preserved() {
        let cases = [
            ("Freight: USD 10,000 per day", "USD 10,000 per day", "USD 12,500 per day"),
            ("Load port: Santos, Brazil", "Santos", "Paranaguá"),
            ("租金：每天一万美元", "一万", "一万二千五百"),
            ("A very long clause text", "very long clause ", ""),
        ];
        for (original, old, new) in cases {
            let mut para = paragraph(&[
                (&original[..3], bold()),
                (&original[3..], StyleHandle::none()),
            ]);
            let before = para.text().chars().count();

            assert!(replace_in_paragraph(&mut para, old, new));

            let expected = before - old.chars().count() + new.chars().count();
            assert_eq!(para.text().chars().count(), expected, "case: {}", original);
            assert_eq!(para.runs().len(), 2);
        }
    }

    #[test]
    fn test_only_first_occurrence_is_replaced() {
        let mut para = paragraph(&[("WOG / WOG", StyleHandle::none())]);
        assert!(replace_in_paragraph(&mut para, "WOG", "WIBON"));
        assert_eq!(para.text(), "WIBON / WOG");
    }

    #[test]
    fn test_no_verbatim_match_is_noop() {
        let mut para = paragraph(&[("Freight: USD 10,000\n", bold()), ("per day", italic())]);
        let before = para.clone();

        // 归一化后能匹配，但逐字不匹配
        assert!(!replace_in_paragraph(&mut para, "USD 10,000 per day", "USD 12,500 per day"));
        assert_eq!(para, before);
    }

    #[test]
    fn test_empty_paragraph_and_empty_old_text_are_noops() {
        let mut empty = Paragraph::new();
        assert!(!replace_in_paragraph(&mut empty, "x", "y"));
        assert!(empty.runs().is_empty());

        let mut para = paragraph(&[("Freight", StyleHandle::none())]);
        assert!(!replace_in_paragraph(&mut para, "", "prefix"));
        assert_eq!(para.text(), "Freight");
    }
}
