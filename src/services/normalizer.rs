//! 空白归一化
//!
//! 只用于"是否匹配"的判断，写回文档的永远是原始的 old_text / new_text。

/// 把任意连续空白（含换行）折叠为单个空格，并去掉首尾空白
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 归一化后 `needle` 是否出现在 `haystack` 中
pub fn normalized_contains(haystack: &str, needle: &str) -> bool {
    normalize(haystack).contains(&normalize(needle))
}
