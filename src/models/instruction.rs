use serde::{Deserialize, Deserializer, Serialize};

/// 单条替换指令：把 Base CP 中的 `old_text` 换成 Recap 中的 `new_text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementInstruction {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub old_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub new_text: String,
}

impl ReplacementInstruction {
    pub fn new(old_text: impl Into<String>, new_text: impl Into<String>) -> Self {
        Self {
            old_text: old_text.into(),
            new_text: new_text.into(),
        }
    }

    /// 两端都有内容才会被执行
    pub fn is_applicable(&self) -> bool {
        !self.old_text.is_empty() && !self.new_text.is_empty()
    }
}

/// 替换指令集合
///
/// 插入顺序即执行顺序。序列化形状与服务返回的结构一致：
/// `{"replacements": [{"old_text": ..., "new_text": ...}, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSet {
    #[serde(default)]
    pub replacements: Vec<ReplacementInstruction>,
}

impl InstructionSet {
    pub fn new(replacements: Vec<ReplacementInstruction>) -> Self {
        Self { replacements }
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReplacementInstruction> {
        self.replacements.iter()
    }
}

impl<'a> IntoIterator for &'a InstructionSet {
    type Item = &'a ReplacementInstruction;
    type IntoIter = std::slice::Iter<'a, ReplacementInstruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.replacements.iter()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
