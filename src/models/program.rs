//! Academic programs (學程) listed on the learning-management site.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Document id (`cid`) of the program page.
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub cached_at: i64,
}

/// Abbreviated program names that upstream pages use interchangeably.
const ALIASES: &[(&str, &str)] = &[
    ("智財學程", "智慧財產權學程"),
    ("金融科技學程", "金融科技與量化分析學程"),
    ("AI學程", "人工智慧學程"),
    ("數據學程", "數據科學與分析學程"),
];

/// Strip annotations and map abbreviations onto canonical names.
///
/// `"（新）人工智慧學程(111學年度起適用)"` becomes `"人工智慧學程"`.
pub fn normalize_program_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' | '（' | '[' | '【' => depth += 1,
            ')' | '）' | ']' | '】' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => name.push(c),
            _ => {}
        }
    }

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(name)
}

/// Whether a program name marks it as discontinued.
pub fn is_discontinued(name: &str) -> bool {
    name.contains("廢止")
}
