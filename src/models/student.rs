//! Student records and id decoding.
//!
//! A student id is an 8- or 9-digit string laid out positionally:
//!
//! ```text
//! 9 digits: D YYY DD R..   (3-digit ROC entry year)
//! 8 digits: D YY  DD R..   (2-digit ROC entry year)
//! ```
//!
//! `D` is the degree kind and `DD` the department code. Undergraduate law
//! (`71`) and social science (`74`) append one more digit for the division.

use serde::{Deserialize, Serialize};

/// Label used when a department code is not in the tables.
pub const UNKNOWN_DEPARTMENT: &str = "未知系所";

/// Unified label for every undergraduate law division.
pub const LAW_DEPARTMENT: &str = "法律系";

/// Undergraduate departments, keyed by 2- or 3-digit code.
const BACHELOR_DEPARTMENTS: &[(&str, &str)] = &[
    ("712", "法律系"),
    ("714", "法律系"),
    ("716", "法律系"),
    ("72", "公共行政暨政策學系"),
    ("73", "經濟學系"),
    ("742", "社會學系"),
    ("744", "社會工作學系"),
    ("75", "財政學系"),
    ("76", "不動產與城鄉環境學系"),
    ("77", "會計學系"),
    ("78", "統計學系"),
    ("79", "企業管理學系"),
    ("80", "金融與合作經營學系"),
    ("81", "中國文學系"),
    ("82", "應用外語學系"),
    ("83", "歷史學系"),
    ("84", "休閒運動管理學系"),
    ("85", "資訊工程學系"),
    ("86", "通訊工程學系"),
    ("87", "電機工程學系"),
];

/// Graduate departments, always keyed by the 2-digit base code.
const GRADUATE_DEPARTMENTS: &[(&str, &str)] = &[
    ("71", "法律學系"),
    ("72", "公共行政暨政策學系"),
    ("73", "經濟學系"),
    ("74", "社會學系"),
    ("75", "財政學系"),
    ("76", "不動產與城鄉環境學系"),
    ("77", "會計學系"),
    ("78", "統計學系"),
    ("79", "企業管理學系"),
    ("80", "金融與合作經營學系"),
    ("81", "中國文學系"),
    ("82", "應用外語學系"),
    ("83", "歷史學系"),
    ("84", "休閒運動管理學系"),
    ("85", "資訊工程學系"),
    ("86", "通訊工程學系"),
    ("87", "電機工程學系"),
    ("88", "犯罪學研究所"),
    ("89", "國際企業研究所"),
    ("90", "民俗藝術與文化資產研究所"),
];

/// Bachelor department codes enumerated by the warmup pipeline.
pub const WARMUP_DEPARTMENT_CODES: &[&str] = &[
    "712", "714", "716", "72", "73", "742", "744", "75", "76", "77", "78", "79", "80", "81",
    "82", "83", "84", "85", "86", "87",
];

/// Degree kind encoded in the first digit of a student id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    Continuing,
    Bachelor,
    Master,
    Doctoral,
    Unknown,
}

impl Degree {
    pub fn from_digit(digit: char) -> Self {
        match digit {
            '3' => Degree::Continuing,
            '4' => Degree::Bachelor,
            '7' => Degree::Master,
            '8' => Degree::Doctoral,
            _ => Degree::Unknown,
        }
    }

    /// Prefix used in portfolio search keywords.
    pub fn keyword_prefix(&self) -> &'static str {
        match self {
            Degree::Continuing => "3",
            Degree::Bachelor => "4",
            Degree::Master => "7",
            Degree::Doctoral => "8",
            Degree::Unknown => "",
        }
    }

    fn is_graduate(&self) -> bool {
        matches!(self, Degree::Master | Degree::Doctoral)
    }
}

/// A student as listed by the portfolio search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub year: u16,
    pub department: String,
    #[serde(default)]
    pub cached_at: i64,
}

impl Student {
    /// Build a student, deriving year and department from the id.
    ///
    /// Returns `None` for ids that are not 8 or 9 digits.
    pub fn from_id(id: &str, name: &str) -> Option<Self> {
        let year = extract_year(id)?;
        Some(Self {
            id: id.to_string(),
            name: name.trim().to_string(),
            year,
            department: derive_department(id),
            cached_at: 0,
        })
    }
}

/// Whether `id` has the shape of a student id.
pub fn is_student_id(id: &str) -> bool {
    matches!(id.len(), 8 | 9) && id.bytes().all(|b| b.is_ascii_digit())
}

/// Width of the entry-year field for an id of this length.
fn year_width(id: &str) -> usize {
    if id.len() == 9 {
        3
    } else {
        2
    }
}

/// ROC entry year encoded in a student id.
pub fn extract_year(id: &str) -> Option<u16> {
    if !is_student_id(id) {
        return None;
    }
    id[1..1 + year_width(id)].parse().ok()
}

/// Degree kind encoded in a student id.
pub fn degree_of(id: &str) -> Degree {
    id.chars()
        .next()
        .map(Degree::from_digit)
        .unwrap_or(Degree::Unknown)
}

/// Department code used for lookups: 2 digits, or 3 for undergraduate
/// law/social science divisions.
pub fn department_code(id: &str) -> Option<String> {
    if !is_student_id(id) {
        return None;
    }
    let start = 1 + year_width(id);
    let base = &id[start..start + 2];
    let degree = degree_of(id);

    if !degree.is_graduate() && matches!(base, "71" | "74") {
        let division = &id[start + 2..start + 3];
        return Some(format!("{}{}", base, division));
    }
    Some(base.to_string())
}

/// Department name for a student id.
pub fn derive_department(id: &str) -> String {
    let Some(code) = department_code(id) else {
        return UNKNOWN_DEPARTMENT.to_string();
    };

    let degree = degree_of(id);
    if !degree.is_graduate() && code.starts_with("71") {
        return LAW_DEPARTMENT.to_string();
    }

    let table = if degree.is_graduate() {
        GRADUATE_DEPARTMENTS
    } else {
        BACHELOR_DEPARTMENTS
    };
    department_name(table, &code)
        .unwrap_or(UNKNOWN_DEPARTMENT)
        .to_string()
}

fn department_name(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Portfolio search keyword for a cohort, e.g. `411285`.
pub fn search_keyword(degree: Degree, year: u16, department_code: &str) -> String {
    format!("{}{}{}", degree.keyword_prefix(), year, department_code)
}
