//! Classifying raw user text into a typed lookup.

use super::error::QueryError;
use crate::models::{is_course_no, is_student_id, CourseUid};

const COURSE_KEYWORDS: &[&str] = &["課程", "課", "course"];
const TEACHER_KEYWORDS: &[&str] = &["教師", "老師", "teacher"];
const STUDENT_KEYWORDS: &[&str] = &["學生", "學號", "student"];
const CONTACT_KEYWORDS: &[&str] = &["聯絡", "電話", "contact"];
const PROGRAM_KEYWORDS: &[&str] = &["學程", "program"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CourseUid(CourseUid),
    /// Bare course number such as `U0010`, looked up in the current terms.
    CourseNo(String),
    CourseTitle { title: String, year: Option<u16> },
    CourseTeacher { teacher: String, year: Option<u16> },
    StudentId(String),
    StudentName(String),
    Contact(String),
    /// Program listing, optionally filtered by name.
    Program(Option<String>),
}

/// Classify `text`.
///
/// Bare identifiers (course uid, course number, student id) are recognised
/// on their own; everything else needs a leading keyword.
pub fn classify(text: &str) -> Result<Intent, QueryError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(QueryError::Invalid("empty query".to_string()));
    }

    if is_student_id(text) {
        return Ok(Intent::StudentId(text.to_string()));
    }
    if is_course_no(&text.to_uppercase()) {
        return Ok(Intent::CourseNo(text.to_uppercase()));
    }
    if looks_like_uid(text) {
        return text
            .parse::<CourseUid>()
            .map(Intent::CourseUid)
            .map_err(|e| QueryError::Invalid(e.to_string()));
    }

    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (text, ""),
    };
    let keyword = keyword.to_lowercase();
    let keyword = keyword.as_str();

    if PROGRAM_KEYWORDS.contains(&keyword) {
        return Ok(Intent::Program((!rest.is_empty()).then(|| rest.to_string())));
    }
    if rest.is_empty() {
        return Err(QueryError::Invalid(format!("nothing to look up in {text:?}")));
    }

    if COURSE_KEYWORDS.contains(&keyword) {
        let (year, title) = split_year(rest);
        return Ok(Intent::CourseTitle {
            title: title.to_string(),
            year,
        });
    }
    if TEACHER_KEYWORDS.contains(&keyword) {
        let (year, teacher) = split_year(rest);
        return Ok(Intent::CourseTeacher {
            teacher: teacher.to_string(),
            year,
        });
    }
    if STUDENT_KEYWORDS.contains(&keyword) {
        return Ok(if is_student_id(rest) {
            Intent::StudentId(rest.to_string())
        } else {
            Intent::StudentName(rest.to_string())
        });
    }
    if CONTACT_KEYWORDS.contains(&keyword) {
        return Ok(Intent::Contact(rest.to_string()));
    }

    Err(QueryError::Invalid(format!("unrecognised query {text:?}")))
}

/// Digits followed by an education letter, e.g. `1141U0010`.
fn looks_like_uid(text: &str) -> bool {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    (3..=4).contains(&digits)
        && text[digits..]
            .chars()
            .next()
            .is_some_and(|c| "UMNPumnp".contains(c))
}

/// Split a leading ROC year (2 or 3 digits) off `rest` when more text follows.
fn split_year(rest: &str) -> (Option<u16>, &str) {
    if let Some((head, tail)) = rest.split_once(char::is_whitespace) {
        let tail = tail.trim();
        if (2..=3).contains(&head.len()) && !tail.is_empty() {
            if let Ok(year) = head.parse::<u16>() {
                return (Some(year), tail);
            }
        }
    }
    (None, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_identifiers() {
        assert_eq!(
            classify("1141U0010").unwrap(),
            Intent::CourseUid(CourseUid::new(114, 1, "U0010"))
        );
        assert_eq!(
            classify(" 992m0101 ").unwrap(),
            Intent::CourseUid(CourseUid::new(99, 2, "M0101"))
        );
        assert_eq!(
            classify("u0010").unwrap(),
            Intent::CourseNo("U0010".to_string())
        );
        assert_eq!(
            classify("411285001").unwrap(),
            Intent::StudentId("411285001".to_string())
        );
    }

    #[test]
    fn test_malformed_uid_is_invalid() {
        assert!(matches!(classify("1143U0010"), Err(QueryError::Invalid(_))));
    }

    #[test]
    fn test_keyword_intents() {
        assert_eq!(
            classify("課程 微積分").unwrap(),
            Intent::CourseTitle {
                title: "微積分".to_string(),
                year: None
            }
        );
        assert_eq!(
            classify("課程 110 微積分").unwrap(),
            Intent::CourseTitle {
                title: "微積分".to_string(),
                year: Some(110)
            }
        );
        assert_eq!(
            classify("老師　王小明").unwrap(),
            Intent::CourseTeacher {
                teacher: "王小明".to_string(),
                year: None
            }
        );
        assert_eq!(
            classify("學生 王小明").unwrap(),
            Intent::StudentName("王小明".to_string())
        );
        assert_eq!(
            classify("學號 49985012").unwrap(),
            Intent::StudentId("49985012".to_string())
        );
        assert_eq!(
            classify("Contact 資訊工程學系").unwrap(),
            Intent::Contact("資訊工程學系".to_string())
        );
        assert_eq!(classify("學程").unwrap(), Intent::Program(None));
        assert_eq!(
            classify("學程 人工智慧").unwrap(),
            Intent::Program(Some("人工智慧".to_string()))
        );
    }

    #[test]
    fn test_year_only_is_a_title() {
        assert_eq!(
            classify("課程 110").unwrap(),
            Intent::CourseTitle {
                title: "110".to_string(),
                year: None
            }
        );
    }

    #[test]
    fn test_unknown_or_empty() {
        assert!(matches!(classify("   "), Err(QueryError::Invalid(_))));
        assert!(matches!(classify("課程"), Err(QueryError::Invalid(_))));
        assert!(matches!(classify("天氣 三峽"), Err(QueryError::Invalid(_))));
    }
}
