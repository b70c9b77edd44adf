//! Course records and course identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Semester;

/// Education level encoded in the first letter of a course number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationCode {
    /// Undergraduate
    U,
    /// Master
    M,
    /// Continuing education
    N,
    /// Doctoral
    P,
}

impl EducationCode {
    pub const ALL: [EducationCode; 4] = [
        EducationCode::U,
        EducationCode::M,
        EducationCode::N,
        EducationCode::P,
    ];

    pub fn as_char(&self) -> char {
        match self {
            EducationCode::U => 'U',
            EducationCode::M => 'M',
            EducationCode::N => 'N',
            EducationCode::P => 'P',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'U' => Some(EducationCode::U),
            'M' => Some(EducationCode::M),
            'N' => Some(EducationCode::N),
            'P' => Some(EducationCode::P),
            _ => None,
        }
    }
}

impl fmt::Display for EducationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Whether `no` is a course number such as `U0010`.
pub fn is_course_no(no: &str) -> bool {
    let mut chars = no.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    EducationCode::from_char(first).is_some()
        && no.len() == 5
        && chars.all(|c| c.is_ascii_digit())
}

/// Parsed form of `year ‖ term ‖ no`, e.g. `1141U0010`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseUid {
    pub year: u16,
    pub term: u8,
    pub no: String,
}

impl CourseUid {
    pub fn new(year: u16, term: u8, no: impl Into<String>) -> Self {
        Self {
            year,
            term,
            no: no.into().to_ascii_uppercase(),
        }
    }

    pub fn semester(&self) -> Semester {
        Semester::new(self.year, self.term)
    }
}

impl fmt::Display for CourseUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.year, self.term, self.no)
    }
}

/// Why a string could not be parsed as a course uid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed course uid {0:?}")]
pub struct InvalidCourseUid(pub String);

impl FromStr for CourseUid {
    type Err = InvalidCourseUid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || InvalidCourseUid(s.to_string());
        if !s.is_ascii() || s.len() < 8 {
            return Err(invalid());
        }

        let year_len = if s.len() >= 9 { 3 } else { 2 };
        let year: u16 = s[..year_len].parse().map_err(|_| invalid())?;
        let term: u8 = s[year_len..year_len + 1].parse().map_err(|_| invalid())?;
        let no = &s[year_len + 1..];

        if !matches!(term, 1 | 2) || !is_course_no(no) {
            return Err(invalid());
        }
        Ok(CourseUid::new(year, term, no))
    }
}

/// Program membership of a course, e.g. ("資訊科技學程", "選").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgram {
    pub name: String,
    pub course_type: String,
}

/// A course offering scraped from the course query system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub uid: String,
    pub year: u16,
    pub term: u8,
    pub no: String,
    pub title: String,
    pub teachers: Vec<String>,
    /// Parallel to `teachers`.
    pub teacher_urls: Vec<String>,
    pub times: Vec<String>,
    pub locations: Vec<String>,
    pub detail_url: String,
    pub note: String,
    pub programs: Vec<CourseProgram>,
    #[serde(default)]
    pub cached_at: i64,
}

impl Course {
    /// Uid derived from the identifying attributes.
    pub fn derive_uid(&self) -> String {
        format!("{}{}{}", self.year, self.term, self.no)
    }

    pub fn semester(&self) -> Semester {
        Semester::new(self.year, self.term)
    }
}
