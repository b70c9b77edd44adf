//! What a warmup run fetches.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{academic_year, semesters_for_date, Semester, WARMUP_DEPARTMENT_CODES};
use crate::scrapers::DirectoryKind;

/// Number of entry years the student module covers, current year included.
pub const STUDENT_YEAR_SPAN: u16 = 6;

/// A record kind that warmup can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Students,
    Contacts,
    Courses,
    Stickers,
    Programs,
}

impl Module {
    /// Modules run when none are configured.
    pub const DEFAULT: [Module; 4] = [
        Module::Students,
        Module::Contacts,
        Module::Courses,
        Module::Stickers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Students => "students",
            Module::Contacts => "contacts",
            Module::Courses => "courses",
            Module::Stickers => "stickers",
            Module::Programs => "programs",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown warmup module {0:?} (expected students, contacts, courses, stickers or programs)")]
pub struct UnknownModule(pub String);

impl FromStr for Module {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "students" | "student" => Ok(Module::Students),
            "contacts" | "contact" => Ok(Module::Contacts),
            "courses" | "course" => Ok(Module::Courses),
            "stickers" | "sticker" => Ok(Module::Stickers),
            "programs" | "program" => Ok(Module::Programs),
            other => Err(UnknownModule(other.to_string())),
        }
    }
}

/// Parse a comma separated module list. Duplicates collapse; order is fixed.
pub fn parse_modules(csv: &str) -> Result<Vec<Module>, UnknownModule> {
    let modules = csv
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<BTreeSet<Module>, _>>()?;
    Ok(modules.into_iter().collect())
}

/// Inputs each module expands into tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupPlan {
    pub student_years: Vec<u16>,
    pub department_codes: Vec<String>,
    pub semesters: Vec<Semester>,
    pub sticker_sources: Vec<String>,
}

impl WarmupPlan {
    /// Plan for the academic calendar around `date`, without sticker sources.
    pub fn for_date(date: NaiveDate) -> Self {
        let newest = academic_year(date);
        let oldest = newest.saturating_sub(STUDENT_YEAR_SPAN - 1);
        Self {
            student_years: (oldest..=newest).collect(),
            department_codes: WARMUP_DEPARTMENT_CODES
                .iter()
                .map(|code| code.to_string())
                .collect(),
            semesters: semesters_for_date(date).to_vec(),
            sticker_sources: Vec::new(),
        }
    }

    pub fn with_sticker_sources(mut self, sources: Vec<String>) -> Self {
        self.sticker_sources = sources;
        self
    }

    /// Expand the selected modules into individual tasks.
    pub fn tasks(&self, modules: &[Module]) -> Vec<WarmupTask> {
        let mut tasks = Vec::new();
        for module in modules {
            match module {
                Module::Students => {
                    for &year in &self.student_years {
                        for department in &self.department_codes {
                            tasks.push(WarmupTask::Students {
                                year,
                                department: department.clone(),
                            });
                        }
                    }
                }
                Module::Contacts => {
                    tasks.extend(DirectoryKind::ALL.into_iter().map(WarmupTask::Contacts));
                }
                Module::Courses => {
                    tasks.extend(self.semesters.iter().copied().map(WarmupTask::Courses));
                }
                Module::Stickers => {
                    tasks.extend(self.sticker_sources.iter().cloned().map(WarmupTask::Stickers));
                }
                Module::Programs => tasks.push(WarmupTask::Programs),
            }
        }
        tasks
    }
}

/// One unit of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupTask {
    Students { year: u16, department: String },
    /// Expands to one fetch per organization listed in the directory.
    Contacts(DirectoryKind),
    /// Iterates the four education codes.
    Courses(Semester),
    Stickers(String),
    Programs,
}

impl WarmupTask {
    pub fn module(&self) -> Module {
        match self {
            WarmupTask::Students { .. } => Module::Students,
            WarmupTask::Contacts(_) => Module::Contacts,
            WarmupTask::Courses(_) => Module::Courses,
            WarmupTask::Stickers(_) => Module::Stickers,
            WarmupTask::Programs => Module::Programs,
        }
    }
}

impl fmt::Display for WarmupTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarmupTask::Students { year, department } => write!(f, "students {year}/{department}"),
            WarmupTask::Contacts(kind) => write!(f, "contacts {}", kind.label()),
            WarmupTask::Courses(semester) => write!(f, "courses {semester}"),
            WarmupTask::Stickers(url) => write!(f, "stickers {url}"),
            WarmupTask::Programs => f.write_str("programs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modules() {
        assert_eq!(
            parse_modules("courses, students,courses").unwrap(),
            vec![Module::Students, Module::Courses]
        );
        assert!(parse_modules("").unwrap().is_empty());
        assert_eq!(
            parse_modules("students,weather").unwrap_err(),
            UnknownModule("weather".to_string())
        );
    }

    #[test]
    fn test_plan_for_date() {
        let plan = WarmupPlan::for_date(NaiveDate::from_ymd_opt(2025, 10, 16).unwrap());
        assert_eq!(plan.student_years, vec![109, 110, 111, 112, 113, 114]);
        assert_eq!(
            plan.semesters,
            vec![Semester::new(114, 1), Semester::new(113, 2)]
        );
        assert!(plan.department_codes.iter().any(|code| code == "85"));
    }

    #[test]
    fn test_tasks_cover_cartesian_product() {
        let plan = WarmupPlan {
            student_years: vec![113, 114],
            department_codes: vec!["85".to_string(), "712".to_string()],
            semesters: vec![Semester::new(114, 1)],
            sticker_sources: vec!["https://stickers.test/a".to_string()],
        };
        let tasks = plan.tasks(&[Module::Students, Module::Courses, Module::Stickers]);
        assert_eq!(tasks.len(), 4 + 1 + 1);
        assert_eq!(tasks[0].to_string(), "students 113/85");
        assert_eq!(tasks[4], WarmupTask::Courses(Semester::new(114, 1)));

        let contacts = plan.tasks(&[Module::Contacts]);
        assert_eq!(contacts.len(), 2);
    }
}
