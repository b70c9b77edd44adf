//! Course query system (課程查詢).
//!
//! Result rows are `tbody tr` with at least 14 cells. Column map:
//!
//! | idx | content                                  |
//! |-----|------------------------------------------|
//! | 0   | term (last digit)                        |
//! | 1   | course number                            |
//! | 5   | departments / programs, `<br>`-separated |
//! | 6   | required / elective, parallel to 5       |
//! | 7   | title `<a>` and note `<font>`            |
//! | 8   | teacher `<a>` links                      |
//! | 11  | times                                    |
//! | 12  | locations                                |

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::big5::big5_url_encode;
use super::error::ScrapeError;
use super::html::{element_text, resolve, text_lines};
use super::upstream::Upstream;
use crate::models::{is_course_no, Course, CourseProgram, CourseUid, EducationCode, Semester};

pub const KEYWORD_PATH: &str = "/pls/dev_stud/course_query_all.queryByKeyword";
pub const CONDITIONS_PATH: &str = "/pls/dev_stud/course_query_all.queryByAllConditions";
const GUIDE_PATH: &str = "/pls/dev_stud/course_query.queryGuide";

const MIN_CELLS: usize = 14;
const NOTE_MARKER: &str = "備註：";
const UNMAINTAINED: &str = "每週未維護";
const PROGRAM_SUFFIX: &str = "學程";
const DEFAULT_COURSE_TYPE: &str = "選";

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").expect("valid selector"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));
static FONT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("font").expect("valid selector"));
static CLASSROOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:教室|上課地點)[:：]\s*([^\s，,；;)）]+)").expect("valid regex")
});

/// Query string for the keyword endpoint. Term 0 omits `qTerm`.
pub fn keyword_query(semester: Semester, course_no: &str) -> String {
    let mut query = format!("qYear={}", semester.year);
    if semester.term != 0 {
        query.push_str(&format!("&qTerm={}", semester.term));
    }
    query.push_str(&format!("&courseno={}&seq1=A&seq2=M", course_no));
    query
}

/// Form body for the all-conditions endpoint; `field` is `cour` or `teach`.
pub fn conditions_body(semester: Semester, field: &str, value: &str) -> Result<String, ScrapeError> {
    let mut body = format!("qYear={}", semester.year);
    if semester.term != 0 {
        body.push_str(&format!("&qTerm={}", semester.term));
    }
    body.push_str(&format!(
        "&{}={}&seq1=A&seq2=M",
        field,
        big5_url_encode(value.trim())?
    ));
    Ok(body)
}

#[derive(Clone)]
pub struct CourseScraper {
    upstream: Upstream,
}

impl CourseScraper {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    /// The course identified by `uid`, if the upstream lists it.
    pub async fn by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &CourseUid,
    ) -> Result<Option<Course>, ScrapeError> {
        let courses = self.by_code(cancel, uid.semester(), &uid.no).await?;
        let wanted = uid.to_string();
        Ok(courses.into_iter().find(|c| c.uid == wanted))
    }

    /// Courses whose number matches `course_no`; a bare education code
    /// (`U`, `M`, `N`, `P`) lists a whole level.
    pub async fn by_code(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        course_no: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        let path = format!("{}?{}", KEYWORD_PATH, keyword_query(semester, course_no));
        let page = self.upstream.get(cancel, &path).await?;
        Ok(parse_courses(&page.url, &page.html(), semester))
    }

    pub async fn by_education(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        code: EducationCode,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.by_code(cancel, semester, &code.to_string()).await
    }

    pub async fn by_title(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        title: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.by_conditions(cancel, semester, "cour", title).await
    }

    pub async fn by_teacher(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        teacher: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.by_conditions(cancel, semester, "teach", teacher).await
    }

    async fn by_conditions(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        field: &str,
        value: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        if value.trim().is_empty() {
            return Err(ScrapeError::Invalid(format!("empty {} query", field)));
        }
        let body = conditions_body(semester, field, value)?;
        let page = self.upstream.post_raw(cancel, CONDITIONS_PATH, &body).await?;
        Ok(parse_courses(&page.url, &page.html(), semester))
    }
}

/// Course rows in document order. Rows without a title are skipped.
pub fn parse_courses(page_url: &str, document: &Html, semester: Semester) -> Vec<Course> {
    let origin = Url::parse(page_url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_default();

    document
        .select(&ROW)
        .filter_map(|row| parse_row(page_url, &origin, row, semester))
        .collect()
}

fn parse_row(page_url: &str, origin: &str, row: ElementRef, semester: Semester) -> Option<Course> {
    let cells: Vec<ElementRef> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| c.value().name() == "td")
        .collect();
    if cells.len() < MIN_CELLS {
        return None;
    }

    let term = if semester.term == 0 {
        element_text(cells[0])
            .chars()
            .rev()
            .find_map(|c| c.to_digit(10))
            .and_then(|d| u8::try_from(d).ok())?
    } else {
        semester.term
    };

    let no = element_text(cells[1]).to_ascii_uppercase();
    if !is_course_no(&no) {
        return None;
    }

    let title_link = cells[7].select(&ANCHOR).next()?;
    let title = element_text(title_link);
    if title.is_empty() {
        return None;
    }
    let detail_url = title_link
        .value()
        .attr("href")
        .and_then(|href| href.split_once('?'))
        .map(|(_, query)| format!("{}{}?{}", origin, GUIDE_PATH, query))
        .unwrap_or_default();

    let note = cells[7]
        .select(&FONT)
        .map(element_text)
        .find_map(|text| text.strip_prefix(NOTE_MARKER).map(|n| n.trim().to_string()))
        .unwrap_or_default();

    let (teachers, teacher_urls): (Vec<String>, Vec<String>) = cells[8]
        .select(&ANCHOR)
        .map(|a| {
            let url = a
                .value()
                .attr("href")
                .and_then(|href| resolve(page_url, href))
                .unwrap_or_default();
            (element_text(a), url)
        })
        .filter(|(name, _)| !name.is_empty())
        .unzip();

    let times = maintained_lines(cells[11]);
    let mut locations = maintained_lines(cells[12]);
    if let Some(room) = classroom_in(&note) {
        if !locations.contains(&room) {
            locations.push(room);
        }
    }

    let programs = parse_programs(cells[5], cells[6]);

    Some(Course {
        uid: format!("{}{}{}", semester.year, term, no),
        year: semester.year,
        term,
        no,
        title,
        teachers,
        teacher_urls,
        times,
        locations,
        detail_url,
        note,
        programs,
        cached_at: 0,
    })
}

fn maintained_lines(cell: ElementRef) -> Vec<String> {
    text_lines(cell)
        .into_iter()
        .filter(|line| !line.contains(UNMAINTAINED))
        .collect()
}

/// Classroom embedded in a note, e.g. `教室：商1F01`.
pub fn classroom_in(note: &str) -> Option<String> {
    CLASSROOM
        .captures(note)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pair program names in `names` with the course type at the same position.
fn parse_programs(names: ElementRef, types: ElementRef) -> Vec<CourseProgram> {
    let types = text_lines(types);
    text_lines(names)
        .into_iter()
        .enumerate()
        .filter(|(_, name)| name.ends_with(PROGRAM_SUFFIX))
        .map(|(i, name)| CourseProgram {
            name,
            course_type: types
                .get(i)
                .cloned()
                .unwrap_or_else(|| DEFAULT_COURSE_TYPE.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../tests/fixtures/courses_query.html");
    const PAGE: &str = "http://sea.test/pls/dev_stud/course_query_all.queryByKeyword?qYear=114";

    fn parsed(term: u8) -> Vec<Course> {
        parse_courses(PAGE, &Html::parse_document(FIXTURE), Semester::new(114, term))
    }

    #[test]
    fn test_skips_short_and_untitled_rows() {
        let uids: Vec<_> = parsed(1).into_iter().map(|c| c.uid).collect();
        assert_eq!(uids, ["1141U0010", "1141U0011", "1141M0020"]);
    }

    #[test]
    fn test_full_row() {
        let course = parsed(1).remove(0);
        assert_eq!(course.title, "資料結構");
        assert_eq!(course.teachers, ["林教授", "王教授"]);
        assert_eq!(
            course.teacher_urls,
            [
                "http://sea.test/pls/faculty/show?id=1",
                "http://sea.test/pls/faculty/show?id=2"
            ]
        );
        assert_eq!(
            course.detail_url,
            "http://sea.test/pls/dev_stud/course_query.queryGuide?g_serial=U0010&g_year=114&g_term=1"
        );
        assert_eq!(course.note, "教室：電4F12，請自備筆電");
        assert_eq!(course.times, ["每週二2~4"]);
        assert_eq!(course.locations, ["電資大樓4F12", "電4F12"]);
        assert_eq!(
            course.programs,
            [
                CourseProgram {
                    name: "資訊科技學程".to_string(),
                    course_type: "必".to_string()
                },
                CourseProgram {
                    name: "人工智慧學程".to_string(),
                    course_type: "選".to_string()
                },
            ]
        );
        assert_eq!(course.teachers.len(), course.teacher_urls.len());
        assert_eq!(course.uid, course.derive_uid());
    }

    #[test]
    fn test_row_without_teacher_links() {
        let course = parsed(1).remove(1);
        assert!(course.teachers.is_empty());
        assert!(course.teacher_urls.is_empty());
        assert!(course.times.is_empty());
        assert!(course.programs.is_empty());
    }

    #[test]
    fn test_term_zero_reads_row_term() {
        let courses = parsed(0);
        assert_eq!(courses[0].term, 1);
        assert_eq!(courses[2].term, 2);
        assert_eq!(courses[2].uid, "1142M0020");
    }

    #[test]
    fn test_keyword_query() {
        assert_eq!(
            keyword_query(Semester::new(114, 1), "U0010"),
            "qYear=114&qTerm=1&courseno=U0010&seq1=A&seq2=M"
        );
        assert_eq!(
            keyword_query(Semester::new(114, 0), "U"),
            "qYear=114&courseno=U&seq1=A&seq2=M"
        );
    }

    #[test]
    fn test_conditions_body_is_big5() {
        assert_eq!(
            conditions_body(Semester::new(114, 1), "cour", " 微積分 ").unwrap(),
            "qYear=114&qTerm=1&cour=%B7L%BFn%A4%C0&seq1=A&seq2=M"
        );
    }

    #[test]
    fn test_classroom_in() {
        assert_eq!(classroom_in("上課地點: 商1F01)").as_deref(), Some("商1F01"));
        assert_eq!(classroom_in("無"), None);
    }
}
