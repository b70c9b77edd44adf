//! Data models for the campus cache.

mod contact;
mod course;
mod program;
mod semester;
mod sticker;
mod student;

pub use contact::{individual_uid, organization_uid, Contact, ContactKind};
pub use course::{
    is_course_no, Course, CourseProgram, CourseUid, EducationCode, InvalidCourseUid,
};
pub use program::{is_discontinued, normalize_program_name, Program};
pub use semester::{academic_year, campus_today, roc_year, semesters_for_date, Semester};
pub use sticker::{sticker_id, Sticker};
pub use student::{
    degree_of, department_code, derive_department, extract_year, is_student_id, search_keyword,
    Degree, Student, LAW_DEPARTMENT, UNKNOWN_DEPARTMENT, WARMUP_DEPARTMENT_CODES,
};
