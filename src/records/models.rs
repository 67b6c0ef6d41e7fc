//! Request and response shapes for the record operations
//!
//! Stored rows are passed through as [`DatabaseRow`], so only inputs and the two
//! composite responses have types of their own.

use crate::core::{DatabaseRow, DatabaseValue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fields of a student, used for both insert and full replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub student_name: String,
    pub student_email: String,
    pub student_age: i32,
    /// Another student's id, or `null`
    #[serde(default)]
    pub student_parent_id: Option<i64>,
    /// `YYYY-MM-DD`
    pub date_of_birth: NaiveDate,
}

impl NewStudent {
    /// Column/value pairs in table order
    pub(crate) fn columns(&self) -> [(&'static str, DatabaseValue); 5] {
        [
            ("student_name", self.student_name.as_str().into()),
            ("student_email", self.student_email.as_str().into()),
            ("student_age", self.student_age.into()),
            ("student_parent_id", self.student_parent_id.into()),
            ("date_of_birth", self.date_of_birth.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub course_name: String,
    pub course_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMark {
    pub student_id: i64,
    pub course_id: i64,
    pub mark: f64,
    /// `YYYY-MM-DD`
    pub date_recorded: NaiveDate,
}

/// One page of the student listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPage {
    pub page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub students: Vec<DatabaseRow>,
}

/// A student together with all of its marks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDetail {
    pub student: DatabaseRow,
    pub marks: Vec<DatabaseRow>,
}
