//! Table names and the SQLite development schema

use crate::core::{Database, Result};

/// Default PostgreSQL schema holding the three tables
pub const DEFAULT_SCHEMA: &str = "student_schema";

/// Schema-qualified table names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub students: String,
    pub courses: String,
    pub marks: String,
}

impl Tables {
    /// Qualify the table names with `schema`, if any
    pub fn new(schema: Option<&str>) -> Self {
        let qualify = |table: &str| match schema {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, table),
            _ => table.to_string(),
        };
        Self {
            students: qualify("students"),
            courses: qualify("courses"),
            marks: qualify("marks"),
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new(Some(DEFAULT_SCHEMA))
    }
}

/// Tables for a local SQLite store
///
/// PostgreSQL deployments own their schema; this only exists so a fresh SQLite file
/// is usable for development and tests.
pub const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_name TEXT NOT NULL,
    student_email TEXT NOT NULL,
    student_age INTEGER NOT NULL,
    student_parent_id INTEGER REFERENCES students(student_id),
    date_of_birth TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS courses (
    course_id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_name TEXT NOT NULL,
    course_code TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS marks (
    mark_id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    course_id INTEGER NOT NULL REFERENCES courses(course_id),
    mark REAL NOT NULL,
    date_recorded TEXT NOT NULL
);
";

/// Create the tables in an SQLite store if they are missing
pub async fn ensure_sqlite_schema(db: &dyn Database) -> Result<()> {
    db.execute_batch(SQLITE_SCHEMA).await?;
    tracing::debug!("SQLite schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_qualification() {
        let tables = Tables::default();
        assert_eq!(tables.students, "student_schema.students");
        assert_eq!(tables.marks, "student_schema.marks");

        let tables = Tables::new(None);
        assert_eq!(tables.courses, "courses");

        assert_eq!(Tables::new(Some("")), Tables::new(None));
    }
}
