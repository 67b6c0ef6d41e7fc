//! Data-access operations over the student, course and mark tables
//!
//! Every statement is produced by the query builder, so caller input only ever
//! reaches the store as a bound parameter.

use super::error::{RecordError, RecordResult};
use super::models::{NewCourse, NewMark, NewStudent, StudentDetail, StudentPage};
use super::pagination::PageRequest;
use super::schema::Tables;
use crate::core::{
    Database, DatabaseError, DatabaseRow, DatabaseType, DeleteBuilder, InsertBuilder,
    SelectBuilder, Statement, Transaction, UpdateBuilder,
};
use std::sync::Arc;

const STUDENT_NOT_FOUND: &str = "Student not found";
const MARK_STUDENT_MISSING: &str = "Student with provided student_id does not exist";

/// Student records backed by a pooled [`Database`]
#[derive(Clone)]
pub struct Repository {
    db: Arc<dyn Database>,
    tables: Tables,
}

impl Repository {
    /// Create a repository over `db` using the given table names
    pub fn new(db: Arc<dyn Database>, tables: Tables) -> Self {
        Self { db, tables }
    }

    /// The underlying connection provider
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    fn dialect(&self) -> DatabaseType {
        self.db.database_type()
    }

    /// Check that a connection can be leased and the server answers
    pub async fn ping(&self) -> RecordResult<()> {
        self.db.ping().await?;
        Ok(())
    }

    /// One page of students ordered by id, with the total matching count
    ///
    /// A non-empty search filters both the rows and the count by
    /// case-insensitive substring match on the name.
    pub async fn list_students(&self, request: &PageRequest) -> RecordResult<StudentPage> {
        let pattern = request.search_pattern();

        let mut select = SelectBuilder::new(&self.tables.students)
            .dialect(self.dialect())
            .count_column("count");
        if let Some(pattern) = &pattern {
            select = select.where_ilike("student_name", pattern);
        }
        let statement = select
            .order_by_asc("student_id")
            .limit(request.limit)
            .offset(request.offset())
            .to_statement();

        let students = self.db.query_statement(&statement).await?;

        let total_count = match students.first() {
            Some(row) => count_of(row)?,
            // Past the last page the count column has no row to ride on.
            None => self.count_students(pattern.as_deref()).await?,
        };

        Ok(StudentPage {
            page: request.page,
            total_pages: request.total_pages(total_count),
            total_count,
            students,
        })
    }

    async fn count_students(&self, pattern: Option<&str>) -> RecordResult<i64> {
        let mut select = SelectBuilder::new(&self.tables.students)
            .dialect(self.dialect())
            .columns(&["COUNT(*) AS count"]);
        if let Some(pattern) = pattern {
            select = select.where_ilike("student_name", pattern);
        }

        let rows = self.db.query_statement(&select.to_statement()).await?;
        let row = rows
            .first()
            .ok_or_else(|| DatabaseError::query("COUNT returned no row"))?;
        Ok(count_of(row)?)
    }

    /// A student and its marks, ordered by mark id
    pub async fn get_student(&self, student_id: i64) -> RecordResult<StudentDetail> {
        let statement = SelectBuilder::new(&self.tables.students)
            .where_eq("student_id", student_id)
            .to_statement();
        let student = self
            .db
            .query_statement(&statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RecordError::not_found(STUDENT_NOT_FOUND))?;

        let statement = SelectBuilder::new(&self.tables.marks)
            .where_eq("student_id", student_id)
            .order_by_asc("mark_id")
            .to_statement();
        let marks = self.db.query_statement(&statement).await?;

        Ok(StudentDetail { student, marks })
    }

    /// Insert a student and return the stored row
    pub async fn create_student(&self, student: &NewStudent) -> RecordResult<DatabaseRow> {
        let insert = student
            .columns()
            .into_iter()
            .fold(InsertBuilder::new(&self.tables.students), |builder, (column, value)| {
                builder.value(column, value)
            })
            .returning_all();

        let row = self.insert_one(&insert.to_statement()).await?;
        tracing::info!(student_id = ?row.get("student_id"), "student created");
        Ok(row)
    }

    /// Insert a course and return the stored row
    pub async fn create_course(&self, course: &NewCourse) -> RecordResult<DatabaseRow> {
        let statement = InsertBuilder::new(&self.tables.courses)
            .value("course_name", course.course_name.as_str())
            .value("course_code", course.course_code.as_str())
            .returning_all()
            .to_statement();

        self.insert_one(&statement).await
    }

    /// Insert a mark for an existing student and return the stored row
    ///
    /// The student is looked up first; when it is absent nothing is written.
    pub async fn create_mark(&self, mark: &NewMark) -> RecordResult<DatabaseRow> {
        let statement = SelectBuilder::new(&self.tables.students)
            .columns(&["student_id"])
            .where_eq("student_id", mark.student_id)
            .to_statement();
        if self.db.query_statement(&statement).await?.is_empty() {
            tracing::warn!(student_id = mark.student_id, "mark rejected: unknown student");
            return Err(RecordError::not_found(MARK_STUDENT_MISSING));
        }

        let statement = InsertBuilder::new(&self.tables.marks)
            .value("student_id", mark.student_id)
            .value("course_id", mark.course_id)
            .value("mark", mark.mark)
            .value("date_recorded", mark.date_recorded)
            .returning_all()
            .to_statement();

        self.insert_one(&statement).await
    }

    /// Replace every field of a student and return the updated row
    pub async fn update_student(
        &self,
        student_id: i64,
        student: &NewStudent,
    ) -> RecordResult<DatabaseRow> {
        let statement = student
            .columns()
            .into_iter()
            .fold(UpdateBuilder::new(&self.tables.students), |builder, (column, value)| {
                builder.set(column, value)
            })
            .where_eq("student_id", student_id)
            .returning_all()
            .to_statement();

        self.db
            .query_statement(&statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                tracing::warn!(student_id, "update rejected: unknown student");
                RecordError::not_found(STUDENT_NOT_FOUND)
            })
    }

    /// Delete a student together with its marks as one unit of work
    pub async fn delete_student(&self, student_id: i64) -> RecordResult<()> {
        let mut tx = self.db.begin().await?;

        match self.delete_in(tx.as_mut(), student_id).await {
            Ok(true) => {
                tx.commit().await?;
                Ok(())
            }
            Ok(false) => {
                tx.rollback().await?;
                tracing::warn!(student_id, "delete rejected: unknown student");
                Err(RecordError::not_found(STUDENT_NOT_FOUND))
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(error = %rollback_error, "rollback after failed delete");
                }
                Err(e.into())
            }
        }
    }

    /// Returns whether the student row existed
    async fn delete_in(
        &self,
        tx: &mut dyn Transaction,
        student_id: i64,
    ) -> Result<bool, DatabaseError> {
        let statement = DeleteBuilder::new(&self.tables.marks)
            .where_eq("student_id", student_id)
            .to_statement();
        let marks_deleted = tx.execute_statement(&statement).await?;

        let statement = DeleteBuilder::new(&self.tables.students)
            .where_eq("student_id", student_id)
            .returning_all()
            .to_statement();
        let deleted = tx.query_statement(&statement).await?;

        if !deleted.is_empty() {
            tracing::info!(student_id, marks_deleted, "student deleted");
        }
        Ok(!deleted.is_empty())
    }

    async fn insert_one(&self, statement: &Statement) -> RecordResult<DatabaseRow> {
        let row = self
            .db
            .query_statement(statement)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::query("INSERT returned no row"))?;
        Ok(row)
    }
}

/// Read the `count` column as an integer
fn count_of(row: &DatabaseRow) -> Result<i64, DatabaseError> {
    row.get("count")
        .and_then(|value| value.as_long())
        .ok_or_else(|| DatabaseError::ColumnNotFound("count".to_string()))
}
